use crm_core::CrmError;
use crm_segmentation::{
    create_group, create_rule, deserialize, serialize, serialize_group, ComparisonOperator, Field,
    LogicalOperator, Rule, RuleGroup, RuleNode,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn high_spenders_inactive_wire_format() {
    let group = create_group(
        "AND",
        vec![
            create_rule("totalSpend", ">", 10000).unwrap().into(),
            create_rule("inactiveDays", ">", 90).unwrap().into(),
        ],
    )
    .unwrap();

    assert_eq!(
        serialize_group(&group).unwrap(),
        r#"{"type":"group","op":"AND","children":[{"type":"rule","field":"totalSpend","operator":">","value":10000},{"type":"rule","field":"inactiveDays","operator":">","value":90}]}"#
    );
}

#[test]
fn string_value_serializes_as_number() {
    let rule = create_rule("totalSpend", ">", "10000").unwrap();
    let json = serialize(&RuleNode::Rule(rule)).unwrap();
    assert_eq!(
        json,
        r#"{"type":"rule","field":"totalSpend","operator":">","value":10000}"#
    );
}

#[test]
fn empty_group_round_trips() {
    let group = create_group("OR", vec![]).unwrap();
    let json = serialize_group(&group).unwrap();
    assert_eq!(json, r#"{"type":"group","op":"OR","children":[]}"#);
    assert_eq!(deserialize(&json).unwrap(), RuleNode::Group(group));
}

#[test]
fn nested_groups_decode_from_backend_text() {
    let raw = r#"{"type":"group","op":"OR","children":[
        {"type":"rule","field":"totalVisits","operator":"<","value":3},
        {"type":"group","op":"AND","children":[
            {"type":"rule","field":"totalSpend","operator":">=","value":5000.5},
            {"type":"rule","field":"inactiveDays","operator":"==","value":0}
        ]}
    ]}"#;

    let RuleNode::Group(root) = deserialize(raw).unwrap() else {
        panic!("expected a group at the root");
    };
    assert_eq!(root.op, LogicalOperator::Or);
    assert_eq!(root.depth(), 2);
    let rules = root.rules();
    assert_eq!(rules.len(), 3);
    assert_eq!(rules[1].value(), 5000.5);
    assert_eq!(rules[2].operator(), ComparisonOperator::Equals);
}

#[test]
fn missing_type_tag_is_rejected() {
    let err = deserialize(r#"{"op":"AND","children":[]}"#);
    assert!(matches!(err, Err(CrmError::Parse(_))));
}

#[test]
fn deeply_nested_tree_round_trips() {
    // Debug builds recurse per level in both directions; give them room.
    std::thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .spawn(|| {
            let mut node = RuleNode::from(create_rule("totalVisits", ">=", 3).unwrap());
            for level in 0..100 {
                let op = if level % 2 == 0 { "AND" } else { "OR" };
                node = create_group(op, vec![node]).unwrap().into();
            }
            assert_eq!(node.depth(), 100);

            let json = serialize(&node).unwrap();
            assert_eq!(deserialize(&json).unwrap(), node);
        })
        .unwrap()
        .join()
        .unwrap();
}

fn arb_rule() -> impl Strategy<Value = Rule> {
    let field = prop::sample::select(Field::ALL.to_vec());
    let operator = prop::sample::select(ComparisonOperator::ALL.to_vec());
    let value = prop_oneof![
        (-1_000_000i64..1_000_000).prop_map(|v| v as f64),
        (-1.0e9f64..1.0e9),
    ];
    (field, operator, value).prop_map(|(f, o, v)| Rule::new(f, o, v).unwrap())
}

fn arb_node() -> impl Strategy<Value = RuleNode> {
    let leaf = arb_rule().prop_map(RuleNode::Rule);
    leaf.prop_recursive(4, 32, 5, |inner| {
        (
            prop::sample::select(vec![LogicalOperator::And, LogicalOperator::Or]),
            prop::collection::vec(inner, 0..5),
        )
            .prop_map(|(op, children)| RuleNode::Group(RuleGroup::new(op, children)))
    })
}

proptest! {
    #[test]
    fn serialize_then_deserialize_is_identity(node in arb_node()) {
        let json = serialize(&node).unwrap();
        prop_assert_eq!(deserialize(&json).unwrap(), node);
    }

    #[test]
    fn serialization_is_deterministic(node in arb_node()) {
        let first = serialize(&node).unwrap();
        let again = serialize(&deserialize(&first).unwrap()).unwrap();
        prop_assert_eq!(first, again);
    }
}
