//! Rule tree construction: free functions over raw form input plus a fluent
//! builder for assembling a segment in code.

use crm_core::types::{NewSegment, PreviewRequest};
use crm_core::{CrmError, CrmResult};
use serde_json::Value;

use crate::codec;
use crate::predicates::{ComparisonOperator, Field, LogicalOperator, Rule, RuleGroup, RuleNode};

/// Build a leaf predicate from untyped input. Numeric strings are coerced,
/// so `create_rule("totalSpend", ">", "10000")` yields a value of `10000`.
pub fn create_rule(field: &str, operator: &str, value: impl Into<Value>) -> CrmResult<Rule> {
    let field: Field = field.parse()?;
    let operator: ComparisonOperator = operator.parse()?;
    let value = coerce_number(field, value.into())?;
    Rule::new(field, operator, value)
}

/// Build a group node. Zero children is allowed.
pub fn create_group(op: &str, children: Vec<RuleNode>) -> CrmResult<RuleGroup> {
    Ok(RuleGroup::new(op.parse()?, children))
}

/// Returns a copy of `group` with `node` appended.
pub fn add_child(group: &RuleGroup, node: impl Into<RuleNode>) -> RuleGroup {
    let mut next = group.clone();
    next.children.push(node.into());
    next
}

/// Returns a copy of `group` without the child at `index`.
pub fn remove_child(group: &RuleGroup, index: usize) -> CrmResult<RuleGroup> {
    if index >= group.children.len() {
        return Err(CrmError::Index {
            index,
            len: group.children.len(),
        });
    }
    let mut next = group.clone();
    next.children.remove(index);
    Ok(next)
}

fn coerce_number(field: Field, value: Value) -> CrmResult<f64> {
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(CrmError::Validation(format!(
            "value {value} for {field} is not a number"
        ))),
    }
}

/// A named segment that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDraft {
    pub name: String,
    pub criteria: RuleGroup,
}

impl SegmentDraft {
    /// Body for `POST /api/segments`.
    pub fn to_request(&self) -> CrmResult<NewSegment> {
        Ok(NewSegment {
            name: self.name.clone(),
            rule_json: codec::serialize_group(&self.criteria)?,
        })
    }

    /// Body for `POST /api/segments/preview`.
    pub fn to_preview(&self) -> CrmResult<PreviewRequest> {
        Ok(PreviewRequest {
            rule_json: codec::serialize_group(&self.criteria)?,
        })
    }
}

/// Fluent construction of a flat segment, the shape the segment form produces.
pub struct SegmentBuilder {
    name: String,
    operator: LogicalOperator,
    children: Vec<RuleNode>,
    error: Option<CrmError>,
}

impl SegmentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operator: LogicalOperator::And,
            children: Vec::new(),
            error: None,
        }
    }

    pub fn with_or(mut self) -> Self {
        self.operator = LogicalOperator::Or;
        self
    }

    pub fn rule(mut self, field: Field, operator: ComparisonOperator, value: f64) -> Self {
        match Rule::new(field, operator, value) {
            Ok(rule) => self.children.push(rule.into()),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn spend_over(self, amount: f64) -> Self {
        self.rule(Field::TotalSpend, ComparisonOperator::GreaterThan, amount)
    }

    pub fn visits_at_least(self, visits: u32) -> Self {
        self.rule(
            Field::TotalVisits,
            ComparisonOperator::GreaterThanOrEqual,
            f64::from(visits),
        )
    }

    pub fn inactive_for_more_than(self, days: u32) -> Self {
        self.rule(
            Field::InactiveDays,
            ComparisonOperator::GreaterThan,
            f64::from(days),
        )
    }

    pub fn group(mut self, group: RuleGroup) -> Self {
        self.children.push(group.into());
        self
    }

    /// Fails with the first invalid rule handed to the builder.
    pub fn build(self) -> CrmResult<SegmentDraft> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(SegmentDraft {
            name: self.name,
            criteria: RuleGroup::new(self.operator, self.children),
        })
    }
}
