//! Predicate types for segment criteria.

use std::fmt;
use std::str::FromStr;

use crm_core::{CrmError, CrmResult};
use serde::{Deserialize, Serialize, Serializer};

/// Customer aggregate a rule compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    TotalSpend,
    TotalVisits,
    InactiveDays,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::TotalSpend, Field::TotalVisits, Field::InactiveDays];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::TotalSpend => "totalSpend",
            Field::TotalVisits => "totalVisits",
            Field::InactiveDays => "inactiveDays",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| CrmError::Validation(format!("unknown field '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "==")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
}

impl ComparisonOperator {
    pub const ALL: [ComparisonOperator; 6] = [
        ComparisonOperator::GreaterThan,
        ComparisonOperator::GreaterThanOrEqual,
        ComparisonOperator::LessThan,
        ComparisonOperator::LessThanOrEqual,
        ComparisonOperator::Equals,
        ComparisonOperator::NotEquals,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::Equals => "==",
            ComparisonOperator::NotEquals => "!=",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ComparisonOperator {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComparisonOperator::ALL
            .into_iter()
            .find(|op| op.symbol() == s)
            .ok_or_else(|| CrmError::Validation(format!("unknown operator '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalOperator {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(LogicalOperator::And),
            "OR" => Ok(LogicalOperator::Or),
            other => Err(CrmError::Validation(format!("unknown group operator '{other}'"))),
        }
    }
}

/// A single numeric comparison. `value` is always finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    field: Field,
    operator: ComparisonOperator,
    #[serde(serialize_with = "serialize_threshold")]
    value: f64,
}

impl Rule {
    pub fn new(field: Field, operator: ComparisonOperator, value: f64) -> CrmResult<Self> {
        if !value.is_finite() {
            return Err(CrmError::Validation(format!(
                "rule value for {field} must be a finite number, got {value}"
            )));
        }
        Ok(Self {
            field,
            operator,
            value,
        })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn operator(&self) -> ComparisonOperator {
        self.operator
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// Parses the `Display` form, e.g. `totalSpend > 10000`.
impl FromStr for Rule {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let [field, operator, value] = parts.as_slice() else {
            return Err(CrmError::Validation(format!(
                "expected '<field> <operator> <value>', got '{s}'"
            )));
        };
        crate::builder::create_rule(field, operator, *value)
    }
}

// Integral thresholds go out as JSON integers so `10000` never becomes `10000.0`.
fn serialize_threshold<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Boolean combinator over child nodes. Child order is kept for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub op: LogicalOperator,
    pub children: Vec<RuleNode>,
}

impl RuleGroup {
    pub fn new(op: LogicalOperator, children: Vec<RuleNode>) -> Self {
        Self { op, children }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of group levels from here down; a flat group has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(RuleNode::depth).max().unwrap_or(0)
    }

    /// All leaf rules in depth-first order.
    pub fn rules(&self) -> Vec<&Rule> {
        let mut out = Vec::new();
        collect_rules(self, &mut out);
        out
    }
}

fn collect_rules<'a>(group: &'a RuleGroup, out: &mut Vec<&'a Rule>) {
    for child in &group.children {
        match child {
            RuleNode::Rule(rule) => out.push(rule),
            RuleNode::Group(inner) => collect_rules(inner, out),
        }
    }
}

impl fmt::Display for RuleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.op)?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}

/// A node of the rule tree, tagged on the wire by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleNode {
    Rule(Rule),
    Group(RuleGroup),
}

impl RuleNode {
    pub fn depth(&self) -> usize {
        match self {
            RuleNode::Rule(_) => 0,
            RuleNode::Group(group) => group.depth(),
        }
    }
}

impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleNode::Rule(rule) => write!(f, "{rule}"),
            RuleNode::Group(group) => write!(f, "{group}"),
        }
    }
}

impl From<Rule> for RuleNode {
    fn from(rule: Rule) -> Self {
        RuleNode::Rule(rule)
    }
}

impl From<RuleGroup> for RuleNode {
    fn from(group: RuleGroup) -> Self {
        RuleNode::Group(group)
    }
}
