//! Audience segmentation rules: a boolean tree of numeric predicates over
//! customer aggregates, built and serialized client-side and evaluated by the
//! backend.

pub mod builder;
pub mod codec;
pub mod predicates;

pub use builder::{add_child, create_group, create_rule, remove_child, SegmentBuilder, SegmentDraft};
pub use codec::{deserialize, serialize, serialize_group, serialize_rule};
pub use predicates::{ComparisonOperator, Field, LogicalOperator, Rule, RuleGroup, RuleNode};
