//! Canonical JSON form of a rule tree, the `ruleJson` payload the backend
//! evaluates.
//!
//! ```text
//! {"type":"group","op":"AND","children":[{"type":"rule","field":"totalSpend","operator":">","value":10000}]}
//! ```

use crm_core::{CrmError, CrmResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::predicates::{Rule, RuleGroup, RuleNode};

/// Borrowed view so a bare group or rule serializes with its `type` tag
/// without being cloned into a `RuleNode`.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum NodeRef<'a> {
    Rule(&'a Rule),
    Group(&'a RuleGroup),
}

pub fn serialize(node: &RuleNode) -> CrmResult<String> {
    Ok(serde_json::to_string(node)?)
}

pub fn serialize_group(group: &RuleGroup) -> CrmResult<String> {
    Ok(serde_json::to_string(&NodeRef::Group(group))?)
}

pub fn serialize_rule(rule: &Rule) -> CrmResult<String> {
    Ok(serde_json::to_string(&NodeRef::Rule(rule))?)
}

/// Parse `ruleJson` text. Nesting depth is not limited, so anything
/// `serialize` produces decodes again.
pub fn deserialize(json: &str) -> CrmResult<RuleNode> {
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    RuleNode::deserialize(&mut de)
        .and_then(|node| de.end().map(|()| node))
        .map_err(|e| {
            debug!(error = %e, "Rejected rule tree");
            CrmError::Parse(e.to_string())
        })
}
