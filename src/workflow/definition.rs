//! Workflow definition parsing and structures
//!
//! A workflow arrives as a JSON tree of `{ id, type, data, childs }` nodes.
//! Node types are case-sensitive; anything outside the known set loads as a
//! structural pass-through node. Kind-specific payloads are parsed eagerly so
//! a malformed definition fails at load, never mid-conversation.

use std::sync::Arc;

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A workflow definition file: optional name plus the step tree.
///
/// The tree root is a container (trigger) node; execution starts at its
/// first child.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub tree: RawNode,
}

/// A node exactly as it appears on the wire, before payload typing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNode {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub childs: Vec<RawNode>,
}

/// Node ids may be JSON strings or numbers; normalize to a string key.
fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "node id must be a string or number, got {}",
            other
        ))),
    }
}

/// One step of the workflow tree, fully typed.
#[derive(Debug, Clone)]
pub struct WorkflowNode {
    pub id: String,
    pub kind: StepKind,
    pub children: Vec<Arc<WorkflowNode>>,
}

impl WorkflowNode {
    /// First child, if any.
    pub fn first_child(&self) -> Option<&WorkflowNode> {
        self.children.first().map(|c| c.as_ref())
    }

    /// Resolve an outcome-tagged child (`ValidAnswer`, `InvalidAnswer`, ...)
    /// to the step it wraps. The wrapper itself carries no behavior; its
    /// first child is what executes.
    pub fn outcome_child(&self, tag: &str) -> Option<&WorkflowNode> {
        self.children
            .iter()
            .find(|c| matches!(&c.kind, StepKind::Structural(name) if name == tag))
            .and_then(|c| c.first_child())
    }
}

/// Closed set of step behaviors. Unknown wire types (including the
/// outcome-tag wrappers) land in `Structural`, which keeps the raw name for
/// tagged-child lookup.
#[derive(Debug, Clone)]
pub enum StepKind {
    Question(QuestionData),
    Branch,
    Condition(ConditionData),
    Else,
    Action(ActionData),
    HttpRequest(HttpRequestData),
    DateTime,
    AssignTo,
    Jump(JumpData),
    Structural(String),
}

impl StepKind {
    /// Short name for logging.
    pub fn name(&self) -> &str {
        match self {
            StepKind::Question(_) => "QuestionStep",
            StepKind::Branch => "BranchStep",
            StepKind::Condition(_) => "IfCondition",
            StepKind::Else => "ElseCondition",
            StepKind::Action(_) => "ActionStep",
            StepKind::HttpRequest(_) => "HttpRequestStep",
            StepKind::DateTime => "DateTimeStep",
            StepKind::AssignTo => "AssignToStep",
            StepKind::Jump(_) => "JumpStep",
            StepKind::Structural(name) => name,
        }
    }
}

/// Payload of a question step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionData {
    pub question: Question,
    #[serde(default)]
    pub save_response: Option<SaveResponse>,
}

/// The prompt itself.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub interactive: Option<ListPayload>,
}

/// Expected reply shape of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Free text; valid iff non-empty after trimming.
    #[default]
    Text,
    /// Bounded choice; reply must equal one option exactly.
    Multiple,
    /// Selectable list; reply must equal a row title.
    WhatsappList,
}

/// Where a valid reply is stored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveResponse {
    pub has_variable: bool,
    pub variable: Option<String>,
    pub has_field: bool,
    pub field: Option<String>,
}

/// Selectable-list payload. Doubles as the outbound wire shape, so it
/// serializes too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPayload {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub body: ListBody,
    pub action: ListAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBody {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAction {
    pub button: String,
    #[serde(default)]
    pub sections: Vec<ListSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ListPayload {
    /// Whether any row title equals `reply` exactly.
    pub fn has_row(&self, reply: &str) -> bool {
        self.action
            .sections
            .iter()
            .any(|s| s.rows.iter().any(|r| r.title == reply))
    }
}

/// Payload of a condition child under a branch step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionData {
    #[serde(default)]
    pub conditions: Vec<Predicate>,
}

/// One equality check against a session variable. All predicates of a
/// condition must hold; an empty predicate list matches nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct Predicate {
    #[serde(rename = "hasVariable", default)]
    pub has_variable: bool,
    #[serde(default)]
    pub variable: Option<String>,
    #[serde(default)]
    pub filter_operator: FilterOperator,
    #[serde(default)]
    pub values: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum FilterOperator {
    #[default]
    EqualTo,
    /// Operators this engine does not evaluate; such predicates pass.
    Other,
}

impl From<String> for FilterOperator {
    fn from(value: String) -> Self {
        match value.as_str() {
            "equal_to" => FilterOperator::EqualTo,
            _ => FilterOperator::Other,
        }
    }
}

/// Payload of an action step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionData {
    SendMessage {
        #[serde(default)]
        payload: Vec<MessagePayload>,
    },
    AddComment {
        #[serde(default)]
        comment: String,
    },
    /// Action types this engine does not perform; the step still visits its
    /// child.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub message: Option<MessageBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub text: Option<String>,
}

/// Payload of an HTTP-request step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestData {
    pub url: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub save_response: Option<SaveResponse>,
    #[serde(default)]
    pub response_map: Vec<ResponseMapping>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
}

/// Copies one field of the JSON response into a session variable.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMapping {
    pub variable: String,
    pub key: String,
}

/// Payload of a jump step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpData {
    #[serde(deserialize_with = "id_string")]
    pub step_id: String,
    #[serde(default)]
    pub max_jumps: Option<u32>,
}

impl WorkflowNode {
    /// Type a raw wire node. Fails on a malformed payload for a known kind.
    pub fn from_raw(raw: RawNode) -> Result<Self> {
        let RawNode { id, kind, data, childs } = raw;

        let kind = match kind.as_str() {
            "QuestionStep" => StepKind::Question(parse_payload(&id, &kind, data)?),
            "BranchStep" => StepKind::Branch,
            "IfCondition" => StepKind::Condition(parse_payload(&id, &kind, data)?),
            "ElseCondition" => StepKind::Else,
            "ActionStep" => {
                if data.is_null() {
                    StepKind::Action(ActionData::Unknown)
                } else {
                    StepKind::Action(parse_payload(&id, &kind, data)?)
                }
            }
            "HttpRequestStep" => StepKind::HttpRequest(parse_payload(&id, &kind, data)?),
            "DateTimeStep" => StepKind::DateTime,
            "AssignToStep" => StepKind::AssignTo,
            "JumpStep" => StepKind::Jump(parse_payload(&id, &kind, data)?),
            other => StepKind::Structural(other.to_string()),
        };

        let children = childs
            .into_iter()
            .map(|c| WorkflowNode::from_raw(c).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(WorkflowNode { id, kind, children })
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    id: &str,
    kind: &str,
    data: serde_json::Value,
) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| Error::Definition(format!("{} {}: invalid payload: {}", kind, id, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_node_numeric_id() {
        let raw: RawNode = serde_json::from_str(r#"{"id": 42, "type": "BranchStep"}"#).unwrap();
        assert_eq!(raw.id, "42");
        assert!(raw.childs.is_empty());
    }

    #[test]
    fn test_unknown_type_is_structural() {
        let raw: RawNode =
            serde_json::from_str(r#"{"id": "x", "type": "SomeFutureStep"}"#).unwrap();
        let node = WorkflowNode::from_raw(raw).unwrap();
        assert!(matches!(node.kind, StepKind::Structural(ref n) if n == "SomeFutureStep"));
    }

    #[test]
    fn test_question_payload() {
        let raw: RawNode = serde_json::from_str(
            r#"{
                "id": "q1",
                "type": "QuestionStep",
                "data": {
                    "question": { "type": "multiple", "text": "Pick", "options": ["A", "B"] },
                    "saveResponse": { "hasVariable": true, "variable": "choice" }
                }
            }"#,
        )
        .unwrap();
        let node = WorkflowNode::from_raw(raw).unwrap();
        let StepKind::Question(q) = &node.kind else {
            panic!("expected question");
        };
        assert_eq!(q.question.kind, QuestionKind::Multiple);
        assert_eq!(q.question.options, vec!["A", "B"]);
        let save = q.save_response.as_ref().unwrap();
        assert!(save.has_variable);
        assert_eq!(save.variable.as_deref(), Some("choice"));
    }

    #[test]
    fn test_malformed_question_payload_is_fatal() {
        let raw: RawNode = serde_json::from_str(
            r#"{"id": "q1", "type": "QuestionStep", "data": {"question": {"type": "carousel"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            WorkflowNode::from_raw(raw),
            Err(Error::Definition(_))
        ));
    }

    #[test]
    fn test_action_unknown_type_tolerated() {
        let raw: RawNode = serde_json::from_str(
            r#"{"id": "a1", "type": "ActionStep", "data": {"type": "close_ticket"}}"#,
        )
        .unwrap();
        let node = WorkflowNode::from_raw(raw).unwrap();
        assert!(matches!(node.kind, StepKind::Action(ActionData::Unknown)));
    }

    #[test]
    fn test_jump_numeric_target() {
        let raw: RawNode = serde_json::from_str(
            r#"{"id": "j1", "type": "JumpStep", "data": {"stepId": 7, "maxJumps": 3}}"#,
        )
        .unwrap();
        let node = WorkflowNode::from_raw(raw).unwrap();
        let StepKind::Jump(j) = &node.kind else { panic!("expected jump") };
        assert_eq!(j.step_id, "7");
        assert_eq!(j.max_jumps, Some(3));
    }

    #[test]
    fn test_outcome_child_skips_wrapper() {
        let raw: RawNode = serde_json::from_str(
            r#"{
                "id": "h1", "type": "DateTimeStep",
                "childs": [
                    { "id": "ok", "type": "ValidDateTime",
                      "childs": [ { "id": "inner", "type": "BranchStep" } ] }
                ]
            }"#,
        )
        .unwrap();
        let node = WorkflowNode::from_raw(raw).unwrap();
        let inner = node.outcome_child("ValidDateTime").unwrap();
        assert_eq!(inner.id, "inner");
        assert!(node.outcome_child("InvalidDateTime").is_none());
    }
}
