//! Conversation workflow system
//!
//! A workflow is a static tree of steps scripting one conversation:
//!
//! - **Questions**: prompt the user and suspend until a reply arrives
//! - **Branches**: pick one child by session-variable conditions
//! - **Actions**: send templated messages or log comments; a childless
//!   action ends the session
//! - **HttpRequest**: call an external endpoint and capture the response
//! - **Jumps**: loop back to an earlier step, budgeted per session
//!
//! ## Example definition
//!
//! ```json
//! {
//!   "name": "support-intake",
//!   "tree": {
//!     "id": "root", "type": "Trigger",
//!     "childs": [{
//!       "id": "q1", "type": "QuestionStep",
//!       "data": {
//!         "question": { "type": "multiple", "text": "Pick one", "options": ["A", "B"] },
//!         "saveResponse": { "hasVariable": true, "variable": "choice" }
//!       },
//!       "childs": [
//!         { "id": "ok", "type": "ValidAnswer", "childs": [ ... ] },
//!         { "id": "bad", "type": "InvalidAnswer", "childs": [ ... ] }
//!       ]
//!     }]
//!   }
//! }
//! ```

pub mod definition;
pub mod runner;
pub mod store;

pub use definition::{
    ActionData, ConditionData, FilterOperator, Header, HttpRequestData, JumpData, ListAction,
    ListBody, ListPayload, ListRow, ListSection, MessageBody, MessagePayload, Predicate, Question,
    QuestionData, QuestionKind, RawNode, ResponseMapping, SaveResponse, StepKind,
    WorkflowDefinition, WorkflowNode,
};
pub use runner::{RunnerOptions, WorkflowRunner};
pub use store::Workflow;
