//! Workflow step interpreter
//!
//! Walks the step tree for one conversation, handling:
//! - Prompt rendering (text / buttons / list) and suspension on questions
//! - Reply validation and resumption at the matching outcome branch
//! - Conditional branching on session variables
//! - Outbound HTTP calls with response capture
//! - Loop-guarded jumps
//!
//! Execution is strictly sequential within one conversation; different
//! conversations run independently. Any error raised while executing a node
//! is caught at that node's boundary, logged, and stops that branch only.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::channel::ChannelAdapter;
use crate::inbound::InboundEvent;
use crate::session::{Session, SessionRegistry};
use crate::store::{Direction, MessageRecord, MessageSink};
use crate::template;
use crate::Result;

use super::definition::{
    ActionData, FilterOperator, HttpRequestData, JumpData, ListAction, ListBody, ListPayload,
    ListRow, ListSection, Predicate, QuestionData, QuestionKind, StepKind, WorkflowNode,
};
use super::store::Workflow;

const VALID_ANSWER: &str = "ValidAnswer";
const INVALID_ANSWER: &str = "InvalidAnswer";
const VALID_DATETIME: &str = "ValidDateTime";
const VALID_ASSIGN_TO: &str = "ValidAssignTo";

/// At most this many options render as quick-reply buttons.
const MAX_BUTTON_OPTIONS: usize = 3;
/// Longest option title the button shape accepts.
const BUTTON_OPTION_LIMIT: usize = 20;
/// Row titles in generated lists are clamped to this length.
const LIST_ROW_TITLE_LIMIT: usize = 24;

/// Tuning knobs for the runner.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Jump budget for jump nodes that do not carry their own.
    pub max_jumps: u32,
    /// Button label of list prompts generated from an oversized option set.
    pub list_button: String,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions {
            max_jumps: 10,
            list_button: "Select".to_string(),
        }
    }
}

/// Workflow step interpreter
pub struct WorkflowRunner {
    workflow: Arc<Workflow>,
    sessions: Arc<SessionRegistry>,
    channel: Arc<dyn ChannelAdapter>,
    sink: Arc<dyn MessageSink>,
    http: reqwest::Client,
    options: RunnerOptions,
}

impl WorkflowRunner {
    pub fn new(
        workflow: Arc<Workflow>,
        sessions: Arc<SessionRegistry>,
        channel: Arc<dyn ChannelAdapter>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self::with_options(workflow, sessions, channel, sink, RunnerOptions::default())
    }

    pub fn with_options(
        workflow: Arc<Workflow>,
        sessions: Arc<SessionRegistry>,
        channel: Arc<dyn ChannelAdapter>,
        sink: Arc<dyn MessageSink>,
        options: RunnerOptions,
    ) -> Self {
        WorkflowRunner {
            workflow,
            sessions,
            channel,
            sink,
            http: reqwest::Client::new(),
            options,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Process one inbound event to completion (or to the next suspension
    /// point). Holding the session lock for the whole call serializes
    /// near-simultaneous events for the same conversation.
    pub async fn handle_message(&self, event: &InboundEvent) -> Result<()> {
        self.record(
            MessageRecord::new(
                &event.conversation_id,
                Direction::Inbound,
                &event.text,
                None,
            )
            .with_sender_name(&event.display_name),
        )
        .await;

        if let Some(handle) = self.sessions.get(&event.conversation_id) {
            let mut session = handle.lock().await;

            let Some(step_id) = session.waiting_for_step.clone() else {
                debug!(
                    conversation = %event.conversation_id,
                    "no pending question, ignoring message"
                );
                return Ok(());
            };

            match self.workflow.lookup(&step_id) {
                Some(node) => match &node.kind {
                    StepKind::Question(data) => {
                        self.process_reply(
                            node,
                            data,
                            &mut session,
                            &event.conversation_id,
                            &event.text,
                        )
                        .await;
                    }
                    _ => warn!(step = %step_id, "pending step is not a question"),
                },
                None => warn!(step = %step_id, "pending step not found in workflow"),
            }
            return Ok(());
        }

        info!(conversation = %event.conversation_id, "starting workflow");
        let handle = self
            .sessions
            .create(&event.conversation_id, &event.display_name);
        let mut session = handle.lock().await;
        if let Some(entry) = self.workflow.entry() {
            self.execute(entry, &mut session, &event.conversation_id).await;
        }
        Ok(())
    }

    /// Execute one step. The error boundary: a failure inside the step is
    /// logged and stops this branch without propagating.
    fn execute<'a>(
        &'a self,
        node: &'a WorkflowNode,
        session: &'a mut Session,
        conversation: &'a str,
    ) -> BoxFuture<'a, ()> {
        async move {
            debug!(step = %node.id, kind = node.kind.name(), "executing step");
            if let Err(e) = self.execute_inner(node, session, conversation).await {
                error!(step = %node.id, kind = node.kind.name(), "step failed: {}", e);
            }
        }
        .boxed()
    }

    async fn execute_inner(
        &self,
        node: &WorkflowNode,
        session: &mut Session,
        conversation: &str,
    ) -> Result<()> {
        match &node.kind {
            StepKind::Question(data) => self.ask(node, data, session, conversation).await?,

            StepKind::Branch => self.run_branch(node, session, conversation).await,

            StepKind::Action(data) => self.run_action(node, data, session, conversation).await?,

            StepKind::HttpRequest(data) => {
                match self.http_request(data, session).await {
                    Ok(()) => {
                        if let Some(next) = node.outcome_child(VALID_ANSWER) {
                            self.execute(next, session, conversation).await;
                        }
                    }
                    Err(e) => {
                        warn!(step = %node.id, "http request failed: {}", e);
                        if let Some(next) = node.outcome_child(INVALID_ANSWER) {
                            self.execute(next, session, conversation).await;
                        }
                    }
                }
            }

            // Always in business hours for now; the outcome split is kept so
            // workflows are already authored against it.
            StepKind::DateTime => {
                if let Some(next) = node.outcome_child(VALID_DATETIME) {
                    self.execute(next, session, conversation).await;
                }
            }

            StepKind::AssignTo => {
                info!(conversation, step = %node.id, "handing conversation off");
                if let Some(next) = node.outcome_child(VALID_ASSIGN_TO) {
                    self.execute(next, session, conversation).await;
                }
            }

            StepKind::Jump(data) => self.run_jump(node, data, session, conversation).await,

            // Outcome wrappers and anything unrecognized pass through to
            // their first child.
            StepKind::Condition(_) | StepKind::Else | StepKind::Structural(_) => {
                if let Some(child) = node.first_child() {
                    self.execute(child, session, conversation).await;
                }
            }
        }
        Ok(())
    }

    /// Render a question prompt and arm the pending-reply state. The state
    /// is only armed after a successful send, so a transport failure leaves
    /// the session without a dangling question.
    async fn ask(
        &self,
        node: &WorkflowNode,
        data: &QuestionData,
        session: &mut Session,
        conversation: &str,
    ) -> Result<()> {
        let question = &data.question;

        let (provider_id, recorded) = match question.kind {
            QuestionKind::WhatsappList => match &question.interactive {
                Some(list) => {
                    let id = self.channel.send_list(conversation, list).await?;
                    (id, list.body.text.clone())
                }
                None => {
                    let id = self.channel.send_text(conversation, &question.text).await?;
                    (id, question.text.clone())
                }
            },

            QuestionKind::Multiple if !question.options.is_empty() => {
                if fits_buttons(&question.options) {
                    let id = self
                        .channel
                        .send_buttons(conversation, &question.text, &question.options)
                        .await?;
                    (id, format!("{}\n{}", question.text, question.options.join(" | ")))
                } else {
                    let list = list_from_options(
                        &question.text,
                        &question.options,
                        &self.options.list_button,
                    );
                    let id = self.channel.send_list(conversation, &list).await?;
                    (id, question.text.clone())
                }
            }

            _ => {
                let id = self.channel.send_text(conversation, &question.text).await?;
                (id, question.text.clone())
            }
        };

        self.record(MessageRecord::new(
            conversation,
            Direction::Outbound,
            &recorded,
            provider_id,
        ))
        .await;

        session.waiting_for_step = Some(node.id.clone());
        Ok(())
    }

    /// Validate a reply against the pending question and resume the tree at
    /// the matching outcome branch.
    async fn process_reply(
        &self,
        node: &WorkflowNode,
        data: &QuestionData,
        session: &mut Session,
        conversation: &str,
        reply: &str,
    ) {
        let question = &data.question;

        let valid = match question.kind {
            QuestionKind::Multiple => question.options.iter().any(|o| o == reply),
            QuestionKind::WhatsappList => question
                .interactive
                .as_ref()
                .map(|list| list.has_row(reply))
                .unwrap_or(false),
            QuestionKind::Text => !reply.trim().is_empty(),
        };

        if valid {
            if let Some(save) = &data.save_response {
                if save.has_variable {
                    if let Some(variable) = &save.variable {
                        session
                            .variables
                            .insert(variable.clone(), reply.to_string());
                    }
                }
                if save.has_field {
                    if let Some(field) = &save.field {
                        session.contact.set_field(field, reply);
                    }
                }
            }
        }

        session.waiting_for_step = None;

        let tag = if valid { VALID_ANSWER } else { INVALID_ANSWER };
        if let Some(next) = node.outcome_child(tag) {
            self.execute(next, session, conversation).await;
        } else if !valid {
            // No invalid branch configured: re-ask the same question.
            self.execute(node, session, conversation).await;
        }
    }

    /// First condition whose predicates all hold wins; the else child
    /// catches everything once no condition matched. Siblings after the
    /// taken branch are never tried.
    async fn run_branch(&self, node: &WorkflowNode, session: &mut Session, conversation: &str) {
        for child in &node.children {
            match &child.kind {
                StepKind::Condition(data) => {
                    if eval_conditions(&data.conditions, session) {
                        debug!(step = %node.id, taken = %child.id, "branch matched");
                        if let Some(next) = child.first_child() {
                            self.execute(next, session, conversation).await;
                        }
                        return;
                    }
                }
                StepKind::Else => {
                    debug!(step = %node.id, taken = %child.id, "branch fell through to else");
                    if let Some(next) = child.first_child() {
                        self.execute(next, session, conversation).await;
                    }
                    return;
                }
                _ => {}
            }
        }
        debug!(step = %node.id, "no branch matched");
    }

    async fn run_action(
        &self,
        node: &WorkflowNode,
        data: &ActionData,
        session: &mut Session,
        conversation: &str,
    ) -> Result<()> {
        match data {
            ActionData::SendMessage { payload } => {
                for item in payload {
                    let Some(text) = item.message.as_ref().and_then(|m| m.text.as_deref()) else {
                        continue;
                    };
                    let rendered = template::substitute(text, session);
                    let id = self.channel.send_text(conversation, &rendered).await?;
                    self.record(MessageRecord::new(
                        conversation,
                        Direction::Outbound,
                        &rendered,
                        id,
                    ))
                    .await;
                }
            }
            ActionData::AddComment { comment } => {
                info!(
                    conversation,
                    comment = %template::substitute(comment, session),
                    "workflow comment"
                );
            }
            ActionData::Unknown => {}
        }

        match node.first_child() {
            Some(child) => self.execute(child, session, conversation).await,
            None => {
                // The only non-question termination path.
                info!(conversation, "workflow complete, ending session");
                self.sessions.delete(conversation);
            }
        }
        Ok(())
    }

    async fn http_request(&self, data: &HttpRequestData, session: &mut Session) -> Result<()> {
        let body_text = template::substitute(data.body.as_deref().unwrap_or_default(), session);
        let body: serde_json::Value = serde_json::from_str(&body_text)?;

        let mut request = self.http.post(&data.url).json(&body);
        for header in &data.headers {
            request = request.header(header.key.as_str(), header.value.as_str());
        }

        let response = request.send().await?.error_for_status()?;
        let value: serde_json::Value = response.json().await?;

        if let Some(save) = &data.save_response {
            if save.has_variable {
                if let Some(variable) = &save.variable {
                    session.variables.insert(variable.clone(), value.to_string());
                }
            }
        }

        for mapping in &data.response_map {
            let mapped = match value.get(&mapping.key) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            session.variables.insert(mapping.variable.clone(), mapped);
        }

        Ok(())
    }

    /// Jumps are budgeted per (session, jump node); past the budget the jump
    /// is swallowed without error, as a loop valve rather than a failure.
    async fn run_jump(
        &self,
        node: &WorkflowNode,
        data: &JumpData,
        session: &mut Session,
        conversation: &str,
    ) {
        let count = session.jump_counts.entry(node.id.clone()).or_insert(0);
        *count += 1;
        let fired = *count;

        let budget = data.max_jumps.unwrap_or(self.options.max_jumps);
        if fired > budget {
            debug!(step = %node.id, fired, budget, "jump budget exhausted, stopping");
            return;
        }

        match self.workflow.lookup(&data.step_id) {
            Some(target) => self.execute(target, session, conversation).await,
            None => warn!(step = %node.id, target = %data.step_id, "jump target not found"),
        }
    }

    /// The sink is best-effort bookkeeping; its failures never disturb the
    /// conversation.
    async fn record(&self, record: MessageRecord) {
        if let Err(e) = self.sink.record(record).await {
            warn!("failed to record message: {}", e);
        }
    }
}

fn eval_conditions(conditions: &[Predicate], session: &Session) -> bool {
    // No predicates means the condition can never match.
    if conditions.is_empty() {
        return false;
    }
    for predicate in conditions {
        let value = if predicate.has_variable {
            predicate
                .variable
                .as_ref()
                .and_then(|v| session.variables.get(v))
                .map(String::as_str)
                .unwrap_or("")
        } else {
            ""
        };
        if predicate.filter_operator == FilterOperator::EqualTo && value != predicate.values {
            return false;
        }
    }
    true
}

fn fits_buttons(options: &[String]) -> bool {
    options.len() <= MAX_BUTTON_OPTIONS
        && options.iter().all(|o| o.chars().count() <= BUTTON_OPTION_LIMIT)
}

fn list_from_options(text: &str, options: &[String], button: &str) -> ListPayload {
    ListPayload {
        kind: Some("list".to_string()),
        body: ListBody {
            text: text.to_string(),
        },
        action: ListAction {
            button: button.to_string(),
            sections: vec![ListSection {
                title: None,
                rows: options
                    .iter()
                    .enumerate()
                    .map(|(i, option)| ListRow {
                        id: format!("opt_{}", i),
                        title: option.chars().take(LIST_ROW_TITLE_LIMIT).collect(),
                        description: None,
                    })
                    .collect(),
            }],
        },
    }
}
