//! Turn controller executor

use super::recovery::{recover_interrupted, RecoveryReason};
use super::traits::{CheckpointStore, LlmClient, ToolExecutor};
use super::{SseEvent, TurnError, TurnOutcome, TurnStatus};

use crate::llm::{ContentBlock, LlmMessage, LlmRequest, MessageRole, SystemContent};
use crate::state_machine::{
    transition, Conversation, Effect, Event, Notification, Role, ThreadSummary, TurnState,
};
use crate::system_prompt::build_system_prompt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const MAX_RESPONSE_TOKENS: u32 = 4096;

/// Drives turns for any number of threads.
///
/// One call to `submit` or `resume` runs the thread's state machine until the
/// turn finishes or suspends on the approval question. Each thread has its
/// own lock; a second call while a turn is running is refused rather than
/// queued.
pub struct TurnController<S, L, T>
where
    S: CheckpointStore + 'static,
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    store: S,
    llm_client: L,
    tool_executor: T,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    channels: Mutex<HashMap<String, broadcast::Sender<SseEvent>>>,
}

impl<S, L, T> TurnController<S, L, T>
where
    S: CheckpointStore + 'static,
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    pub fn new(store: S, llm_client: L, tool_executor: T) -> Self {
        Self {
            store,
            llm_client,
            tool_executor,
            locks: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn model_id(&self) -> &str {
        self.llm_client.model_id()
    }

    /// Start a turn with the user's text
    pub async fn submit(&self, thread_id: &str, text: &str) -> Result<TurnOutcome, TurnError> {
        self.run_turn(
            thread_id,
            Event::UserMessage {
                text: text.to_string(),
            },
        )
        .await
    }

    /// Resume a suspended turn with the operator's approval answer
    pub async fn resume(&self, thread_id: &str, answer: &str) -> Result<TurnOutcome, TurnError> {
        self.run_turn(
            thread_id,
            Event::ApprovalAnswer {
                answer: answer.to_string(),
            },
        )
        .await
    }

    /// Latest checkpoint for a thread
    pub async fn conversation(&self, thread_id: &str) -> Result<Option<Conversation>, TurnError> {
        self.store.load(thread_id).await.map_err(TurnError::Storage)
    }

    pub async fn threads(&self) -> Result<Vec<ThreadSummary>, TurnError> {
        self.store.list().await.map_err(TurnError::Storage)
    }

    /// Subscribe to live events for a thread
    pub fn subscribe(&self, thread_id: &str) -> broadcast::Receiver<SseEvent> {
        self.prune_channels();
        self.channel(thread_id).subscribe()
    }

    fn channel(&self, thread_id: &str) -> broadcast::Sender<SseEvent> {
        self.channels
            .lock()
            .unwrap()
            .entry(thread_id.to_string())
            .or_insert_with(|| broadcast::channel(128).0)
            .clone()
    }

    /// Drop channels whose subscribers have all gone and whose thread is idle
    fn prune_channels(&self) {
        let locks = self.locks.lock().unwrap();
        self.channels.lock().unwrap().retain(|id, tx| {
            tx.receiver_count() > 0 || locks.get(id).is_some_and(|l| Arc::strong_count(l) > 1)
        });
    }

    /// Forget a finished thread's lock, then prune idle channels
    fn release_thread(&self, thread_id: &str) {
        {
            let mut locks = self.locks.lock().unwrap();
            if locks
                .get(thread_id)
                .is_some_and(|l| Arc::strong_count(l) == 1)
            {
                locks.remove(thread_id);
            }
        }
        self.prune_channels();
    }

    #[cfg(test)]
    pub(crate) fn tracked_threads(&self) -> (usize, usize) {
        (
            self.locks.lock().unwrap().len(),
            self.channels.lock().unwrap().len(),
        )
    }

    fn thread_lock(&self, thread_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap()
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }

    async fn run_turn(&self, thread_id: &str, event: Event) -> Result<TurnOutcome, TurnError> {
        let Ok(guard) = self.thread_lock(thread_id).try_lock_owned() else {
            tracing::warn!(thread_id = %thread_id, "Rejected request: turn already running");
            return Err(TurnError::ThreadBusy(thread_id.to_string()));
        };

        let result = self.drive_turn(thread_id, event).await;
        drop(guard);
        self.release_thread(thread_id);
        result
    }

    /// Run one turn; the caller holds the thread lock
    async fn drive_turn(&self, thread_id: &str, event: Event) -> Result<TurnOutcome, TurnError> {
        let mut conv = self
            .store
            .load(thread_id)
            .await
            .map_err(TurnError::Storage)?
            .unwrap_or_else(|| Conversation::new(thread_id));

        let recovery = recover_interrupted(&mut conv);
        if recovery != RecoveryReason::NotInterrupted {
            tracing::warn!(thread_id = %thread_id, reason = ?recovery, "Closed out interrupted turn");
            self.store.save(&conv).await.map_err(TurnError::Storage)?;
        }
        let start_len = conv.messages().len();

        let broadcast_tx = self.channel(thread_id);
        let mut failure = None;

        // Process events in a loop - no recursion
        let mut events_to_process = vec![event];
        while let Some(current_event) = events_to_process.pop() {
            let result = transition(&conv.turn, current_event)?;
            let old_label = conv.turn.label();
            conv.turn = result.new_state;
            tracing::debug!(
                thread_id = %thread_id,
                from = old_label,
                to = conv.turn.label(),
                "State transition"
            );

            for effect in result.effects {
                if let Some(generated) = self
                    .execute_effect(&mut conv, effect, &broadcast_tx, &mut failure)
                    .await?
                {
                    events_to_process.push(generated);
                }
            }
        }

        let messages = conv.messages().iter().skip(start_len).cloned().collect();
        let status = match (failure, &conv.turn) {
            (Some(error), _) => TurnStatus::Failed { error },
            (None, TurnState::Done) => TurnStatus::Done,
            (None, TurnState::AwaitingHumanApproval { question, .. }) => {
                TurnStatus::AwaitingApproval {
                    question: question.clone(),
                }
            }
            (None, other) => TurnStatus::Failed {
                error: format!("Turn stopped in state {}", other.label()),
            },
        };

        tracing::info!(
            thread_id = %thread_id,
            state = conv.turn.label(),
            appended = conv.messages().len() - start_len,
            "Turn finished"
        );

        Ok(TurnOutcome {
            thread_id: thread_id.to_string(),
            status,
            messages,
        })
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(
        &self,
        conv: &mut Conversation,
        effect: Effect,
        broadcast_tx: &broadcast::Sender<SseEvent>,
        failure: &mut Option<String>,
    ) -> Result<Option<Event>, TurnError> {
        match effect {
            Effect::AppendMessage(message) => {
                let _ = broadcast_tx.send(SseEvent::Message {
                    message: message.clone(),
                });
                conv.push(message);
                Ok(None)
            }

            Effect::SetApproval(outcome) => {
                tracing::info!(thread_id = %conv.thread_id, outcome = %outcome, "Approval recorded");
                conv.approval = Some(outcome);
                Ok(None)
            }

            Effect::Checkpoint => {
                self.store.save(conv).await.map_err(TurnError::Storage)?;
                Ok(None)
            }

            Effect::RequestModel => {
                let request = self.build_request(conv);
                let event = match self.llm_client.complete(&request).await {
                    Ok(response) => Event::from_llm_response(&response),
                    Err(e) => Event::from_llm_error(&e),
                };
                Ok(Some(event))
            }

            Effect::ExecuteTool { call } => {
                tracing::info!(
                    thread_id = %conv.thread_id,
                    tool = %call.kind,
                    id = %call.id,
                    "Executing tool"
                );
                let output = self.tool_executor.execute(&conv.thread_id, &call).await;
                Ok(Some(Event::ToolComplete {
                    tool_call_id: call.id,
                    output,
                }))
            }

            Effect::Notify(Notification::ApprovalRequired {
                tool_call_id,
                question,
            }) => {
                let _ = broadcast_tx.send(SseEvent::ApprovalRequired {
                    tool_call_id,
                    question,
                });
                Ok(None)
            }

            Effect::Notify(Notification::TurnDone) => {
                let _ = broadcast_tx.send(SseEvent::TurnDone);
                Ok(None)
            }

            Effect::ReportFailure { message } => {
                tracing::warn!(thread_id = %conv.thread_id, error = %message, "Turn failed");
                let _ = broadcast_tx.send(SseEvent::TurnFailed {
                    message: message.clone(),
                });
                *failure = Some(message);
                Ok(None)
            }
        }
    }

    fn build_request(&self, conv: &Conversation) -> LlmRequest {
        LlmRequest {
            system: vec![SystemContent::new(build_system_prompt(conv.approval))],
            messages: llm_messages(conv),
            tools: self.tool_executor.definitions(),
            max_tokens: Some(MAX_RESPONSE_TOKENS),
        }
    }
}

/// Translate the log into provider-neutral messages
fn llm_messages(conv: &Conversation) -> Vec<LlmMessage> {
    conv.messages()
        .iter()
        .map(|msg| match msg.role {
            Role::User => LlmMessage {
                role: MessageRole::User,
                content: vec![ContentBlock::text(msg.content.clone())],
            },
            Role::Assistant => {
                let mut content = Vec::new();
                if !msg.content.is_empty() {
                    content.push(ContentBlock::text(msg.content.clone()));
                }
                content.extend(msg.tool_calls.iter().map(|call| {
                    ContentBlock::tool_use(call.id.clone(), call.name.clone(), call.arguments.clone())
                }));
                LlmMessage {
                    role: MessageRole::Assistant,
                    content,
                }
            }
            Role::Tool => LlmMessage {
                role: MessageRole::User,
                content: vec![ContentBlock::tool_result(
                    msg.tool_call_id.clone().unwrap_or_default(),
                    msg.content.clone(),
                    msg.is_error,
                )],
            },
        })
        .collect()
}
