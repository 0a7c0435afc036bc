//! Prompt submission: turns the pending prompt plus the conversation so far into one
//! relay exchange, then replays the reply into the store one character at a time.
//!
//! Only one exchange runs at a time. The synchronous half of [`Controller::submit`]
//! marks the store as loading before it returns, so a second submit is rejected until
//! the first reply has been fully revealed. The asynchronous half never touches the
//! store directly; it sends actions through an [`ActionSink`] and the UI loop applies
//! them.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TYPING_DELAY_MS};
use crate::instructions::InstructionTable;
use crate::relay::Relay;
use crate::state::{Action, SessionState, Store};
use crate::wire::{ChatTurn, RelayRequest};

/// Shown as the assistant's reply when the exchange fails for any reason.
pub const ERROR_REPLY: &str = "Error: Server Error. Please try again later.";

/// Where the background half of an exchange sends its actions.
pub trait ActionSink: Send + Sync + 'static {
    fn dispatch(&self, action: Action);
}

impl ActionSink for mpsc::UnboundedSender<Action> {
    fn dispatch(&self, action: Action) {
        // The receiver only goes away when the UI is shutting down.
        let _ = self.send(action);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Handle to a running exchange.
pub struct Submission {
    cancel: CancellationToken,
    handle: JoinHandle<ExchangeOutcome>,
}

impl Submission {
    /// Stop waiting on the relay or stop the reveal. Nothing is appended afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> ExchangeOutcome {
        self.handle.await.unwrap_or(ExchangeOutcome::Failed)
    }
}

pub struct Controller<R: Relay> {
    relay: Arc<R>,
    instructions: InstructionTable,
    typing_delay: Duration,
    timeout: Duration,
    session_id: Option<String>,
}

impl<R: Relay> Controller<R> {
    pub fn new(relay: R, instructions: InstructionTable) -> Self {
        Self {
            relay: Arc::new(relay),
            instructions,
            typing_delay: Duration::from_millis(DEFAULT_TYPING_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session_id: None,
        }
    }

    pub fn with_typing_delay(mut self, delay: Duration) -> Self {
        self.typing_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Scope the relay's server-side history to this id.
    pub fn with_session_id(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_random_session(self) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        self.with_session_id(&id)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Submit `pending` as the next user turn.
    ///
    /// Returns `None` without touching the store or `pending` when an exchange is
    /// already running or the prompt is blank.
    pub fn submit<S: ActionSink>(
        &self,
        store: &mut Store,
        pending: &mut String,
        sink: S,
    ) -> Option<Submission> {
        if store.state().is_busy() {
            return None;
        }
        let prompt = pending.trim();
        if prompt.is_empty() {
            return None;
        }

        // History is what existed before this prompt; the relay appends the prompt itself.
        let request = self.build_request(store.state(), prompt);
        store.dispatch(Action::UserInput(prompt.to_string()));
        pending.clear();

        Some(self.send_to_relay(store, request, sink))
    }

    /// Discard the conversation and the pending prompt. A running exchange keeps going.
    pub fn clear(&self, store: &mut Store, pending: &mut String) {
        store.dispatch(Action::ClearConversation);
        pending.clear();
    }

    pub fn build_request(&self, state: &SessionState, prompt: &str) -> RelayRequest {
        let instruction = self.instructions.lookup(&state.selected_model);

        let mut history = Vec::with_capacity(state.conversation.len() + 1);
        history.push(ChatTurn::system(&instruction));
        history.extend(state.conversation.iter().map(ChatTurn::from));

        RelayRequest {
            prompt: prompt.to_string(),
            model: Some(state.selected_model.clone()),
            history: Some(history),
            session_id: self.session_id.clone(),
        }
    }

    fn send_to_relay<S: ActionSink>(
        &self,
        store: &mut Store,
        request: RelayRequest,
        sink: S,
    ) -> Submission {
        store.dispatch(Action::SetTyping(String::new()));
        store.dispatch(Action::SetLoading(true));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_exchange(
            self.relay.clone(),
            request,
            self.timeout,
            self.typing_delay,
            sink,
            cancel.clone(),
        ));

        Submission { cancel, handle }
    }
}

async fn run_exchange<R: Relay, S: ActionSink>(
    relay: Arc<R>,
    request: RelayRequest,
    timeout: Duration,
    typing_delay: Duration,
    sink: S,
    cancel: CancellationToken,
) -> ExchangeOutcome {
    debug!(
        "[chat] sending prompt to relay model={:?} history={}",
        request.model,
        request.history.as_ref().map_or(0, Vec::len)
    );

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = tokio::time::timeout(timeout, relay.send(&request)) => Some(result),
    };

    let text = match result {
        None => {
            info!("[chat] exchange cancelled while waiting on the relay");
            sink.dispatch(Action::SetLoading(false));
            sink.dispatch(Action::SetTyping(String::new()));
            return ExchangeOutcome::Cancelled;
        }
        Some(Err(_)) => {
            warn!("[chat] relay did not answer within {}s", timeout.as_secs());
            fail(&sink);
            return ExchangeOutcome::Failed;
        }
        Some(Ok(Err(e))) => {
            warn!("[chat] relay request failed: {e:#}");
            fail(&sink);
            return ExchangeOutcome::Failed;
        }
        Some(Ok(Ok(text))) => text,
    };

    sink.dispatch(Action::SetLoading(false));

    if !reveal(&text, typing_delay, &sink, &cancel).await {
        info!("[chat] exchange cancelled during reveal");
        sink.dispatch(Action::SetTyping(String::new()));
        return ExchangeOutcome::Cancelled;
    }

    sink.dispatch(Action::AiOutput(text));
    sink.dispatch(Action::SetTyping(String::new()));
    ExchangeOutcome::Completed
}

fn fail<S: ActionSink>(sink: &S) {
    sink.dispatch(Action::SetLoading(false));
    sink.dispatch(Action::AiOutput(ERROR_REPLY.to_string()));
}

/// Replay an already received reply as a growing prefix, one character per step.
///
/// Returns false if `cancel` fired before the whole text was shown.
pub async fn reveal<S: ActionSink>(
    text: &str,
    delay: Duration,
    sink: &S,
    cancel: &CancellationToken,
) -> bool {
    let mut prefix = String::with_capacity(text.len());
    for ch in text.chars() {
        if cancel.is_cancelled() {
            return false;
        }
        prefix.push(ch);
        sink.dispatch(Action::SetTyping(prefix.clone()));

        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
    true
}
