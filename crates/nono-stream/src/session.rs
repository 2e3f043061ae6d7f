use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use parking_lot::ReentrantMutex;
use tokio::sync::watch;
use tracing::{Instrument as _, debug, info_span, warn};

use crate::classify::{Observation, classify};
use crate::errors::{ClassifiedError, ErrorKind};
use crate::openai::request::RequestSpec;
use crate::retry::RetryPolicy;
use crate::stream::{
    CompletionCallbacks, DeltaFilter, FrameOutcome, SessionState, interpret_frame,
};
use crate::transport::StreamTransport;

/// State shared between a running session and its handles.
///
/// Every callback runs while holding `gate`, and `cancel` takes the same gate,
/// so once `cancel` returns no callback is running or can start. The gate is
/// re-entrant so a callback may cancel its own session.
struct SessionShared {
    id: uuid::Uuid,
    state: watch::Sender<SessionState>,
    gate: ReentrantMutex<()>,
}

impl SessionShared {
    fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            id: uuid::Uuid::new_v4(),
            state,
            gate: ReentrantMutex::new(()),
        }
    }

    fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Moves to `next` unless the session is already terminal.
    fn transition(&self, next: SessionState) -> bool {
        let mut allowed = false;
        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            allowed = true;
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        allowed
    }

    fn emit_message(
        &self,
        callbacks: &mut dyn CompletionCallbacks,
        text: &str,
        is_first: bool,
    ) -> bool {
        let _gate = self.gate.lock();
        if self.current() != SessionState::Streaming {
            return false;
        }
        callbacks.on_message(text, is_first);
        true
    }

    fn emit_finish(&self, callbacks: &mut dyn CompletionCallbacks, full_text: &str) {
        let _gate = self.gate.lock();
        if self.transition(SessionState::Finished) {
            callbacks.on_finish(full_text);
        }
    }

    fn emit_error(&self, callbacks: &mut dyn CompletionCallbacks, message: &str) {
        let _gate = self.gate.lock();
        if self.transition(SessionState::Failed) {
            callbacks.on_error(message);
        }
    }

    fn cancel(&self) -> bool {
        let _gate = self.gate.lock();
        self.transition(SessionState::Cancelled)
    }
}

/// Handle to a running session.
///
/// Clones refer to the same session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub fn id(&self) -> uuid::Uuid {
        self.shared.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.current()
    }

    /// Returns true until the session reaches a terminal state.
    pub fn is_active(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Cancels the session. Idempotent.
    ///
    /// After this returns no further callback fires for the session, even if
    /// network activity is still unwinding. Cancelling a finished or failed
    /// session has no effect.
    pub fn cancel(&self) {
        if self.shared.cancel() {
            debug!(session_id = %self.shared.id, "completion session cancelled");
        }
    }

    /// Waits until the session reaches a terminal state and returns it.
    pub async fn wait(&self) -> SessionState {
        let mut rx = self.shared.state.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// A handle with no driver behind it; it stays idle until cancelled.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            shared: Arc::new(SessionShared::new()),
        }
    }
}

/// How one connection attempt ended.
enum AttemptEnd {
    Ended {
        error: ClassifiedError,
        delivered: bool,
    },
    /// The session became terminal (cancelled) mid-attempt.
    Abandoned,
}

enum Delivery {
    Delivered,
    Skipped,
    Closed,
}

/// Drives one query from the first connection to a terminal state.
pub struct CompletionSession {
    shared: Arc<SessionShared>,
    transport: Arc<dyn StreamTransport>,
    request: RequestSpec,
    retry: RetryPolicy,
    filter: Box<dyn DeltaFilter>,
    callbacks: Box<dyn CompletionCallbacks>,
    idle_timeout: Option<Duration>,
    accumulated: String,
    first_pending: bool,
    filter_pending: bool,
}

impl CompletionSession {
    pub(crate) fn new(
        transport: Arc<dyn StreamTransport>,
        request: RequestSpec,
        retry: RetryPolicy,
        filter: Box<dyn DeltaFilter>,
        callbacks: Box<dyn CompletionCallbacks>,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared::new()),
            transport,
            request,
            retry,
            filter,
            callbacks,
            idle_timeout: None,
            accumulated: String::new(),
            first_pending: true,
            filter_pending: true,
        }
    }

    /// Ends an attempt as a dropped connection when no body data arrives
    /// for `limit`.
    pub(crate) fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle_timeout = limit;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
        }
    }

    /// Spawns the session onto the current Tokio runtime.
    ///
    /// Panics when called outside a runtime.
    pub fn spawn(self) -> SessionHandle {
        let handle = self.handle();
        let span = info_span!("completion_session", session_id = %self.shared.id);
        tokio::spawn(self.run().instrument(span));
        handle
    }

    /// Runs the session to a terminal state.
    pub async fn run(mut self) {
        let _settle = SettleOnExit(self.shared.clone());
        let mut state_rx = self.shared.state.subscribe();
        let mut failures: u32 = 0;

        loop {
            if !self.shared.transition(SessionState::Opening) {
                return;
            }

            let end = tokio::select! {
                biased;
                _ = cancelled(&mut state_rx) => return,
                end = self.attempt() => end,
            };
            let (error, delivered) = match end {
                AttemptEnd::Abandoned => return,
                AttemptEnd::Ended { error, delivered } => (error, delivered),
            };

            match error.kind {
                ErrorKind::Stop => {
                    debug!(chars = self.accumulated.len(), "completion stream finished");
                    self.shared
                        .emit_finish(self.callbacks.as_mut(), &self.accumulated);
                    return;
                }
                ErrorKind::Fatal => {
                    warn!(detail = %error.detail, "completion stream failed");
                    self.shared.emit_error(self.callbacks.as_mut(), &error.detail);
                    return;
                }
                ErrorKind::Retriable => {
                    if delivered {
                        failures = 0;
                    }
                    failures = failures.saturating_add(1);
                    let Some(delay) = self.retry.delay_for(failures) else {
                        let message = format!(
                            "completion stream failed after {} retries: {}",
                            failures - 1,
                            error.detail
                        );
                        warn!(%message, "retry budget exhausted");
                        self.shared.emit_error(self.callbacks.as_mut(), &message);
                        return;
                    };
                    warn!(attempt = failures, delay_ms = delay.as_millis() as u64, detail = %error.detail, "reconnecting completion stream");
                    tokio::select! {
                        biased;
                        _ = cancelled(&mut state_rx) => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn attempt(&mut self) -> AttemptEnd {
        let connection = match self.transport.open(&self.request).await {
            Ok(connection) => connection,
            Err(e) => return ended(classified(Observation::OpenFailed, e.message()), false),
        };

        let status = connection.status();
        let opened = Observation::Opened {
            status,
            content_type: connection.content_type(),
        };
        match classify(&opened) {
            None => {}
            Some(ErrorKind::Retriable) => {
                return ended(
                    ClassifiedError::retriable(format!("service responded with status {status}")),
                    false,
                );
            }
            Some(_) if (200..300).contains(&status) => {
                let content_type = connection.content_type().unwrap_or("none").to_string();
                return ended(
                    ClassifiedError::fatal(format!(
                        "expected an event stream, got content type {content_type}"
                    )),
                    false,
                );
            }
            Some(_) => {
                return ended(ClassifiedError::fatal(connection.error_message().await), false);
            }
        }

        if !self.shared.transition(SessionState::Streaming) {
            return AttemptEnd::Abandoned;
        }
        debug!(status, "completion stream open");

        let mut frames = connection.frames();
        let mut delivered = false;
        loop {
            let next = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, frames.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        let detail = format!(
                            "completion stream idle for {}ms",
                            limit.as_millis()
                        );
                        return ended(classified(Observation::StreamClosed, &detail), delivered);
                    }
                },
                None => frames.next().await,
            };
            let Some(item) = next else { break };
            let outcome = match item {
                Ok(frame) => interpret_frame(&frame),
                Err(e) => FrameOutcome::classified(Observation::StreamClosed, None, e.message()),
            };
            match outcome {
                FrameOutcome::Continue(None) => {}
                FrameOutcome::Continue(Some(delta)) => match self.deliver(&delta) {
                    Delivery::Delivered => delivered = true,
                    Delivery::Skipped => {}
                    Delivery::Closed => return AttemptEnd::Abandoned,
                },
                FrameOutcome::Finished(delta) => {
                    if let Some(delta) = delta
                        && let Delivery::Closed = self.deliver(&delta)
                    {
                        return AttemptEnd::Abandoned;
                    }
                    return ended(ClassifiedError::stop(), true);
                }
                FrameOutcome::Failed(reason) => {
                    return ended(ClassifiedError::fatal(reason), delivered);
                }
                FrameOutcome::Retry(reason) => {
                    return ended(ClassifiedError::retriable(reason), delivered);
                }
            }
        }

        ended(
            classified(
                Observation::StreamClosed,
                "completion stream closed before [DONE]",
            ),
            delivered,
        )
    }

    fn deliver(&mut self, raw: &str) -> Delivery {
        let first_received = std::mem::replace(&mut self.filter_pending, false);
        let surfaced = self.filter.apply(raw, first_received);
        if surfaced.is_empty() {
            return Delivery::Skipped;
        }
        if !self
            .shared
            .emit_message(self.callbacks.as_mut(), &surfaced, self.first_pending)
        {
            return Delivery::Closed;
        }
        self.accumulated.push_str(&surfaced);
        self.first_pending = false;
        Delivery::Delivered
    }
}

/// Marks the session failed if the driver exits without settling it (for
/// example when a callback panics), so `wait` never hangs.
struct SettleOnExit(Arc<SessionShared>);

impl Drop for SettleOnExit {
    fn drop(&mut self) {
        self.0.transition(SessionState::Failed);
    }
}

fn ended(error: ClassifiedError, delivered: bool) -> AttemptEnd {
    AttemptEnd::Ended { error, delivered }
}

fn classified(observation: Observation<'_>, detail: &str) -> ClassifiedError {
    ClassifiedError {
        kind: classify(&observation).unwrap_or(ErrorKind::Fatal),
        detail: detail.to_string(),
    }
}

async fn cancelled(rx: &mut watch::Receiver<SessionState>) {
    let _ = rx.wait_for(|state| *state == SessionState::Cancelled).await;
}
