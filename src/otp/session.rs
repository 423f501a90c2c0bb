//! Verification session: the composition root for one code entry cycle.
//!
//! A session runs as a single task that owns the entry grid, the expiry timer,
//! the coordinator and every in-flight request. User input, countdown ticks,
//! the debounce deadline and verify responses are multiplexed in one loop, so
//! no state is shared and nothing needs a lock. Dropping the
//! [`SessionBoundary`] aborts that task, which drops the timer (aborting the
//! countdown) and the request set (aborting in-flight calls).

use super::{
    cells::{CodeBuffer, CodeCellArray, Focus, InputError, KeyAction, Mutation},
    coordinator::{AttemptStats, VerificationCoordinator, Verdict},
    timer::{format_remaining, ExpiryTimer},
    DEFAULT_DEBOUNCE, DEFAULT_REMAINING_SECONDS, DEFAULT_TICK,
};
use crate::email_auth::{ApiError, EmailAuthApi};
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::{JoinHandle, JoinSet},
    time::{sleep_until, Instant},
};
use tracing::{debug, info, info_span, warn, Instrument};
use ulid::Ulid;

const COMMAND_BUFFER: usize = 64;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub debounce: Duration,
    pub tick: Duration,
    /// Remaining time used when the server cannot be asked; `None` leaves the
    /// session expired instead.
    pub remaining_fallback: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            tick: DEFAULT_TICK,
            remaining_fallback: Some(DEFAULT_REMAINING_SECONDS),
        }
    }
}

/// User input delivered to the entry grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Digit { index: usize, ch: char },
    Paste { index: usize, text: String },
    Key { index: usize, action: KeyAction },
    Focus { index: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Waiting for the server's remaining time.
    Starting,
    Active,
    Expired,
    Verified,
}

/// The single user-visible message slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notice {
    Input(InputError),
    Mismatch,
    Transport,
}

impl fmt::Display for Notice {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(err) => write!(formatter, "{err}"),
            Self::Mismatch => write!(
                formatter,
                "Invalid or expired code. A new code is being sent to your email."
            ),
            Self::Transport => write!(
                formatter,
                "Something went wrong while contacting the server. Please try again."
            ),
        }
    }
}

/// Snapshot published after every change.
#[derive(Clone, Debug)]
pub struct SessionView {
    pub session_id: Ulid,
    pub email: String,
    pub buffer: CodeBuffer,
    pub focus: Focus,
    pub remaining_seconds: u64,
    pub status: SessionStatus,
    pub notice: Option<Notice>,
    /// A completed code is waiting for its debounce window or its response.
    pub verifying: bool,
    /// Input events processed so far, including rejected ones.
    pub inputs_applied: u64,
    pub stats: AttemptStats,
}

impl SessionView {
    /// Countdown rendered as `m:ss`.
    #[must_use]
    pub fn countdown(&self) -> String {
        format_remaining(self.remaining_seconds)
    }

    #[must_use]
    pub fn expired_message(&self) -> Option<&'static str> {
        (self.status == SessionStatus::Expired && !self.email.is_empty())
            .then_some("Verification time expired. Please try again.")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The code matched; the caller moves on to the next signup step.
    Verified,
    /// The session was closed before a code matched.
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("an email address is required to verify a code")]
    MissingEmail,
    #[error("verification session is no longer running")]
    Closed,
    #[error("verification session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug)]
enum Command {
    Input(InputEvent),
    Close,
}

/// Handle to a running verification session.
#[derive(Debug)]
pub struct SessionBoundary {
    session_id: Ulid,
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
    task: Option<JoinHandle<SessionOutcome>>,
}

impl SessionBoundary {
    /// Opens a session for `email` and starts its event loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingEmail` when `email` is blank.
    pub fn open<A: EmailAuthApi>(
        email: impl Into<String>,
        api: Arc<A>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let email = email.into().trim().to_string();
        if email.is_empty() {
            return Err(SessionError::MissingEmail);
        }

        let session_id = Ulid::new();
        let cells = CodeCellArray::new();
        let initial = SessionView {
            session_id,
            email: email.clone(),
            buffer: cells.buffer().clone(),
            focus: cells.focus(),
            remaining_seconds: 0,
            status: SessionStatus::Starting,
            notice: None,
            verifying: false,
            inputs_applied: 0,
            stats: AttemptStats::default(),
        };
        let (view_tx, view_rx) = watch::channel(initial);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);

        let session = SessionLoop {
            email,
            api,
            cells,
            timer: ExpiryTimer::new(config.tick),
            coordinator: VerificationCoordinator::new(config.debounce),
            inflight: JoinSet::new(),
            view: view_tx,
            status: SessionStatus::Starting,
            notice: None,
            remaining_seconds: 0,
            remaining_fallback: config.remaining_fallback,
            inputs_applied: 0,
        };

        let span = info_span!("otp_session", %session_id);
        let task = tokio::spawn(session.run(commands_rx).instrument(span));

        Ok(Self {
            session_id,
            commands: commands_tx,
            view: view_rx,
            task: Some(task),
        })
    }

    #[must_use]
    pub fn id(&self) -> Ulid {
        self.session_id
    }

    /// A receiver that observes every published [`SessionView`].
    #[must_use]
    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Delivers one input event.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` once the session has ended.
    pub async fn send(&self, event: InputEvent) -> Result<(), SessionError> {
        self.commands
            .send(Command::Input(event))
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Closed` once the session has ended.
    pub async fn enter_digit(&self, index: usize, ch: char) -> Result<(), SessionError> {
        self.send(InputEvent::Digit { index, ch }).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::Closed` once the session has ended.
    pub async fn paste(&self, index: usize, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(InputEvent::Paste {
            index,
            text: text.into(),
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `SessionError::Closed` once the session has ended.
    pub async fn key(&self, index: usize, action: KeyAction) -> Result<(), SessionError> {
        self.send(InputEvent::Key { index, action }).await
    }

    /// Waits for the session to end on its own, which only a matching code does.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Task` if the session task panicked or was aborted.
    pub async fn finished(mut self) -> Result<SessionOutcome, SessionError> {
        match self.task.take() {
            Some(task) => Ok(task.await?),
            None => Err(SessionError::Closed),
        }
    }

    /// Stops the session, releasing its timers and in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Task` if the session task panicked or was aborted.
    pub async fn close(mut self) -> Result<SessionOutcome, SessionError> {
        // The loop may already be gone after a match; its outcome still stands.
        let _ = self.commands.send(Command::Close).await;
        match self.task.take() {
            Some(task) => Ok(task.await?),
            None => Err(SessionError::Closed),
        }
    }
}

impl Drop for SessionBoundary {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

type VerifyResult = (u64, Result<bool, ApiError>);

struct SessionLoop<A> {
    email: String,
    api: Arc<A>,
    cells: CodeCellArray,
    timer: ExpiryTimer,
    coordinator: VerificationCoordinator,
    inflight: JoinSet<VerifyResult>,
    view: watch::Sender<SessionView>,
    status: SessionStatus,
    notice: Option<Notice>,
    remaining_seconds: u64,
    remaining_fallback: Option<u64>,
    inputs_applied: u64,
}

impl<A: EmailAuthApi> SessionLoop<A> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> SessionOutcome {
        let initial = self.fetch_remaining().await;
        self.status = SessionStatus::Active;
        if let Err(err) = self.timer.start(initial) {
            warn!("expiry timer not started: {err}");
        }
        let mut remaining = self.timer.subscribe();
        self.on_remaining(initial);
        self.publish();

        let outcome = loop {
            let deadline = self.coordinator.deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Input(event)) => self.on_input(event),
                    Some(Command::Close) | None => break SessionOutcome::Closed,
                },
                changed = remaining.changed() => {
                    if changed.is_ok() {
                        let value = *remaining.borrow_and_update();
                        self.on_remaining(value);
                    }
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.dispatch_due();
                }
                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    match joined {
                        Ok((generation, result)) => {
                            if self.on_response(generation, result) {
                                break SessionOutcome::Verified;
                            }
                        }
                        Err(err) => warn!("verification task failed: {err}"),
                    }
                }
            }

            self.publish();
        };

        self.teardown();
        self.publish();
        info!(?outcome, "verification session ended");

        outcome
    }

    async fn fetch_remaining(&mut self) -> u64 {
        match self.api.remaining_time(&self.email).await {
            Ok(seconds) => seconds,
            Err(err) => {
                warn!("failed to fetch remaining time: {err}");
                self.notice = Some(Notice::Transport);
                self.remaining_fallback.unwrap_or(0)
            }
        }
    }

    fn on_input(&mut self, event: InputEvent) {
        self.inputs_applied += 1;
        let typed = matches!(event, InputEvent::Digit { .. } | InputEvent::Paste { .. });

        let result = match event {
            InputEvent::Digit { index, ch } => self.cells.on_digit_entered(index, ch),
            InputEvent::Paste { index, text } => self.cells.on_paste(index, &text),
            InputEvent::Key { index, action } => self.cells.on_key_action(index, action),
            InputEvent::Focus { index } => self.cells.focus_cell(index).map(|()| Mutation::None),
        };

        match result {
            Ok(mutation) => {
                if typed {
                    self.notice = None;
                }
                match mutation {
                    Mutation::None => {}
                    Mutation::Incomplete => {
                        self.coordinator.cancel_pending();
                    }
                    Mutation::Complete(code) => {
                        let generation = self.coordinator.on_buffer_complete(code, Instant::now());
                        debug!(generation, "code complete, verification scheduled");
                    }
                }
            }
            // Expired grids ignore input; the expiry message is already shown.
            Err(InputError::Disabled) => {}
            Err(err) => self.notice = Some(Notice::Input(err)),
        }
    }

    fn on_remaining(&mut self, seconds: u64) {
        self.remaining_seconds = seconds;
        if seconds == 0 && self.status == SessionStatus::Active {
            self.cells.set_disabled(true);
            self.status = SessionStatus::Expired;
            info!("code entry disabled");
        }
    }

    fn dispatch_due(&mut self) {
        let Some(dispatch) = self.coordinator.take_due(Instant::now()) else {
            return;
        };

        let api = Arc::clone(&self.api);
        let email = self.email.clone();
        self.inflight.spawn(
            async move {
                let result = api.verify_code(&email, &dispatch.code).await;
                (dispatch.generation, result)
            }
            .in_current_span(),
        );
    }

    /// Applies a verify response; `true` when the session is done.
    fn on_response(&mut self, generation: u64, result: Result<bool, ApiError>) -> bool {
        match self.coordinator.on_response(generation, result) {
            Verdict::Stale => false,
            Verdict::Advance => {
                self.notice = None;
                self.status = SessionStatus::Verified;
                true
            }
            Verdict::ResetBuffer => {
                self.cells.clear();
                self.notice = Some(Notice::Mismatch);
                false
            }
            Verdict::KeepBuffer => {
                self.notice = Some(Notice::Transport);
                false
            }
        }
    }

    fn teardown(&mut self) {
        self.timer.stop();
        self.coordinator.cancel_pending();
        self.inflight.abort_all();
    }

    fn publish(&self) {
        self.view.send_modify(|view| {
            view.buffer = self.cells.buffer().clone();
            view.focus = self.cells.focus();
            view.remaining_seconds = self.remaining_seconds;
            view.status = self.status;
            view.notice = self.notice;
            view.verifying = self.coordinator.deadline().is_some() || !self.inflight.is_empty();
            view.inputs_applied = self.inputs_applied;
            view.stats = self.coordinator.stats();
        });
    }
}
