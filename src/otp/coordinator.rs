//! Debounced auto-submission of completed codes.
//!
//! Every completion gets a new generation. Only the newest generation can be
//! dispatched, and only a response carrying the newest generation is applied.

use crate::email_auth::ApiError;
use secrecy::SecretString;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Matched,
    Mismatched,
    TransportError,
}

/// A dispatched verification, tagged with the generation that produced it.
#[derive(Debug)]
pub struct VerificationAttempt {
    pub generation: u64,
    pub outcome: AttemptOutcome,
}

/// Work handed to the network layer once the debounce window settles.
#[derive(Debug)]
pub struct Dispatch {
    pub generation: u64,
    pub code: SecretString,
}

/// How the session must react to a verify response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Code accepted; hand control back to the caller.
    Advance,
    /// Code rejected; clear every cell and refocus the first one.
    ResetBuffer,
    /// Request failed; keep what the user typed.
    KeepBuffer,
    /// Response for a superseded generation; ignore it.
    Stale,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttemptStats {
    pub dispatched: u32,
    pub matched: u32,
    pub mismatched: u32,
    pub transport_errors: u32,
    pub stale: u32,
}

#[derive(Debug)]
struct Scheduled {
    generation: u64,
    code: SecretString,
    deadline: Instant,
}

#[derive(Debug)]
pub struct VerificationCoordinator {
    debounce: Duration,
    generation: u64,
    pending: Option<Scheduled>,
    attempt: Option<VerificationAttempt>,
    stats: AttemptStats,
}

impl VerificationCoordinator {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            generation: 0,
            pending: None,
            attempt: None,
            stats: AttemptStats::default(),
        }
    }

    /// Schedules a dispatch of `code` one debounce period after `now`,
    /// replacing any dispatch still waiting. Returns the new generation.
    pub fn on_buffer_complete(&mut self, code: String, now: Instant) -> u64 {
        self.generation += 1;
        let scheduled = Scheduled {
            generation: self.generation,
            code: SecretString::from(code),
            deadline: now + self.debounce,
        };

        if let Some(previous) = self.pending.replace(scheduled) {
            debug!(
                superseded = previous.generation,
                generation = self.generation,
                "debounce restarted"
            );
        }

        self.generation
    }

    /// Drops the waiting dispatch, if any. Returns whether one was dropped.
    pub fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(previous) => {
                debug!(generation = previous.generation, "pending verification cancelled");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|scheduled| scheduled.deadline)
    }

    /// Hands out the waiting dispatch once its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<Dispatch> {
        if self.deadline()? > now {
            return None;
        }
        let scheduled = self.pending.take()?;

        self.stats.dispatched += 1;
        self.attempt = Some(VerificationAttempt {
            generation: scheduled.generation,
            outcome: AttemptOutcome::Pending,
        });
        info!(generation = scheduled.generation, "dispatching verification");

        Some(Dispatch {
            generation: scheduled.generation,
            code: scheduled.code,
        })
    }

    /// Interprets a verify response for `generation`.
    pub fn on_response(&mut self, generation: u64, result: Result<bool, ApiError>) -> Verdict {
        let current = self
            .attempt
            .as_mut()
            .filter(|attempt| attempt.generation == generation && generation == self.generation);

        let Some(attempt) = current else {
            self.stats.stale += 1;
            debug!(generation, latest = self.generation, "discarding stale response");
            return Verdict::Stale;
        };

        match result {
            Ok(true) => {
                attempt.outcome = AttemptOutcome::Matched;
                self.stats.matched += 1;
                info!(generation, "code matched");
                Verdict::Advance
            }
            Ok(false) => {
                attempt.outcome = AttemptOutcome::Mismatched;
                self.stats.mismatched += 1;
                info!(generation, "code rejected");
                Verdict::ResetBuffer
            }
            Err(err) => {
                attempt.outcome = AttemptOutcome::TransportError;
                self.stats.transport_errors += 1;
                warn!(generation, "verification request failed: {err}");
                Verdict::KeepBuffer
            }
        }
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&VerificationAttempt> {
        self.attempt.as_ref()
    }

    #[must_use]
    pub fn stats(&self) -> AttemptStats {
        self.stats
    }
}
