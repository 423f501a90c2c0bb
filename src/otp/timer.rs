//! Expiry countdown seeded by the server's remaining time.

use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Duration, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("expiry timer already started")]
    AlreadyStarted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownStatus {
    Active,
    Expired,
}

/// Once-per-period countdown to zero.
///
/// The recurring task belongs to the timer: `stop` and `Drop` both abort it.
#[derive(Debug)]
pub struct ExpiryTimer {
    period: Duration,
    remaining: Arc<watch::Sender<u64>>,
    task: Option<JoinHandle<()>>,
    started: bool,
}

impl ExpiryTimer {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let (remaining, _) = watch::channel(0);
        Self {
            period,
            remaining: Arc::new(remaining),
            task: None,
            started: false,
        }
    }

    /// Starts counting down from `initial_seconds`; a zero start is expired at once.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::AlreadyStarted` on a second call.
    pub fn start(&mut self, initial_seconds: u64) -> Result<(), TimerError> {
        if self.started {
            return Err(TimerError::AlreadyStarted);
        }
        self.started = true;
        self.remaining.send_replace(initial_seconds);

        if initial_seconds == 0 {
            info!("verification window already expired");
            return Ok(());
        }

        let remaining = Arc::clone(&self.remaining);
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;

                let mut left = 0;
                remaining.send_modify(|value| {
                    *value = value.saturating_sub(1);
                    left = *value;
                });

                if left == 0 {
                    info!("verification window expired");
                    break;
                }
                debug!(remaining = left, "countdown tick");
            }
        }));

        Ok(())
    }

    /// Releases the recurring task. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Receiver notified with the new remaining value on every tick.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.subscribe()
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    #[must_use]
    pub fn status(&self) -> CountdownStatus {
        if self.started && self.remaining() == 0 {
            CountdownStatus::Expired
        } else {
            CountdownStatus::Active
        }
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Renders seconds as `m:ss`.
#[must_use]
pub fn format_remaining(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
