//! One-time passcode entry, expiry and verification.

pub mod cells;
pub mod coordinator;
pub mod session;
pub mod timer;

use std::time::Duration;

/// Number of digits in an emailed code.
pub const CODE_LENGTH: usize = 4;
/// Quiet period after the last completing edit before the code is submitted.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1_000);
/// Countdown resolution.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
/// Remaining time assumed when the server cannot be asked (five minutes).
pub const DEFAULT_REMAINING_SECONDS: u64 = 300;

pub use cells::{CodeBuffer, CodeCellArray, Focus, InputError, KeyAction, Mutation};
pub use coordinator::{AttemptOutcome, AttemptStats, VerificationCoordinator, Verdict};
pub use session::{
    InputEvent, Notice, SessionBoundary, SessionConfig, SessionError, SessionOutcome,
    SessionStatus, SessionView,
};
pub use timer::{format_remaining, CountdownStatus, ExpiryTimer, TimerError};
