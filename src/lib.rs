//! # MediFlow (staff signup email verification)
//!
//! `mediflow` drives the second step of the MediFlow staff signup flow: the
//! user received a 4-digit one-time passcode by email and has to type it back
//! before the server-issued expiry runs out.
//!
//! ## Components
//!
//! - [`otp::cells`]: the segmented code entry grid (typing, paste, arrows,
//!   backspace-merge).
//! - [`otp::timer`]: the once-per-second expiry countdown seeded by the server.
//! - [`otp::coordinator`]: debounced auto-submission with generation-tagged
//!   dispatches so stale responses are discarded.
//! - [`otp::session`]: the composition root that owns all of the above in a
//!   single event loop and tears every timer down on exit.
//! - [`email_auth`]: the HTTP client for the `/api/auth/email` endpoints.
//!
//! The passcode itself is carried as a `SecretString` and never logged.

pub mod cli;
pub mod email_auth;
pub mod otp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
