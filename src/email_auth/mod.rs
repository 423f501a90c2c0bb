//! Client side of the email verification API.
//!
//! The server owns code generation, mailing and expiry. This module only
//! consumes it through three `GET` endpoints under `/api/auth/email`:
//!
//! - `check?email=` issues (or reissues) a code and reports duplicates.
//! - `remaining-time?email=` returns `{ "remainingSeconds": n }`.
//! - `verify-code?email=&code=` returns `{ "isMatch": bool }`.
//!
//! Callers must not log the code; it is passed around as a `SecretString`.

pub mod client;
pub mod errors;
pub mod types;

use secrecy::SecretString;
use std::future::Future;

pub use client::{ClientConfig, EmailAuthClient};
pub use errors::ApiError;
pub use types::{EmailCheckResponse, RemainingTimeResponse, VerifyCodeResponse};

/// The endpoints a verification session depends on.
pub trait EmailAuthApi: Send + Sync + 'static {
    /// Seconds left before the code mailed to `email` expires.
    fn remaining_time(&self, email: &str) -> impl Future<Output = Result<u64, ApiError>> + Send;

    /// Whether `code` matches the code mailed to `email`.
    fn verify_code(
        &self,
        email: &str,
        code: &SecretString,
    ) -> impl Future<Output = Result<bool, ApiError>> + Send;

    /// Checks `email` for an existing account and mails a code when it is free.
    fn check_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<EmailCheckResponse, ApiError>> + Send;
}
