//! Wire types for the `/api/auth/email` endpoints.

use serde::{Deserialize, Serialize};

/// `GET /api/auth/email/remaining-time`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemainingTimeResponse {
    pub remaining_seconds: i64,
}

impl RemainingTimeResponse {
    /// Seconds left, with negative values treated as expired.
    #[must_use]
    pub fn seconds(&self) -> u64 {
        u64::try_from(self.remaining_seconds).unwrap_or(0)
    }
}

/// `GET /api/auth/email/verify-code`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResponse {
    pub is_match: bool,
}

/// `GET /api/auth/email/check`, the step that issues and mails the code.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailCheckResponse {
    pub is_duplicate: bool,
    #[serde(default)]
    pub message: String,
}
