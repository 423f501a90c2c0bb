//! `reqwest` implementation of [`EmailAuthApi`] with a fixed timeout policy and
//! sanitized error bodies.

use super::{
    errors::ApiError,
    types::{EmailCheckResponse, RemainingTimeResponse, VerifyCodeResponse},
    EmailAuthApi,
};
use crate::APP_USER_AGENT;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Default request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;
/// Path of the email verification API, relative to the base URL.
const EMAIL_AUTH_PATH: &str = "api/auth/email";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EmailAuthClient {
    http: Client,
    base_url: Url,
}

impl EmailAuthClient {
    /// Builds a client for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` when the base URL is empty or invalid, or the
    /// HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let base = normalize_base_url(&config.api_base_url)
            .ok_or_else(|| ApiError::Config("API base URL is empty.".to_string()))?;

        let base_url = Url::parse(&format!("{base}/"))
            .map_err(|err| ApiError::Config(format!("Invalid API base URL: {err}")))?;

        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `<base>/api/auth/email/<endpoint>?<query>`.
    fn endpoint(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(&format!("{EMAIL_AUTH_PATH}/{endpoint}"))
            .map_err(|err| ApiError::Config(format!("Invalid endpoint {endpoint}: {err}")))?;

        url.query_pairs_mut().extend_pairs(query);

        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(map_request_error)?;

        handle_json_response(response).await
    }
}

impl EmailAuthApi for EmailAuthClient {
    #[instrument(skip_all)]
    async fn remaining_time(&self, email: &str) -> Result<u64, ApiError> {
        let url = self.endpoint("remaining-time", &[("email", email)])?;
        let response: RemainingTimeResponse = self.get_json(url).await?;

        debug!(remaining = response.remaining_seconds, "remaining time fetched");

        Ok(response.seconds())
    }

    // The code only leaves its secret wrapper here, in the query string.
    #[instrument(skip_all)]
    async fn verify_code(&self, email: &str, code: &SecretString) -> Result<bool, ApiError> {
        let url = self.endpoint(
            "verify-code",
            &[("email", email), ("code", code.expose_secret())],
        )?;
        let response: VerifyCodeResponse = self.get_json(url).await?;

        Ok(response.is_match)
    }

    #[instrument(skip_all)]
    async fn check_email(&self, email: &str) -> Result<EmailCheckResponse, ApiError> {
        let url = self.endpoint("check", &[("email", email)])?;
        self.get_json(url).await
    }
}

/// Trims the base URL and strips trailing slashes; `None` when nothing is left.
fn normalize_base_url(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Maps transport errors into user-facing `ApiError` variants with timeout detection.
fn map_request_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout("Request timed out. Please try again.".to_string())
    } else {
        ApiError::Network(format!("Unable to reach the server: {err}"))
    }
}

/// Parses JSON responses and surfaces HTTP errors with sanitized bodies.
async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();

    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Parse(format!("Failed to decode response: {err}")))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Http {
            status: status.as_u16(),
            message: sanitize_body(&body),
        })
    }
}

/// Trims and truncates HTTP error bodies for user-facing messages.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
