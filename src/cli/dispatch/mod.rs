use crate::cli::{
    actions::Action,
    commands::{
        ARG_API_URL, ARG_DEBOUNCE_MS, ARG_EMAIL, ARG_REMAINING_FALLBACK, ARG_SKIP_CHECK,
        ARG_TIMEOUT_MS,
    },
};
use crate::otp::SessionConfig;
use anyhow::{anyhow, Result};
use regex::Regex;
use std::time::Duration;

/// Loose sanity check; the server owns real address validation.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

/// Builds the action from parsed arguments.
///
/// # Errors
///
/// Returns an error if a required argument is missing or the email is malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let email = matches
        .get_one::<String>(ARG_EMAIL)
        .map(|email| email.trim().to_string())
        .ok_or_else(|| anyhow!("missing required argument: --email"))?;

    if !valid_email(&email) {
        return Err(anyhow!("invalid email address: {email}"));
    }

    let api_url = matches
        .get_one::<String>(ARG_API_URL)
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: --api-url"))?;

    let defaults = SessionConfig::default();
    let session = SessionConfig {
        debounce: matches
            .get_one::<u64>(ARG_DEBOUNCE_MS)
            .map_or(defaults.debounce, |ms| Duration::from_millis(*ms)),
        remaining_fallback: matches
            .get_one::<Option<u64>>(ARG_REMAINING_FALLBACK)
            .copied()
            .unwrap_or(defaults.remaining_fallback),
        ..defaults
    };

    Ok(Action::Verify {
        email,
        api_url,
        timeout: Duration::from_millis(
            matches.get_one::<u64>(ARG_TIMEOUT_MS).copied().unwrap_or(10_000),
        ),
        session,
        skip_check: matches.get_flag(ARG_SKIP_CHECK),
    })
}
