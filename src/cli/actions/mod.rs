pub mod verify;

use crate::otp::SessionConfig;
use std::time::Duration;

#[derive(Debug)]
pub enum Action {
    Verify {
        email: String,
        api_url: String,
        timeout: Duration,
        session: SessionConfig,
        skip_check: bool,
    },
}
