pub mod logging;

use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_EMAIL: &str = "email";
pub const ARG_API_URL: &str = "api-url";
pub const ARG_TIMEOUT_MS: &str = "timeout-ms";
pub const ARG_DEBOUNCE_MS: &str = "debounce-ms";
pub const ARG_REMAINING_FALLBACK: &str = "remaining-fallback";
pub const ARG_SKIP_CHECK: &str = "skip-check";

/// Parses the remaining-time fallback; `none`/`off` disables it.
#[must_use]
pub fn validator_remaining_fallback() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<Option<u64>, String> {
        match value.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(None),
            other => other
                .parse::<u64>()
                .map(Some)
                .map_err(|_| "expected a number of seconds or 'none'".to_string()),
        }
    })
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("mediflow")
        .about("MediFlow staff signup email verification")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_EMAIL)
                .short('e')
                .long("email")
                .help("Email address the verification code was sent to")
                .env("MEDIFLOW_EMAIL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_API_URL)
                .short('u')
                .long("api-url")
                .help("MediFlow API base URL, example: https://emr.mediflow.dev")
                .default_value("http://localhost:8080")
                .env("MEDIFLOW_API_URL"),
        )
        .arg(
            Arg::new(ARG_TIMEOUT_MS)
                .long("timeout-ms")
                .help("HTTP request timeout in milliseconds")
                .default_value("10000")
                .env("MEDIFLOW_TIMEOUT_MS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_DEBOUNCE_MS)
                .long("debounce-ms")
                .help("Quiet period after the last edit before a complete code is submitted")
                .default_value("1000")
                .env("MEDIFLOW_DEBOUNCE_MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_REMAINING_FALLBACK)
                .long("remaining-fallback")
                .help("Seconds assumed when the remaining time cannot be fetched, or 'none'")
                .default_value("300")
                .env("MEDIFLOW_REMAINING_FALLBACK")
                .value_parser(validator_remaining_fallback()),
        )
        .arg(
            Arg::new(ARG_SKIP_CHECK)
                .long("skip-check")
                .help("Do not request a new code; verify the one already mailed")
                .env("MEDIFLOW_SKIP_CHECK")
                .action(ArgAction::SetTrue),
        );

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "mediflow");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "MediFlow staff signup email verification"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
        assert_eq!(
            command.get_long_version().unwrap().to_string(),
            format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH)
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("MEDIFLOW_API_URL", None::<&str>),
                ("MEDIFLOW_TIMEOUT_MS", None),
                ("MEDIFLOW_DEBOUNCE_MS", None),
                ("MEDIFLOW_REMAINING_FALLBACK", None),
                ("MEDIFLOW_SKIP_CHECK", None),
                ("MEDIFLOW_LOG_LEVEL", None),
            ],
            || {
                let matches =
                    new().get_matches_from(vec!["mediflow", "--email", "nurse@mediflow.dev"]);

                assert_eq!(
                    matches.get_one::<String>(ARG_EMAIL).map(String::as_str),
                    Some("nurse@mediflow.dev")
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_API_URL).map(String::as_str),
                    Some("http://localhost:8080")
                );
                assert_eq!(matches.get_one::<u64>(ARG_TIMEOUT_MS).copied(), Some(10_000));
                assert_eq!(matches.get_one::<u64>(ARG_DEBOUNCE_MS).copied(), Some(1_000));
                assert_eq!(
                    matches.get_one::<Option<u64>>(ARG_REMAINING_FALLBACK).copied(),
                    Some(Some(300))
                );
                assert!(!matches.get_flag(ARG_SKIP_CHECK));
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(0)
                );
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("MEDIFLOW_EMAIL", Some("charge.nurse@mediflow.dev")),
                ("MEDIFLOW_API_URL", Some("https://emr.mediflow.dev")),
                ("MEDIFLOW_DEBOUNCE_MS", Some("250")),
                ("MEDIFLOW_REMAINING_FALLBACK", Some("none")),
                ("MEDIFLOW_SKIP_CHECK", Some("true")),
                ("MEDIFLOW_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["mediflow"]);

                assert_eq!(
                    matches.get_one::<String>(ARG_EMAIL).map(String::as_str),
                    Some("charge.nurse@mediflow.dev")
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_API_URL).map(String::as_str),
                    Some("https://emr.mediflow.dev")
                );
                assert_eq!(matches.get_one::<u64>(ARG_DEBOUNCE_MS).copied(), Some(250));
                assert_eq!(
                    matches.get_one::<Option<u64>>(ARG_REMAINING_FALLBACK).copied(),
                    Some(None)
                );
                assert!(matches.get_flag(ARG_SKIP_CHECK));
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_email_is_required() {
        temp_env::with_vars([("MEDIFLOW_EMAIL", None::<&str>)], || {
            let result = new().try_get_matches_from(vec!["mediflow"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_invalid_remaining_fallback() {
        let result = new().try_get_matches_from(vec![
            "mediflow",
            "--email",
            "nurse@mediflow.dev",
            "--remaining-fallback",
            "soon",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_u8 {
            temp_env::with_vars([("MEDIFLOW_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "mediflow".to_string(),
                    "--email".to_string(),
                    "nurse@mediflow.dev".to_string(),
                ];

                if index > 0 {
                    args.push(format!("-{}", "v".repeat(usize::from(index))));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(index)
                );
            });
        }
    }
}
