use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Installs the global subscriber. Logs go to stderr so stdout stays free for
/// the interactive view.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init(verbosity_level: Option<Level>, json: bool) -> Result<()> {
    // RUST_LOG=
    let env_filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(Level::ERROR).into())
        .from_env_lossy();

    let (plain, json) = if json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr);
        (None, Some(layer))
    } else {
        let layer = fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_writer(std::io::stderr);
        (Some(layer), None)
    };

    let subscriber = Registry::default().with(env_filter).with(plain).with(json);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
