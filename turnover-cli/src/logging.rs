use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
/// Logs go to stderr so command output on stdout stays pipeable.
pub fn init_logging(level: &str, format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .context("init json logging")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()
            .context("init pretty logging")?,
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
            .context("init compact logging")?,
        other => bail!("unsupported log format: {other}"),
    }

    Ok(())
}
