// Logging setup
// stderr subscriber (pretty or JSON) plus an optional rolling file sink

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_FORMAT_ENV: &str = "VMATE_LOG_FORMAT";
pub const LOG_DIR_ENV: &str = "VMATE_LOG_DIR";
const LOG_FILE_PREFIX: &str = "vmate.log";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "vmate=debug"
    } else {
        "vmate=warn"
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the default filter. Logs go to stderr so the progress
/// bar on stdout stays intact. The returned guard flushes the file sink and
/// must live until exit.
pub fn init(verbose: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))
        .context("Failed to create env filter")?;

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let stderr_layer = if json {
        // Production: JSON structured logging
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().pretty().with_writer(std::io::stderr).boxed()
    };

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let dir = shellexpand::tilde(dir.trim()).into_owned();
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
