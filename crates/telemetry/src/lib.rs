//! Logging bootstrap for bookshelf binaries.

use bookshelf_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, EnvFilter};

/// Build the event filter. `RUST_LOG` takes precedence over the configured
/// `log_filter`.
pub fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.log_filter).map_err(|e| {
            anyhow::anyhow!("invalid log filter '{}': {}", settings.log_filter, e)
        }),
    }
}

/// Install the global tracing subscriber.
///
/// Calling this more than once is harmless; later calls keep the first
/// subscriber.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let builder = fmt().with_env_filter(filter).with_target(true);

    let installed = match settings.log_format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().flatten_event(true).try_init().is_ok(),
    };

    if installed {
        tracing::info!(
            target: "bookshelf-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        );
    }

    Ok(())
}
