//! Tracing subscriber for processes embedding the repo kit.
//!
//! Statement events are emitted at `debug` under the `directory_repo` target;
//! driver crates log through `log`, which is bridged into the same pipeline.

use std::any::type_name_of_val;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::{ConfigError, RepoConfig};

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("invalid telemetry configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Filter for `config.log_level`; `RUST_LOG` wins when set.
fn env_filter(config: &RepoConfig) -> Result<EnvFilter, TelemetryInitError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryInitError::Filter {
        directive: config.log_level.clone(),
        source,
    })
}

/// Installs the global subscriber once; later calls are no-ops.
pub fn init_tracing(config: &RepoConfig) -> Result<(), TelemetryInitError> {
    config.validate()?;
    let filter = env_filter(config)?;

    if INSTALLED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        // An embedding process may have bridged `log` already.
        if !type_name_of_val(log::logger()).contains("LogTracer") {
            INSTALLED.store(false, Ordering::SeqCst);
            return Err(err.into());
        }
    }

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().boxed(),
        _ => fmt::layer().json().boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
    {
        INSTALLED.store(false, Ordering::SeqCst);
        return Err(err.into());
    }

    tracing::info!(
        profile = %config.profile,
        max_page_size = config.max_page_size,
        statement_timeout_ms = config.statement_timeout_ms,
        "Repo tracing installed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let config = RepoConfig {
            log_format: "pretty".to_string(),
            ..RepoConfig::default()
        };
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected_before_install() {
        let config = RepoConfig {
            log_format: "xml".to_string(),
            ..RepoConfig::default()
        };
        assert!(matches!(
            init_tracing(&config),
            Err(TelemetryInitError::Config(ConfigError::InvalidLogFormat { .. }))
        ));
    }
}
