//! Logging initialization for processes embedding the record core
//!
//! Supports configuration-based logging with file rotation, JSON formatting, and
//! `RUST_LOG` overrides.

use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the non-blocking file writer flushing. Hold it for the lifetime of the process.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize logging from a `LoggingConfig`
///
/// - JSON or human-readable console output
/// - optional rolling file output (daily, hourly, minutely, never)
/// - `RUST_LOG` takes precedence over `config.level`
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let (layers, file_guard) = build_layers(config)?;
    tracing_subscriber::registry()
        .with(layers.with_filter(build_env_filter(config)))
        .try_init()?;

    tracing::info!(
        level = %config.level,
        json = config.json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Suppress verbose sqlx statement logs by default
        EnvFilter::new(format!(
            "vellum_core={},vellum_patch={},sqlx=warn",
            config.level, config.level
        ))
    })
}

/// Stdout, plus the rolling file when enabled. Both sinks share one output format.
fn build_layers(
    config: &LoggingConfig,
) -> anyhow::Result<(Vec<BoxedLayer>, Option<WorkerGuard>)> {
    let mut layers = vec![output_layer(config, std::io::stdout, true)];
    let mut file_guard = None;

    if config.file_enabled {
        let (file_appender, guard) = create_file_appender(config)?;
        layers.push(output_layer(config, file_appender, false));
        file_guard = Some(guard);
    }

    Ok((layers, file_guard))
}

fn output_layer<W>(config: &LoggingConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_target(true)
        .with_ansi(ansi && !config.json)
        .with_writer(writer);

    if config.json {
        layer
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        layer.boxed()
    }
}

fn create_file_appender(config: &LoggingConfig) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.file_directory)?;

    let file_appender = match config.file_rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.file_directory, &config.file_prefix),
        "minutely" => {
            tracing_appender::rolling::minutely(&config.file_directory, &config.file_prefix)
        }
        "never" => tracing_appender::rolling::never(
            &config.file_directory,
            format!("{}.log", config.file_prefix),
        ),
        _ => tracing_appender::rolling::daily(&config.file_directory, &config.file_prefix),
    };

    Ok(tracing_appender::non_blocking(file_appender))
}

/// Initialize logging from `RUST_LOG` only
///
/// Meant for tests and small tools. Safe to call more than once; later calls are no-ops.
pub fn init_simple_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vellum_core=info,vellum_patch=info,sqlx=warn".into()),
        )
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_is_added_only_when_enabled() {
        let mut config = LoggingConfig::default();
        let (layers, guard) = build_layers(&config).unwrap();
        assert_eq!(layers.len(), 1);
        assert!(guard.is_none());

        let dir = std::env::temp_dir().join(format!("vellum-logs-{}", uuid::Uuid::new_v4()));
        config.file_enabled = true;
        config.json = true;
        config.file_rotation = "never".to_string();
        config.file_directory = dir.to_string_lossy().into_owned();

        let (layers, guard) = build_layers(&config).unwrap();
        assert_eq!(layers.len(), 2);
        assert!(guard.is_some());
        assert!(dir.is_dir());

        drop(guard);
        let _ = fs::remove_dir_all(&dir);
    }
}
