use crate::config::AppConfig;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Directive used when RUST_LOG is unset: this crate at the configured
/// level, dependencies at `warn`.
pub fn default_directive(config: &AppConfig) -> String {
    format!(
        "warn,{}={}",
        env!("CARGO_CRATE_NAME"),
        config.log_level.trim()
    )
}

fn file_appender(config: &AppConfig) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    }
}

/// Human-readable stderr mirror, off when `log_console` is false
fn console_layer<S>(config: &AppConfig) -> Option<Box<dyn Layer<S> + Send + Sync>>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    config.log_console.then(|| {
        fmt::layer()
            .with_target(false)
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .boxed()
    })
}

/// Install the global subscriber. Keep the guard alive for the process
/// lifetime or buffered file output is lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(config));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry
            .with(file_layer)
            .with(console_layer(config))
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry
            .with(file_layer)
            .with(console_layer(config))
            .init();
    }

    guard
}
