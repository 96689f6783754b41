use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "newspulse.log";

/// Installs the global subscriber: human-readable stdout plus, when `log_dir`
/// is set, a daily-rolling JSON file. `RUST_LOG` overrides `level`.
///
/// Keep the returned guard alive for the life of the process so buffered file
/// output is flushed. Calling this twice is harmless; the second call is ignored.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console_layer = fmt::layer().with_target(true);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_current_span(true)
                .with_span_list(false);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
            None
        }
    }
}
