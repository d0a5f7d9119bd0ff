//! Console log output.
//!
//! JSON lines carry the current span's fields (`request_id`, `http.method`,
//! ...) so every line can be joined to its request. Human-readable output
//! is meant for development.

use tracing::Subscriber;
use tracing_subscriber::{fmt, registry::LookupSpan, Layer};

use crate::TelemetryConfig;

/// Boxed layer type produced for any subscriber position
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Build the stdout layer, or `None` when console output is off.
pub fn console_layer<S>(config: &TelemetryConfig) -> Option<BoxedLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if !config.console_output {
        return None;
    }

    let layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true)
            .boxed()
    };

    Some(layer)
}
