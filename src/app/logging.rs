//! Tracing subscriber setup and custom formatters.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

// Custom time formatter for logs: "YYYY-MM-DD HH:MM:SS" (local time)
pub struct LocalTimeFormatter;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

// Custom event formatter for logs: "YYYY-MM-DD HH:MM:SS [LEVEL] [host=...] message"
pub struct CustomEventFormat {
    ansi: bool,
}

impl CustomEventFormat {
    pub fn console() -> Self {
        Self { ansi: true }
    }

    pub fn plain() -> Self {
        Self { ansi: false }
    }
}

impl<S, N> FormatEvent<S, N> for CustomEventFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use tracing_subscriber::fmt::time::FormatTime;

        LocalTimeFormatter.format_time(&mut writer)?;
        write!(writer, " ")?;

        let level = event.metadata().level();
        if self.ansi {
            let level_color = match *level {
                tracing::Level::TRACE => "\x1b[2m",  // Dim/gray
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::ERROR => "\x1b[31m", // Red
            };
            write!(writer, "{}[{}]\x1b[0m ", level_color, level)?;
        } else {
            write!(writer, "[{}] ", level)?;
        }

        // Span fields, outermost first (the host of a multi-host run)
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "[{}] ", fields)?;
                    }
                }
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over `filter` when set;
/// with `log_file` every line is also appended there without colors.
pub fn init_tracing(filter: &str, log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .event_format(CustomEventFormat::plain()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
                .event_format(CustomEventFormat::console()),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
