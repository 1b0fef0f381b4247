//! Compact console log format
//!
//! `HH:MM:SS.mmm LEVEL target: span1:span2: message`, with the crate prefix
//! stripped from the target so board modules read as `polling`, `stands`, ...

use chrono::Utc;
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const CRATE_PREFIX: &str = "apronview::";

pub struct CompactFormat {
    ansi: bool,
}

impl CompactFormat {
    pub fn new(ansi: bool) -> Self {
        Self { ansi }
    }
}

impl Default for CompactFormat {
    fn default() -> Self {
        Self::new(true)
    }
}

/// `apronview::polling` -> `polling`; foreign targets are left alone
pub fn short_target(target: &str) -> &str {
    target.strip_prefix(CRATE_PREFIX).unwrap_or(target)
}

impl<S, N> FormatEvent<S, N> for CompactFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        write!(writer, "{} ", Utc::now().format("%H:%M:%S%.3f"))?;

        let level = metadata.level();
        if self.ansi {
            let level_style = match *level {
                tracing::Level::ERROR => "\x1b[31m", // Red
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::TRACE => "\x1b[35m", // Magenta
            };
            write!(writer, "{}{:>5}\x1b[0m ", level_style, level)?;
        } else {
            write!(writer, "{:>5} ", level)?;
        }

        write!(writer, "{}: ", short_target(metadata.target()))?;

        if let Some(scope) = ctx.event_scope() {
            let mut first = true;
            for span in scope.from_root() {
                if !first {
                    write!(writer, ":")?;
                }
                write!(writer, "{}", span.name())?;
                first = false;
            }
            if !first {
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
