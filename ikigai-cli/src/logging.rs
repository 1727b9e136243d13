//! Developer-facing diagnostics via `tracing`, independent of
//! `ikigai_core::logger`'s user-facing rotating `current.log` (SPEC_FULL
//! §1.1, spec §4.18).
//!
//! The REPL owns the real terminal as a full-screen alt-screen display, so
//! `tracing` output can never share stdout/stderr with it; this writes
//! through a non-blocking file appender instead, filtered by `RUST_LOG`
//! (default `warn`), the same split the teacher's `cli` crate draws between
//! `tracing` and its own conversation logging.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::log_format::TextWithSpanIds;

const TRACE_LOG_FILE: &str = "trace.log";

/// Initializes the global `tracing` subscriber, writing to
/// `<working_dir>/.ikigai/logs/trace.log`. The returned guard must be held
/// for the process lifetime; dropping it stops the background flush thread.
pub fn init(working_dir: &Path) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let dir = working_dir.join(".ikigai").join("logs");
    std::fs::create_dir_all(&dir)?;

    let file_appender = tracing_appender::rolling::never(&dir, TRACE_LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .event_format(TextWithSpanIds::new())
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    Ok(guard)
}
