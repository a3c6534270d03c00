//! Tracing setup for simulation runs and tests.
//!
//! Verbosity comes from `RUST_LOG` (default `info`). `LOG_JSON=1` switches
//! to JSON lines, `LOG_LINE_NUM=1` adds file and line to each event.

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable that selects JSON output.
pub const LOG_JSON_ENVVAR: &str = "LOG_JSON";
/// Environment variable that adds source locations to each event.
pub const LOG_LINE_NUM_ENVVAR: &str = "LOG_LINE_NUM";

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1")
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// # Panics
/// If a global subscriber is already installed.
pub fn init() {
    let line_num = env_flag(LOG_LINE_NUM_ENVVAR);
    let builder = fmt()
        .with_env_filter(filter())
        .with_file(line_num)
        .with_line_number(line_num);
    if env_flag(LOG_JSON_ENVVAR) {
        builder.json().init();
    } else {
        builder.compact().init();
    }
    tracing::info!(version = hubbridge_types::constants::VERSION, "logging started");
}

/// Install a test-writer subscriber, ignoring the error if one is already
/// installed by another test in the same binary.
pub fn init_test_tracing() {
    let _ = fmt()
        .with_env_filter(filter())
        .with_test_writer()
        .try_init();
}
