//! Logging helpers.
//!
//! Tracing initialization plus formatting/sanitization used when prompts
//! and backend traffic are logged.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `default_filter` applies when `RUST_LOG` is unset. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Format a duration in human-readable form.
pub fn format_duration(duration: std::time::Duration) -> String {
    let millis = duration.as_millis();

    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.2}s", millis as f64 / 1000.0)
    } else {
        let seconds = millis / 1000;
        format!("{}m{}s", seconds / 60, seconds % 60)
    }
}

/// Redact credential-looking fragments before a string is logged.
///
/// Prompts assembled from caller-provided modules can contain anything;
/// this strips the common secret shapes before they land in logs.
pub fn sanitize_for_logging(input: &str) -> String {
    let patterns = [
        (r"(?i)(api[\s_-]?key|apikey)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (r"(?i)(password|passwd)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (r"(?i)(token|secret)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (
            r"(?i)(authorization|auth)\s*:\s*bearer\s+\S+",
            "$1: Bearer [REDACTED]",
        ),
    ];

    let mut result = input.to_string();
    for (pattern, replacement) in &patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            result = re.replace_all(&result, *replacement).to_string();
        }
    }
    result
}
