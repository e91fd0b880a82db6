use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;

/// Bodies longer than this are cut down before logging.
pub const TRUNCATE_THRESHOLD: usize = 300;
/// Characters kept from a cut-down body.
pub const TRUNCATE_KEEP: usize = 150;
pub const EMPTY_BODY: &str = "-empty-";

pub fn init() {
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Render a response body for a diagnostic line.
pub fn body_for_log(body: &str) -> String {
    if body.is_empty() {
        return EMPTY_BODY.to_string();
    }
    if body.chars().count() > TRUNCATE_THRESHOLD {
        let head: String = body.chars().take(TRUNCATE_KEEP).collect();
        return format!("{}...", head);
    }
    body.to_string()
}
