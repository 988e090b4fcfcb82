use std::env;
use std::io;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILTER_VAR: &str = "PARTWATCH_LOG";
const LOG_FORMAT_VAR: &str = "PARTWATCH_LOG_FORMAT";

fn wants_json(raw: Option<&str>) -> bool {
    raw.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"))
}

/// Install the global subscriber. Diagnostics go to stderr so command
/// reports on stdout stay machine-readable.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let format = env::var(LOG_FORMAT_VAR).ok();
    let registry = tracing_subscriber::registry().with(filter);

    let _ = if wants_json(format.as_deref()) {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .try_init()
    };
}
