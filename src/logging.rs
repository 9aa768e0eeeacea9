//! Structured logging for vcal-bench.
//!
//! Filtered by the `VCAL_LOG` environment variable, e.g. `VCAL_LOG=debug` or
//! `VCAL_LOG=warn,vcal_bench::benchmark=debug`. Default level is `info`.

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "VCAL_LOG";

/// Install the global subscriber at `info` unless `VCAL_LOG` says otherwise.
pub fn init() {
    init_with_default("info");
}

/// Install the global subscriber; repeat calls are ignored.
pub fn init_with_default(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}
