//! Log setup. Level is controlled with `POMOPAL_LOG` (default `warn`);
//! output goes to stderr so stdout stays clean for JSON.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let env_filter = EnvFilter::try_from_env("POMOPAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
