//! Tracing setup for the CLI.
//!
//! Logs go to stderr so tables on stdout stay clean. `RUST_LOG` takes
//! precedence over `--verbose` when set.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const APP_TARGET: &str = env!("CARGO_CRATE_NAME");

fn app_targets(verbose: bool) -> Targets {
    if verbose {
        // HTTP client internals stay at warn; oracle requests are traced by the providers.
        Targets::new()
            .with_target(APP_TARGET, LevelFilter::DEBUG)
            .with_target("reqwest", LevelFilter::WARN)
            .with_target("hyper_util", LevelFilter::WARN)
    } else {
        Targets::new().with_target(APP_TARGET, LevelFilter::OFF)
    }
}

pub fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "off" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(app_targets(verbose))
        .with(env_filter)
        .init();
}
