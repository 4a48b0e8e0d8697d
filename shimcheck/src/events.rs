//! Diagnostic event output.

use tracing_subscriber::{Layer, filter::Targets, layer::SubscriberExt, util::SubscriberInitExt};

/// Target under which the harness library emits its events.
const HARNESS_TARGET: &str = "shimcheck_harness";

/// Installs a stderr subscriber; `verbose` raises the harness's events to debug level.
pub(crate) fn init(verbose: bool) {
    let mut filter = Targets::new().with_default(tracing_subscriber::filter::LevelFilter::INFO);

    if verbose {
        filter = filter.with_target(HARNESS_TARGET, tracing::Level::DEBUG);
    }

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_filter(filter);

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        // Something went wrong; proceed on anyway but complain audibly.
        eprintln!("warning: failed to initialize tracing.");
    }
}
