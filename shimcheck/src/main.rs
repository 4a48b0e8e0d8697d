//! Implements the command-line interface for `shimcheck`.

mod events;

use clap::Parser;
use shimcheck_harness::{HarnessConfig, HarnessOptions, ShimRunner};

/// Exit code reported when any check failed.
const EXIT_CODE_FAILED: i32 = 1;

/// Exit code reported when the harness itself could not run.
const EXIT_CODE_ERROR: i32 = 2;

/// Main entry point for `shimcheck`.
fn main() {
    human_panic::setup_panic!(human_panic::Metadata::new(
        env!("CARGO_BIN_NAME"),
        env!("CARGO_PKG_VERSION")
    ));

    let options = HarnessOptions::parse();

    events::init(options.verbose);

    let exit_code = match run(options) {
        Ok(true) => 0,
        Ok(false) => EXIT_CODE_FAILED,
        Err(e) => {
            tracing::error!("{e:#}");
            EXIT_CODE_ERROR
        }
    };

    std::process::exit(exit_code);
}

fn run(options: HarnessOptions) -> anyhow::Result<bool> {
    let config = HarnessConfig::from_options(&options)?;
    ShimRunner::new(config, options).run()
}
