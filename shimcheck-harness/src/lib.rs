//! Verification harness for cross-shell CLI launcher scripts.
//!
//! A package that ships two CLI aliases (e.g., `npm` and `npx`) installs one small
//! launcher script per alias and shell family: an extensionless POSIX shell script, a
//! Windows `.cmd` batch file and a PowerShell `.ps1` script. This crate verifies those
//! launchers in two independent ways:
//!
//! 1. **Launcher drift**: sibling launchers of a family are compared character by
//!    character. They may differ only by the letters that tell the alias names apart
//!    and, outside PowerShell, by a single line assigning the secondary alias's entry
//!    point.
//!
//! 2. **Dispatch**: every installed shell target launches both aliases from an isolated
//!    fixture directory holding the launchers, a copy of the runtime and a decoy copy of
//!    the package. The launchers must resolve to the package under test, not the decoy.

#![cfg(any(unix, windows))]

mod comparison;
mod config;
mod differ;
mod error;
mod execution;
mod fixture;
mod invocation;
mod reporting;
mod runner;
mod script;
mod shell;

pub use comparison::{
    InvocationComparison, InvocationExpectation, InvocationResult, ShimPairComparison,
    SingleExpectationComparison,
};
pub use config::{
    AliasPair, DEFAULT_TIMEOUT_IN_SECONDS, HarnessConfig, HarnessOptions, HostEnvironment,
    OutputFormat, PackageUnderTest, Runtime, RuntimeKind,
};
pub use differ::{ShimDiff, ShimDiffExpectation, ShimDiffViolation, compare};
pub use error::Error;
pub use execution::{Dispatcher, run_noop};
pub use fixture::{Fixture, GLOBAL_PREFIX_DIR_NAME};
pub use invocation::{
    CmdStyle, Invocation, InvocationStyle, PosixStyle, PowerShellStyle, launcher_path,
    quote_path_segments,
};
pub use reporting::{
    DispatchOutcome, DispatchResult, RunResults, report_results, write_shim_check_details,
};
pub use runner::{ShimRunner, check_launcher_pairs, dispatch_through};
pub use script::{AliasRole, LauncherScript, ShellFamily, ShimSet};
pub use shell::{Availability, ProbeMethod, ShellTarget, catalogue};
