//! Harness runner implementation.

use crate::comparison::{InvocationExpectation, ShimPairComparison};
use crate::config::{AliasPair, HarnessConfig, HarnessOptions, OutputFormat};
use crate::differ::{self, ShimDiffExpectation};
use crate::error::Error;
use crate::execution::Dispatcher;
use crate::fixture::Fixture;
use crate::reporting::{DispatchOutcome, DispatchResult, RunResults};
use crate::script::{AliasRole, ShellFamily, ShimSet};
use crate::shell::{self, Availability, ShellTarget};
use anyhow::{Context, Result};
use colored::Colorize;

/// The main harness runner.
pub struct ShimRunner {
    config: HarnessConfig,
    options: HarnessOptions,
}

impl ShimRunner {
    /// Creates a new runner with the given configuration and options.
    pub const fn new(config: HarnessConfig, options: HarnessOptions) -> Self {
        Self { config, options }
    }

    /// Runs every check and returns success/failure.
    pub fn run(&self) -> Result<bool> {
        let mut targets: Vec<ShellTarget> = shell::catalogue(&self.config)?
            .into_iter()
            .filter(|target| self.options.should_run_shell(&target.name))
            .collect();

        if self.options.list_shells_only {
            for target in &targets {
                println!("{}: {}", target.name, target.family);
            }
            return Ok(true);
        }

        let shims_dir = &self.config.shims_dir;
        let shims = ShimSet::load(shims_dir, &self.config.aliases)
            .with_context(|| format!("loading launchers from {}", shims_dir.display()))?;

        let mut results = RunResults {
            shim_checks: check_launcher_pairs(&shims, &self.config.aliases)?,
            dispatches: vec![],
        };

        for target in &mut targets {
            target.probe(&self.config);
            results
                .dispatches
                .extend(dispatch_through(&self.config, &shims, target));
        }

        crate::reporting::report_results(&results, &self.options)?;

        let success_count = results.success_count();
        let fail_count = results.fail_count();
        let skip_count = results.skip_count();

        if matches!(self.options.format, OutputFormat::Pretty) {
            let formatted_fail_count = if fail_count > 0 {
                fail_count.to_string().red()
            } else {
                fail_count.to_string().green()
            };

            let formatted_skip_count = if skip_count > 0 {
                skip_count.to_string().cyan()
            } else {
                skip_count.to_string().green()
            };

            eprintln!(
                "================================================================================"
            );
            eprintln!(
                "{} check(s) ran: {} succeeded, {} failed, {} skipped.",
                success_count + fail_count,
                success_count.to_string().green(),
                formatted_fail_count,
                formatted_skip_count,
            );
            eprintln!(
                "================================================================================"
            );
        }

        Ok(fail_count == 0)
    }
}

/// Checks that each family's launcher pair differs only in the allowed ways.
pub fn check_launcher_pairs(
    shims: &ShimSet,
    aliases: &AliasPair,
) -> Result<Vec<ShimPairComparison>, Error> {
    let mut checks = vec![];

    for family in ShellFamily::ALL {
        let Some((primary, secondary)) = shims.pair(family) else {
            continue;
        };

        let diff = differ::compare(&primary.contents, &secondary.contents);
        let violations = ShimDiffExpectation::for_family(family, aliases)?.check(&diff);

        tracing::debug!(
            "{family} launchers differ by letters {:?} and {} chunk(s)",
            diff.letters,
            diff.chunks.len()
        );

        checks.push(ShimPairComparison {
            family,
            diff,
            violations,
        });
    }

    Ok(checks)
}

/// Dispatches both aliases through a probed shell target, each against a fresh fixture.
pub fn dispatch_through(
    config: &HarnessConfig,
    shims: &ShimSet,
    target: &ShellTarget,
) -> Vec<DispatchResult> {
    let result_for = |role: AliasRole, outcome: DispatchOutcome, duration| DispatchResult {
        shell: target.name.clone(),
        family: target.family,
        alias: role.alias(&config.aliases).to_owned(),
        strict: config.strict,
        outcome,
        duration,
    };
    let unrun = |outcome: &DispatchOutcome| -> Vec<DispatchResult> {
        AliasRole::ALL
            .into_iter()
            .map(|role| result_for(role, outcome.clone(), std::time::Duration::default()))
            .collect()
    };

    let skip_reason = match target.availability() {
        Availability::Available(_) => None,
        Availability::Skipped(reason) => Some(reason.clone()),
        Availability::Unprobed => Some(String::from("not probed")),
    };

    if let Some(reason) = skip_reason {
        if config.strict {
            tracing::warn!("shell '{}' is unavailable in strict mode: {reason}", target.name);
        }

        return unrun(&DispatchOutcome::Skipped { reason });
    }

    let fixture = match Fixture::assemble(config, shims) {
        Ok(fixture) => fixture,
        Err(e) => {
            let message = format!("assembling fixture for shell '{}': {e:#}", target.name);
            tracing::warn!("{message}");

            return unrun(&DispatchOutcome::Errored { message });
        }
    };
    let dispatcher = Dispatcher::new(config, fixture.path());

    let mut results = vec![];
    for role in AliasRole::ALL {
        let alias = role.alias(&config.aliases);
        let expectation = InvocationExpectation::for_role(role, config);

        let start_time = std::time::Instant::now();
        let outcome = match dispatcher.invoke(target, alias, &role.dispatch_args()) {
            Ok(result) => DispatchOutcome::Completed {
                comparison: expectation.check(&result),
                result,
            },
            Err(e) => DispatchOutcome::Errored {
                message: format!("{e:#}"),
            },
        };

        results.push(result_for(role, outcome, start_time.elapsed()));
    }

    results
}
