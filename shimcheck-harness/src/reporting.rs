//! Reporting utilities for harness results.

use crate::comparison::{
    InvocationComparison, InvocationResult, ShimPairComparison, SingleExpectationComparison,
};
use crate::config::{HarnessOptions, OutputFormat};
use crate::script::ShellFamily;
use anyhow::Result;
use colored::Colorize;
use std::io::Write;

/// What happened when an alias was dispatched through a shell target.
#[derive(Clone, Debug)]
pub enum DispatchOutcome {
    /// The shell was not available.
    Skipped {
        /// Why the shell was skipped.
        reason: String,
    },
    /// The invocation ran to completion.
    Completed {
        /// The captured result.
        result: InvocationResult,
        /// The result compared against its expectation.
        comparison: InvocationComparison,
    },
    /// The invocation could not be run.
    Errored {
        /// Description of the error.
        message: String,
    },
}

/// Result of dispatching one alias through one shell target.
#[derive(Debug)]
pub struct DispatchResult {
    /// Name of the shell target.
    pub shell: String,
    /// Family of the shell target.
    pub family: ShellFamily,
    /// The alias that was dispatched.
    pub alias: String,
    /// Whether skips count as failures.
    pub strict: bool,
    /// What happened.
    pub outcome: DispatchOutcome,
    /// How long the invocation took.
    pub duration: std::time::Duration,
}

impl DispatchResult {
    /// Qualified name of this dispatch.
    pub fn name(&self) -> String {
        format!("{}::{}", self.shell, self.alias)
    }

    /// Returns whether this result was skipped without counting as a failure.
    pub const fn is_skip(&self) -> bool {
        !self.strict && matches!(self.outcome, DispatchOutcome::Skipped { .. })
    }

    /// Returns whether this result indicates a failure.
    pub const fn is_failure(&self) -> bool {
        match &self.outcome {
            DispatchOutcome::Skipped { .. } => self.strict,
            DispatchOutcome::Completed { comparison, .. } => comparison.is_failure(),
            DispatchOutcome::Errored { .. } => true,
        }
    }

    /// Writes the details of this result to a writer.
    pub fn write_details<W: Write>(&self, mut writer: W, options: &HarnessOptions) -> Result<()> {
        if !options.verbose && !self.is_failure() {
            return Ok(());
        }

        write!(
            writer,
            "* {}: [{}]... ",
            "Dispatch".bright_yellow(),
            self.name().italic()
        )?;

        match &self.outcome {
            DispatchOutcome::Skipped { reason } => {
                if self.strict {
                    writeln!(writer, "{} {reason}", "unavailable:".bright_red())?;
                } else {
                    writeln!(writer, "{} {reason}", "skipped:".cyan())?;
                    return Ok(());
                }
            }
            DispatchOutcome::Completed { result, comparison } => {
                if !comparison.is_failure() {
                    writeln!(writer, "{}", "ok.".bright_green())?;
                    return Ok(());
                }

                writeln!(writer)?;
                write_invocation_details(&mut writer, result, comparison)?;
            }
            DispatchOutcome::Errored { message } => {
                writeln!(writer, "{} {message}", "error:".bright_red())?;
            }
        }

        writeln!(writer, "    {}", "FAILED.".bright_red())?;

        Ok(())
    }
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunResults {
    /// One comparison per launcher family.
    pub shim_checks: Vec<ShimPairComparison>,
    /// One result per shell target and alias.
    pub dispatches: Vec<DispatchResult>,
}

impl RunResults {
    /// Number of checks that succeeded.
    pub fn success_count(&self) -> usize {
        self.shim_checks.iter().filter(|c| !c.is_failure()).count()
            + self
                .dispatches
                .iter()
                .filter(|d| !d.is_failure() && !d.is_skip())
                .count()
    }

    /// Number of checks that failed.
    pub fn fail_count(&self) -> usize {
        self.shim_checks.iter().filter(|c| c.is_failure()).count()
            + self.dispatches.iter().filter(|d| d.is_failure()).count()
    }

    /// Number of dispatches that were skipped.
    pub fn skip_count(&self) -> usize {
        self.dispatches.iter().filter(|d| d.is_skip()).count()
    }
}

/// Writes the details of a launcher pair comparison to a writer.
pub fn write_shim_check_details<W: Write>(
    mut writer: W,
    check: &ShimPairComparison,
    options: &HarnessOptions,
) -> Result<()> {
    if !options.verbose && !check.is_failure() {
        return Ok(());
    }

    write!(
        writer,
        "* {}: [{}]... ",
        "Launcher pair".bright_yellow(),
        check.family.name().italic()
    )?;

    if !check.is_failure() {
        writeln!(writer, "{}", "ok.".bright_green())?;
        return Ok(());
    }

    writeln!(writer)?;
    for violation in &check.violations {
        writeln!(writer, "      {} {violation}", "violation:".bright_red())?;
    }

    writeln!(
        writer,
        "          {}",
        "------ Observed differences ---------------------------------".cyan()
    )?;
    writeln!(
        writer,
        "{}",
        indent::indent_all_by(
            10,
            format!(
                "letters: {}\nchunks: {:?}",
                check.diff.letters.iter().collect::<String>(),
                check.diff.chunks
            )
        )
    )?;

    writeln!(writer, "    {}", "FAILED.".bright_red())?;

    Ok(())
}

fn write_invocation_details<W: Write>(
    writer: &mut W,
    result: &InvocationResult,
    comparison: &InvocationComparison,
) -> Result<()> {
    writeln!(writer, "      command: {}", result.command.as_str().cyan())?;

    for (label, field) in [
        ("exit code", &comparison.exit_code),
        ("signal", &comparison.signal),
    ] {
        if let SingleExpectationComparison::Differs { expected, actual } = field {
            writeln!(
                writer,
                "      {label} {}: expected {}, got {}",
                "DIFFERS".bright_red(),
                expected.cyan(),
                actual.bright_red()
            )?;
        }
    }

    for (label, field) in [("stdout", &comparison.stdout), ("stderr", &comparison.stderr)] {
        match field {
            SingleExpectationComparison::Matches => {
                writeln!(writer, "      {label} matches {}", "✔️".green())?;
            }
            SingleExpectationComparison::Differs { expected, actual } => {
                writeln!(writer, "      {label} {}", "DIFFERS:".bright_red())?;
                writeln!(
                    writer,
                    "          {}",
                    format!("------ Expected <> Actual: {label} ---------------------------------")
                        .cyan()
                )?;
                write_diff(writer, 10, expected, actual)?;
            }
        }
    }

    for (label, output) in [("stdout", &result.stdout), ("stderr", &result.stderr)] {
        writeln!(
            writer,
            "          {}",
            format!("------ Captured: {label} ---------------------------------").cyan()
        )?;
        writeln!(writer, "{}", indent::indent_all_by(10, output))?;
    }

    Ok(())
}

/// Writes a line diff between two strings to a writer.
fn write_diff(writer: &mut impl Write, indent: usize, left: &str, right: &str) -> Result<()> {
    let indent_str = " ".repeat(indent);

    for d in diff::lines(left, right) {
        let formatted = match d {
            diff::Result::Left(l) => std::format!("{indent_str}- {l}").red(),
            diff::Result::Both(l, _) => std::format!("{indent_str}  {l}").bright_black(),
            diff::Result::Right(r) => std::format!("{indent_str}+ {r}").green(),
        };

        writeln!(writer, "{formatted}")?;
    }

    Ok(())
}

/// Reports results based on the configured output format.
pub fn report_results(results: &RunResults, options: &HarnessOptions) -> Result<()> {
    match options.format {
        OutputFormat::Pretty => report_results_pretty(results, options),
        OutputFormat::Junit => report_results_junit(results, options),
        OutputFormat::Terse => Ok(()),
    }
}

fn report_results_pretty(results: &RunResults, options: &HarnessOptions) -> Result<()> {
    for check in &results.shim_checks {
        write_shim_check_details(std::io::stderr(), check, options)?;
    }

    for dispatch in &results.dispatches {
        dispatch.write_details(std::io::stderr(), options)?;
    }

    Ok(())
}

fn report_results_junit(results: &RunResults, options: &HarnessOptions) -> Result<()> {
    let mut report = junit_report::Report::new();

    let mut suite = junit_report::TestSuite::new("launcher contents");
    for check in &results.shim_checks {
        let mut test_case = if check.is_failure() {
            junit_report::TestCase::failure(
                check.family.name(),
                std::time::Duration::ZERO.try_into()?,
                "launcher drift",
                "failed",
            )
        } else {
            junit_report::TestCase::success(
                check.family.name(),
                std::time::Duration::ZERO.try_into()?,
            )
        };

        let mut output_buf: Vec<u8> = vec![];
        write_shim_check_details(&mut output_buf, check, options)?;
        let output_as_string = String::from_utf8(output_buf)?;
        test_case.set_system_out(strip_ansi_escapes::strip_str(output_as_string).as_str());

        suite.add_testcase(test_case);
    }
    report.add_testsuite(suite);

    let mut suite = junit_report::TestSuite::new("dispatch");
    for dispatch in &results.dispatches {
        let name = dispatch.name();
        let mut test_case = if dispatch.is_skip() {
            junit_report::TestCase::skipped(name.as_str())
        } else if dispatch.is_failure() {
            junit_report::TestCase::failure(
                name.as_str(),
                dispatch.duration.try_into()?,
                "dispatch failure",
                "failed",
            )
        } else {
            junit_report::TestCase::success(name.as_str(), dispatch.duration.try_into()?)
        };

        let mut output_buf: Vec<u8> = vec![];
        dispatch.write_details(&mut output_buf, options)?;
        let output_as_string = String::from_utf8(output_buf)?;
        test_case.set_system_out(strip_ansi_escapes::strip_str(output_as_string).as_str());

        suite.add_testcase(test_case);
    }
    report.add_testsuite(suite);

    report.write_xml(std::io::stdout())?;
    writeln!(std::io::stdout())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::{ShimDiff, ShimDiffViolation};
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn options(args: &[&str]) -> HarnessOptions {
        HarnessOptions::parse_from(std::iter::once("shimcheck").chain(args.iter().copied()))
    }

    fn completed(stdout: &str) -> DispatchOutcome {
        let result = InvocationResult {
            code: Some(0),
            signal: None,
            stdout: stdout.to_owned(),
            stderr: String::new(),
            command: String::from("bash -l npx --version"),
        };
        let comparison = crate::comparison::InvocationExpectation {
            stdout: String::from("1.0.0"),
        }
        .check(&result);

        DispatchOutcome::Completed { result, comparison }
    }

    fn dispatch(outcome: DispatchOutcome, strict: bool) -> DispatchResult {
        DispatchResult {
            shell: String::from("bash"),
            family: ShellFamily::Posix,
            alias: String::from("npx"),
            strict,
            outcome,
            duration: std::time::Duration::default(),
        }
    }

    fn skipped() -> DispatchOutcome {
        DispatchOutcome::Skipped {
            reason: String::from("bash not found"),
        }
    }

    #[test]
    fn counts_respect_strict_mode() {
        let results = RunResults {
            shim_checks: vec![ShimPairComparison {
                family: ShellFamily::Posix,
                diff: ShimDiff::default(),
                violations: vec![],
            }],
            dispatches: vec![
                dispatch(completed("1.0.0"), false),
                dispatch(completed("0.9.0"), false),
                dispatch(skipped(), false),
                dispatch(skipped(), true),
            ],
        };

        assert_eq!(results.success_count(), 2);
        assert_eq!(results.fail_count(), 2);
        assert_eq!(results.skip_count(), 1);
    }

    #[test]
    fn failed_dispatch_details_include_command_and_output() -> Result<()> {
        colored::control::set_override(false);

        let mut buf = vec![];
        dispatch(completed("0.9.0"), false).write_details(&mut buf, &options(&[]))?;
        let text = String::from_utf8(buf)?;

        assert!(text.contains("[bash::npx]"));
        assert!(text.contains("command: bash -l npx --version"));
        assert!(text.contains("- 1.0.0"));
        assert!(text.contains("+ 0.9.0"));
        assert!(text.contains("FAILED."));

        Ok(())
    }

    #[test]
    fn successes_are_quiet_unless_verbose() -> Result<()> {
        let mut buf = vec![];
        dispatch(completed("1.0.0"), false).write_details(&mut buf, &options(&[]))?;
        assert!(buf.is_empty());

        let mut buf = vec![];
        dispatch(skipped(), false).write_details(&mut buf, &options(&["--verbose"]))?;
        assert!(String::from_utf8(buf)?.contains("bash not found"));

        Ok(())
    }

    #[test]
    fn violations_are_listed() -> Result<()> {
        colored::control::set_override(false);

        let check = ShimPairComparison {
            family: ShellFamily::Cmd,
            diff: ShimDiff::default(),
            violations: vec![ShimDiffViolation::WrongChunkCount {
                expected: 1,
                actual: vec![],
            }],
        };

        let mut buf = vec![];
        write_shim_check_details(&mut buf, &check, &options(&[]))?;
        let text = String::from_utf8(buf)?;
        assert!(text.contains("[cmd]"));
        assert!(text.contains("expected 1 multi-character difference(s), found 0"));

        Ok(())
    }
}
