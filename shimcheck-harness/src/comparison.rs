//! Comparison types for harness results.

use crate::config::HarnessConfig;
use crate::differ::{ShimDiff, ShimDiffViolation};
use crate::script::{AliasRole, ShellFamily};

/// Result of launching an alias through a shell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationResult {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Signal that terminated the process, if any.
    pub signal: Option<i32>,
    /// Trimmed standard output.
    pub stdout: String,
    /// Trimmed standard error.
    pub stderr: String,
    /// The command line that was executed.
    pub command: String,
}

/// Comparison of a single expectation.
#[derive(Clone, Debug)]
pub enum SingleExpectationComparison {
    /// Actual matches expected.
    Matches,
    /// Actual differs from expected.
    Differs {
        /// The expected value.
        expected: String,
        /// The actual value.
        actual: String,
    },
}

impl SingleExpectationComparison {
    /// Returns whether this comparison indicates a failure.
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Differs { .. })
    }

    fn compare(expected: &str, actual: &str) -> Self {
        if expected == actual {
            Self::Matches
        } else {
            Self::Differs {
                expected: expected.to_owned(),
                actual: actual.to_owned(),
            }
        }
    }
}

/// What a successful invocation of an alias looks like.
#[derive(Clone, Debug)]
pub struct InvocationExpectation {
    /// Expected standard output.
    pub stdout: String,
}

impl InvocationExpectation {
    /// Expected exit code of every invocation.
    pub const EXIT_CODE: i32 = 0;

    /// Builds the expectation for an alias role.
    ///
    /// The primary alias's diagnostic help reports `<alias>@<version> <root>`; the
    /// secondary alias reports just the version.
    pub fn for_role(role: AliasRole, config: &HarnessConfig) -> Self {
        let version = config.package.version.as_str();
        let stdout = match role {
            AliasRole::Primary => format!(
                "{}@{version} {}",
                config.aliases.primary,
                config.package.root.display()
            ),
            AliasRole::Secondary => version.to_owned(),
        };

        Self { stdout }
    }

    /// Compares an invocation result against this expectation.
    pub fn check(&self, result: &InvocationResult) -> InvocationComparison {
        let describe_code =
            |code: Option<i32>| code.map_or_else(|| String::from("none"), |c| c.to_string());

        InvocationComparison {
            exit_code: SingleExpectationComparison::compare(
                &describe_code(Some(Self::EXIT_CODE)),
                &describe_code(result.code),
            ),
            signal: match result.signal {
                None => SingleExpectationComparison::Matches,
                Some(signal) => SingleExpectationComparison::Differs {
                    expected: String::from("none"),
                    actual: signal.to_string(),
                },
            },
            stdout: SingleExpectationComparison::compare(&self.stdout, &result.stdout),
            stderr: SingleExpectationComparison::compare("", &result.stderr),
        }
    }
}

/// Comparison of an invocation against its expectation.
#[derive(Clone, Debug)]
pub struct InvocationComparison {
    /// Comparison of exit code.
    pub exit_code: SingleExpectationComparison,
    /// Comparison of termination signal.
    pub signal: SingleExpectationComparison,
    /// Comparison of stdout.
    pub stdout: SingleExpectationComparison,
    /// Comparison of stderr.
    pub stderr: SingleExpectationComparison,
}

impl InvocationComparison {
    /// Returns whether this comparison indicates a failure.
    pub const fn is_failure(&self) -> bool {
        self.exit_code.is_failure()
            || self.signal.is_failure()
            || self.stdout.is_failure()
            || self.stderr.is_failure()
    }
}

/// Outcome of checking one family's launcher pair.
#[derive(Clone, Debug)]
pub struct ShimPairComparison {
    /// The family whose launchers were compared.
    pub family: ShellFamily,
    /// The observed diff.
    pub diff: ShimDiff,
    /// Violations of the family's expectation.
    pub violations: Vec<ShimDiffViolation>,
}

impl ShimPairComparison {
    /// Returns whether this comparison indicates a failure.
    pub fn is_failure(&self) -> bool {
        !self.violations.is_empty()
    }
}
