//! Shell targets and availability probing.

use crate::config::HarnessConfig;
use crate::error::Error;
use crate::execution;
use crate::script::ShellFamily;
use std::path::{Path, PathBuf};

/// Whether a shell target can be dispatched through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Availability {
    /// Not yet probed.
    Unprobed,
    /// Installed at the given path.
    Available(PathBuf),
    /// Not usable, for the given reason.
    Skipped(String),
}

/// How a target's availability is established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeMethod {
    /// Resolve the candidate against the host search path.
    Resolve,
    /// Resolve the candidate, then run a no-op through it as a login shell.
    NestedInterpreter,
}

/// A command shell the launchers are dispatched through.
#[derive(Clone, Debug)]
pub struct ShellTarget {
    /// Human-readable name.
    pub name: String,
    /// Shell family, controlling invocation style.
    pub family: ShellFamily,
    /// Executable name or path to resolve.
    pub candidate: PathBuf,
    /// How availability is established.
    pub probe_method: ProbeMethod,
    /// Whether the target must be skipped while coverage instrumentation is active.
    pub conflicts_with_coverage: bool,
    availability: Availability,
}

impl ShellTarget {
    /// Creates a new, unprobed target resolved by search path lookup.
    pub fn new(
        name: impl Into<String>,
        family: ShellFamily,
        candidate: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            family,
            candidate: candidate.into(),
            probe_method: ProbeMethod::Resolve,
            conflicts_with_coverage: false,
            availability: Availability::Unprobed,
        }
    }

    /// Sets the probe method.
    #[must_use]
    pub const fn with_probe_method(mut self, probe_method: ProbeMethod) -> Self {
        self.probe_method = probe_method;
        self
    }

    /// Marks the target as conflicting with coverage instrumentation.
    #[must_use]
    pub const fn with_coverage_conflict(mut self) -> Self {
        self.conflicts_with_coverage = true;
        self
    }

    /// Current availability.
    pub const fn availability(&self) -> &Availability {
        &self.availability
    }

    /// Resolved executable, if the target is available.
    pub fn executable(&self) -> Option<&Path> {
        match &self.availability {
            Availability::Available(path) => Some(path.as_path()),
            _ => None,
        }
    }

    /// Establishes availability. Only an unprobed target is probed; the outcome is final.
    pub fn probe(&mut self, config: &HarnessConfig) -> &Availability {
        if self.availability == Availability::Unprobed {
            self.availability = self.evaluate(config);

            match &self.availability {
                Availability::Available(path) => {
                    tracing::debug!("shell '{}' available at {}", self.name, path.display());
                }
                Availability::Skipped(reason) => {
                    tracing::info!("skipping shell '{}': {reason}", self.name);
                }
                Availability::Unprobed => (),
            }
        }

        &self.availability
    }

    fn evaluate(&self, config: &HarnessConfig) -> Availability {
        if self.conflicts_with_coverage && config.coverage_active {
            return Availability::Skipped(String::from(
                "conflicts with code-coverage instrumentation",
            ));
        }

        let resolved = match which::which(&self.candidate) {
            Ok(resolved) => resolved,
            Err(e) => {
                return Availability::Skipped(format!(
                    "{} not found: {e}",
                    self.candidate.display()
                ));
            }
        };

        if self.probe_method == ProbeMethod::NestedInterpreter {
            match execution::run_noop(&resolved, config.timeout) {
                Ok(true) => (),
                Ok(false) => {
                    return Availability::Skipped(format!(
                        "{} could not run a command",
                        resolved.display()
                    ));
                }
                Err(e) => {
                    return Availability::Skipped(format!(
                        "{} failed to start: {e:#}",
                        resolved.display()
                    ));
                }
            }
        }

        Availability::Available(resolved)
    }
}

/// Builds the catalogue of shell targets for a run, in dispatch order.
pub fn catalogue(config: &HarnessConfig) -> Result<Vec<ShellTarget>, Error> {
    let program_files = config.host.program_files.as_str();
    let system_root = config.host.system_root.as_str();
    let system_drive = system_root
        .split_once(':')
        .map_or_else(|| String::from("C:"), |(drive, _)| format!("{drive}:"));

    let mut targets = vec![
        ShellTarget::new("cmd", ShellFamily::Cmd, "cmd"),
        ShellTarget::new("pwsh", ShellFamily::PowerShell, "pwsh"),
        ShellTarget::new(
            "git",
            ShellFamily::Posix,
            windows_path(program_files, &["Git", "bin", "bash.exe"]),
        )
        .with_coverage_conflict(),
        ShellTarget::new(
            "user git",
            ShellFamily::Posix,
            windows_path(program_files, &["Git", "usr", "bin", "bash.exe"]),
        ),
        ShellTarget::new(
            "wsl",
            ShellFamily::Posix,
            windows_path(system_root, &["System32", "bash.exe"]),
        )
        .with_probe_method(ProbeMethod::NestedInterpreter),
        ShellTarget::new(
            "cygwin",
            ShellFamily::Posix,
            windows_path(&system_drive, &["cygwin64", "bin", "bash.exe"]),
        ),
    ];

    if !cfg!(windows) {
        targets.push(ShellTarget::new("bash", ShellFamily::Posix, "bash"));
    }

    for (name, executable) in &config.extra_shells {
        let family = ShellFamily::from_executable(executable)?;
        targets.push(ShellTarget::new(name.as_str(), family, executable.as_path()));
    }

    Ok(targets)
}

// Candidate paths are Windows paths regardless of the host running the harness.
fn windows_path(base: &str, segments: &[&str]) -> String {
    std::iter::once(base.trim_end_matches('\\'))
        .chain(segments.iter().copied())
        .collect::<Vec<_>>()
        .join("\\")
}

#[cfg(test)]
#[allow(clippy::panic_in_result_fn)]
mod tests {
    use super::*;
    use crate::config::{HostEnvironment, PackageUnderTest, Runtime, RuntimeKind};
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn test_config() -> HarnessConfig {
        HarnessConfig::new(
            PathBuf::from("shims"),
            PackageUnderTest {
                root: PathBuf::from("/pkg"),
                version: String::from("1.0.0"),
            },
            Runtime {
                path: PathBuf::from("/bin/sh"),
                kind: RuntimeKind::Shell,
            },
        )
        .with_host(HostEnvironment {
            program_files: String::from(r"D:\Apps\"),
            system_root: String::from(r"E:\Windows"),
        })
    }

    #[test]
    fn catalogue_uses_host_locations() -> Result<()> {
        let targets = catalogue(&test_config())?;

        let candidate = |name: &str| {
            targets
                .iter()
                .find(|t| t.name == name)
                .map(|t| t.candidate.to_string_lossy().to_string())
        };

        assert_eq!(candidate("git").as_deref(), Some(r"D:\Apps\Git\bin\bash.exe"));
        assert_eq!(
            candidate("user git").as_deref(),
            Some(r"D:\Apps\Git\usr\bin\bash.exe")
        );
        assert_eq!(
            candidate("wsl").as_deref(),
            Some(r"E:\Windows\System32\bash.exe")
        );
        assert_eq!(
            candidate("cygwin").as_deref(),
            Some(r"E:\cygwin64\bin\bash.exe")
        );

        let names: Vec<_> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(&names[..6], &["cmd", "pwsh", "git", "user git", "wsl", "cygwin"]);

        Ok(())
    }

    #[test]
    fn extra_shells_need_known_family() -> Result<()> {
        let config = test_config().with_extra_shell("mine", PathBuf::from("/opt/bin/sh"));
        let targets = catalogue(&config)?;
        let last = targets.last().ok_or_else(|| anyhow::anyhow!("no targets"))?;
        assert_eq!(last.name, "mine");
        assert_eq!(last.family, ShellFamily::Posix);

        let config = test_config().with_extra_shell("fish", PathBuf::from("/usr/bin/fish"));
        assert!(matches!(catalogue(&config), Err(Error::UnknownShell(_))));

        Ok(())
    }

    #[test]
    fn missing_shell_is_skipped() {
        let mut target = ShellTarget::new(
            "nowhere",
            ShellFamily::Posix,
            "/definitely/not/installed/bash",
        );
        assert_eq!(target.availability(), &Availability::Unprobed);
        assert!(matches!(
            target.probe(&test_config()),
            Availability::Skipped(_)
        ));
        assert!(target.executable().is_none());
    }

    #[test]
    fn coverage_conflict_forces_skip() -> Result<()> {
        let shell = which::which("sh")?;
        let config = test_config().with_coverage_active(true);

        let mut target = ShellTarget::new("git", ShellFamily::Posix, shell.as_path())
            .with_coverage_conflict();
        assert_eq!(
            target.probe(&config),
            &Availability::Skipped(String::from(
                "conflicts with code-coverage instrumentation"
            ))
        );

        let mut target = ShellTarget::new("plain", ShellFamily::Posix, shell.as_path());
        assert_eq!(target.probe(&config), &Availability::Available(shell));

        Ok(())
    }

    #[test]
    fn probe_outcome_is_final() -> Result<()> {
        let shell = which::which("sh")?;
        let mut target = ShellTarget::new("sh", ShellFamily::Posix, shell.as_path());
        target.probe(&test_config());

        // Moving the candidate after probing does not trigger a new evaluation.
        target.candidate = PathBuf::from("/definitely/not/installed/sh");
        assert_eq!(target.probe(&test_config()), &Availability::Available(shell));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn nested_interpreter_probe_runs_noop() -> Result<()> {
        let shell = which::which("sh")?;
        let mut target = ShellTarget::new("nested", ShellFamily::Posix, shell.as_path())
            .with_probe_method(ProbeMethod::NestedInterpreter);
        assert_eq!(target.probe(&test_config()), &Availability::Available(shell));

        let falsy = which::which("false")?;
        let mut target = ShellTarget::new("broken", ShellFamily::Posix, falsy.as_path())
            .with_probe_method(ProbeMethod::NestedInterpreter);
        assert!(matches!(
            target.probe(&test_config()),
            Availability::Skipped(_)
        ));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn hung_nested_interpreter_is_skipped() -> Result<()> {
        use assert_fs::prelude::*;
        use std::os::unix::fs::PermissionsExt;

        let dir = assert_fs::TempDir::new()?;
        let hang = dir.child("hang");
        hang.write_str("#!/bin/sh\nsleep 30\n")?;
        let mut perms = hang.metadata()?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        std::fs::set_permissions(hang.path(), perms)?;

        let config = test_config().with_timeout(std::time::Duration::from_secs(1));
        let mut target = ShellTarget::new("hang", ShellFamily::Posix, hang.path())
            .with_probe_method(ProbeMethod::NestedInterpreter);

        let start = std::time::Instant::now();
        assert!(matches!(target.probe(&config), Availability::Skipped(_)));
        assert!(start.elapsed() < std::time::Duration::from_secs(10));
        assert!(target.executable().is_none());

        Ok(())
    }
}
