//! Execution of launchers through shell targets.

use crate::comparison::InvocationResult;
use crate::config::HarnessConfig;
use crate::error::Error;
use crate::shell::ShellTarget;
use anyhow::{Context, Result};
#[cfg(unix)]
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

/// Launches aliases through shell targets against one fixture directory.
pub struct Dispatcher<'a> {
    config: &'a HarnessConfig,
    fixture_dir: &'a Path,
}

impl<'a> Dispatcher<'a> {
    /// Creates a dispatcher for launchers installed in `fixture_dir`.
    pub const fn new(config: &'a HarnessConfig, fixture_dir: &'a Path) -> Self {
        Self {
            config,
            fixture_dir,
        }
    }

    /// Invokes `alias` with `argv` through `shell`, capturing its result.
    ///
    /// The child sees only a search path pointing at the fixture directory and the
    /// update-check switch, and runs with the fixture directory as its working directory.
    pub fn invoke(
        &self,
        shell: &ShellTarget,
        alias: &str,
        argv: &[String],
    ) -> Result<InvocationResult> {
        let executable = shell
            .executable()
            .ok_or_else(|| Error::ShellUnavailable(shell.name.clone()))?;

        let invocation = shell
            .family
            .style()
            .build(executable, self.fixture_dir, alias, argv);
        let command_line = invocation.command_line();

        tracing::debug!("invoking through '{}': {command_line}", shell.name);

        let mut cmd = invocation.to_command();
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        // Clear all environment vars so the launchers only see the fixture.
        cmd.env_clear();
        cmd.env("PATH", self.fixture_dir);
        cmd.env(self.config.aliases.update_check_variable(), "false");
        cmd.current_dir(self.fixture_dir);

        let output = run_bounded(cmd, self.config.timeout)
            .with_context(|| format!("running {command_line}"))?;

        Ok(InvocationResult {
            code: output.status.code(),
            signal: termination_signal(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            command: command_line,
        })
    }
}

/// Runs a no-op command through a shell as a login shell, returning whether it succeeded.
pub fn run_noop(shell: &Path, timeout: Duration) -> Result<bool> {
    let mut cmd = std::process::Command::new(shell);
    cmd.args(["-l", "-c", "exit 0"])
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let output = run_bounded(cmd, timeout)
        .with_context(|| format!("probing {}", shell.display()))?;

    Ok(output.status.success())
}

/// Polling interval while waiting on a bounded child.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn run_bounded(
    mut cmd: std::process::Command,
    timeout: Duration,
) -> Result<std::process::Output> {
    // SAFETY:
    // Interactive shells may try to access /dev/tty directly and wait on input, so the
    // child gets a new session. The standard library's setsid() API is unstable, so we
    // use nix here. pre_exec runs in the child after fork() and before exec(), where
    // only async-signal-safe work is allowed; setsid() neither allocates nor touches
    // forked state.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            let _ = nix::unistd::setsid();
            Ok(())
        })
    };

    cmd.stdin(Stdio::null());

    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }

        if Instant::now() >= deadline {
            tracing::warn!("killing process {} after {timeout:?}", child.id());
            kill_tree(&mut child)?;
            break child.wait()?;
        }

        std::thread::sleep(POLL_INTERVAL);
    };

    // Descendants left behind would keep the output pipes open.
    kill_group(&child);

    Ok(std::process::Output {
        status,
        stdout: collect(stdout)?,
        stderr: collect(stderr)?,
    })
}

type Drain = std::thread::JoinHandle<std::io::Result<Vec<u8>>>;

fn drain(mut pipe: impl Read + Send + 'static) -> Drain {
    std::thread::spawn(move || {
        let mut buffer = vec![];
        pipe.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn collect(drain: Option<Drain>) -> Result<Vec<u8>> {
    match drain {
        Some(handle) => handle
            .join()
            .map_err(|_| anyhow::anyhow!("output reader panicked"))?
            .context("reading child output"),
        None => Ok(vec![]),
    }
}

fn kill_tree(child: &mut std::process::Child) -> Result<()> {
    kill_group(child);

    // A child whose setsid() failed leads no group of its own.
    match child.kill() {
        Err(e) if e.kind() != std::io::ErrorKind::InvalidInput => Err(e.into()),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn kill_group(child: &std::process::Child) {
    let Ok(pid) = i32::try_from(child.id()) else {
        return;
    };

    // The child leads its own session, so its pid names its process group.
    match nix::sys::signal::killpg(nix::unistd::Pid::from_raw(pid), nix::sys::signal::SIGKILL)
    {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => (),
        Err(e) => tracing::debug!("failed to kill process group {pid}: {e}"),
    }
}

#[cfg(not(unix))]
const fn kill_group(_child: &std::process::Child) {}

#[cfg(unix)]
fn termination_signal(status: std::process::ExitStatus) -> Option<i32> {
    status.signal()
}

#[cfg(not(unix))]
const fn termination_signal(_status: std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
#[allow(clippy::panic_in_result_fn)]
mod tests {
    use super::*;
    use crate::config::{PackageUnderTest, Runtime, RuntimeKind};
    use crate::script::ShellFamily;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

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
    }

    #[test]
    fn unprobed_shell_cannot_be_dispatched() -> Result<()> {
        let config = test_config();
        let dir = assert_fs::TempDir::new()?;
        let dispatcher = Dispatcher::new(&config, dir.path());
        let shell = ShellTarget::new("bash", ShellFamily::Posix, "bash");

        let err = dispatcher
            .invoke(&shell, "npm", &[])
            .err()
            .ok_or_else(|| anyhow::anyhow!("dispatch unexpectedly succeeded"))?;
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ShellUnavailable(name)) if name == "bash"
        ));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn environment_is_restricted_to_fixture() -> Result<()> {
        use assert_fs::prelude::*;
        use std::os::unix::fs::PermissionsExt;

        let config = test_config();
        let dir = assert_fs::TempDir::new()?;
        let shell_path = which::which("sh")?;

        // A launcher that reports what it sees, using builtins only.
        let launcher = dir.child("envdump");
        launcher.write_str(
            "echo \"${CARGO_MANIFEST_DIR-unset}|$npm_config_update_notifier|$1\"\n\
             echo 'warning  ' >&2\n",
        )?;
        let mut perms = launcher.metadata()?.permissions();
        perms.set_mode(perms.mode() | 0o100);
        std::fs::set_permissions(launcher.path(), perms)?;

        let mut shell = ShellTarget::new("sh", ShellFamily::Posix, shell_path.as_path());
        shell.probe(&config);

        let dispatcher = Dispatcher::new(&config, dir.path());
        let result = dispatcher.invoke(&shell, "envdump", &[String::from("arg")])?;

        assert!(result.stdout.ends_with("unset|false|arg"), "{}", result.stdout);
        assert_eq!(result.stderr.lines().last(), Some("warning"));
        assert_eq!(result.code, Some(0));
        assert_eq!(result.signal, None);
        assert!(result.command.ends_with("-l envdump arg"));

        Ok(())
    }

    #[cfg(unix)]
    fn write_executable(dir: &assert_fs::TempDir, name: &str, body: &str) -> Result<PathBuf> {
        use assert_fs::prelude::*;
        use std::os::unix::fs::PermissionsExt;

        let file = dir.child(name);
        file.write_str(body)?;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        std::fs::set_permissions(file.path(), perms)?;

        Ok(file.path().to_owned())
    }

    #[cfg(unix)]
    fn available_sh(config: &HarnessConfig) -> Result<ShellTarget> {
        let mut shell = ShellTarget::new("sh", ShellFamily::Posix, which::which("sh")?);
        shell.probe(config);
        Ok(shell)
    }

    #[cfg(unix)]
    #[test]
    fn hung_noop_is_killed_at_timeout() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        let shell = write_executable(&dir, "hang", "#!/bin/sh\nsleep 30\n")?;

        let start = std::time::Instant::now();
        assert!(!run_noop(&shell, Duration::from_secs(1))?);
        assert!(start.elapsed() < Duration::from_secs(10), "{:?}", start.elapsed());

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn hung_invocation_is_killed_at_timeout() -> Result<()> {
        let config = test_config().with_timeout(Duration::from_secs(1));
        let dir = assert_fs::TempDir::new()?;
        let sleep = which::which("sleep")?;
        write_executable(&dir, "hang", &format!("{} 30\n", sleep.display()))?;

        let dispatcher = Dispatcher::new(&config, dir.path());
        let start = std::time::Instant::now();
        let result = dispatcher.invoke(&available_sh(&config)?, "hang", &[])?;

        assert!(start.elapsed() < Duration::from_secs(10), "{:?}", start.elapsed());
        assert_eq!(result.code, None);
        assert_eq!(result.signal, Some(9));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn background_children_do_not_hold_output_open() -> Result<()> {
        let config = test_config();
        let dir = assert_fs::TempDir::new()?;
        let sleep = which::which("sleep")?;
        write_executable(
            &dir,
            "detach",
            &format!("{} 30 &\necho started\n", sleep.display()),
        )?;

        let dispatcher = Dispatcher::new(&config, dir.path());
        let start = std::time::Instant::now();
        let result = dispatcher.invoke(&available_sh(&config)?, "detach", &[])?;

        assert!(start.elapsed() < Duration::from_secs(10), "{:?}", start.elapsed());
        assert!(result.stdout.ends_with("started"), "{}", result.stdout);
        assert_eq!(result.code, Some(0));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn noop_probe_reports_failure() -> Result<()> {
        assert!(run_noop(&which::which("sh")?, Duration::from_secs(15))?);
        assert!(!run_noop(&which::which("false")?, Duration::from_secs(15))?);
        Ok(())
    }
}
