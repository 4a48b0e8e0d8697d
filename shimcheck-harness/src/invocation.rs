//! Construction of family-specific shell invocations.

use crate::script::{LauncherScript, ShellFamily};
use std::path::{Path, PathBuf};

/// A fully constructed command line for launching an alias through a shell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Whether the command line is handed to the system shell instead of being
    /// executed directly.
    pub through_system_shell: bool,
}

impl Invocation {
    /// Renders the invocation as a single command line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Creates a process command for this invocation.
    pub fn to_command(&self) -> std::process::Command {
        if self.through_system_shell {
            system_shell_command(&self.command_line())
        } else {
            let mut cmd = std::process::Command::new(&self.program);
            cmd.args(&self.args);
            cmd
        }
    }
}

#[cfg(windows)]
fn system_shell_command(command_line: &str) -> std::process::Command {
    use std::os::windows::process::CommandExt;

    let mut cmd = std::process::Command::new("cmd.exe");
    cmd.args(["/d", "/s", "/c"]).raw_arg(format!("\"{command_line}\""));
    cmd
}

#[cfg(not(windows))]
fn system_shell_command(command_line: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("/bin/sh");
    cmd.arg("-c").arg(command_line);
    cmd
}

/// Builds the invocation of an alias for one shell family.
pub trait InvocationStyle {
    /// Builds the invocation of `alias` with `argv` through `shell`, with the launchers
    /// installed in `fixture_dir`.
    fn build(&self, shell: &Path, fixture_dir: &Path, alias: &str, argv: &[String]) -> Invocation;
}

/// The Windows command interpreter runs the `.cmd` launcher directly.
pub struct CmdStyle;

impl InvocationStyle for CmdStyle {
    fn build(&self, _shell: &Path, fixture_dir: &Path, alias: &str, argv: &[String]) -> Invocation {
        let launcher = launcher_path(fixture_dir, alias, ShellFamily::Cmd);
        Invocation {
            program: launcher.to_string_lossy().to_string(),
            args: argv.to_vec(),
            through_system_shell: false,
        }
    }
}

/// PowerShell is started by the system shell with the `.ps1` launcher as its script.
pub struct PowerShellStyle;

impl InvocationStyle for PowerShellStyle {
    fn build(&self, shell: &Path, _fixture_dir: &Path, alias: &str, argv: &[String]) -> Invocation {
        let mut args = vec![LauncherScript::file_name(alias, ShellFamily::PowerShell)];
        args.extend(argv.iter().cloned());

        Invocation {
            program: quote_path_segments(shell),
            args,
            through_system_shell: true,
        }
    }
}

/// POSIX shells run the extensionless launcher as a login shell.
pub struct PosixStyle;

impl InvocationStyle for PosixStyle {
    fn build(&self, shell: &Path, _fixture_dir: &Path, alias: &str, argv: &[String]) -> Invocation {
        let mut args = vec![
            String::from("-l"),
            LauncherScript::file_name(alias, ShellFamily::Posix),
        ];
        args.extend(argv.iter().cloned());

        Invocation {
            program: shell.to_string_lossy().to_string(),
            args,
            through_system_shell: false,
        }
    }
}

impl ShellFamily {
    /// Returns the invocation style for this family.
    pub fn style(self) -> &'static dyn InvocationStyle {
        match self {
            Self::Posix => &PosixStyle,
            Self::Cmd => &CmdStyle,
            Self::PowerShell => &PowerShellStyle,
        }
    }
}

/// Quotes each segment of a path that contains a space.
///
/// Only spaces are considered; other characters meaningful to a shell pass through.
pub fn quote_path_segments(path: &Path) -> String {
    path.to_string_lossy()
        .split(std::path::MAIN_SEPARATOR)
        .map(|segment| {
            if segment.contains(' ') {
                format!("\"{segment}\"")
            } else {
                segment.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(std::path::MAIN_SEPARATOR_STR)
}

/// Path of the launcher script an invocation of `alias` executes.
pub fn launcher_path(fixture_dir: &Path, alias: &str, family: ShellFamily) -> PathBuf {
    fixture_dir.join(LauncherScript::file_name(alias, family))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn cmd_runs_sibling_launcher() {
        let fixture = Path::new("fixture");
        let invocation = CmdStyle.build(Path::new("cmd"), fixture, "npx", &argv(&["--version"]));
        assert_eq!(
            invocation,
            Invocation {
                program: launcher_path(fixture, "npx", ShellFamily::Cmd)
                    .to_string_lossy()
                    .to_string(),
                args: argv(&["--version"]),
                through_system_shell: false,
            }
        );
    }

    #[test]
    fn powershell_prepends_script_and_uses_system_shell() {
        let invocation = ShellFamily::PowerShell.style().build(
            Path::new("pwsh"),
            Path::new("fixture"),
            "npm",
            &argv(&["help"]),
        );
        assert_eq!(invocation.program, "pwsh");
        assert_eq!(invocation.args, argv(&["npm.ps1", "help"]));
        assert!(invocation.through_system_shell);
        assert_eq!(invocation.command_line(), "pwsh npm.ps1 help");
    }

    #[test]
    fn posix_uses_login_flag() {
        let invocation = ShellFamily::Posix.style().build(
            Path::new("bash"),
            Path::new("fixture"),
            "npx",
            &argv(&["--version"]),
        );
        assert_eq!(invocation.program, "bash");
        assert_eq!(invocation.args, argv(&["-l", "npx", "--version"]));
        assert!(!invocation.through_system_shell);
    }

    #[test]
    fn only_segments_with_spaces_are_quoted() {
        let sep = std::path::MAIN_SEPARATOR_STR;
        let path = ["", "opt", "Power Shell", "7", "pwsh"].join(sep);
        let expected = ["", "opt", "\"Power Shell\"", "7", "pwsh"].join(sep);
        assert_eq!(quote_path_segments(Path::new(&path)), expected);

        let path = ["", "opt", "a&b", "pwsh"].join(sep);
        assert_eq!(quote_path_segments(Path::new(&path)), path);
    }
}
