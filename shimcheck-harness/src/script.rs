//! Launcher scripts and the shell families they target.

use crate::config::AliasPair;
use crate::error::Error;
use std::path::{Path, PathBuf};

/// A class of command interpreters sharing one invocation syntax.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShellFamily {
    /// POSIX-compatible shells (bash and friends).
    Posix,
    /// The Windows command interpreter.
    Cmd,
    /// PowerShell.
    PowerShell,
}

impl ShellFamily {
    /// All families, in the order their launcher pairs are checked.
    pub const ALL: [Self; 3] = [Self::Posix, Self::Cmd, Self::PowerShell];

    /// File extension of launcher scripts for this family, including the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Posix => "",
            Self::Cmd => ".cmd",
            Self::PowerShell => ".ps1",
        }
    }

    /// Short display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Posix => "posix",
            Self::Cmd => "cmd",
            Self::PowerShell => "powershell",
        }
    }

    /// Infers the family of a shell from its executable's file name.
    pub fn from_executable(path: &Path) -> Result<Self, Error> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match file_name.as_str() {
            "cmd" | "cmd.exe" => Ok(Self::Cmd),
            "pwsh" | "pwsh.exe" | "powershell" | "powershell.exe" => Ok(Self::PowerShell),
            "bash" | "bash.exe" | "sh" | "sh.exe" => Ok(Self::Posix),
            _ => Err(Error::UnknownShell(path.to_string_lossy().to_string())),
        }
    }
}

impl std::fmt::Display for ShellFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which of the two aliases a launcher belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AliasRole {
    /// The full-featured command.
    Primary,
    /// The convenience command.
    Secondary,
}

impl AliasRole {
    /// Both roles, primary first.
    pub const ALL: [Self; 2] = [Self::Primary, Self::Secondary];

    /// Resolves the alias name for this role.
    pub fn alias(self, aliases: &AliasPair) -> &str {
        match self {
            Self::Primary => aliases.primary.as_str(),
            Self::Secondary => aliases.secondary.as_str(),
        }
    }

    /// Arguments the alias is invoked with during dispatch.
    ///
    /// The primary alias prints deterministic diagnostic help; the secondary alias is
    /// only asked for its version, since a bare invocation may prompt or install.
    pub fn dispatch_args(self) -> Vec<String> {
        match self {
            Self::Primary => vec![String::from("help")],
            Self::Secondary => vec![String::from("--version")],
        }
    }
}

/// A launcher script loaded from disk.
#[derive(Clone, Debug)]
pub struct LauncherScript {
    /// The alias this script launches.
    pub alias: String,
    /// The role of that alias.
    pub role: AliasRole,
    /// Shell family the script is written for.
    pub family: ShellFamily,
    /// Where the script was read from.
    pub path: PathBuf,
    /// Raw script text.
    pub contents: String,
}

impl LauncherScript {
    /// File name of the launcher for an alias in a family.
    pub fn file_name(alias: &str, family: ShellFamily) -> String {
        format!("{alias}{}", family.extension())
    }

    fn load(
        dir: &Path,
        aliases: &AliasPair,
        role: AliasRole,
        family: ShellFamily,
    ) -> Result<Self, Error> {
        let alias = role.alias(aliases).to_owned();
        let path = dir.join(Self::file_name(&alias, family));

        if !path.is_file() {
            return Err(Error::MissingShim(path));
        }

        let contents = std::fs::read_to_string(&path)?;

        Ok(Self {
            alias,
            role,
            family,
            path,
            contents,
        })
    }
}

/// Every launcher script for an alias pair, loaded once per run.
#[derive(Clone, Debug)]
pub struct ShimSet {
    scripts: Vec<LauncherScript>,
}

impl ShimSet {
    /// Loads one launcher per alias and family from the given directory.
    pub fn load(dir: &Path, aliases: &AliasPair) -> Result<Self, Error> {
        let mut scripts = vec![];
        for family in ShellFamily::ALL {
            for role in AliasRole::ALL {
                scripts.push(LauncherScript::load(dir, aliases, role, family)?);
            }
        }

        tracing::debug!(
            "loaded {} launcher scripts from {}",
            scripts.len(),
            dir.display()
        );

        Ok(Self { scripts })
    }

    /// Iterates over every loaded script.
    pub fn iter(&self) -> impl Iterator<Item = &LauncherScript> {
        self.scripts.iter()
    }

    /// Returns the (primary, secondary) launchers of a family.
    pub fn pair(&self, family: ShellFamily) -> Option<(&LauncherScript, &LauncherScript)> {
        let find = |role| {
            self.scripts
                .iter()
                .find(|s| s.family == family && s.role == role)
        };

        Some((find(AliasRole::Primary)?, find(AliasRole::Secondary)?))
    }
}
