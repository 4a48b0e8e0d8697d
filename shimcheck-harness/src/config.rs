//! Configuration types for the harness.

use crate::error::Error;
use clap::Parser;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for every subprocess the harness spawns, in seconds.
pub const DEFAULT_TIMEOUT_IN_SECONDS: u64 = 15;

/// The two CLI aliases whose launchers are verified together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasPair {
    /// The full-featured command (e.g., `npm`).
    pub primary: String,
    /// The convenience command sharing the same installation (e.g., `npx`).
    pub secondary: String,
}

impl AliasPair {
    /// Creates a new alias pair.
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// Returns the uppercased letters that tell the two alias names apart.
    ///
    /// This is the first position at which the names differ; names that share no
    /// differing position fall back to their initials.
    pub fn distinguishing_letters(&self) -> BTreeSet<char> {
        let differing = self
            .primary
            .chars()
            .zip(self.secondary.chars())
            .find(|(p, s)| p != s);

        let (p, s) = differing.unwrap_or_else(|| {
            (
                self.primary.chars().next().unwrap_or_default(),
                self.secondary.chars().next().unwrap_or_default(),
            )
        });

        [p, s].iter().flat_map(|c| c.to_uppercase()).collect()
    }

    /// Name of the alias-specific variable whose assignment the secondary launcher adds.
    pub fn anchor_variable(&self) -> String {
        format!("{}_CLI_JS", self.secondary.to_uppercase().replace('-', "_"))
    }

    /// Name of the environment variable that disables update checks.
    pub fn update_check_variable(&self) -> String {
        format!("{}_config_update_notifier", self.primary)
    }

    /// File name of the entry point a given alias launches.
    pub fn entry_point(alias: &str) -> String {
        format!("{alias}-cli.js")
    }
}

impl Default for AliasPair {
    fn default() -> Self {
        Self::new("npm", "npx")
    }
}

/// The language spoken by the runtime the shims launch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RuntimeKind {
    /// A Node.js runtime; synthetic entry points are written in JavaScript.
    #[default]
    Node,
    /// A POSIX `sh` compatible runtime; synthetic entry points are shell scripts.
    Shell,
}

/// The runtime executable that is planted next to the shims.
#[derive(Clone, Debug)]
pub struct Runtime {
    /// Path to the runtime executable on the host.
    pub path: PathBuf,
    /// What kind of runtime this is.
    pub kind: RuntimeKind,
}

impl Runtime {
    /// Base name the runtime is installed under inside fixtures.
    pub const INSTALLED_NAME: &'static str = "node";

    /// Resolves the runtime, searching the host for `node` when no path is given.
    pub fn resolve(path: Option<&Path>, kind: RuntimeKind) -> Result<Self, Error> {
        let path = match path {
            Some(path) if path.is_file() => path.to_owned(),
            Some(path) => return Err(Error::RuntimeNotFound(path.to_string_lossy().to_string())),
            None => which::which(Self::INSTALLED_NAME)
                .map_err(|_| Error::RuntimeNotFound(Self::INSTALLED_NAME.to_owned()))?,
        };

        Ok(Self { path, kind })
    }
}

#[derive(serde::Deserialize)]
struct PackageManifest {
    version: String,
}

/// The installed package the shims must resolve to.
#[derive(Clone, Debug)]
pub struct PackageUnderTest {
    /// Root directory of the package.
    pub root: PathBuf,
    /// Version string declared by the package manifest.
    pub version: String,
}

impl PackageUnderTest {
    /// Name of the manifest file holding the version string.
    pub const MANIFEST_FILE_NAME: &'static str = "package.json";

    /// Loads the package rooted at the given directory.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let manifest_path = root.join(Self::MANIFEST_FILE_NAME);
        let contents = std::fs::read_to_string(&manifest_path)
            .map_err(|e| Error::InvalidManifest(manifest_path.clone(), e.to_string()))?;
        let manifest: PackageManifest = serde_json::from_str(&contents)
            .map_err(|e| Error::InvalidManifest(manifest_path.clone(), e.to_string()))?;

        Ok(Self {
            root: canonical_root(root)?,
            version: manifest.version,
        })
    }
}

// Shims report the physical install root, so symlinks in the given path are resolved.
#[cfg(not(windows))]
fn canonical_root(root: &Path) -> Result<PathBuf, Error> {
    Ok(std::fs::canonicalize(root)?)
}

// Canonical paths on Windows carry a verbatim prefix the shims never print.
#[cfg(windows)]
fn canonical_root(root: &Path) -> Result<PathBuf, Error> {
    Ok(std::path::absolute(root)?)
}

/// Host locations consulted when looking for candidate shells.
#[derive(Clone, Debug)]
pub struct HostEnvironment {
    /// The Windows "Program Files" directory.
    pub program_files: String,
    /// The Windows system root directory.
    pub system_root: String,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            program_files: String::from(r"C:\Program Files"),
            system_root: String::from(r"C:\Windows"),
        }
    }
}

/// Configuration for a harness run, assembled once at startup.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// The aliases under verification.
    pub aliases: AliasPair,
    /// Directory name of the installed package inside `node_modules`.
    pub package_name: String,
    /// Directory holding the launcher scripts.
    pub shims_dir: PathBuf,
    /// The package the shims must resolve to.
    pub package: PackageUnderTest,
    /// The runtime planted next to the shims.
    pub runtime: Runtime,
    /// Host locations used to find candidate shells.
    pub host: HostEnvironment,
    /// Whether an unavailable shell counts as a failure.
    pub strict: bool,
    /// Whether code-coverage instrumentation is active.
    pub coverage_active: bool,
    /// Upper bound on the duration of each subprocess.
    pub timeout: Duration,
    /// Additional shell targets, as `(name, executable)` pairs.
    pub extra_shells: Vec<(String, PathBuf)>,
}

impl HarnessConfig {
    /// Creates a new config with default values.
    pub fn new(shims_dir: PathBuf, package: PackageUnderTest, runtime: Runtime) -> Self {
        let aliases = AliasPair::default();
        Self {
            package_name: aliases.primary.clone(),
            aliases,
            shims_dir,
            package,
            runtime,
            host: HostEnvironment::default(),
            strict: false,
            coverage_active: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_IN_SECONDS),
            extra_shells: vec![],
        }
    }

    /// Assembles the config from parsed options.
    pub fn from_options(options: &HarnessOptions) -> Result<Self, Error> {
        let package = PackageUnderTest::load(&options.package_root)?;
        let runtime = Runtime::resolve(options.runtime.as_deref(), options.runtime_kind)?;

        let extra_shells = options
            .extra_shells
            .iter()
            .map(|spec| parse_shell_spec(spec))
            .collect::<Result<Vec<_>, _>>()?;

        let aliases = AliasPair::new(&options.primary_alias, &options.secondary_alias);

        Ok(Self {
            package_name: options
                .package_name
                .clone()
                .unwrap_or_else(|| aliases.primary.clone()),
            aliases,
            shims_dir: options.shims_dir.clone(),
            package,
            runtime,
            host: HostEnvironment {
                program_files: options.program_files.clone(),
                system_root: options.system_root.clone(),
            },
            strict: options.strict,
            coverage_active: options.coverage,
            timeout: Duration::from_secs(options.timeout_in_seconds),
            extra_shells,
        })
    }

    /// Sets the aliases under verification; the package name follows the primary alias.
    #[must_use]
    pub fn with_aliases(mut self, aliases: AliasPair) -> Self {
        self.package_name.clone_from(&aliases.primary);
        self.aliases = aliases;
        self
    }

    /// Sets whether unavailable shells are treated as failures.
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets whether code-coverage instrumentation is active.
    #[must_use]
    pub const fn with_coverage_active(mut self, coverage_active: bool) -> Self {
        self.coverage_active = coverage_active;
        self
    }

    /// Sets the subprocess timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the host locations used to find candidate shells.
    #[must_use]
    pub fn with_host(mut self, host: HostEnvironment) -> Self {
        self.host = host;
        self
    }

    /// Adds an extra shell target.
    #[must_use]
    pub fn with_extra_shell(mut self, name: impl Into<String>, executable: PathBuf) -> Self {
        self.extra_shells.push((name.into(), executable));
        self
    }
}

fn parse_shell_spec(spec: &str) -> Result<(String, PathBuf), Error> {
    match spec.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_owned(), PathBuf::from(path)))
        }
        _ => Err(Error::InvalidShellSpec(spec.to_owned())),
    }
}

/// Output format for results.
#[derive(Clone, Copy, Default, clap::ValueEnum, Debug)]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// `JUnit` XML format.
    Junit,
    /// Minimal output.
    Terse,
}

/// Command-line options for the harness.
#[derive(Clone, Parser, Debug)]
#[clap(version, about)]
pub struct HarnessOptions {
    /// Output format for results.
    #[clap(long = "format", default_value = "pretty")]
    pub format: OutputFormat,

    /// Display details regarding successful checks.
    #[clap(short = 'v', long = "verbose", env = "SHIMCHECK_VERBOSE")]
    pub verbose: bool,

    /// List the selected shell targets without running anything.
    #[clap(long = "list")]
    pub list_shells_only: bool,

    /// Exactly match filters (not just substring match).
    #[clap(long = "exact")]
    pub exact_match: bool,

    /// Directory containing the launcher scripts.
    #[clap(long = "shims-dir", default_value = "shims", env = "SHIMCHECK_SHIMS_DIR")]
    pub shims_dir: PathBuf,

    /// Root of the package the launchers must resolve to.
    #[clap(long = "package-root", default_value = ".", env = "SHIMCHECK_PACKAGE_ROOT")]
    pub package_root: PathBuf,

    /// Runtime executable the launchers exec; defaults to `node` on the search path.
    #[clap(long = "runtime", env = "SHIMCHECK_RUNTIME")]
    pub runtime: Option<PathBuf>,

    /// Language of the runtime, used for synthetic entry points.
    #[clap(long = "runtime-kind", default_value = "node")]
    pub runtime_kind: RuntimeKind,

    /// Name of the primary alias.
    #[clap(long = "primary-alias", default_value = "npm")]
    pub primary_alias: String,

    /// Name of the secondary alias.
    #[clap(long = "secondary-alias", default_value = "npx")]
    pub secondary_alias: String,

    /// Directory name of the installed package; defaults to the primary alias.
    #[clap(long = "package-name")]
    pub package_name: Option<String>,

    /// Treat shells that are not installed as failures.
    #[clap(
        long = "strict",
        env = "SHIMCHECK_STRICT",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub strict: bool,

    /// Code-coverage instrumentation is active.
    #[clap(
        long = "coverage",
        env = "CARGO_LLVM_COV",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub coverage: bool,

    /// The Windows "Program Files" directory.
    #[clap(long = "program-files", default_value = r"C:\Program Files", env = "ProgramFiles")]
    pub program_files: String,

    /// The Windows system root directory.
    #[clap(long = "system-root", default_value = r"C:\Windows", env = "SystemRoot")]
    pub system_root: String,

    /// Timeout for each subprocess, in seconds.
    #[clap(long = "timeout", default_value_t = DEFAULT_TIMEOUT_IN_SECONDS)]
    pub timeout_in_seconds: u64,

    /// Additional shell target, given as NAME=PATH.
    #[clap(long = "shell")]
    pub extra_shells: Vec<String>,

    /// Patterns for shell targets to be excluded.
    #[clap(long = "skip")]
    pub exclude_filters: Vec<String>,

    /// Patterns for shell targets to be included.
    pub include_filters: Vec<String>,
}

impl HarnessOptions {
    /// Returns whether the named shell target should run based on include/exclude filters.
    pub fn should_run_shell(&self, name: &str) -> bool {
        if self.include_filters.is_empty() && self.exclude_filters.is_empty() {
            return true;
        }

        // If any include filters were given, then we are in opt-in mode.
        if !self.include_filters.is_empty() && !self.matches_filters(name, &self.include_filters)
        {
            return false;
        }

        // In all cases, exclude filters may be used to exclude shells.
        if !self.exclude_filters.is_empty() && self.matches_filters(name, &self.exclude_filters) {
            return false;
        }

        true
    }

    fn matches_filters(&self, name: &str, filters: &[String]) -> bool {
        if self.exact_match {
            filters.iter().any(|f| f == name)
        } else {
            filters.iter().any(|filter| name.contains(filter))
        }
    }
}
