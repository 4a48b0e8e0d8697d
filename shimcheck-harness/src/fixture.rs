//! Assembly of isolated fixture directories for dispatch.

use crate::config::{AliasPair, HarnessConfig, Runtime, RuntimeKind};
use crate::script::ShimSet;
use anyhow::{Context, Result};
use assert_fs::fixture::{FileWriteStr, PathChild};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Name of the directory standing in for the configured global installation root.
pub const GLOBAL_PREFIX_DIR_NAME: &str = "global-prefix";

/// A temporary directory holding the launchers, a runtime and a fake package tree.
///
/// Layout:
///
/// ```text
/// <dir>/<launchers>                                 copies of every launcher script
/// <dir>/node.exe                                    copy of the runtime
/// <dir>/node_modules/<pkg>/bin/<alias>-cli.js       bundled copy that must not be used
/// <dir>/global-prefix/node_modules/<pkg>            link to the package under test
/// ```
///
/// The directory is removed when the fixture is dropped.
pub struct Fixture {
    dir: assert_fs::TempDir,
    global_prefix: PathBuf,
}

impl Fixture {
    /// Assembles a fresh fixture.
    pub fn assemble(config: &HarnessConfig, shims: &ShimSet) -> Result<Self> {
        let dir = assert_fs::TempDir::new()?;

        for script in shims.iter() {
            let file_name = script.path.file_name().ok_or_else(|| {
                anyhow::anyhow!("launcher {} has no file name", script.path.display())
            })?;
            let child = dir.child(file_name);
            child.write_str(&script.contents)?;
            make_executable(child.path())?;
        }

        let runtime_path = dir.child(format!("{}.exe", Runtime::INSTALLED_NAME));
        std::fs::copy(&config.runtime.path, runtime_path.path()).with_context(|| {
            format!("copying runtime {}", config.runtime.path.display())
        })?;

        let global_prefix = dir.path().join(GLOBAL_PREFIX_DIR_NAME);
        let linked_package = global_prefix.join("node_modules").join(&config.package_name);
        std::fs::create_dir_all(global_prefix.join("node_modules"))?;
        link_dir(&config.package.root, &linked_package).with_context(|| {
            format!(
                "linking {} to {}",
                linked_package.display(),
                config.package.root.display()
            )
        })?;

        let fixture = Self { dir, global_prefix };
        fixture.write_bundled_entry_points(config)?;

        tracing::debug!("assembled fixture in {}", fixture.path().display());

        Ok(fixture)
    }

    /// Root of the fixture.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The directory the bundled copy reports as the global installation root.
    pub fn global_prefix(&self) -> &Path {
        &self.global_prefix
    }

    /// Directory holding the bundled copy's entry points.
    pub fn bundled_bin_dir(&self, package_name: &str) -> PathBuf {
        self.path().join("node_modules").join(package_name).join("bin")
    }

    fn write_bundled_entry_points(&self, config: &HarnessConfig) -> Result<()> {
        let bin_dir = self.bundled_bin_dir(&config.package_name);
        std::fs::create_dir_all(&bin_dir)?;

        let prefix = self.global_prefix.to_string_lossy();
        let aliases = &config.aliases;

        let (primary, secondary) = match config.runtime.kind {
            RuntimeKind::Node => (
                node_prefix_entry_point(&aliases.primary, &prefix)?,
                node_failing_entry_point(&aliases.secondary),
            ),
            RuntimeKind::Shell => (
                shell_prefix_entry_point(&aliases.primary, &prefix),
                shell_failing_entry_point(&aliases.secondary),
            ),
        };

        std::fs::write(bin_dir.join(AliasPair::entry_point(&aliases.primary)), primary)?;
        std::fs::write(bin_dir.join(AliasPair::entry_point(&aliases.secondary)), secondary)?;

        Ok(())
    }
}

// The bundled primary entry point only answers the global prefix query.
fn node_prefix_entry_point(alias: &str, prefix: &str) -> Result<String> {
    let prefix = serde_json::to_string(prefix)?;
    Ok(format!(
        "const args = process.argv.slice(2);\n\
         if (args[0] === 'prefix' && args[1] === '-g') {{\n  \
           console.log({prefix});\n\
         }} else {{\n  \
           console.error('bundled {alias} must not handle: ' + args.join(' '));\n  \
           process.exit(1);\n\
         }}\n"
    ))
}

fn node_failing_entry_point(alias: &str) -> String {
    format!("console.error('bundled {alias} must not be invoked');\nprocess.exit(1);\n")
}

fn shell_prefix_entry_point(alias: &str, prefix: &str) -> String {
    let prefix = sh_quote(prefix);
    format!(
        "if [ \"$1\" = prefix ] && [ \"$2\" = -g ]; then\n  \
           echo {prefix}\n  \
           exit 0\n\
         fi\n\
         echo \"bundled {alias} must not handle: $*\" >&2\n\
         exit 1\n"
    )
}

fn shell_failing_entry_point(alias: &str) -> String {
    format!("echo 'bundled {alias} must not be invoked' >&2\nexit 1\n")
}

fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    // chmod a+x
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}
