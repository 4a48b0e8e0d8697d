//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use assert_fs::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Version reported by the synthetic package.
pub const VERSION: &str = "7.7.7";

/// Directory holding the launchers under verification.
pub fn shims_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("shims")
}

/// Runtime used in place of Node: the host's POSIX shell.
pub fn runtime() -> PathBuf {
    PathBuf::from("/bin/sh")
}

/// Writes a package whose entry points are shell scripts run by [`runtime`].
///
/// `help` on the primary entry point reports the physical package root, so a launcher
/// that resolves through the global prefix link reports the canonical root.
pub fn write_package(dir: &assert_fs::TempDir, version: &str) -> Result<()> {
    dir.child("package.json")
        .write_str(&format!(r#"{{ "name": "npm", "version": "{version}" }}"#))?;

    dir.child("bin/npm-cli.js").write_str(&format!(
        "if [ \"$1\" = help ]; then\n  \
           root=$(cd \"${{0%/*}}/..\" && pwd -P)\n  \
           echo \"npm@{version} $root\"\n  \
           exit 0\n\
         fi\n\
         echo \"unexpected arguments: $*\" >&2\n\
         exit 1\n"
    ))?;

    dir.child("bin/npx-cli.js").write_str(&format!(
        "if [ \"$1\" = --version ]; then\n  \
           echo {version}\n  \
           exit 0\n\
         fi\n\
         echo \"unexpected arguments: $*\" >&2\n\
         exit 1\n"
    ))?;

    Ok(())
}

/// Writes an executable named `bash` that runs its script with the host's POSIX shell,
/// without sourcing any login profile.
pub fn write_posix_shell(dir: &assert_fs::TempDir) -> Result<PathBuf> {
    let shell = dir.child("bash");
    shell.write_str("#!/bin/sh\n[ \"$1\" = -l ] && shift\nexec /bin/sh \"$@\"\n")?;

    let mut perms = shell.metadata()?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(shell.path(), perms)?;

    Ok(shell.path().to_owned())
}
