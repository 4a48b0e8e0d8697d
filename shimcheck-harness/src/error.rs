//! Error types for the harness.

use std::path::PathBuf;

/// Errors the harness can name precisely.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An executable could not be mapped onto any supported shell family.
    #[error("unknown shell: {0}")]
    UnknownShell(String),

    /// A `NAME=PATH` shell specification was malformed.
    #[error("invalid shell specification '{0}'; expected NAME=PATH")]
    InvalidShellSpec(String),

    /// A dispatch was attempted through a shell that was never found available.
    #[error("shell '{0}' is not available for dispatch")]
    ShellUnavailable(String),

    /// A launcher script expected in the shims directory is missing.
    #[error("launcher script not found: {0}")]
    MissingShim(PathBuf),

    /// The runtime executable the shims launch could not be located.
    #[error("runtime not found: {0}")]
    RuntimeNotFound(String),

    /// The package manifest could not be read or parsed.
    #[error("invalid package manifest {0}: {1}")]
    InvalidManifest(PathBuf, String),

    /// An anchor pattern could not be compiled.
    #[error("invalid anchor pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
