//! Error types for script generation.

use thiserror::Error;

/// Errors that can occur while rendering a completion script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The root command's name cannot be embedded in a shell script.
    #[error("program name {0:?} cannot be used in a completion script")]
    InvalidProgramName(String),

    /// A shell name that no generator answers to.
    #[error("unknown shell: {0}. Supported: bash, bash-v1, zsh, fish, powershell")]
    UnknownShell(String),

    /// Writing the script failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience alias for results with [`ScriptError`].
pub type Result<T> = std::result::Result<T, ScriptError>;
