//! Error types for completion dispatch.
//!
//! These reach programmatic callers of the dispatcher only. The protocol
//! writer never shows them to a shell.

use thiserror::Error;

use command_router_core::RouterError;

/// Errors that can occur while computing completions.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The words before the cursor could not be routed or parsed.
    #[error("unable to route completion arguments: {0}")]
    Router(#[from] RouterError),

    /// The flag whose value is being completed is unknown to the command.
    #[error("subcommand '{command}' does not support flag '{flag}'")]
    UnknownFlag { command: String, flag: String },
}

/// Convenience alias for results with [`CompletionError`].
pub type Result<T> = std::result::Result<T, CompletionError>;
