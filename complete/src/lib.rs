//! Shell completion for command-router trees.
//!
//! [`Dispatcher`] computes candidates and a [`ShellCompDirective`] for a
//! partial command line; [`serve`] wraps it in the `__complete` protocol
//! that generated shell scripts speak. Active Help hints are filtered
//! according to [`ActiveHelpConfig`].

mod active_help;
mod dispatch;
mod error;
mod protocol;

pub use active_help::{ActiveHelpConfig, DISABLED, GLOBAL_ENV_VAR, active_help_env_var};
pub use dispatch::{CompletionOutcome, Dispatcher};
pub use error::{CompletionError, Result};
pub use protocol::{
    COMPLETE_CMD, COMPLETE_NO_DESC_CMD, is_completion_request, serve, write_response,
};

pub use command_router_core::{
    ACTIVE_HELP_MARKER, Completer, Completion, CompletionRequest, ShellCompDirective,
    StaticCompleter, no_file_completions,
};
