//! Command tree routing: resolution, flag inheritance and flag groups.
//!
//! This crate models a CLI as a tree of commands and routes argument vectors
//! through it:
//!
//! - [`CommandTree`]: arena of [`Command`] nodes and their [`Flag`]s.
//! - [`CommandTree::find`] / [`CommandTree::traverse`]: map arguments to a
//!   target command, honouring aliases, prefixes and case folding as set in
//!   [`RouterConfig`].
//! - [`effective_flags`]: the local plus inherited flags a command sees.
//! - [`validate_flag_groups`]: required-together, mutually-exclusive,
//!   one-required and if-present-then-required constraints.
//! - [`CommandTree::execute`]: resolve, parse, validate and run.
//! - [`Completer`], [`Completion`] and [`ShellCompDirective`]: the pieces a
//!   completion engine builds on.
//! - [`TreeDefinition`]: YAML/JSON tree definitions, linted by
//!   [`validate_definition`].
//!
//! # Example
//!
//! ```
//! use command_router_core::*;
//!
//! let mut tree = CommandTree::new(
//!     Command::new("app").persistent_flag(Flag::bool("verbose").shorthand('v')),
//! )
//! .unwrap();
//! let root = tree.root();
//! let remote = tree.add_command(root, Command::new("remote")).unwrap();
//! let add = tree
//!     .add_command(
//!         remote,
//!         Command::new("add <name> <url>")
//!             .args(ArgsValidator::ExactN(2))
//!             .run(NoopAction),
//!     )
//!     .unwrap();
//!
//! let args = ["remote", "-v", "add", "origin", "git@host:repo"].map(String::from);
//! let invocation = tree.execute(&RouterConfig::default(), &args).unwrap();
//! assert_eq!(invocation.command, add);
//! assert_eq!(invocation.args, ["origin", "git@host:repo"]);
//! ```

mod args;
mod command;
mod completion;
mod config;
mod definition;
mod directive;
mod error;
mod execute;
mod flag;
mod flagset;
mod groups;
mod merge;
mod resolve;
mod tree;
mod validate;

pub use args::{ArgValidator, ArgsSpec, ArgsValidator};
pub use command::{BoxError, Command, CommandId, NoopAction, Runnable};
pub use completion::{
    ACTIVE_HELP_MARKER, Completer, Completion, CompletionRequest, StaticCompleter,
    no_file_completions,
};
pub use config::RouterConfig;
pub use definition::{CommandDef, FlagDef, GroupDef, TreeDefinition};
pub use directive::ShellCompDirective;
pub use error::{Result, RouterError};
pub use execute::{Invocation, RunContext, validate_required_flags};
pub use flag::{
    ANNOTATION_CUSTOM, ANNOTATION_FILENAME_EXT, ANNOTATION_REQUIRED, ANNOTATION_SUBDIRS_IN_DIR,
    Flag, FlagId, FlagKind, FlagValue,
};
pub use flagset::{FlagSet, ParsedArgs, is_flag_arg};
pub use groups::{
    ANNOTATION_IF_PRESENT_THEN_REQUIRED, ANNOTATION_MUTUALLY_EXCLUSIVE, ANNOTATION_ONE_REQUIRED,
    ANNOTATION_REQUIRED_TOGETHER, FlagGroup, GroupHints, GroupKind, completion_hints,
    validate_flag_groups,
};
pub use merge::{effective_flags, inherited_flags, local_non_persistent_flags, non_inherited_flags};
pub use resolve::{Resolution, suggestions};
pub use tree::CommandTree;
pub use validate::{ValidationError, validate_definition};
