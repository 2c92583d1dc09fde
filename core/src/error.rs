//! Error types for tree construction, resolution and validation.
//!
//! A single error type covers every failure the router can report, from
//! setup-time mistakes (cycles, duplicate flags) to invocation-time problems
//! (unknown commands, bad flag values, violated flag groups).

use thiserror::Error;

use crate::groups::GroupKind;

/// Errors produced while building or routing through a command tree.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No child matched and the command does not accept extra arguments.
    #[error("unknown command {name:?} for {command_path:?}{}", format_suggestions(.suggestions))]
    UnknownCommand {
        name: String,
        command_path: String,
        suggestions: Vec<String>,
    },

    /// A prefix matched two or more distinct children.
    #[error("ambiguous command {token:?} for {command_path:?}, could be: {}", .candidates.join(", "))]
    AmbiguousCommand {
        token: String,
        command_path: String,
        candidates: Vec<String>,
    },

    /// A `--long` flag that no visible flag set defines.
    #[error("unknown flag: --{0}")]
    UnknownFlag(String),

    /// A `-x` shorthand that no visible flag set defines.
    #[error("unknown shorthand flag: {shorthand:?} in {token}")]
    UnknownShorthand { shorthand: char, token: String },

    /// A value-taking flag appeared last without a value.
    #[error("flag needs an argument: {0}")]
    MissingFlagValue(String),

    /// The flag's value slot rejected the supplied text.
    #[error("invalid argument {value:?} for {flag:?} flag: {reason}")]
    InvalidFlagValue {
        flag: String,
        value: String,
        reason: String,
    },

    /// Malformed flag token such as `---x` or `--=x`.
    #[error("bad flag syntax: {0}")]
    BadFlagSyntax(String),

    /// A positional argument outside the command's valid-args list.
    #[error("invalid argument {arg:?} for {command_path:?}{}", format_suggestions(.suggestions))]
    InvalidArgument {
        arg: String,
        command_path: String,
        suggestions: Vec<String>,
    },

    #[error("requires at least {min} arg(s), only received {actual}")]
    TooFewArgs { min: usize, actual: usize },

    #[error("accepts at most {max} arg(s), received {actual}")]
    TooManyArgs { max: usize, actual: usize },

    #[error("accepts {expected} arg(s), received {actual}")]
    WrongArgCount { expected: usize, actual: usize },

    #[error("accepts between {min} and {max} arg(s), received {actual}")]
    ArgCountOutOfRange {
        min: usize,
        max: usize,
        actual: usize,
    },

    /// A custom [`ArgValidator`](crate::ArgValidator) rejected the arguments.
    #[error("{0}")]
    ArgsRejected(String),

    /// Flags carrying the required marker were not supplied.
    #[error("required flag(s) \"{}\" not set", .0.join("\", \""))]
    RequiredFlagsMissing(Vec<String>),

    /// A registered flag group constraint was violated.
    #[error("{}", describe_group_violation(.kind, .group, .flags))]
    FlagGroup {
        kind: GroupKind,
        group: Vec<String>,
        /// Missing members for "together"/"dependent" groups, offending
        /// members for exclusive groups, empty for one-required groups.
        flags: Vec<String>,
    },

    /// The resolved command has no runnable action.
    #[error("{0:?} is not runnable; a subcommand is required")]
    NotRunnable(String),

    /// The command's action returned an error.
    #[error("{command_path}: {source}")]
    Run {
        command_path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A command cannot be added as its own child.
    #[error("command {0:?} cannot be a child of itself")]
    SelfParent(String),

    /// The command is already attached to a parent.
    #[error("command {0:?} already has a parent")]
    AlreadyParented(String),

    /// Attaching would make a command its own ancestor.
    #[error("adding {child:?} under {parent:?} would create a cycle")]
    CycleDetected { parent: String, child: String },

    /// Two flags on one command share a name or shorthand.
    #[error("flag {flag:?} redefined on command {command:?}")]
    DuplicateFlag { command: String, flag: String },

    /// A completer was already registered for the flag.
    #[error("flag {0:?} already has a completion function")]
    DuplicateCompleter(String),

    /// An annotation or group named a flag the command cannot see.
    #[error("command {command:?} has no flag named {flag:?}")]
    NoSuchFlag { command: String, flag: String },

    /// A tree definition file is structurally invalid.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// File I/O failure while loading definitions or configuration.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Convenience alias for results with [`RouterError`].
pub type Result<T> = std::result::Result<T, RouterError>;

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\nDid you mean this?\n");
    for suggestion in suggestions {
        out.push('\t');
        out.push_str(suggestion);
        out.push('\n');
    }
    out
}

fn describe_group_violation(kind: &GroupKind, group: &[String], flags: &[String]) -> String {
    let group = group.join(" ");
    match kind {
        GroupKind::RequiredTogether => format!(
            "if any flags in the group [{group}] are set they must all be set; missing [{}]",
            flags.join(" ")
        ),
        GroupKind::MutuallyExclusive => format!(
            "if any flags in the group [{group}] are set none of the others can be; [{}] were all set",
            flags.join(" ")
        ),
        GroupKind::OneRequired => {
            format!("at least one of the flags in the group [{group}] is required")
        }
        GroupKind::IfPresentThenRequired => {
            let trigger = group.split(' ').next().unwrap_or_default();
            format!(
                "if flag {trigger:?} is set then all flags in the group [{group}] must be set; missing [{}]",
                flags.join(" ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_lists_suggestions() {
        let err = RouterError::UnknownCommand {
            name: "ech".to_string(),
            command_path: "root".to_string(),
            suggestions: vec!["echo".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "unknown command \"ech\" for \"root\"\n\nDid you mean this?\n\techo\n"
        );
    }

    #[test]
    fn test_required_flags_message() {
        let err = RouterError::RequiredFlagsMissing(vec!["name".into(), "port".into()]);
        assert_eq!(err.to_string(), "required flag(s) \"name\", \"port\" not set");
    }

    #[test]
    fn test_group_message_names_missing_subset() {
        let err = RouterError::FlagGroup {
            kind: GroupKind::RequiredTogether,
            group: vec!["a".into(), "b".into(), "c".into()],
            flags: vec!["c".into()],
        };
        assert_eq!(
            err.to_string(),
            "if any flags in the group [a b c] are set they must all be set; missing [c]"
        );
    }
}
