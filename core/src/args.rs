//! Positional-argument validators.
//!
//! The common validators form a closed enum so the completion layer can
//! inspect them (for example to learn how many positionals a command still
//! accepts). Anything else plugs in through [`ArgValidator`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::CommandId;
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::resolve::suggestions;
use crate::tree::CommandTree;

/// Custom positional-argument check.
pub trait ArgValidator: Send + Sync {
    fn validate(&self, tree: &CommandTree, command: CommandId, args: &[String]) -> Result<()>;
}

impl<F> ArgValidator for F
where
    F: Fn(&CommandTree, CommandId, &[String]) -> Result<()> + Send + Sync,
{
    fn validate(&self, tree: &CommandTree, command: CommandId, args: &[String]) -> Result<()> {
        self(tree, command, args)
    }
}

/// Positional-argument rule attached to a command.
#[derive(Clone)]
pub enum ArgsValidator {
    /// Rejects any positional argument.
    NoArgs,
    /// Accepts anything.
    Arbitrary,
    /// Every argument must be a valid arg or arg alias.
    OnlyValidArgs,
    MinimumN(usize),
    MaximumN(usize),
    ExactN(usize),
    Range(usize, usize),
    /// All validators must pass, checked in order.
    MatchAll(Vec<ArgsValidator>),
    Custom(Arc<dyn ArgValidator>),
}

impl ArgsValidator {
    pub fn custom(validator: impl ArgValidator + 'static) -> Self {
        ArgsValidator::Custom(Arc::new(validator))
    }

    /// Upper bound on positional arguments, when the rule has one.
    pub fn max_args(&self) -> Option<usize> {
        match self {
            ArgsValidator::NoArgs => Some(0),
            ArgsValidator::MaximumN(n) | ArgsValidator::ExactN(n) => Some(*n),
            ArgsValidator::Range(_, max) => Some(*max),
            ArgsValidator::MatchAll(all) => all.iter().filter_map(ArgsValidator::max_args).min(),
            ArgsValidator::Arbitrary
            | ArgsValidator::OnlyValidArgs
            | ArgsValidator::MinimumN(_)
            | ArgsValidator::Custom(_) => None,
        }
    }

    pub fn validate(&self, tree: &CommandTree, command: CommandId, args: &[String]) -> Result<()> {
        let actual = args.len();
        match self {
            ArgsValidator::NoArgs => match args.first() {
                Some(first) => Err(RouterError::UnknownCommand {
                    name: first.clone(),
                    command_path: tree.command_path(command),
                    suggestions: Vec::new(),
                }),
                None => Ok(()),
            },
            ArgsValidator::Arbitrary => Ok(()),
            ArgsValidator::OnlyValidArgs => only_valid_args(tree, command, args),
            ArgsValidator::MinimumN(min) if actual < *min => {
                Err(RouterError::TooFewArgs { min: *min, actual })
            }
            ArgsValidator::MaximumN(max) if actual > *max => {
                Err(RouterError::TooManyArgs { max: *max, actual })
            }
            ArgsValidator::ExactN(expected) if actual != *expected => {
                Err(RouterError::WrongArgCount {
                    expected: *expected,
                    actual,
                })
            }
            ArgsValidator::Range(min, max) if actual < *min || actual > *max => {
                Err(RouterError::ArgCountOutOfRange {
                    min: *min,
                    max: *max,
                    actual,
                })
            }
            ArgsValidator::MatchAll(all) => all
                .iter()
                .try_for_each(|validator| validator.validate(tree, command, args)),
            ArgsValidator::Custom(validator) => validator.validate(tree, command, args),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for ArgsValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsValidator::NoArgs => f.write_str("NoArgs"),
            ArgsValidator::Arbitrary => f.write_str("Arbitrary"),
            ArgsValidator::OnlyValidArgs => f.write_str("OnlyValidArgs"),
            ArgsValidator::MinimumN(n) => write!(f, "MinimumN({n})"),
            ArgsValidator::MaximumN(n) => write!(f, "MaximumN({n})"),
            ArgsValidator::ExactN(n) => write!(f, "ExactN({n})"),
            ArgsValidator::Range(min, max) => write!(f, "Range({min}, {max})"),
            ArgsValidator::MatchAll(all) => f.debug_tuple("MatchAll").field(all).finish(),
            ArgsValidator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn only_valid_args(tree: &CommandTree, command: CommandId, args: &[String]) -> Result<()> {
    let cmd = tree.command(command);
    if cmd.valid_arg_list().is_empty() {
        return Ok(());
    }
    let accepted: Vec<&str> = cmd
        .valid_arg_values()
        .chain(cmd.arg_alias_list().iter().map(String::as_str))
        .collect();
    for arg in args {
        if !accepted.contains(&arg.as_str()) {
            return Err(RouterError::InvalidArgument {
                arg: arg.clone(),
                command_path: tree.command_path(command),
                suggestions: tree.suggestions_for(command, arg),
            });
        }
    }
    Ok(())
}

/// Serializable form of the closed validator set, used by tree definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArgsSpec {
    None,
    Arbitrary,
    OnlyValid,
    Minimum { n: usize },
    Maximum { n: usize },
    Exact { n: usize },
    Range { min: usize, max: usize },
    All { of: Vec<ArgsSpec> },
}

impl From<&ArgsSpec> for ArgsValidator {
    fn from(spec: &ArgsSpec) -> Self {
        match spec {
            ArgsSpec::None => ArgsValidator::NoArgs,
            ArgsSpec::Arbitrary => ArgsValidator::Arbitrary,
            ArgsSpec::OnlyValid => ArgsValidator::OnlyValidArgs,
            ArgsSpec::Minimum { n } => ArgsValidator::MinimumN(*n),
            ArgsSpec::Maximum { n } => ArgsValidator::MaximumN(*n),
            ArgsSpec::Exact { n } => ArgsValidator::ExactN(*n),
            ArgsSpec::Range { min, max } => ArgsValidator::Range(*min, *max),
            ArgsSpec::All { of } => ArgsValidator::MatchAll(of.iter().map(Into::into).collect()),
        }
    }
}

/// Fallback applied when a command declares no validator.
///
/// Commands without children take any arguments. With children, only the
/// root rejects extra arguments; a nested command still accepts them.
pub(crate) fn legacy_args(
    tree: &CommandTree,
    command: CommandId,
    args: &[String],
    config: &RouterConfig,
) -> Result<()> {
    if tree.children(command).is_empty() {
        return Ok(());
    }
    match args.first() {
        Some(first) if tree.parent(command).is_none() => Err(RouterError::UnknownCommand {
            name: first.clone(),
            command_path: tree.command_path(command),
            suggestions: suggestions(tree, command, first, config),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use crate::command::Command;

    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn tree() -> (CommandTree, CommandId) {
        let mut tree = CommandTree::new(Command::new("root")).unwrap();
        let root = tree.root();
        let get = tree
            .add_command(
                root,
                Command::new("get")
                    .valid_args(["pods\tPods", "nodes"])
                    .arg_aliases(["po"]),
            )
            .unwrap();
        (tree, get)
    }

    #[test]
    fn test_count_validators() {
        let (tree, get) = tree();
        let two = args(&["a", "b"]);
        assert!(ArgsValidator::MinimumN(2).validate(&tree, get, &two).is_ok());
        assert!(matches!(
            ArgsValidator::MinimumN(3).validate(&tree, get, &two),
            Err(RouterError::TooFewArgs { min: 3, actual: 2 })
        ));
        assert!(matches!(
            ArgsValidator::MaximumN(1).validate(&tree, get, &two),
            Err(RouterError::TooManyArgs { max: 1, actual: 2 })
        ));
        assert!(matches!(
            ArgsValidator::ExactN(1).validate(&tree, get, &two),
            Err(RouterError::WrongArgCount {
                expected: 1,
                actual: 2
            })
        ));
        assert!(matches!(
            ArgsValidator::Range(3, 4).validate(&tree, get, &two),
            Err(RouterError::ArgCountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_only_valid_args_accepts_aliases() {
        let (tree, get) = tree();
        assert!(
            ArgsValidator::OnlyValidArgs
                .validate(&tree, get, &args(&["pods", "po"]))
                .is_ok()
        );
        let err = ArgsValidator::OnlyValidArgs
            .validate(&tree, get, &args(&["pod"]))
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidArgument { ref arg, .. } if arg == "pod"));
    }

    #[test]
    fn test_match_all_reports_first_failure() {
        let (tree, get) = tree();
        let rule = ArgsValidator::MatchAll(vec![
            ArgsValidator::ExactN(1),
            ArgsValidator::OnlyValidArgs,
        ]);
        assert!(rule.validate(&tree, get, &args(&["nodes"])).is_ok());
        assert!(matches!(
            rule.validate(&tree, get, &args(&["x", "y"])),
            Err(RouterError::WrongArgCount { .. })
        ));
        assert_eq!(rule.max_args(), Some(1));
    }

    #[test]
    fn test_legacy_args_root_vs_nested() {
        let mut tree = CommandTree::new(Command::new("root")).unwrap();
        let root = tree.root();
        let parent = tree.add_command(root, Command::new("parent")).unwrap();
        tree.add_command(parent, Command::new("child")).unwrap();

        let config = RouterConfig::default();
        assert!(legacy_args(&tree, root, &args(&["extra"]), &config).is_err());
        assert!(legacy_args(&tree, parent, &args(&["extra"]), &config).is_ok());
    }

    #[test]
    fn test_args_spec_converts() {
        let spec: ArgsSpec = serde_json::from_str(r#"{"type":"range","min":1,"max":2}"#).unwrap();
        assert_eq!(ArgsValidator::from(&spec).max_args(), Some(2));
    }
}
