//! Definition linting.
//!
//! [`validate_definition`] walks a [`TreeDefinition`] and reports every
//! structural problem it finds, so a definition file can be checked in one
//! pass before it is built.
//!
//! # Examples
//!
//! ```
//! use command_router_core::*;
//!
//! let good = TreeDefinition::from_yaml("root:\n  use: app\n").unwrap();
//! assert!(validate_definition(&good).is_empty());
//!
//! let bad = TreeDefinition::from_yaml(
//!     "root:\n  use: app\n  commands:\n    - use: run\n    - use: run\n",
//! )
//! .unwrap();
//! assert!(matches!(
//!     validate_definition(&bad)[0],
//!     ValidationError::DuplicateCommand { .. }
//! ));
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::definition::{CommandDef, FlagDef, TreeDefinition};
use crate::flag::FlagValue;

static COMMAND_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]*$").expect("static regex must compile")
});
static FLAG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("static regex must compile"));

/// A structural problem in a tree definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A use line with no command name.
    #[error("command under {0:?} has an empty use line")]
    EmptyCommandName(String),
    #[error("invalid command name or alias {0:?}")]
    InvalidCommandName(String),
    /// Two siblings share a name or alias.
    #[error("{name:?} is used twice under {parent:?}")]
    DuplicateCommand { parent: String, name: String },
    #[error("invalid flag name {0:?}")]
    InvalidFlagName(String),
    /// A shorthand that is not a single ASCII letter or digit.
    #[error("invalid shorthand {shorthand:?} for flag --{flag}")]
    InvalidShorthand { flag: String, shorthand: char },
    /// Two flags declared on one command share a name or shorthand.
    #[error("flag {flag:?} declared twice on {command:?}")]
    DuplicateFlag { command: String, flag: String },
    #[error("default {value:?} is not valid for flag --{flag}: {reason}")]
    InvalidDefault {
        flag: String,
        value: String,
        reason: String,
    },
    /// A group names a flag the command cannot see.
    #[error("group on {command:?} names unknown flag {flag:?}")]
    UnknownGroupFlag { command: String, flag: String },
    #[error("group on {0:?} needs at least two flags")]
    GroupTooSmall(String),
}

/// Lints a whole definition; an empty result means it will build.
pub fn validate_definition(definition: &TreeDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut path = Vec::new();
    let mut inherited = Vec::new();
    validate_command(&definition.root, &mut path, &mut inherited, &mut errors);
    errors
}

fn validate_command<'a>(
    command: &'a CommandDef,
    path: &mut Vec<&'a str>,
    inherited: &mut Vec<&'a str>,
    errors: &mut Vec<ValidationError>,
) {
    let name = command.use_line.split_whitespace().next().unwrap_or_default();
    if name.is_empty() {
        errors.push(ValidationError::EmptyCommandName(path.join(" ")));
        return;
    }
    for word in std::iter::once(name).chain(command.aliases.iter().map(String::as_str)) {
        if !COMMAND_NAME_RE.is_match(word) {
            errors.push(ValidationError::InvalidCommandName(word.to_string()));
        }
    }
    path.push(name);
    let here = path.join(" ");

    let mut names = HashSet::new();
    let mut shorthands = HashSet::new();
    for flag in command.flags.iter().chain(&command.persistent_flags) {
        validate_flag(flag, errors);
        let short_clash = flag.shorthand.is_some_and(|c| !shorthands.insert(c));
        if !names.insert(flag.name.as_str()) || short_clash {
            errors.push(ValidationError::DuplicateFlag {
                command: here.clone(),
                flag: flag.name.clone(),
            });
        }
    }

    for group in &command.groups {
        if group.flags.len() < 2 {
            errors.push(ValidationError::GroupTooSmall(here.clone()));
        }
        for member in &group.flags {
            if !names.contains(member.as_str()) && !inherited.contains(&member.as_str()) {
                errors.push(ValidationError::UnknownGroupFlag {
                    command: here.clone(),
                    flag: member.clone(),
                });
            }
        }
    }

    let mut siblings = HashSet::new();
    for child in &command.commands {
        let child_name = child.use_line.split_whitespace().next().unwrap_or_default();
        for word in std::iter::once(child_name).chain(child.aliases.iter().map(String::as_str)) {
            if !word.is_empty() && !siblings.insert(word) {
                errors.push(ValidationError::DuplicateCommand {
                    parent: here.clone(),
                    name: word.to_string(),
                });
            }
        }
    }

    let depth = inherited.len();
    inherited.extend(command.persistent_flags.iter().map(|f| f.name.as_str()));
    for child in &command.commands {
        validate_command(child, path, inherited, errors);
    }
    inherited.truncate(depth);
    path.pop();
}

fn validate_flag(flag: &FlagDef, errors: &mut Vec<ValidationError>) {
    if !FLAG_NAME_RE.is_match(&flag.name) {
        errors.push(ValidationError::InvalidFlagName(flag.name.clone()));
    }
    if let Some(c) = flag.shorthand {
        if !c.is_ascii_alphanumeric() {
            errors.push(ValidationError::InvalidShorthand {
                flag: flag.name.clone(),
                shorthand: c,
            });
        }
    }
    if let Some(raw) = &flag.default {
        if let Err(reason) = FlagValue::parse(flag.kind, raw) {
            errors.push(ValidationError::InvalidDefault {
                flag: flag.name.clone(),
                value: raw.clone(),
                reason,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lint(yaml: &str) -> Vec<ValidationError> {
        validate_definition(&TreeDefinition::from_yaml(yaml).unwrap())
    }

    #[test]
    fn test_valid_definition_has_no_errors() {
        let errors = lint(
            r#"
root:
  use: app
  persistent_flags:
    - { name: verbose, shorthand: v, kind: bool }
  commands:
    - use: run
      flags:
        - { name: quiet, kind: bool }
      groups:
        - { kind: mutually-exclusive, flags: [verbose, quiet] }
"#,
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_flag_problems_are_reported() {
        let errors = lint(
            r#"
root:
  use: app
  flags:
    - { name: "--bad" }
    - { name: port, kind: int, default: "abc", shorthand: "?" }
    - { name: port }
"#,
        );
        assert!(errors.contains(&ValidationError::InvalidFlagName("--bad".into())));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidDefault { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidShorthand { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateFlag { .. })));
    }

    #[test]
    fn test_alias_clash_between_siblings() {
        let errors = lint(
            r#"
root:
  use: app
  commands:
    - { use: remove, aliases: [rm] }
    - { use: rm }
"#,
        );
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateCommand {
                parent: "app".into(),
                name: "rm".into()
            }]
        );
    }

    #[test]
    fn test_group_members_must_be_visible() {
        let errors = lint(
            r#"
root:
  use: app
  flags:
    - { name: local-only }
  commands:
    - use: run
      flags:
        - { name: x }
      groups:
        - { kind: one-required, flags: [x, local-only] }
"#,
        );
        assert_eq!(
            errors,
            vec![ValidationError::UnknownGroupFlag {
                command: "app run".into(),
                flag: "local-only".into()
            }]
        );
    }

    #[test]
    fn test_bad_command_name() {
        let errors = lint("root:\n  use: app\n  commands:\n    - use: \"-x\"\n");
        assert_eq!(errors, vec![ValidationError::InvalidCommandName("-x".into())]);
    }
}
