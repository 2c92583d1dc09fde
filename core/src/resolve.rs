//! Command resolution: mapping an argument vector to a target command.
//!
//! [`CommandTree::find`] descends by matching positional tokens against
//! child names while skipping flags (and the value of a value-taking flag)
//! without parsing them. [`CommandTree::traverse`] instead parses each
//! level's flags before descending, so flags may sit between command names.
//!
//! Matching tries, in order: exact name, exact alias, case-folded name or
//! alias (when enabled), then a unique prefix over names and aliases (when
//! enabled). A prefix that selects two different commands is an error.

use tracing::debug;

use crate::args::legacy_args;
use crate::command::CommandId;
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::flagset::{self, consumes_next, is_flag_arg};
use crate::merge::effective_flags;
use crate::tree::CommandTree;

/// Outcome of resolving an argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The deepest matched command.
    pub command: CommandId,
    /// Arguments left once the command names were consumed.
    pub args: Vec<String>,
    /// The token that selected `command`, or the root's name when nothing
    /// below the root matched.
    pub called_as: String,
}

impl CommandTree {
    /// Resolves `args` without parsing any flag.
    ///
    /// When the target declares no argument validator the legacy rule
    /// applies: a root with children rejects a leftover positional
    /// argument as an unknown command.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_router_core::*;
    ///
    /// let mut tree = CommandTree::new(Command::new("root")).unwrap();
    /// let root = tree.root();
    /// let echo = tree
    ///     .add_command(root, Command::new("echo").alias("say").run(NoopAction))
    ///     .unwrap();
    /// tree.add_command(root, Command::new("print").run(NoopAction)).unwrap();
    ///
    /// let args = vec!["say".to_string(), "hello".to_string()];
    /// let found = tree.find(&RouterConfig::default(), &args).unwrap();
    /// assert_eq!(found.command, echo);
    /// assert_eq!(found.called_as, "say");
    /// assert_eq!(found.args, vec!["hello"]);
    /// ```
    pub fn find(&self, config: &RouterConfig, args: &[String]) -> Result<Resolution> {
        let mut current = self.root();
        let mut called_as = self.name(current).to_string();
        let mut rest = args.to_vec();

        loop {
            let positional = strip_flags(self, current, &rest);
            let Some(next) = positional.first() else {
                break;
            };
            let Some((child, token)) = find_next(self, current, next, config)? else {
                break;
            };
            rest = args_minus_first(self, current, &rest, next);
            debug!(command = %self.command_path(child), token = %token, "matched subcommand");
            current = child;
            called_as = token;
        }

        if self.command(current).args_validator().is_none() {
            legacy_args(self, current, &strip_flags(self, current, &rest), config)?;
        }
        Ok(Resolution {
            command: current,
            args: rest,
            called_as,
        })
    }

    /// Resolves `args`, parsing each traversed level's flags on the way down.
    ///
    /// Flags belonging to the final command are left in the returned
    /// arguments for the caller to parse.
    ///
    /// # Errors
    ///
    /// Any flag error at a traversed level, including an unknown flag unless
    /// that level whitelists them.
    pub fn traverse(&mut self, config: &RouterConfig, args: &[String]) -> Result<Resolution> {
        let mut current = self.root();
        let mut called_as = self.name(current).to_string();
        let mut rest: &[String] = args;

        loop {
            let set = effective_flags(self, current);
            let mut pending = Vec::new();
            let mut in_flag = false;
            let mut descend = None;
            for (i, arg) in rest.iter().enumerate() {
                if arg == "--" {
                    break;
                }
                if (arg.starts_with('-') && consumes_next(&self.flags, &set, arg))
                    || is_flag_arg(arg)
                {
                    in_flag = consumes_next(&self.flags, &set, arg);
                    pending.push(arg.clone());
                    continue;
                }
                if in_flag {
                    in_flag = false;
                    pending.push(arg.clone());
                    continue;
                }
                descend = find_next(self, current, arg, config)?.map(|found| (i, found));
                break;
            }

            let Some((i, (child, token))) = descend else {
                break;
            };
            let allow_unknown = self.command(current).unknown_flags_whitelisted();
            flagset::parse(&mut self.flags, &set, &pending, allow_unknown)?;
            debug!(command = %self.command_path(child), token = %token, "traversed into subcommand");
            current = child;
            called_as = token;
            rest = &rest[i + 1..];
        }

        if self.command(current).args_validator().is_none() {
            legacy_args(self, current, &strip_flags(self, current, rest), config)?;
        }
        Ok(Resolution {
            command: current,
            args: rest.to_vec(),
            called_as,
        })
    }
}

/// Positional tokens of `args`, skipping flags and the values they consume.
pub(crate) fn strip_flags(tree: &CommandTree, command: CommandId, args: &[String]) -> Vec<String> {
    let set = effective_flags(tree, command);
    let mut commands = Vec::new();
    let mut iter = args.iter();
    while let Some(token) = iter.next() {
        if token == "--" {
            break;
        }
        if token.starts_with('-') {
            if consumes_next(tree.flag_arena(), &set, token) {
                iter.next();
            }
            continue;
        }
        if !token.is_empty() {
            commands.push(token.clone());
        }
    }
    commands
}

/// `args` with the first positional occurrence of `name` removed.
fn args_minus_first(
    tree: &CommandTree,
    command: CommandId,
    args: &[String],
    name: &str,
) -> Vec<String> {
    let set = effective_flags(tree, command);
    let mut pos = 0;
    while pos < args.len() {
        let token = &args[pos];
        if token == "--" {
            break;
        }
        if token.starts_with('-') {
            if consumes_next(tree.flag_arena(), &set, token) {
                pos += 1;
            }
        } else if token == name {
            let mut out = args[..pos].to_vec();
            out.extend_from_slice(&args[pos + 1..]);
            return out;
        }
        pos += 1;
    }
    args.to_vec()
}

/// Finds the child of `command` selected by `token`.
///
/// Returns the child together with the called-as name: the token as typed
/// for exact and case-folded matches, the full name or alias for prefixes.
pub(crate) fn find_next(
    tree: &CommandTree,
    command: CommandId,
    token: &str,
    config: &RouterConfig,
) -> Result<Option<(CommandId, String)>> {
    let children = tree.children(command);

    if let Some(child) = children.iter().find(|c| tree.name(**c) == token) {
        return Ok(Some((*child, token.to_string())));
    }
    if let Some(child) = children.iter().find(|c| tree.command(**c).has_alias(token)) {
        return Ok(Some((*child, token.to_string())));
    }
    if config.case_insensitive {
        let folded = children.iter().find(|c| {
            names_of(tree, **c).any(|name| fold(name) == fold(token))
        });
        if let Some(child) = folded {
            return Ok(Some((*child, token.to_string())));
        }
    }
    if !config.prefix_matching || token.is_empty() {
        return Ok(None);
    }

    let mut matches: Vec<(CommandId, String)> = Vec::new();
    for child in children {
        let hit = names_of(tree, *child).find(|name| has_prefix(name, token, config.case_insensitive));
        if let Some(name) = hit {
            matches.push((*child, name.to_string()));
        }
    }
    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        _ => {
            let mut candidates: Vec<String> = matches
                .iter()
                .map(|(child, _)| tree.name(*child).to_string())
                .collect();
            candidates.sort();
            Err(RouterError::AmbiguousCommand {
                token: token.to_string(),
                command_path: tree.command_path(command),
                candidates,
            })
        }
    }
}

fn names_of(tree: &CommandTree, command: CommandId) -> impl Iterator<Item = &str> {
    let cmd = tree.command(command);
    std::iter::once(cmd.name()).chain(cmd.alias_list().iter().map(String::as_str))
}

fn has_prefix(name: &str, prefix: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        fold(name).starts_with(&fold(prefix))
    } else {
        name.starts_with(prefix)
    }
}

/// Case folding shared by every case-insensitive comparison.
fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// Available children of `command` whose name resembles `typed`.
///
/// A child qualifies when any of its names is within the configured edit
/// distance (ignoring case), when its name starts with `typed`, or when it
/// lists `typed` in its `suggest_for` words.
pub fn suggestions(
    tree: &CommandTree,
    command: CommandId,
    typed: &str,
    config: &RouterConfig,
) -> Vec<String> {
    if config.disable_suggestions {
        return Vec::new();
    }
    let typed_lower = fold(typed);
    let mut out: Vec<String> = Vec::new();
    for child in tree.children(command) {
        if !tree.is_available(*child) {
            continue;
        }
        let cmd = tree.command(*child);
        let close = names_of(tree, *child).any(|name| {
            strsim::levenshtein(&fold(name), &typed_lower)
                <= config.suggestions_minimum_distance
        });
        let by_prefix = fold(cmd.name()).starts_with(&typed_lower);
        let explicit = cmd
            .suggest_for_list()
            .iter()
            .any(|word| fold(word) == typed_lower);
        if (close || by_prefix || explicit) && !out.iter().any(|s| s == cmd.name()) {
            out.push(cmd.name().to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, NoopAction};
    use crate::flag::Flag;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn tree() -> (CommandTree, CommandId, CommandId) {
        let mut tree = CommandTree::new(
            Command::new("root").persistent_flag(Flag::string("name", "").shorthand('n')),
        )
        .unwrap();
        let root = tree.root();
        let echo = tree
            .add_command(
                root,
                Command::new("echo")
                    .alias("say")
                    .flag(Flag::bool("loud"))
                    .run(NoopAction),
            )
            .unwrap();
        let times = tree
            .add_command(echo, Command::new("times").run(NoopAction))
            .unwrap();
        tree.add_command(root, Command::new("print").run(NoopAction))
            .unwrap();
        (tree, echo, times)
    }

    #[test]
    fn test_find_skips_flag_values() {
        let (tree, _, times) = tree();
        let found = tree
            .find(
                &RouterConfig::default(),
                &args(&["--name", "echo", "echo", "-n", "x", "times", "a"]),
            )
            .unwrap();
        assert_eq!(found.command, times);
        assert_eq!(found.args, args(&["--name", "echo", "-n", "x", "a"]));
    }

    #[test]
    fn test_find_stops_at_double_dash() {
        let (tree, echo, _) = tree();
        let found = tree
            .find(&RouterConfig::default(), &args(&["echo", "--", "times"]))
            .unwrap();
        assert_eq!(found.command, echo);
        assert_eq!(found.args, args(&["--", "times"]));
    }

    #[test]
    fn test_unknown_command_at_root() {
        let (tree, _, _) = tree();
        let err = tree
            .find(&RouterConfig::default(), &args(&["ecoh"]))
            .unwrap_err();
        match err {
            RouterError::UnknownCommand {
                name, suggestions, ..
            } => {
                assert_eq!(name, "ecoh");
                assert_eq!(suggestions, vec!["echo"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nested_command_accepts_unknown_token() {
        let (tree, echo, _) = tree();
        let found = tree
            .find(&RouterConfig::default(), &args(&["echo", "hello"]))
            .unwrap();
        assert_eq!(found.command, echo);
        assert_eq!(found.args, args(&["hello"]));
    }

    #[test]
    fn test_prefix_matching() {
        let (tree, echo, _) = tree();
        let config = RouterConfig::default().with_prefix_matching(true);
        let found = tree.find(&config, &args(&["ec"])).unwrap();
        assert_eq!(found.command, echo);
        assert_eq!(found.called_as, "echo");

        let found = tree.find(&config, &args(&["sa"])).unwrap();
        assert_eq!(found.called_as, "say");

        assert!(tree.find(&RouterConfig::default(), &args(&["ec"])).is_err());
    }

    #[test]
    fn test_prefix_ambiguity_names_candidates() {
        let mut tree = CommandTree::new(Command::new("root")).unwrap();
        let root = tree.root();
        tree.add_command(root, Command::new("status")).unwrap();
        tree.add_command(root, Command::new("stash").alias("sh")).unwrap();
        let config = RouterConfig::default().with_prefix_matching(true);

        match tree.find(&config, &args(&["st"])).unwrap_err() {
            RouterError::AmbiguousCommand { candidates, .. } => {
                assert_eq!(candidates, vec!["stash", "status"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(tree.find(&config, &args(&["sta"])).is_err());
        assert!(tree.find(&config, &args(&["stat"])).is_ok());
    }

    #[test]
    fn test_case_insensitive_keeps_typed_token() {
        let (tree, echo, _) = tree();
        let config = RouterConfig::default().with_case_insensitive(true);
        let found = tree.find(&config, &args(&["SAY"])).unwrap();
        assert_eq!(found.command, echo);
        assert_eq!(found.called_as, "SAY");
    }

    #[test]
    fn test_case_folding_covers_non_ascii_names() {
        let mut tree = CommandTree::new(Command::new("root")).unwrap();
        let root = tree.root();
        let unpack = tree
            .add_command(root, Command::new("ünpack").alias("entpäcken").run(NoopAction))
            .unwrap();

        let config = RouterConfig::default().with_case_insensitive(true);
        let found = tree.find(&config, &args(&["ÜNPACK"])).unwrap();
        assert_eq!(found.command, unpack);
        assert_eq!(found.called_as, "ÜNPACK");
        let found = tree.find(&config, &args(&["ENTPÄCKEN"])).unwrap();
        assert_eq!(found.command, unpack);

        let prefixed = config.clone().with_prefix_matching(true);
        let found = tree.find(&prefixed, &args(&["ÜN"])).unwrap();
        assert_eq!(found.command, unpack);
        assert_eq!(found.called_as, "ünpack");

        assert!(tree.find(&RouterConfig::default(), &args(&["ÜNPACK"])).is_err());
    }

    #[test]
    fn test_traverse_parses_intermediate_flags() {
        let (mut tree, _, times) = tree();
        let config = RouterConfig::default().with_traverse_children(true);
        let found = tree
            .traverse(&config, &args(&["--name", "bob", "echo", "--loud", "times", "x"]))
            .unwrap();
        assert_eq!(found.command, times);
        assert_eq!(found.args, args(&["x"]));
        let root = tree.root();
        let name = tree.find_flag(root, "name").unwrap();
        assert_eq!(tree.flag(name).value().to_string(), "bob");
    }

    #[test]
    fn test_traverse_unknown_flag_is_error() {
        let (mut tree, _, _) = tree();
        let err = tree
            .traverse(&RouterConfig::default(), &args(&["--bogus=1", "echo"]))
            .unwrap_err();
        assert!(matches!(err, RouterError::UnknownFlag(flag) if flag == "bogus"));
    }

    #[test]
    fn test_traverse_defers_final_flags() {
        let (mut tree, echo, _) = tree();
        let found = tree
            .traverse(&RouterConfig::default(), &args(&["echo", "--whatever"]))
            .unwrap();
        assert_eq!(found.command, echo);
        assert_eq!(found.args, args(&["--whatever"]));
    }

    #[test]
    fn test_suggest_for_and_disable() {
        let mut tree = CommandTree::new(Command::new("root")).unwrap();
        let root = tree.root();
        tree.add_command(root, Command::new("delete").suggest_for("remove").run(NoopAction))
            .unwrap();
        let config = RouterConfig::default();
        assert_eq!(suggestions(&tree, root, "remove", &config), vec!["delete"]);
        assert_eq!(suggestions(&tree, root, "del", &config), vec!["delete"]);

        let quiet = RouterConfig {
            disable_suggestions: true,
            ..RouterConfig::default()
        };
        assert!(suggestions(&tree, root, "remove", &quiet).is_empty());
    }
}
