//! Candidate computation for a partial command line.
//!
//! The last argument is the word under the cursor; everything before it is
//! routed through the tree to find the command being completed. From there:
//!
//! 1. a value for a flag: the flag's completer, its extension filter, its
//!    directory filter, its custom shell function, or nothing;
//! 2. a flag name when the word starts with `-`;
//! 3. otherwise subcommands, unset required flags, valid args and the
//!    command's own completer.

use std::collections::HashSet;

use tracing::debug;

use command_router_core::{
    ANNOTATION_CUSTOM, ANNOTATION_FILENAME_EXT, ANNOTATION_SUBDIRS_IN_DIR, CommandId,
    CommandTree, Completion, CompletionRequest, Flag, FlagId, FlagSet, GroupHints,
    RouterConfig, ShellCompDirective, completion_hints, effective_flags, inherited_flags,
    is_flag_arg, local_non_persistent_flags, non_inherited_flags,
};

use crate::active_help::ActiveHelpConfig;
use crate::error::{CompletionError, Result};

/// Candidates for one completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// The command the request was routed to.
    pub command: CommandId,
    pub completions: Vec<Completion>,
    pub directive: ShellCompDirective,
}

/// Computes completions against a tree.
///
/// # Examples
///
/// ```
/// use command_router_core::{Command, CommandTree, NoopAction, RouterConfig};
/// use command_router_complete::{ActiveHelpConfig, Dispatcher};
///
/// let mut tree = CommandTree::new(Command::new("app")).unwrap();
/// let root = tree.root();
/// tree.add_command(root, Command::new("one").run(NoopAction)).unwrap();
/// tree.add_command(root, Command::new("two").run(NoopAction)).unwrap();
///
/// let dispatcher = Dispatcher::new(RouterConfig::default(), ActiveHelpConfig::default());
/// let outcome = dispatcher.complete(&mut tree, &["t".to_string()]).unwrap();
/// let values: Vec<&str> = outcome.completions.iter().map(|c| c.value.as_str()).collect();
/// assert_eq!(values, ["two"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: RouterConfig,
    active_help: ActiveHelpConfig,
}

/// Where the flag being completed came from.
struct FlagValueTarget {
    flag: Option<FlagId>,
    args: Vec<String>,
    to_complete: String,
    unknown: Option<String>,
}

impl Dispatcher {
    pub fn new(config: RouterConfig, active_help: ActiveHelpConfig) -> Self {
        Self {
            config,
            active_help,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn active_help(&self) -> &ActiveHelpConfig {
        &self.active_help
    }

    /// Completes the last element of `args` given the ones before it.
    ///
    /// Flags on the line are parsed into the tree, so callers completing
    /// several lines with one tree reset flags in between.
    ///
    /// # Errors
    ///
    /// Routing and flag-parsing errors, and
    /// [`UnknownFlag`](CompletionError::UnknownFlag) when the value of an
    /// unknown flag is requested.
    pub fn complete(&self, tree: &mut CommandTree, args: &[String]) -> Result<CompletionOutcome> {
        let (to_complete, preceding) = match args.split_last() {
            Some((last, rest)) => (last.as_str(), rest),
            None => ("", args),
        };

        let resolution = if self.config.traverse_children {
            tree.traverse(&self.config, preceding)?
        } else {
            tree.find(&self.config, preceding)?
        };
        let command = resolution.command;
        debug!(command = %tree.command_path(command), to_complete, "completing");

        let target = flag_value_target(tree, command, resolution.args, to_complete);
        let parsed = tree.parse_flags(command, &target.args);
        if let Some(flag) = target.unknown {
            // Past a `--` the word is a plain argument, not a flag value.
            if !target.args.iter().any(|arg| arg == "--") {
                return Err(CompletionError::UnknownFlag {
                    command: tree.command_path(command),
                    flag,
                });
            }
        }
        let parsed = parsed?;
        // A `--` already on the line ends flag parsing, so flags are not offered.
        let flag_completion = parsed.dash_at.is_none();

        let positional = if tree.command(command).flag_parsing_disabled() {
            target.args
        } else {
            parsed.positional
        };
        let to_complete = target.to_complete.as_str();

        let (mut completions, directive) = match target.flag {
            Some(flag) if flag_completion => {
                self.complete_flag_value(tree, command, flag, &positional, to_complete)
            }
            _ => self.complete_command(tree, command, &positional, to_complete, flag_completion),
        };

        if !self.active_help.is_enabled() {
            completions.retain(|c| !c.is_active_help());
        }
        debug!(count = completions.len(), directive = %directive, "completion done");
        Ok(CompletionOutcome {
            command,
            completions,
            directive,
        })
    }

    fn request<'a>(
        &'a self,
        tree: &'a CommandTree,
        command: CommandId,
        args: &'a [String],
        to_complete: &'a str,
    ) -> CompletionRequest<'a> {
        CompletionRequest {
            tree,
            command,
            args,
            to_complete,
            active_help_config: self.active_help.value(),
        }
    }

    fn complete_flag_value(
        &self,
        tree: &CommandTree,
        command: CommandId,
        id: FlagId,
        args: &[String],
        to_complete: &str,
    ) -> (Vec<Completion>, ShellCompDirective) {
        if let Some(completer) = tree.flag_completer(id) {
            return completer.complete(&self.request(tree, command, args, to_complete));
        }
        let flag = tree.flag(id);
        if let Some(exts) = flag.annotation(ANNOTATION_FILENAME_EXT).filter(|e| !e.is_empty()) {
            let completions = exts.iter().map(Completion::new).collect();
            return (completions, ShellCompDirective::FILTER_FILE_EXT);
        }
        if let Some(dirs) = flag.annotation(ANNOTATION_SUBDIRS_IN_DIR) {
            let completions = match dirs {
                [dir] => vec![Completion::new(dir)],
                _ => Vec::new(),
            };
            return (completions, ShellCompDirective::FILTER_DIRS);
        }
        if flag.annotation(ANNOTATION_CUSTOM).is_some() {
            return (Vec::new(), ShellCompDirective::DEFAULT);
        }
        (Vec::new(), inherited_directive(tree, command))
    }

    fn complete_command(
        &self,
        tree: &CommandTree,
        command: CommandId,
        args: &[String],
        to_complete: &str,
        flag_completion: bool,
    ) -> (Vec<Completion>, ShellCompDirective) {
        let hints = completion_hints(tree, command);
        let cmd = tree.command(command);

        if flag_completion && to_complete.starts_with('-') && !to_complete.contains('=') {
            let mut completions = required_flag_names(tree, command, &hints, to_complete);
            if completions.is_empty() {
                completions = flag_names(tree, command, &hints, to_complete);
            }
            let directive = match completions.as_slice() {
                [only] if only.value.ends_with('=') => ShellCompDirective::NO_SPACE,
                _ => ShellCompDirective::NO_FILE_COMP,
            };
            if !cmd.flag_parsing_disabled() {
                return (completions, directive);
            }
        }

        let mut directive = inherited_directive(tree, command);
        let mut completions = Vec::new();

        let local_flag_set = !self.config.traverse_children && {
            let local = local_non_persistent_flags(tree, command);
            local.ids().iter().any(|id| tree.flag(*id).changed())
        };
        if args.is_empty() && !local_flag_set {
            for child in tree.ordered_children(command, &self.config) {
                if !tree.is_available(child) {
                    continue;
                }
                if let Some(name) = matching_name(tree, child, to_complete) {
                    completions.push(Completion::with_description(
                        name,
                        tree.command(child).short_description(),
                    ));
                }
                directive = ShellCompDirective::NO_FILE_COMP;
            }
        }

        completions.extend(required_flag_names(tree, command, &hints, to_complete));

        let max_args = cmd.args_validator().and_then(|v| v.max_args());
        if max_args.is_some_and(|max| args.len() >= max) {
            debug!(supplied = args.len(), ?max_args, "positional arguments complete");
            return (completions, ShellCompDirective::NO_FILE_COMP);
        }

        let has_valid_args = !cmd.valid_arg_list().is_empty();
        let completer = cmd.valid_args_function();
        if !has_valid_args && completer.is_none() {
            return (completions, directive);
        }

        let used: HashSet<&str> = if cmd.has_repeatable_args() {
            HashSet::new()
        } else {
            args.iter().map(String::as_str).collect()
        };
        let offered = |c: &Completion| {
            c.value.starts_with(to_complete) && !used.contains(c.value.as_str())
        };

        if has_valid_args {
            let before = completions.len();
            completions.extend(
                cmd.valid_arg_list()
                    .iter()
                    .map(|raw| Completion::parse(raw))
                    .filter(|c| offered(c)),
            );
            if completions.len() > before {
                directive = ShellCompDirective::NO_FILE_COMP;
            }
            return (completions, directive);
        }

        if let Some(completer) = completer {
            let (found, returned) = completer.complete(&self.request(tree, command, args, to_complete));
            // Active Help lines are messages, not candidates for the word.
            completions.extend(
                found
                    .into_iter()
                    .filter(|c| c.is_active_help() || offered(c)),
            );
            directive = returned;
        }
        (completions, directive)
    }
}

/// How a flag was spelled on the command line.
enum FlagName {
    Long(String),
    Short(char),
}

impl FlagName {
    /// `--name` or the last shorthand of a `-abc` cluster.
    fn from_token(token: &str) -> Option<Self> {
        match token.strip_prefix("--") {
            Some(long) if !long.is_empty() => Some(FlagName::Long(long.to_string())),
            Some(_) => None,
            None => token.strip_prefix('-')?.chars().last().map(FlagName::Short),
        }
    }

    fn lookup(&self, set: &FlagSet) -> Option<FlagId> {
        match self {
            FlagName::Long(name) => set.lookup(name),
            FlagName::Short(c) => set.lookup_shorthand(*c),
        }
    }

    fn into_string(self) -> String {
        match self {
            FlagName::Long(name) => name,
            FlagName::Short(c) => c.to_string(),
        }
    }
}

/// Works out whether the cursor sits on a flag value.
///
/// `--flag=partial` and `-f=partial` complete `partial` for that flag; a
/// value-taking flag as the previous word completes the current word for
/// it and drops the flag from the arguments so the incomplete value cannot
/// fail parsing.
fn flag_value_target(
    tree: &CommandTree,
    command: CommandId,
    mut args: Vec<String>,
    to_complete: &str,
) -> FlagValueTarget {
    let plain = |args: Vec<String>| FlagValueTarget {
        flag: None,
        args,
        to_complete: to_complete.to_string(),
        unknown: None,
    };
    if tree.command(command).flag_parsing_disabled() {
        return plain(args);
    }

    let (name, value, with_equal) = if to_complete.starts_with('-') {
        let Some((spelled, value)) = to_complete.split_once('=') else {
            return plain(args);
        };
        match FlagName::from_token(spelled) {
            Some(name) => (name, value.to_string(), true),
            None => return plain(args),
        }
    } else {
        let previous = args
            .last()
            .filter(|prev| is_flag_arg(prev) && !prev.contains('='))
            .and_then(|prev| FlagName::from_token(prev));
        match previous {
            Some(name) => (name, to_complete.to_string(), false),
            None => return plain(args),
        }
    };

    let Some(flag) = name.lookup(&effective_flags(tree, command)) else {
        return FlagValueTarget {
            flag: None,
            args,
            to_complete: to_complete.to_string(),
            unknown: Some(name.into_string()),
        };
    };
    if !with_equal && tree.flag(flag).no_opt_default().is_some() {
        // A boolean flag takes no separate value; complete the word normally.
        return plain(args);
    }

    if !with_equal {
        args.pop();
    }
    FlagValueTarget {
        flag: Some(flag),
        args,
        to_complete: value,
        unknown: None,
    }
}

/// Default directive for command-level completion, from the nearest
/// ancestor that sets one.
fn inherited_directive(tree: &CommandTree, command: CommandId) -> ShellCompDirective {
    tree.ancestors(command)
        .find_map(|id| tree.command(id).default_completion_directive())
        .unwrap_or_default()
}

/// The child's name, or its first alias, when it starts with `prefix`.
fn matching_name<'a>(tree: &'a CommandTree, child: CommandId, prefix: &str) -> Option<&'a str> {
    let cmd = tree.command(child);
    if cmd.name().starts_with(prefix) {
        return Some(cmd.name());
    }
    cmd.alias_list()
        .iter()
        .map(String::as_str)
        .find(|alias| alias.starts_with(prefix))
}

/// Flags in completion order: inherited then own, each sorted by name.
fn ordered_flags(tree: &CommandTree, command: CommandId) -> Vec<FlagId> {
    let arena = tree.flag_arena();
    let mut ids = inherited_flags(tree, command).sorted_ids(arena);
    ids.extend(non_inherited_flags(tree, command).sorted_ids(arena));
    ids
}

fn is_offered(flag: &Flag, id: FlagId, hints: &GroupHints) -> bool {
    flag.is_completable() && !hints.hidden.contains(&id)
}

fn required_flag_names(
    tree: &CommandTree,
    command: CommandId,
    hints: &GroupHints,
    to_complete: &str,
) -> Vec<Completion> {
    ordered_flags(tree, command)
        .into_iter()
        .filter(|id| {
            let flag = tree.flag(*id);
            (flag.is_required() || hints.required.contains(id)) && !flag.changed()
        })
        .flat_map(|id| flag_name_completions(tree.flag(id), id, hints, to_complete))
        .collect()
}

fn flag_names(
    tree: &CommandTree,
    command: CommandId,
    hints: &GroupHints,
    to_complete: &str,
) -> Vec<Completion> {
    ordered_flags(tree, command)
        .into_iter()
        .filter(|id| {
            let flag = tree.flag(*id);
            !flag.changed() || flag.kind().is_repeatable()
        })
        .flat_map(|id| flag_name_completions(tree.flag(id), id, hints, to_complete))
        .collect()
}

fn flag_name_completions(
    flag: &Flag,
    id: FlagId,
    hints: &GroupHints,
    to_complete: &str,
) -> Vec<Completion> {
    if !is_offered(flag, id, hints) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let long = format!("--{}", flag.name());
    if long.starts_with(to_complete) {
        out.push(Completion::with_description(long, flag.usage_text()));
    }
    if let Some(c) = flag.shorthand_char() {
        let short = format!("-{c}");
        if short.starts_with(to_complete) {
            out.push(Completion::with_description(short, flag.usage_text()));
        }
    }
    out
}
