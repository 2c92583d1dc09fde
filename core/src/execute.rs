//! The execution path: resolve, parse, validate, run.
//!
//! Flag values and `changed` state stay in the tree after a call. Callers
//! routing several argument vectors through one tree call
//! [`CommandTree::reset_flags`] in between; nothing here resets them.

use tracing::{debug, warn};

use crate::command::CommandId;
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::flag::{Flag, FlagValue};
use crate::flagset::{self, ParsedArgs};
use crate::groups::validate_flag_groups;
use crate::merge::effective_flags;
use crate::resolve::Resolution;
use crate::tree::CommandTree;

/// A routed invocation: target command plus its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: CommandId,
    pub called_as: String,
    /// Positional arguments after flag parsing.
    pub args: Vec<String>,
    /// How many positional arguments preceded a `--`, if one was given.
    pub dash_at: Option<usize>,
}

/// What a [`Runnable`](crate::Runnable) sees when it runs.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub tree: &'a CommandTree,
    pub invocation: &'a Invocation,
}

impl<'a> RunContext<'a> {
    pub fn command(&self) -> CommandId {
        self.invocation.command
    }

    pub fn command_path(&self) -> String {
        self.tree.command_path(self.invocation.command)
    }

    pub fn called_as(&self) -> &'a str {
        &self.invocation.called_as
    }

    pub fn args(&self) -> &'a [String] {
        &self.invocation.args
    }

    /// A flag visible to the invoked command.
    pub fn flag(&self, name: &str) -> Option<&'a Flag> {
        let tree = self.tree;
        tree.find_flag(self.invocation.command, name)
            .map(|id| tree.flag(id))
    }

    pub fn value(&self, name: &str) -> Option<&'a FlagValue> {
        self.flag(name).map(Flag::value)
    }

    /// Whether the flag was supplied on this command line.
    pub fn changed(&self, name: &str) -> bool {
        self.flag(name).is_some_and(Flag::changed)
    }

    pub fn string(&self, name: &str) -> Option<&'a str> {
        match self.value(name)? {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.value(name)? {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl CommandTree {
    /// Parses `args` against the effective flags of `command`.
    ///
    /// With flag parsing disabled every argument is positional. Unknown
    /// flags are skipped when the command whitelists them.
    pub fn parse_flags(&mut self, command: CommandId, args: &[String]) -> Result<ParsedArgs> {
        let cmd = self.command(command);
        if cmd.flag_parsing_disabled() {
            return Ok(ParsedArgs {
                positional: args.to_vec(),
                dash_at: None,
            });
        }
        let allow_unknown = cmd.unknown_flags_whitelisted();
        let set = effective_flags(self, command);
        flagset::parse(&mut self.flags, &set, args, allow_unknown)
    }

    /// Resolves and parses `args` and runs every validation, without running
    /// the target's action.
    pub fn prepare(&mut self, config: &RouterConfig, args: &[String]) -> Result<Invocation> {
        let invocation = self.resolve_and_parse(config, args)?;
        self.validate(&invocation)?;
        Ok(invocation)
    }

    /// Routes `args` to a command and runs it.
    ///
    /// # Errors
    ///
    /// Resolution and flag errors, [`NotRunnable`](RouterError::NotRunnable)
    /// for topic commands, validation failures, and
    /// [`Run`](RouterError::Run) wrapping an error from the action.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_router_core::*;
    ///
    /// let mut tree = CommandTree::new(Command::new("root")).unwrap();
    /// let root = tree.root();
    /// tree.add_command(
    ///     root,
    ///     Command::new("greet")
    ///         .args(ArgsValidator::ExactN(1))
    ///         .flag(Flag::bool("shout"))
    ///         .run(|ctx: &RunContext<'_>| -> std::result::Result<(), BoxError> {
    ///             assert_eq!(ctx.args(), ["world"]);
    ///             assert!(ctx.changed("shout"));
    ///             Ok(())
    ///         }),
    /// )
    /// .unwrap();
    ///
    /// let args = ["greet", "--shout", "world"].map(String::from);
    /// let invocation = tree.execute(&RouterConfig::default(), &args).unwrap();
    /// assert_eq!(invocation.called_as, "greet");
    /// ```
    pub fn execute(&mut self, config: &RouterConfig, args: &[String]) -> Result<Invocation> {
        let invocation = self.resolve_and_parse(config, args)?;
        let Some(action) = self.command(invocation.command).runnable().cloned() else {
            return Err(RouterError::NotRunnable(self.command_path(invocation.command)));
        };
        self.validate(&invocation)?;

        debug!(command = %self.command_path(invocation.command), "running command");
        let ctx = RunContext {
            tree: self,
            invocation: &invocation,
        };
        action.run(&ctx).map_err(|source| RouterError::Run {
            command_path: self.command_path(invocation.command),
            source,
        })?;
        Ok(invocation)
    }

    fn resolve_and_parse(&mut self, config: &RouterConfig, args: &[String]) -> Result<Invocation> {
        let Resolution {
            command,
            args: rest,
            called_as,
        } = if config.traverse_children {
            self.traverse(config, args)?
        } else {
            self.find(config, args)?
        };

        if let Some(message) = self.command(command).deprecation() {
            warn!("Command {:?} is deprecated, {}", self.name(command), message);
        }
        let parsed = self.parse_flags(command, &rest)?;
        Ok(Invocation {
            command,
            called_as,
            args: parsed.positional,
            dash_at: parsed.dash_at,
        })
    }

    fn validate(&self, invocation: &Invocation) -> Result<()> {
        let command = invocation.command;
        if let Some(validator) = self.command(command).args_validator() {
            validator.validate(self, command, &invocation.args)?;
        }
        validate_required_flags(self, command)?;
        validate_flag_groups(self, command)
    }
}

/// Fails when a required flag visible to `command` was not supplied.
///
/// Every missing flag is reported, sorted by name.
pub fn validate_required_flags(tree: &CommandTree, command: CommandId) -> Result<()> {
    let effective = effective_flags(tree, command);
    let missing: Vec<String> = effective
        .sorted_ids(tree.flag_arena())
        .into_iter()
        .map(|id| tree.flag(id))
        .filter(|flag| flag.is_required() && !flag.changed())
        .map(|flag| flag.name().to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RouterError::RequiredFlagsMissing(missing))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::args::ArgsValidator;
    use crate::command::{BoxError, Command, NoopAction};
    use crate::groups::GroupKind;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_execute_runs_action_with_parsed_flags() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut tree = CommandTree::new(
            Command::new("root").persistent_flag(Flag::string("region", "us")),
        )
        .unwrap();
        let root = tree.root();
        tree.add_command(
            root,
            Command::new("deploy").run(move |ctx: &RunContext<'_>| -> std::result::Result<(), BoxError> {
                assert_eq!(ctx.string("region"), Some("eu"));
                assert_eq!(ctx.args(), ["app"]);
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

        tree.execute(
            &RouterConfig::default(),
            &args(&["deploy", "--region", "eu", "app"]),
        )
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_topic_command_is_not_runnable() {
        let mut tree = CommandTree::new(Command::new("root")).unwrap();
        let root = tree.root();
        let topic = tree.add_command(root, Command::new("config")).unwrap();
        tree.add_command(topic, Command::new("get").run(NoopAction))
            .unwrap();
        let err = tree
            .execute(&RouterConfig::default(), &args(&["config"]))
            .unwrap_err();
        assert!(matches!(err, RouterError::NotRunnable(path) if path == "root config"));
    }

    #[test]
    fn test_required_flags_reported_sorted() {
        let mut tree = CommandTree::new(
            Command::new("root")
                .flag(Flag::string("zone", ""))
                .flag(Flag::string("account", ""))
                .run(NoopAction),
        )
        .unwrap();
        let root = tree.root();
        tree.mark_flag_required(root, "zone").unwrap();
        tree.mark_flag_required(root, "account").unwrap();

        let err = tree.execute(&RouterConfig::default(), &[]).unwrap_err();
        match err {
            RouterError::RequiredFlagsMissing(names) => assert_eq!(names, vec!["account", "zone"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mutually_exclusive_scenario() {
        let mut tree = CommandTree::new(
            Command::new("root")
                .flag(Flag::string("a", ""))
                .flag(Flag::string("b", ""))
                .run(NoopAction),
        )
        .unwrap();
        let root = tree.root();
        tree.mark_flags_mutually_exclusive(root, &["a", "b"]).unwrap();
        let config = RouterConfig::default();

        let err = tree.execute(&config, &args(&["--a=1", "--b=2"])).unwrap_err();
        match err {
            RouterError::FlagGroup { kind, flags, .. } => {
                assert_eq!(kind, GroupKind::MutuallyExclusive);
                assert_eq!(flags, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        tree.reset_flags();
        assert!(tree.execute(&config, &args(&["--a=1"])).is_ok());
    }

    #[test]
    fn test_args_validated_before_flag_requirements() {
        let mut tree = CommandTree::new(
            Command::new("root")
                .args(ArgsValidator::NoArgs)
                .flag(Flag::string("name", ""))
                .run(NoopAction),
        )
        .unwrap();
        let root = tree.root();
        tree.mark_flag_required(root, "name").unwrap();
        let err = tree
            .execute(&RouterConfig::default(), &args(&["extra"]))
            .unwrap_err();
        assert!(matches!(err, RouterError::UnknownCommand { .. }));
    }

    #[test]
    fn test_action_error_is_wrapped() {
        let mut tree = CommandTree::new(Command::new("root").run(
            |_ctx: &RunContext<'_>| -> std::result::Result<(), BoxError> { Err("boom".into()) },
        ))
        .unwrap();
        let err = tree.execute(&RouterConfig::default(), &[]).unwrap_err();
        assert_eq!(err.to_string(), "root: boom");
    }

    #[test]
    fn test_disabled_flag_parsing_keeps_everything_positional() {
        let mut tree = CommandTree::new(Command::new("root")).unwrap();
        let root = tree.root();
        tree.add_command(
            root,
            Command::new("exec").disable_flag_parsing().run(NoopAction),
        )
        .unwrap();
        let invocation = tree
            .prepare(&RouterConfig::default(), &args(&["exec", "--rm", "-it"]))
            .unwrap();
        assert_eq!(invocation.args, args(&["--rm", "-it"]));
    }

    #[test]
    fn test_whitelisted_unknown_flags_are_skipped() {
        let mut tree = CommandTree::new(
            Command::new("root").whitelist_unknown_flags().run(NoopAction),
        )
        .unwrap();
        let invocation = tree
            .prepare(&RouterConfig::default(), &args(&["--unknown", "a", "b"]))
            .unwrap();
        assert_eq!(invocation.args, args(&["b"]));
    }

    #[test]
    fn test_changed_state_persists_until_reset() {
        let mut tree = CommandTree::new(
            Command::new("root").flag(Flag::bool("verbose")).run(NoopAction),
        )
        .unwrap();
        let root = tree.root();
        let config = RouterConfig::default();
        tree.execute(&config, &args(&["--verbose"])).unwrap();
        let verbose = tree.find_flag(root, "verbose").unwrap();
        assert!(tree.flag(verbose).changed());
        tree.execute(&config, &[]).unwrap();
        assert!(tree.flag(verbose).changed());
        tree.reset_flags();
        assert!(!tree.flag(verbose).changed());
    }
}
