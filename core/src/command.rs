//! Command node definitions.
//!
//! A [`Command`] is built with chained setters and then moved into a
//! [`CommandTree`](crate::CommandTree), which assigns it a [`CommandId`] and
//! owns its flags. Behaviour is attached through small capability traits
//! ([`Runnable`], [`ArgValidator`](crate::ArgValidator),
//! [`Completer`](crate::Completer)) so callers can ask "does this node have a
//! completer?" without poking at closures.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::args::ArgsValidator;
use crate::completion::Completer;
use crate::directive::ShellCompDirective;
use crate::execute::RunContext;
use crate::flag::Flag;

/// Index of a command in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) usize);

/// Boxed error returned by command actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The action of a runnable command.
pub trait Runnable: Send + Sync {
    fn run(&self, ctx: &RunContext<'_>) -> Result<(), BoxError>;
}

impl<F> Runnable for F
where
    F: Fn(&RunContext<'_>) -> Result<(), BoxError> + Send + Sync,
{
    fn run(&self, ctx: &RunContext<'_>) -> Result<(), BoxError> {
        self(ctx)
    }
}

/// Action that does nothing; marks a command runnable without behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAction;

impl Runnable for NoopAction {
    fn run(&self, _ctx: &RunContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A node in the command tree.
///
/// # Examples
///
/// ```
/// use command_router_core::{ArgsValidator, Command, NoopAction};
///
/// let echo = Command::new("echo [text...]")
///     .alias("say")
///     .short("Print text")
///     .args(ArgsValidator::MinimumN(1))
///     .run(NoopAction);
/// assert_eq!(echo.name(), "echo");
/// assert!(echo.has_alias("say"));
/// assert!(echo.is_runnable());
/// ```
#[derive(Clone, Default)]
pub struct Command {
    use_line: String,
    aliases: Vec<String>,
    short: String,
    hidden: bool,
    deprecated: Option<String>,
    suggest_for: Vec<String>,
    args: Option<ArgsValidator>,
    valid_args: Vec<String>,
    arg_aliases: Vec<String>,
    repeatable_args: bool,
    valid_args_completer: Option<Arc<dyn Completer>>,
    runnable: Option<Arc<dyn Runnable>>,
    disable_flag_parsing: bool,
    unknown_flags_whitelisted: bool,
    default_directive: Option<ShellCompDirective>,
    annotations: BTreeMap<String, String>,
    pub(crate) pending_flags: Vec<Flag>,
    pub(crate) pending_persistent_flags: Vec<Flag>,
}

impl Command {
    /// Creates a command from its use line; the name is the first word.
    pub fn new(use_line: &str) -> Self {
        Self {
            use_line: use_line.to_string(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn short(mut self, short: &str) -> Self {
        self.short = short.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deprecated(mut self, message: &str) -> Self {
        self.deprecated = Some(message.to_string());
        self
    }

    /// Extra words this command is suggested for on "unknown command".
    pub fn suggest_for(mut self, word: &str) -> Self {
        self.suggest_for.push(word.to_string());
        self
    }

    pub fn args(mut self, validator: ArgsValidator) -> Self {
        self.args = Some(validator);
        self
    }

    /// Static positional candidates; `value\tdescription` entries keep a
    /// description for completion.
    pub fn valid_args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Accepted by `OnlyValidArgs` but never offered as completions.
    pub fn arg_aliases<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg_aliases.extend(values.into_iter().map(Into::into));
        self
    }

    /// Allows valid args to be completed again after being supplied.
    pub fn repeatable_args(mut self) -> Self {
        self.repeatable_args = true;
        self
    }

    pub fn valid_args_completer(mut self, completer: impl Completer + 'static) -> Self {
        self.valid_args_completer = Some(Arc::new(completer));
        self
    }

    pub fn run(mut self, action: impl Runnable + 'static) -> Self {
        self.runnable = Some(Arc::new(action));
        self
    }

    pub fn disable_flag_parsing(mut self) -> Self {
        self.disable_flag_parsing = true;
        self
    }

    /// Tolerates unknown flags instead of failing the parse.
    pub fn whitelist_unknown_flags(mut self) -> Self {
        self.unknown_flags_whitelisted = true;
        self
    }

    /// Directive used for command-level completions of this subtree.
    pub fn default_directive(mut self, directive: ShellCompDirective) -> Self {
        self.default_directive = Some(directive);
        self
    }

    pub fn annotate(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    /// Queues a local flag; it is moved into the arena on insertion.
    pub fn flag(mut self, flag: Flag) -> Self {
        self.pending_flags.push(flag);
        self
    }

    /// Queues a persistent flag visible to every descendant.
    pub fn persistent_flag(mut self, flag: Flag) -> Self {
        self.pending_persistent_flags.push(flag);
        self
    }

    pub fn name(&self) -> &str {
        self.use_line.split_whitespace().next().unwrap_or_default()
    }

    pub fn use_line(&self) -> &str {
        &self.use_line
    }

    pub fn alias_list(&self) -> &[String] {
        &self.aliases
    }

    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a == name)
    }

    pub fn short_description(&self) -> &str {
        &self.short
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn suggest_for_list(&self) -> &[String] {
        &self.suggest_for
    }

    pub fn args_validator(&self) -> Option<&ArgsValidator> {
        self.args.as_ref()
    }

    pub fn valid_arg_list(&self) -> &[String] {
        &self.valid_args
    }

    /// Valid args with any `\tdescription` suffix removed.
    pub fn valid_arg_values(&self) -> impl Iterator<Item = &str> {
        self.valid_args
            .iter()
            .map(|v| v.split('\t').next().unwrap_or_default())
    }

    pub fn arg_alias_list(&self) -> &[String] {
        &self.arg_aliases
    }

    pub fn has_repeatable_args(&self) -> bool {
        self.repeatable_args
    }

    pub fn valid_args_function(&self) -> Option<&Arc<dyn Completer>> {
        self.valid_args_completer.as_ref()
    }

    pub fn runnable(&self) -> Option<&Arc<dyn Runnable>> {
        self.runnable.as_ref()
    }

    /// Non-runnable commands are topic nodes that only group subcommands.
    pub fn is_runnable(&self) -> bool {
        self.runnable.is_some()
    }

    pub fn flag_parsing_disabled(&self) -> bool {
        self.disable_flag_parsing
    }

    pub fn unknown_flags_whitelisted(&self) -> bool {
        self.unknown_flags_whitelisted
    }

    pub fn default_completion_directive(&self) -> Option<ShellCompDirective> {
        self.default_directive
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("use_line", &self.use_line)
            .field("aliases", &self.aliases)
            .field("hidden", &self.hidden)
            .field("deprecated", &self.deprecated)
            .field("args", &self.args)
            .field("valid_args", &self.valid_args)
            .field("runnable", &self.runnable.is_some())
            .field("has_completer", &self.valid_args_completer.is_some())
            .finish()
    }
}
