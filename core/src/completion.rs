//! Completion candidates and the completer capability.

use crate::command::CommandId;
use crate::directive::ShellCompDirective;
use crate::tree::CommandTree;

/// Prefix marking a candidate as an Active Help hint rather than a value.
pub const ACTIVE_HELP_MARKER: &str = "_activeHelp_ ";

/// A completion candidate with an optional description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Completion {
    pub value: String,
    pub description: Option<String>,
}

impl Completion {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: None,
        }
    }

    /// A candidate shown with a description; an empty one is dropped.
    pub fn with_description(value: impl Into<String>, description: &str) -> Self {
        Self {
            value: value.into(),
            description: (!description.is_empty()).then(|| description.to_string()),
        }
    }

    /// Parses `value\tdescription` as used by valid-args lists.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('\t') {
            Some((value, desc)) => Self::with_description(value, desc),
            None => Self::new(raw),
        }
    }

    /// An Active Help hint line.
    pub fn active_help(message: &str) -> Self {
        Self::new(format!("{ACTIVE_HELP_MARKER}{message}"))
    }

    pub fn is_active_help(&self) -> bool {
        self.value.starts_with(ACTIVE_HELP_MARKER)
    }
}

/// Context handed to a [`Completer`].
#[derive(Debug)]
pub struct CompletionRequest<'a> {
    pub tree: &'a CommandTree,
    /// The command being completed for.
    pub command: CommandId,
    /// Positional arguments already on the command line.
    pub args: &'a [String],
    /// The partial word under the cursor.
    pub to_complete: &'a str,
    /// Program-specific Active Help configuration, passed through verbatim.
    pub active_help_config: &'a str,
}

/// Produces completion candidates for a command's arguments or a flag value.
pub trait Completer: Send + Sync {
    fn complete(&self, request: &CompletionRequest<'_>) -> (Vec<Completion>, ShellCompDirective);

    /// Candidates known without running anything, for script generators
    /// that bake completions in at generation time.
    fn static_candidates(&self) -> Option<&[Completion]> {
        None
    }
}

impl<F> Completer for F
where
    F: Fn(&CompletionRequest<'_>) -> (Vec<Completion>, ShellCompDirective) + Send + Sync,
{
    fn complete(&self, request: &CompletionRequest<'_>) -> (Vec<Completion>, ShellCompDirective) {
        self(request)
    }
}

/// A fixed candidate list filtered by the typed prefix.
#[derive(Debug, Clone, Default)]
pub struct StaticCompleter {
    candidates: Vec<Completion>,
    directive: ShellCompDirective,
}

impl StaticCompleter {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            candidates: values
                .into_iter()
                .map(|v| Completion::parse(v.as_ref()))
                .collect(),
            directive: ShellCompDirective::NO_FILE_COMP,
        }
    }

    pub fn with_directive(mut self, directive: ShellCompDirective) -> Self {
        self.directive = directive;
        self
    }
}

impl Completer for StaticCompleter {
    fn complete(&self, request: &CompletionRequest<'_>) -> (Vec<Completion>, ShellCompDirective) {
        let matches = self
            .candidates
            .iter()
            .filter(|c| c.value.starts_with(request.to_complete))
            .cloned()
            .collect();
        (matches, self.directive)
    }

    fn static_candidates(&self) -> Option<&[Completion]> {
        Some(&self.candidates)
    }
}

/// Convenience completer that offers nothing and disables file completion.
pub fn no_file_completions(_request: &CompletionRequest<'_>) -> (Vec<Completion>, ShellCompDirective) {
    (Vec::new(), ShellCompDirective::NO_FILE_COMP)
}
