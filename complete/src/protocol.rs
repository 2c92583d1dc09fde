//! The hidden `__complete` request/response protocol.
//!
//! Generated scripts call the program back as
//! `prog __complete <args...> <partial>`. The response is one candidate per
//! line on stdout, `value` or `value<TAB>description`, followed by a final
//! `:<directive>` line. A human-readable note about the directive goes to
//! stderr. `__completeNoDesc` answers the same way without descriptions.
//!
//! # Examples
//!
//! ```
//! use command_router_core::{Command, CommandTree, NoopAction};
//! use command_router_complete::{Dispatcher, serve};
//!
//! let mut tree = CommandTree::new(Command::new("app")).unwrap();
//! let root = tree.root();
//! tree.add_command(root, Command::new("status").short("Show status").run(NoopAction))
//!     .unwrap();
//!
//! let argv = ["__complete", "st"].map(String::from);
//! let (mut out, mut err) = (Vec::new(), Vec::new());
//! serve(&Dispatcher::default(), &mut tree, &argv, &mut out, &mut err).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "status\tShow status\n:4\n");
//! ```

use std::io::Write;

use tracing::debug;

use command_router_core::{CommandTree, Completion, ShellCompDirective};

use crate::dispatch::Dispatcher;

/// Subcommand answering with descriptions.
pub const COMPLETE_CMD: &str = "__complete";

/// Subcommand answering without descriptions.
pub const COMPLETE_NO_DESC_CMD: &str = "__completeNoDesc";

/// Whether `word` is one of the hidden completion subcommands.
pub fn is_completion_request(word: &str) -> bool {
    word == COMPLETE_CMD || word == COMPLETE_NO_DESC_CMD
}

/// Writes a response: candidate lines, then `:<bits>` on `out`, then the
/// directive note on `err`.
///
/// A description keeps only its first line, trimmed, with tabs turned into
/// spaces so it cannot break the line format.
pub fn write_response(
    out: &mut dyn Write,
    err: &mut dyn Write,
    completions: &[Completion],
    directive: ShellCompDirective,
    with_descriptions: bool,
) -> std::io::Result<()> {
    for completion in completions {
        let value = completion.value.lines().next().unwrap_or_default();
        match completion.description.as_deref().map(clean_description) {
            Some(desc) if with_descriptions && !desc.is_empty() => {
                writeln!(out, "{value}\t{desc}")?;
            }
            _ => writeln!(out, "{value}")?,
        }
    }
    writeln!(out, ":{}", directive.bits())?;
    writeln!(err, "Completion ended with directive: {}", directive.describe())?;
    Ok(())
}

fn clean_description(raw: &str) -> String {
    raw.lines()
        .next()
        .unwrap_or_default()
        .trim()
        .replace('\t', " ")
}

/// Answers a completion request when `argv[0]` names a completion
/// subcommand.
///
/// Returns `None` without writing anything for ordinary invocations. Errors
/// while computing candidates are logged and answered with no candidates
/// and [`NO_FILE_COMP`](ShellCompDirective::NO_FILE_COMP); nothing but the
/// response reaches `out`.
pub fn serve(
    dispatcher: &Dispatcher,
    tree: &mut CommandTree,
    argv: &[String],
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> std::io::Result<Option<ShellCompDirective>> {
    let Some((first, rest)) = argv.split_first() else {
        return Ok(None);
    };
    if !is_completion_request(first) {
        return Ok(None);
    }
    let with_descriptions = first == COMPLETE_CMD;

    let (completions, directive) = match dispatcher.complete(tree, rest) {
        Ok(outcome) => (outcome.completions, outcome.directive),
        Err(error) => {
            debug!(%error, "completion failed");
            (Vec::new(), ShellCompDirective::NO_FILE_COMP)
        }
    };
    write_response(out, err, &completions, directive, with_descriptions)?;
    Ok(Some(directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(completions: &[Completion], directive: ShellCompDirective, desc: bool) -> (String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_response(&mut out, &mut err, completions, directive, desc).unwrap();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn test_descriptions_are_cleaned() {
        let completions = [
            Completion::with_description("a", "first\tline\nsecond line"),
            Completion::new("b"),
        ];
        let (out, err) = render(&completions, ShellCompDirective::NO_FILE_COMP, true);
        assert_eq!(out, "a\tfirst line\nb\n:4\n");
        assert_eq!(err, "Completion ended with directive: ShellCompDirectiveNoFileComp\n");
    }

    #[test]
    fn test_no_desc_variant_strips_descriptions() {
        let completions = [Completion::with_description("a", "first")];
        let directive = ShellCompDirective::NO_SPACE | ShellCompDirective::NO_FILE_COMP;
        let (out, err) = render(&completions, directive, false);
        assert_eq!(out, "a\n:6\n");
        assert!(err.contains("ShellCompDirectiveNoSpace, ShellCompDirectiveNoFileComp"));
    }

    #[test]
    fn test_empty_default_response() {
        let (out, err) = render(&[], ShellCompDirective::DEFAULT, true);
        assert_eq!(out, ":0\n");
        assert!(err.ends_with("ShellCompDirectiveDefault\n"));
    }

    #[test]
    fn test_ordinary_invocation_is_not_served() {
        let mut tree = CommandTree::new(command_router_core::Command::new("app")).unwrap();
        let mut out = Vec::new();
        let served = serve(
            &Dispatcher::default(),
            &mut tree,
            &["run".to_string()],
            &mut out,
            &mut std::io::sink(),
        )
        .unwrap();
        assert_eq!(served, None);
        assert!(out.is_empty());
    }
}
