//! Fish script with the command tree baked in.
//!
//! Every visible command contributes `complete` entries guarded by
//! `__<prog>_using_command <path>`, which walks the words typed so far the
//! way the resolver does: flags are skipped, along with the value of a flag
//! that takes one, and the walk stops at the first word that is not a
//! subcommand.

use std::collections::BTreeSet;
use std::io::Write;

use tracing::debug;

use command_router_core::{
    ANNOTATION_CUSTOM, ANNOTATION_FILENAME_EXT, ANNOTATION_SUBDIRS_IN_DIR, CommandId,
    CommandTree, Completion, FlagId,
};

use crate::error::Result;
use crate::naming::{check_program, fish_quote, function_name, one_line, render, visible_flags};
use crate::{Shell, ShellGenerator};

const PREAMBLE: &str = r##"# fish completion for @PROG@                              -*- shell-script -*-

function __@FUNC@_debug
    set -l file "$BASH_COMP_DEBUG_FILE"
    if test -n "$file"
        echo "$argv" >> $file
    end
end

function __@FUNC@_command_path
    set -l tokens (commandline -opc)
    set -e tokens[1]
    set -l path ""
    set -l skip 0
    for token in $tokens
        if test $skip -eq 1
            set skip 0
            continue
        end
        if string match -q -- '-*' $token
            if __@FUNC@_takes_value $token
                set skip 1
            end
            continue
        end
        set -l next (__@FUNC@_child "$path" $token)
        if test -z "$next"
            break
        end
        set path (string trim -- "$path $next")
    end
    __@FUNC@_debug "command path: $path"
    echo $path
end

function __@FUNC@_using_command
    set -l current (__@FUNC@_command_path)
    test "$current" = "$argv"
end

# $argv[1], when given, is the directory to list.
function __@FUNC@_subdirs
    set -l token (commandline -ct)
    if test -n "$argv[1]"
        pushd $argv[1]; or return
        __fish_complete_directories $token
        popd
    else
        __fish_complete_directories $token
    end
end

complete -c @PROG@ -e

"##;

/// Fish generator that embeds the tree.
#[derive(Debug, Clone, Copy)]
pub struct Fish {
    with_descriptions: bool,
}

impl Fish {
    pub fn new(with_descriptions: bool) -> Self {
        Self { with_descriptions }
    }

    fn description(&self, text: &str) -> String {
        let text = one_line(text);
        if self.with_descriptions && !text.is_empty() {
            format!(" -d {}", fish_quote(text))
        } else {
            String::new()
        }
    }

    /// `__<prog>_child PARENT WORD`: canonical child name for a typed name
    /// or alias under the parent path.
    fn write_child_lookup(
        &self,
        tree: &CommandTree,
        commands: &[CommandId],
        func: &str,
        out: &mut dyn Write,
    ) -> Result<()> {
        writeln!(out, "function __{func}_child\n    switch \"$argv[1]|$argv[2]\"")?;
        for &id in commands {
            for &child in tree.children(id) {
                if !tree.is_available(child) {
                    continue;
                }
                let cmd = tree.command(child);
                let parent = path_below_root(tree, id);
                let keys: Vec<String> = std::iter::once(cmd.name())
                    .chain(cmd.alias_list().iter().map(String::as_str))
                    .map(|word| fish_quote(&format!("{parent}|{word}")))
                    .collect();
                writeln!(out, "        case {}", keys.join(" "))?;
                writeln!(out, "            echo {}", fish_quote(cmd.name()))?;
            }
        }
        writeln!(out, "    end\nend\n")?;
        Ok(())
    }

    fn write_takes_value(
        &self,
        tree: &CommandTree,
        commands: &[CommandId],
        func: &str,
        out: &mut dyn Write,
    ) -> Result<()> {
        let mut spellings = BTreeSet::new();
        for &id in commands {
            for flag_id in visible_flags(tree, id) {
                let flag = tree.flag(flag_id);
                if flag.no_opt_default().is_some() {
                    continue;
                }
                spellings.insert(format!("--{}", flag.name()));
                if let Some(c) = flag.shorthand_char() {
                    spellings.insert(format!("-{c}"));
                }
            }
        }
        writeln!(out, "function __{func}_takes_value")?;
        if !spellings.is_empty() {
            let quoted: Vec<String> = spellings.iter().map(|s| fish_quote(s)).collect();
            writeln!(out, "    switch $argv[1]")?;
            writeln!(out, "        case {}", quoted.join(" "))?;
            writeln!(out, "            return 0\n    end")?;
        }
        writeln!(out, "    return 1\nend\n")?;
        Ok(())
    }

    fn write_command(
        &self,
        tree: &CommandTree,
        id: CommandId,
        program: &str,
        func: &str,
        out: &mut dyn Write,
    ) -> Result<()> {
        let cmd = tree.command(id);
        let condition = fish_quote(
            format!("__{func}_using_command {}", path_below_root(tree, id)).trim_end(),
        );
        writeln!(out, "# {}", tree.command_path(id))?;

        let children: Vec<CommandId> = tree
            .children(id)
            .iter()
            .copied()
            .filter(|c| tree.is_available(*c))
            .collect();
        let mut values: Vec<Completion> =
            cmd.valid_arg_list().iter().map(|raw| Completion::parse(raw)).collect();
        if let Some(candidates) = cmd.valid_args_function().and_then(|c| c.static_candidates()) {
            values.extend(candidates.iter().cloned());
        }
        if !children.is_empty() || !values.is_empty() {
            writeln!(out, "complete -c {program} -n {condition} -f")?;
        }

        for child in children {
            let child_cmd = tree.command(child);
            writeln!(
                out,
                "complete -c {program} -n {condition} -f -a {}{}",
                fish_quote(child_cmd.name()),
                self.description(child_cmd.short_description())
            )?;
        }

        for flag_id in visible_flags(tree, id) {
            let flag = tree.flag(flag_id);
            let mut line = format!("complete -c {program} -n {condition} -l {}", flag.name());
            if let Some(c) = flag.shorthand_char() {
                line.push_str(&format!(" -s {c}"));
            }
            line.push_str(&self.description(flag.usage_text()));
            if flag.no_opt_default().is_none() {
                line.push_str(" -r");
                line.push_str(&value_source(tree, flag_id, func));
            }
            writeln!(out, "{line}")?;
        }

        for value in values {
            let desc = value.description.as_deref().unwrap_or_default();
            writeln!(
                out,
                "complete -c {program} -n {condition} -f -a {}{}",
                fish_quote(&value.value),
                self.description(desc)
            )?;
        }
        writeln!(out)?;
        Ok(())
    }
}

/// Names from below the root down to `id`, space separated.
fn path_below_root(tree: &CommandTree, id: CommandId) -> String {
    let mut names: Vec<&str> = tree
        .ancestors(id)
        .take_while(|a| *a != tree.root())
        .map(|a| tree.name(a))
        .collect();
    names.reverse();
    names.join(" ")
}

/// Options naming where a flag's value comes from; empty means files.
fn value_source(tree: &CommandTree, id: FlagId, func: &str) -> String {
    let flag = tree.flag(id);
    if let Some(candidates) = tree.flag_completer(id).and_then(|c| c.static_candidates()) {
        let words: Vec<&str> = candidates.iter().map(|c| c.value.as_str()).collect();
        return format!(" -f -a {}", fish_quote(&words.join(" ")));
    }
    if let Some(exts) = flag.annotation(ANNOTATION_FILENAME_EXT).filter(|e| !e.is_empty()) {
        let calls: Vec<String> = exts
            .iter()
            .map(|ext| format!("__fish_complete_suffix .{ext}"))
            .collect();
        return format!(" -f -a {}", fish_quote(&format!("({})", calls.join("; "))));
    }
    if let Some(dirs) = flag.annotation(ANNOTATION_SUBDIRS_IN_DIR) {
        let call = match dirs.first() {
            Some(dir) => format!("(__{func}_subdirs {})", fish_quote(dir)),
            None => format!("(__{func}_subdirs)"),
        };
        return format!(" -f -a {}", fish_quote(&call));
    }
    if let Some(function) = flag.annotation(ANNOTATION_CUSTOM).and_then(|f| f.first()) {
        return format!(" -f -a {}", fish_quote(&format!("({function})")));
    }
    String::new()
}

impl ShellGenerator for Fish {
    fn shell(&self) -> Shell {
        Shell::Fish
    }

    fn generate(&self, tree: &CommandTree, out: &mut dyn Write) -> Result<()> {
        let program = tree.name(tree.root());
        check_program(program)?;
        let func = function_name(program);
        debug!(program, "generating fish script");

        let root = tree.root();
        let commands: Vec<CommandId> = tree
            .walk(root)
            .into_iter()
            .filter(|id| {
                tree.ancestors(*id)
                    .all(|a| a == root || tree.is_available(a))
            })
            .collect();

        out.write_all(render(PREAMBLE, program, "").as_bytes())?;
        self.write_child_lookup(tree, &commands, &func, out)?;
        self.write_takes_value(tree, &commands, &func, out)?;
        for &id in &commands {
            self.write_command(tree, id, program, &func, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use command_router_core::{Command, Flag, NoopAction, StaticCompleter};

    use super::*;

    fn tree() -> CommandTree {
        let mut tree = CommandTree::new(
            Command::new("app").persistent_flag(
                Flag::string("output", "")
                    .shorthand('o')
                    .usage("Output format, e.g. 'json'"),
            ),
        )
        .unwrap();
        let root = tree.root();
        let get = tree
            .add_command(
                root,
                Command::new("get")
                    .alias("g")
                    .short("Display resources")
                    .valid_args(["pods\tPod resources", "nodes"])
                    .flag(Flag::bool("watch").shorthand('w'))
                    .flag(Flag::string("selector", ""))
                    .run(NoopAction),
            )
            .unwrap();
        tree.add_command(root, Command::new("old").deprecated("gone").run(NoopAction))
            .unwrap();
        tree.mark_flag_required(get, "selector").unwrap();
        tree.register_flag_completion(root, "output", StaticCompleter::new(["json", "yaml"]))
            .unwrap();
        tree
    }

    fn script(with_descriptions: bool) -> String {
        let mut out = Vec::new();
        Fish::new(with_descriptions).generate(&tree(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_child_lookup_includes_aliases() {
        let out = script(true);
        assert!(out.contains("        case '|get' '|g'\n            echo 'get'"));
        assert!(!out.contains("'|old'"));
    }

    #[test]
    fn test_value_flags_are_skipped_when_walking() {
        let out = script(true);
        assert!(out.contains("        case '--output' '--selector' '-o'\n            return 0"));
    }

    #[test]
    fn test_entries_with_descriptions() {
        let out = script(true);
        assert!(out.contains(
            "complete -c app -n '__app_using_command' -f -a 'get' -d 'Display resources'"
        ));
        assert!(out.contains(
            r"complete -c app -n '__app_using_command' -l output -s o -d 'Output format, e.g. \'json\'' -r -f -a 'json yaml'"
        ));
        assert!(out.contains(
            "complete -c app -n '__app_using_command get' -f -a 'pods' -d 'Pod resources'"
        ));
    }

    #[test]
    fn test_subdirs_directory_is_quoted() {
        let mut tree = CommandTree::new(
            Command::new("app")
                .flag(Flag::string("chart", ""))
                .run(NoopAction),
        )
        .unwrap();
        let root = tree.root();
        tree.mark_flag_subdirs_in(root, "chart", "my charts; rm").unwrap();
        let mut out = Vec::new();
        Fish::new(false).generate(&tree, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(
            r"-l chart -r -f -a '(__app_subdirs \'my charts; rm\')'"
        ));
    }

    #[test]
    fn test_required_flags_first_and_no_descriptions() {
        let out = script(false);
        let selector = out
            .find("complete -c app -n '__app_using_command get' -l selector -r")
            .unwrap();
        let watch = out
            .find("complete -c app -n '__app_using_command get' -l watch -s w\n")
            .unwrap();
        assert!(selector < watch);
        assert!(!out.contains(" -d "));
        assert!(!out.contains("'old'"));
    }
}
