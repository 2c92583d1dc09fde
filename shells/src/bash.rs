//! Bash script with the command tree baked in.
//!
//! Works with bash 3.2. Each visible command becomes a shell function that
//! fills the arrays the driver walks: `commands`, `flags`,
//! `two_word_flags`, `flags_with_completion`/`flags_completion`,
//! `must_have_one_flag`, `must_have_one_noun` and `noun_aliases`.
//! In-process completers are only visible when they expose fixed candidates;
//! anything else falls back to a user-defined `__<prog>_custom_func`.

use std::io::Write;

use tracing::debug;

use command_router_core::{
    ANNOTATION_CUSTOM, ANNOTATION_FILENAME_EXT, ANNOTATION_SUBDIRS_IN_DIR, CommandId,
    CommandTree, FlagId, local_non_persistent_flags,
};

use crate::error::Result;
use crate::naming::{check_program, function_name, one_line, render, sh_quote, visible_flags};
use crate::{Shell, ShellGenerator};

const PREAMBLE: &str = r##"# bash completion for @PROG@                              -*- shell-script -*-

__@FUNC@_debug()
{
    if [[ -n ${BASH_COMP_DEBUG_FILE-} ]]; then
        echo "$*" >> "${BASH_COMP_DEBUG_FILE}"
    fi
}

__@FUNC@_init_completion()
{
    COMPREPLY=()
    if declare -F _get_comp_words_by_ref >/dev/null 2>&1; then
        _get_comp_words_by_ref "$@" cur prev words cword
        return
    fi
    words=("${COMP_WORDS[@]}")
    cword=${COMP_CWORD}
    cur=${COMP_WORDS[COMP_CWORD]}
    prev=${COMP_WORDS[COMP_CWORD-1]}
}

__@FUNC@_has_assoc_arrays()
{
    [[ -z ${BASH_VERSION:-} || ${BASH_VERSINFO[0]:-} -gt 3 ]]
}

__@FUNC@_index_of_word()
{
    local w word=$1
    shift
    index=0
    for w in "$@"; do
        [[ $w = "$word" ]] && return
        index=$((index+1))
    done
    index=-1
}

__@FUNC@_contains_word()
{
    local w word=$1
    shift
    for w in "$@"; do
        [[ $w = "$word" ]] && return
    done
    return 1
}

__@FUNC@_add_words()
{
    local comp
    while IFS='' read -r comp; do
        COMPREPLY+=("$comp")
    done < <(compgen -W "$*" -- "$cur")
}

__@FUNC@_handle_reply()
{
    __@FUNC@_debug "${FUNCNAME[0]}"
    local index flag
    case $cur in
        -*)
            if [[ $(type -t compopt) = "builtin" ]]; then
                compopt -o nospace
            fi
            local allflags
            if [ ${#must_have_one_flag[@]} -ne 0 ]; then
                allflags=("${must_have_one_flag[@]}")
            else
                allflags=("${flags[*]} ${two_word_flags[*]}")
            fi
            __@FUNC@_add_words "${allflags[*]}"
            if [[ $(type -t compopt) = "builtin" ]]; then
                [[ "${COMPREPLY[0]}" == *= ]] || compopt +o nospace
            fi

            # --flag=partial completes the value.
            if [[ $cur == *=* ]]; then
                if [[ $(type -t compopt) = "builtin" ]]; then
                    compopt +o nospace
                fi
                flag="${cur%=*}"
                __@FUNC@_index_of_word "${flag}" "${flags_with_completion[@]}"
                COMPREPLY=()
                if [[ ${index} -ge 0 ]]; then
                    cur="${cur#*=}"
                    ${flags_completion[${index}]}
                fi
            fi

            if [[ -z ${flag_parsing_disabled} ]]; then
                return 0
            fi
            ;;
    esac

    __@FUNC@_index_of_word "${prev}" "${flags_with_completion[@]}"
    if [[ ${index} -ge 0 ]]; then
        ${flags_completion[${index}]}
        return
    fi

    # A value for a flag without a handler.
    if [[ ${cur} != "${words[cword]}" ]]; then
        return
    fi

    local completions
    completions=("${commands[@]}")
    if [[ ${#must_have_one_noun[@]} -ne 0 ]]; then
        completions+=("${must_have_one_noun[@]}")
    fi
    if [[ ${#must_have_one_flag[@]} -ne 0 ]]; then
        completions+=("${must_have_one_flag[@]}")
    fi
    __@FUNC@_add_words "${completions[*]}"

    if [[ ${#COMPREPLY[@]} -eq 0 && ${#noun_aliases[@]} -gt 0 && ${#must_have_one_noun[@]} -ne 0 ]]; then
        __@FUNC@_add_words "${noun_aliases[*]}"
    fi

    if [[ ${#COMPREPLY[@]} -eq 0 ]]; then
        if declare -F __@FUNC@_custom_func >/dev/null; then
            __@FUNC@_custom_func
        fi
    fi

    if declare -F __ltrim_colon_completions >/dev/null; then
        __ltrim_colon_completions "$cur"
    fi

    if [[ ${#COMPREPLY[@]} -eq 1 ]] && [[ $(type -t compopt) = "builtin" ]] && [[ "${COMPREPLY[0]}" == --*= ]]; then
        compopt -o nospace
    fi
}

# $1 is "ext1|ext2|..."
__@FUNC@_handle_filename_extension_flag()
{
    local ext="$1"
    if declare -F _filedir >/dev/null 2>&1; then
        _filedir "@(${ext})"
        return
    fi
    local comp e
    local IFS='|'
    for e in ${ext}; do
        while IFS='' read -r comp; do
            COMPREPLY+=("$comp")
        done < <(compgen -f -X "!*.${e}" -- "$cur")
    done
    unset IFS
    while IFS='' read -r comp; do
        COMPREPLY+=("$comp")
    done < <(compgen -d -- "$cur")
}

# $1, when given, is the directory to list.
__@FUNC@_handle_subdirs_in_dir_flag()
{
    local dir="$1"
    if [[ -n ${dir} ]]; then
        pushd "${dir}" >/dev/null 2>&1 || return
    fi
    if declare -F _filedir >/dev/null 2>&1; then
        _filedir -d
    else
        local comp
        while IFS='' read -r comp; do
            COMPREPLY+=("$comp")
        done < <(compgen -d -- "$cur")
    fi
    if [[ -n ${dir} ]]; then
        popd >/dev/null 2>&1 || return
    fi
}

__@FUNC@_handle_flag()
{
    __@FUNC@_debug "${FUNCNAME[0]}: c is $c words[c] is ${words[c]}"

    local flagname=${words[c]}
    local flagvalue=""
    if [[ ${words[c]} == *"="* ]]; then
        flagvalue=${flagname#*=}
        flagname=${flagname%=*}
    fi

    if __@FUNC@_contains_word "${flagname}" "${must_have_one_flag[@]}" ||
        __@FUNC@_contains_word "${flagname}=" "${must_have_one_flag[@]}"; then
        must_have_one_flag=()
    fi

    # A flag only this command knows means no subcommand follows.
    if __@FUNC@_contains_word "${flagname}" "${local_nonpersistent_flags[@]}"; then
        commands=()
    fi

    if __@FUNC@_has_assoc_arrays; then
        if [ -n "${flagvalue}" ]; then
            flaghash[${flagname}]=${flagvalue}
        elif [ -n "${words[ $((c+1)) ]}" ]; then
            flaghash[${flagname}]=${words[ $((c+1)) ]}
        else
            flaghash[${flagname}]="true"
        fi
    fi

    if [[ ${words[c]} != *"="* ]] && __@FUNC@_contains_word "${words[c]}" "${two_word_flags[@]}"; then
        __@FUNC@_debug "${FUNCNAME[0]}: found a flag ${words[c]}, skip the next argument"
        c=$((c+1))
        if [[ $c -eq $cword ]]; then
            commands=()
        fi
    fi

    c=$((c+1))
}

__@FUNC@_handle_noun()
{
    __@FUNC@_debug "${FUNCNAME[0]}: c is $c words[c] is ${words[c]}"

    if __@FUNC@_contains_word "${words[c]}" "${must_have_one_noun[@]}"; then
        must_have_one_noun=()
    elif __@FUNC@_contains_word "${words[c]}" "${noun_aliases[@]}"; then
        must_have_one_noun=()
    fi

    nouns+=("${words[c]}")
    c=$((c+1))
}

__@FUNC@_handle_command()
{
    __@FUNC@_debug "${FUNCNAME[0]}: c is $c words[c] is ${words[c]}"

    local next_command
    if [[ -n ${last_command} ]]; then
        next_command="${last_command}_${words[c]//[-:.]/_}"
    else
        next_command="_@FUNC@_root_command"
    fi
    c=$((c+1))
    __@FUNC@_debug "${FUNCNAME[0]}: looking for ${next_command}"
    declare -F "$next_command" >/dev/null && $next_command
}

__@FUNC@_handle_word()
{
    if [[ $c -ge $cword ]]; then
        __@FUNC@_handle_reply
        return
    fi
    __@FUNC@_debug "${FUNCNAME[0]}: c is $c words[c] is ${words[c]}"
    if [[ -z ${flag_parsing_disabled} && ${words[c]} == -* ]]; then
        __@FUNC@_handle_flag
    elif [[ $c -eq 0 ]]; then
        __@FUNC@_handle_command
    elif __@FUNC@_contains_word "${words[c]}" "${commands[@]}"; then
        __@FUNC@_handle_command
    elif __@FUNC@_has_assoc_arrays && __@FUNC@_contains_word "${words[c]}" "${command_aliases[@]}"; then
        words[c]=${aliashash[${words[c]}]}
        __@FUNC@_handle_command
    else
        __@FUNC@_handle_noun
    fi
    __@FUNC@_handle_word
}

"##;

const POSTAMBLE: &str = r##"__start_@FUNC@()
{
    local cur prev words cword split
    declare -A flaghash 2>/dev/null || :
    declare -A aliashash 2>/dev/null || :
    if declare -F _init_completion >/dev/null 2>&1; then
        _init_completion -s || return
    else
        __@FUNC@_init_completion -n "=" || return
    fi

    local c=0
    local flag_parsing_disabled=
    local flags=()
    local two_word_flags=()
    local local_nonpersistent_flags=()
    local flags_with_completion=()
    local flags_completion=()
    local commands=("@PROG@")
    local command_aliases=()
    local must_have_one_flag=()
    local must_have_one_noun=()
    local noun_aliases=()
    local last_command=""
    local nouns=()

    __@FUNC@_handle_word
}

if [[ $(type -t compopt) = "builtin" ]]; then
    complete -o default -F __start_@FUNC@ @PROG@
else
    complete -o default -o nospace -F __start_@FUNC@ @PROG@
fi

# ex: ts=4 sw=4 et filetype=sh
"##;

/// Bash generator that embeds the tree (bash 3.2+).
#[derive(Debug, Clone, Copy)]
pub struct BashV1 {
    with_descriptions: bool,
}

impl BashV1 {
    /// With descriptions, each command function is preceded by a comment
    /// carrying the command's short description.
    pub fn new(with_descriptions: bool) -> Self {
        Self { with_descriptions }
    }

    fn write_command(
        &self,
        tree: &CommandTree,
        id: CommandId,
        func: &str,
        out: &mut dyn Write,
    ) -> Result<()> {
        let cmd = tree.command(id);
        let name = command_function(tree, id, func);
        let prefix = if id == tree.root() {
            format!("_{func}")
        } else {
            name.clone()
        };

        if self.with_descriptions {
            let short = one_line(cmd.short_description());
            if !short.is_empty() {
                writeln!(out, "# {}: {short}", tree.command_path(id))?;
            }
        }
        writeln!(out, "{name}()\n{{")?;
        writeln!(out, "    last_command={}", sh_quote(&prefix))?;
        if cmd.flag_parsing_disabled() {
            writeln!(out, "    flag_parsing_disabled=1")?;
        }

        writeln!(out, "\n    command_aliases=()\n\n    commands=()")?;
        for child in tree.children(id) {
            if !tree.is_available(*child) {
                continue;
            }
            let child_cmd = tree.command(*child);
            writeln!(out, "    commands+=({})", sh_quote(child_cmd.name()))?;
            if child_cmd.alias_list().is_empty() {
                continue;
            }
            writeln!(out, "    if __{func}_has_assoc_arrays; then")?;
            for alias in child_cmd.alias_list() {
                writeln!(out, "        command_aliases+=({})", sh_quote(alias))?;
                writeln!(
                    out,
                    "        aliashash[{}]={}",
                    sh_quote(alias),
                    sh_quote(child_cmd.name())
                )?;
            }
            writeln!(out, "    fi")?;
        }

        self.write_flags(tree, id, func, out)?;

        writeln!(out, "    must_have_one_noun=()")?;
        let mut nouns: Vec<String> = cmd.valid_arg_values().map(str::to_string).collect();
        if let Some(candidates) = cmd.valid_args_function().and_then(|c| c.static_candidates()) {
            nouns.extend(candidates.iter().map(|c| c.value.clone()));
        }
        for noun in &nouns {
            writeln!(out, "    must_have_one_noun+=({})", sh_quote(noun))?;
        }
        writeln!(out, "    noun_aliases=()")?;
        for alias in cmd.arg_alias_list() {
            writeln!(out, "    noun_aliases+=({})", sh_quote(alias))?;
        }
        writeln!(out, "}}\n")?;
        Ok(())
    }

    fn write_flags(
        &self,
        tree: &CommandTree,
        id: CommandId,
        func: &str,
        out: &mut dyn Write,
    ) -> Result<()> {
        writeln!(
            out,
            "\n    flags=()\n    two_word_flags=()\n    local_nonpersistent_flags=()\n    flags_with_completion=()\n    flags_completion=()\n"
        )?;
        let local_only = local_non_persistent_flags(tree, id);
        let mut required = Vec::new();

        for flag_id in visible_flags(tree, id) {
            let flag = tree.flag(flag_id);
            let takes_value = flag.no_opt_default().is_none();
            let long = format!("--{}", flag.name());
            let short = flag.shorthand_char().map(|c| format!("-{c}"));
            let handler = value_handler(tree, flag_id, func);

            if takes_value {
                writeln!(out, "    flags+=({})", sh_quote(&format!("{long}=")))?;
                writeln!(out, "    two_word_flags+=({})", sh_quote(&long))?;
            } else {
                writeln!(out, "    flags+=({})", sh_quote(&long))?;
            }
            if let Some(handler) = &handler {
                writeln!(out, "    flags_with_completion+=({})", sh_quote(&long))?;
                writeln!(out, "    flags_completion+=({})", sh_quote(handler))?;
            }
            if let Some(short) = &short {
                writeln!(out, "    flags+=({})", sh_quote(short))?;
                if takes_value {
                    writeln!(out, "    two_word_flags+=({})", sh_quote(short))?;
                }
                if let Some(handler) = &handler {
                    writeln!(out, "    flags_with_completion+=({})", sh_quote(short))?;
                    writeln!(out, "    flags_completion+=({})", sh_quote(handler))?;
                }
            }
            if local_only.lookup(flag.name()) == Some(flag_id) {
                writeln!(out, "    local_nonpersistent_flags+=({})", sh_quote(&long))?;
                if takes_value {
                    writeln!(out, "    local_nonpersistent_flags+=({})", sh_quote(&format!("{long}=")))?;
                }
                if let Some(short) = &short {
                    writeln!(out, "    local_nonpersistent_flags+=({})", sh_quote(short))?;
                }
            }

            if flag.is_required() {
                required.push(if takes_value { format!("{long}=") } else { long });
                required.extend(short);
            }
        }

        writeln!(out, "\n    must_have_one_flag=()")?;
        for flag in &required {
            writeln!(out, "    must_have_one_flag+=({})", sh_quote(flag))?;
        }
        Ok(())
    }
}

/// Shell function for a command: `_<prog>_root_command` for the root,
/// `_<prog>_<child>_<grandchild>` below it.
fn command_function(tree: &CommandTree, id: CommandId, func: &str) -> String {
    if id == tree.root() {
        return format!("_{func}_root_command");
    }
    let mut path: Vec<&str> = tree
        .ancestors(id)
        .take_while(|a| *a != tree.root())
        .map(|a| tree.name(a))
        .collect();
    path.reverse();
    let mut name = format!("_{func}");
    for part in path {
        name.push('_');
        name.push_str(&part.replace(['-', ':', '.'], "_"));
    }
    name
}

/// Command run by the script to complete a flag's value, if any.
fn value_handler(tree: &CommandTree, id: FlagId, func: &str) -> Option<String> {
    let flag = tree.flag(id);
    if let Some(candidates) = tree.flag_completer(id).and_then(|c| c.static_candidates()) {
        let words: Vec<&str> = candidates.iter().map(|c| c.value.as_str()).collect();
        return Some(format!("__{func}_add_words {}", words.join(" ")));
    }
    if let Some(exts) = flag.annotation(ANNOTATION_FILENAME_EXT).filter(|e| !e.is_empty()) {
        return Some(format!(
            "__{func}_handle_filename_extension_flag {}",
            exts.join("|")
        ));
    }
    if let Some(dirs) = flag.annotation(ANNOTATION_SUBDIRS_IN_DIR) {
        return Some(match dirs.first() {
            Some(dir) => format!("__{func}_handle_subdirs_in_dir_flag {dir}"),
            None => format!("__{func}_handle_subdirs_in_dir_flag"),
        });
    }
    flag.annotation(ANNOTATION_CUSTOM)
        .and_then(|f| f.first())
        .cloned()
}

impl ShellGenerator for BashV1 {
    fn shell(&self) -> Shell {
        Shell::BashV1
    }

    fn generate(&self, tree: &CommandTree, out: &mut dyn Write) -> Result<()> {
        let program = tree.name(tree.root());
        check_program(program)?;
        let func = function_name(program);
        debug!(program, "generating static bash script");

        out.write_all(render(PREAMBLE, program, "").as_bytes())?;
        let root = tree.root();
        for id in tree.walk(root) {
            if id != root && !tree.is_available(id) {
                continue;
            }
            // Children of an unavailable command are unreachable too.
            if tree.ancestors(id).skip(1).any(|a| a != root && !tree.is_available(a)) {
                continue;
            }
            self.write_command(tree, id, &func, out)?;
        }
        out.write_all(render(POSTAMBLE, program, "").as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use command_router_core::{Command, Flag, NoopAction, StaticCompleter};

    use super::*;

    fn tree() -> CommandTree {
        let mut tree = CommandTree::new(
            Command::new("my-app").persistent_flag(Flag::string("config", "").shorthand('c')),
        )
        .unwrap();
        let root = tree.root();
        let remote = tree
            .add_command(root, Command::new("remote").short("Manage remotes"))
            .unwrap();
        tree.add_command(
            remote,
            Command::new("add-url")
                .alias("au")
                .flag(Flag::string("name", ""))
                .flag(Flag::bool("force").shorthand('f'))
                .flag(Flag::string("format", ""))
                .valid_args(["origin\tDefault remote", "upstream"])
                .arg_aliases(["o"])
                .run(NoopAction),
        )
        .unwrap();
        tree.add_command(root, Command::new("secret").hidden().run(NoopAction))
            .unwrap();

        let add = tree.children(remote)[0];
        tree.mark_flag_required(add, "name").unwrap();
        tree.mark_flag_filename(root, "config", &["yaml", "yml"]).unwrap();
        tree.register_flag_completion(add, "format", StaticCompleter::new(["json", "text"]))
            .unwrap();
        tree
    }

    fn script(tree: &CommandTree, with_descriptions: bool) -> String {
        let mut out = Vec::new();
        BashV1::new(with_descriptions).generate(tree, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_command_functions_follow_the_tree() {
        let out = script(&tree(), false);
        assert!(out.contains("_my_app_root_command()\n{"));
        assert!(out.contains("_my_app_remote()\n{"));
        assert!(out.contains("_my_app_remote_add_url()\n{"));
        assert!(out.contains("last_command='_my_app_remote_add_url'"));
        assert!(!out.contains("secret"));
        assert!(out.contains("complete -o default -F __start_my_app my-app"));
    }

    #[test]
    fn test_aliases_and_nouns() {
        let out = script(&tree(), false);
        assert!(out.contains("        aliashash['au']='add-url'"));
        assert!(out.contains("    must_have_one_noun+=('origin')"));
        assert!(out.contains("    must_have_one_noun+=('upstream')"));
        assert!(out.contains("    noun_aliases+=('o')"));
    }

    #[test]
    fn test_flag_arrays() {
        let out = script(&tree(), false);
        assert!(out.contains("    flags+=('--config=')\n    two_word_flags+=('--config')"));
        assert!(out.contains(
            "    flags_completion+=('__my_app_handle_filename_extension_flag yaml|yml')"
        ));
        assert!(out.contains("    flags_completion+=('__my_app_add_words json text')"));
        assert!(out.contains("    flags+=('--force')\n    flags+=('-f')"));
        assert!(out.contains("    local_nonpersistent_flags+=('--force')"));
    }

    #[test]
    fn test_required_flags_listed_first() {
        let out = script(&tree(), false);
        let func = out.find("_my_app_remote_add_url()").unwrap();
        let body = &out[func..];
        let name = body.find("flags+=('--name=')").unwrap();
        let config = body.find("flags+=('--config=')").unwrap();
        assert!(name < config);
        assert!(body.contains("    must_have_one_flag+=('--name=')"));
    }

    #[test]
    fn test_descriptions_become_comments() {
        let out = script(&tree(), true);
        assert!(out.contains("# my-app remote: Manage remotes\n_my_app_remote()"));
        assert!(!script(&tree(), false).contains("# my-app remote:"));
    }
}
