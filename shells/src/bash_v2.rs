//! Bash script that completes through the `__complete` protocol.
//!
//! Needs bash 4.1+ for `compopt`; the `bash-completion` package is used when
//! present and emulated otherwise.

use std::io::Write;

use tracing::debug;

use command_router_complete::{COMPLETE_CMD, COMPLETE_NO_DESC_CMD};
use command_router_core::CommandTree;

use crate::error::Result;
use crate::naming::{check_program, render};
use crate::{Shell, ShellGenerator};

const TEMPLATE: &str = r##"# bash completion for @PROG@                              -*- shell-script -*-

__@FUNC@_debug()
{
    if [[ -n ${BASH_COMP_DEBUG_FILE-} ]]; then
        echo "$*" >> "${BASH_COMP_DEBUG_FILE}"
    fi
}

# Minimal word splitting for systems without bash-completion.
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

# Asks @PROG@ for candidates; sets 'out' and 'directive'.
__@FUNC@_get_completion_results()
{
    local requestComp lastParam lastChar args

    args=("${words[@]:1:cword}")
    requestComp="${words[0]} @COMPCMD@ ${args[*]}"

    lastParam=${words[cword]}
    lastChar=${lastParam:$((${#lastParam}-1)):1}
    __@FUNC@_debug "lastParam ${lastParam}, lastChar ${lastChar}"

    # An empty word under the cursor is lost by the join above.
    if [[ -z ${cur} && ${lastChar} != = ]]; then
        requestComp="${requestComp} ''"
    fi

    # For --flag=value bash completes only the value.
    if [[ ${cur} == -*=* ]]; then
        cur="${cur#*=}"
    fi

    __@FUNC@_debug "Calling ${requestComp}"
    out=$(eval "${requestComp}" 2>/dev/null)

    directive=${out##*:}
    out=${out%:*}
    if [[ ${directive} == "${out}" ]]; then
        directive=0
    fi
    __@FUNC@_debug "Directive: ${directive}"
    __@FUNC@_debug "Completions: ${out}"
}

__@FUNC@_process_completion_results()
{
    local shellCompDirectiveError=@DIR_ERROR@
    local shellCompDirectiveNoSpace=@DIR_NO_SPACE@
    local shellCompDirectiveNoFileComp=@DIR_NO_FILE_COMP@
    local shellCompDirectiveFilterFileExt=@DIR_FILTER_FILE_EXT@
    local shellCompDirectiveFilterDirs=@DIR_FILTER_DIRS@
    local shellCompDirectiveKeepOrder=@DIR_KEEP_ORDER@

    if (((directive & shellCompDirectiveError) != 0)); then
        __@FUNC@_debug "Completion request failed, not completing"
        return
    fi

    if [[ $(type -t compopt) == builtin ]]; then
        if (((directive & shellCompDirectiveNoSpace) != 0)); then
            compopt -o nospace
        fi
        if (((directive & shellCompDirectiveKeepOrder) != 0)); then
            # nosort needs bash 4.4
            if ((BASH_VERSINFO[0] > 4 || (BASH_VERSINFO[0] == 4 && BASH_VERSINFO[1] >= 4))); then
                compopt -o nosort
            fi
        fi
        if (((directive & shellCompDirectiveNoFileComp) != 0)); then
            compopt +o default
        fi
    fi

    local completions=()
    local activeHelp=()
    __@FUNC@_extract_active_help

    if (((directive & shellCompDirectiveFilterFileExt) != 0)); then
        local IFS='|'
        local pattern="@(${completions[*]})"
        unset IFS
        __@FUNC@_debug "File filtering pattern: ${pattern}"
        if declare -F _filedir >/dev/null 2>&1; then
            _filedir "${pattern}"
        else
            local ext
            for ext in "${completions[@]}"; do
                while IFS='' read -r comp; do
                    COMPREPLY+=("$comp")
                done < <(compgen -f -X "!*.${ext}" -- "$cur")
            done
            while IFS='' read -r comp; do
                COMPREPLY+=("$comp")
            done < <(compgen -d -- "$cur")
        fi
    elif (((directive & shellCompDirectiveFilterDirs) != 0)); then
        local subdir=${completions[0]-}
        if [[ -n ${subdir} ]]; then
            __@FUNC@_debug "Listing directories in ${subdir}"
            pushd "${subdir}" >/dev/null 2>&1 || return
            __@FUNC@_complete_dirs
            popd >/dev/null 2>&1 || return
        else
            __@FUNC@_complete_dirs
        fi
    else
        __@FUNC@_handle_completion_types
    fi

    __@FUNC@_handle_special_char "$cur" :
    __@FUNC@_handle_special_char "$cur" =

    # Hints are shown when listing, above the re-drawn prompt.
    if ((${#activeHelp[@]} != 0)) && [[ ${COMP_TYPE-} == 63 ]]; then
        printf "\n"
        printf "%s\n" "${activeHelp[@]}"
        printf "\n"
        if ((${#COMPREPLY[@]} == 0)); then
            # Stop bash from inserting anything while the hint is shown.
            COMPREPLY=(" " "")
        fi
    fi
}

__@FUNC@_complete_dirs()
{
    if declare -F _filedir >/dev/null 2>&1; then
        _filedir -d
        return
    fi
    local comp
    while IFS='' read -r comp; do
        COMPREPLY+=("$comp")
    done < <(compgen -d -- "$cur")
}

# Splits 'out' into 'completions' and 'activeHelp'.
__@FUNC@_extract_active_help()
{
    local activeHelpMarker="@ACTIVE_HELP@"
    local endIndex=${#activeHelpMarker}
    local comp

    while IFS='' read -r comp; do
        [[ -z ${comp} ]] && continue
        if [[ ${comp:0:endIndex} == "${activeHelpMarker}" ]]; then
            comp=${comp:endIndex}
            __@FUNC@_debug "Active Help: ${comp}"
            [[ -n ${comp} ]] && activeHelp+=("${comp}")
        else
            completions+=("${comp}")
        fi
    done <<<"${out}"
}

__@FUNC@_handle_completion_types()
{
    case ${COMP_TYPE-} in
    37|42)
        # Menu completion inserts entries directly, so descriptions go.
        local tab=$'\t' comp
        for comp in "${completions[@]}"; do
            comp=${comp%%"${tab}"*}
            [[ ${comp} == "${cur}"* ]] && COMPREPLY+=("${comp}")
        done
        ;;
    *)
        __@FUNC@_handle_standard_completion_case
        ;;
    esac
}

__@FUNC@_handle_standard_completion_case()
{
    local tab=$'\t' comp compline longest=0

    if ((${#completions[@]} == 1)); then
        comp=${completions[0]%%"${tab}"*}
        [[ ${comp} == "${cur}"* ]] && COMPREPLY=("${comp}")
        return
    fi

    for compline in "${completions[@]}"; do
        comp=${compline%%"${tab}"*}
        [[ ${comp} == "${cur}"* ]] || continue
        COMPREPLY+=("${compline}")
        ((${#comp} > longest)) && longest=${#comp}
    done

    if ((${#COMPREPLY[@]} == 1)); then
        COMPREPLY[0]=${COMPREPLY[0]%%"${tab}"*}
    else
        __@FUNC@_format_comp_descriptions "${longest}"
    fi
}

# Pads values to a column and appends "(description)", cut to the terminal.
__@FUNC@_format_comp_descriptions()
{
    local tab=$'\t' comp desc maxdesclength
    local longest=$1 i ci

    for ci in "${!COMPREPLY[@]}"; do
        comp=${COMPREPLY[ci]}
        [[ ${comp} == *"${tab}"* ]] || continue
        desc=${comp#*"${tab}"}
        comp=${comp%%"${tab}"*}

        maxdesclength=$((${COLUMNS:-80} - longest - 4))
        if ((maxdesclength > 8)); then
            for ((i = ${#comp}; i < longest; i++)); do
                comp+=" "
            done
        else
            maxdesclength=$((${COLUMNS:-80} - ${#comp} - 4))
        fi

        if ((maxdesclength > 0)); then
            if ((${#desc} > maxdesclength)); then
                desc=${desc:0:$((maxdesclength - 1))}
                desc+="…"
            fi
            comp+="  (${desc})"
        fi
        COMPREPLY[ci]=${comp}
    done
}

# Strips the part of each candidate before a word-break character that
# bash already treats as a separate word.
__@FUNC@_handle_special_char()
{
    local comp="$1"
    local char=$2
    if [[ ${comp} == *"${char}"* && ${COMP_WORDBREAKS} == *"${char}"* ]]; then
        local word=${comp%"${comp##*"${char}"}"}
        local idx=${#COMPREPLY[@]}
        while ((--idx >= 0)); do
            COMPREPLY[idx]=${COMPREPLY[idx]#"${word}"}
        done
    fi
}

__start_@FUNC@()
{
    local cur prev words cword split

    COMPREPLY=()
    if declare -F _init_completion >/dev/null 2>&1; then
        _init_completion -n =: || return
    else
        __@FUNC@_init_completion -n =: || return
    fi

    __@FUNC@_debug
    __@FUNC@_debug "========= starting completion logic =========="
    __@FUNC@_debug "cur is ${cur}, words[*] is ${words[*]}, #words[@] is ${#words[@]}, cword is ${cword}"

    local out directive
    __@FUNC@_get_completion_results
    __@FUNC@_process_completion_results
}

if [[ $(type -t compopt) == builtin ]]; then
    complete -o default -F __start_@FUNC@ @PROG@
else
    complete -o default -o nospace -F __start_@FUNC@ @PROG@
fi

# ex: ts=4 sw=4 et filetype=sh
"##;

/// Bash generator using the completion protocol.
#[derive(Debug, Clone, Copy)]
pub struct BashV2 {
    with_descriptions: bool,
}

impl BashV2 {
    pub fn new(with_descriptions: bool) -> Self {
        Self { with_descriptions }
    }
}

impl ShellGenerator for BashV2 {
    fn shell(&self) -> Shell {
        Shell::Bash
    }

    fn generate(&self, tree: &CommandTree, out: &mut dyn Write) -> Result<()> {
        let program = tree.name(tree.root());
        check_program(program)?;
        let complete_cmd = if self.with_descriptions {
            COMPLETE_CMD
        } else {
            COMPLETE_NO_DESC_CMD
        };
        debug!(program, complete_cmd, "generating bash script");
        out.write_all(render(TEMPLATE, program, complete_cmd).as_bytes())?;
        Ok(())
    }
}
