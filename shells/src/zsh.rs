//! Zsh script that completes through the `__complete` protocol.

use std::io::Write;

use tracing::debug;

use command_router_complete::{COMPLETE_CMD, COMPLETE_NO_DESC_CMD};
use command_router_core::CommandTree;

use crate::error::Result;
use crate::naming::{check_program, render};
use crate::{Shell, ShellGenerator};

const TEMPLATE: &str = r##"#compdef @PROG@
compdef _@FUNC@ @PROG@

# zsh completion for @PROG@                               -*- shell-script -*-

__@FUNC@_debug()
{
    local file="$BASH_COMP_DEBUG_FILE"
    if [[ -n ${file} ]]; then
        echo "$*" >> "${file}"
    fi
}

_@FUNC@()
{
    local shellCompDirectiveError=@DIR_ERROR@
    local shellCompDirectiveNoSpace=@DIR_NO_SPACE@
    local shellCompDirectiveNoFileComp=@DIR_NO_FILE_COMP@
    local shellCompDirectiveFilterFileExt=@DIR_FILTER_FILE_EXT@
    local shellCompDirectiveFilterDirs=@DIR_FILTER_DIRS@
    local shellCompDirectiveKeepOrder=@DIR_KEEP_ORDER@

    local lastParam lastChar flagPrefix requestComp out directive comp lastComp noSpace keepOrder
    local -a completions

    __@FUNC@_debug "\n========= starting completion logic =========="
    __@FUNC@_debug "CURRENT: ${CURRENT}, words[*]: ${words[*]}"

    # Only the words up to the cursor matter.
    words=("${=words[1,CURRENT]}")
    __@FUNC@_debug "Truncated words[*]: ${words[*]},"

    lastParam=${words[-1]}
    lastChar=${lastParam[-1]}
    __@FUNC@_debug "lastParam: ${lastParam}, lastChar: ${lastChar}"

    # Candidates for --flag=<TAB> must keep the flag as a prefix.
    setopt local_options BASH_REMATCH
    if [[ "${lastParam}" =~ '-.*=' ]]; then
        flagPrefix="-P ${BASH_REMATCH}"
    fi

    requestComp="${words[1]} @COMPCMD@ ${words[2,-1]}"
    if [ "${lastChar}" = "" ]; then
        __@FUNC@_debug "Adding extra empty parameter"
        requestComp="${requestComp} \"\""
    fi

    __@FUNC@_debug "About to call: eval ${requestComp}"
    out=$(eval ${requestComp} 2>/dev/null)
    __@FUNC@_debug "completion output: ${out}"

    local lastLine line
    while IFS='\n' read -r line; do
        lastLine=${line}
    done < <(printf "%s\n" "${out[@]}")
    __@FUNC@_debug "last line: ${lastLine}"

    if [ "${lastLine[1]}" = : ]; then
        directive=${lastLine[2,-1]}
        local suffix
        (( suffix=${#lastLine}+2))
        out=${out[1,-$suffix]}
    else
        __@FUNC@_debug "No directive found, using default"
        directive=0
    fi

    __@FUNC@_debug "directive: ${directive}"
    __@FUNC@_debug "completions: ${out}"
    __@FUNC@_debug "flagPrefix: ${flagPrefix}"

    if [ $((directive & shellCompDirectiveError)) -ne 0 ]; then
        __@FUNC@_debug "Completion request failed, ignoring candidates"
        return
    fi

    local activeHelpMarker="@ACTIVE_HELP@"
    local endIndex=${#activeHelpMarker}
    local startIndex=$((${#activeHelpMarker}+1))
    local hasActiveHelp=0
    while IFS='\n' read -r comp; do
        if [ "${comp[1,$endIndex]}" = "$activeHelpMarker" ]; then
            __@FUNC@_debug "Active Help: $comp"
            comp="${comp[$startIndex,-1]}"
            if [ -n "$comp" ]; then
                compadd -x "${comp}"
                hasActiveHelp=1
            fi
            continue
        fi

        if [ -n "$comp" ]; then
            # _describe splits value and description on ':'.
            comp=${comp//:/\\:}
            local tab="$(printf '\t')"
            comp=${comp//$tab/:}

            __@FUNC@_debug "Adding completion: ${comp}"
            completions+=${comp}
            lastComp=$comp
        fi
    done < <(printf "%s\n" "${out[@]}")

    # Separate hints from the choices that follow them.
    if [ $hasActiveHelp -eq 1 ]; then
        if [ ${#completions} -ne 0 ] || [ $((directive & shellCompDirectiveNoFileComp)) -eq 0 ]; then
            compadd -x "--"
            hasActiveHelp=0
        fi
    fi

    if [ $((directive & shellCompDirectiveNoSpace)) -ne 0 ]; then
        __@FUNC@_debug "Activating nospace."
        noSpace="-S ''"
    fi

    if [ $((directive & shellCompDirectiveKeepOrder)) -ne 0 ]; then
        __@FUNC@_debug "Activating keep order."
        keepOrder="-V"
    fi

    if [ $((directive & shellCompDirectiveFilterFileExt)) -ne 0 ]; then
        local filteringCmd filter
        filteringCmd='_files'
        for filter in ${completions[@]}; do
            if [ ${filter[1]} != '*' ]; then
                filter="\*.$filter"
            fi
            filteringCmd+=" -g $filter"
        done
        filteringCmd+=" ${flagPrefix}"

        __@FUNC@_debug "File filtering command: $filteringCmd"
        _arguments '*:filename:'"$filteringCmd"
    elif [ $((directive & shellCompDirectiveFilterDirs)) -ne 0 ]; then
        local subdir result
        subdir="${completions[1]}"
        if [ -n "$subdir" ]; then
            __@FUNC@_debug "Listing directories in $subdir"
            pushd "${subdir}" >/dev/null 2>&1
        fi

        _arguments '*:dirname:_files -/'" ${flagPrefix}"
        result=$?
        if [ -n "$subdir" ]; then
            popd >/dev/null 2>&1
        fi
        return $result
    else
        __@FUNC@_debug "Calling _describe"
        if eval _describe $keepOrder "completions" completions $flagPrefix $noSpace; then
            __@FUNC@_debug "_describe found some completions"
            return 0
        fi

        if [ $((directive & shellCompDirectiveNoFileComp)) -ne 0 ]; then
            __@FUNC@_debug "No candidates and file completion disabled"
            # Non-zero lets zsh try its other matchers.
            return 1
        fi

        __@FUNC@_debug "Falling back to file completion"
        _arguments '*:filename:_files'" ${flagPrefix}"
    fi
}

# Only complete when autoloaded, not when sourced or eval-ed.
if [ "$funcstack[1]" = "_@FUNC@" ]; then
    _@FUNC@
fi
"##;

/// Zsh generator using the completion protocol.
#[derive(Debug, Clone, Copy)]
pub struct Zsh {
    with_descriptions: bool,
}

impl Zsh {
    pub fn new(with_descriptions: bool) -> Self {
        Self { with_descriptions }
    }
}

impl ShellGenerator for Zsh {
    fn shell(&self) -> Shell {
        Shell::Zsh
    }

    fn generate(&self, tree: &CommandTree, out: &mut dyn Write) -> Result<()> {
        let program = tree.name(tree.root());
        check_program(program)?;
        let complete_cmd = if self.with_descriptions {
            COMPLETE_CMD
        } else {
            COMPLETE_NO_DESC_CMD
        };
        debug!(program, complete_cmd, "generating zsh script");
        out.write_all(render(TEMPLATE, program, complete_cmd).as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use command_router_core::Command;

    use super::*;

    fn script(name: &str, with_descriptions: bool) -> String {
        let tree = CommandTree::new(Command::new(name)).unwrap();
        let mut out = Vec::new();
        Zsh::new(with_descriptions).generate(&tree, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_registers_function() {
        let out = script("my-app", true);
        assert!(out.starts_with("#compdef my-app\ncompdef _my_app my-app\n"));
        assert!(out.contains(r#"if [ "$funcstack[1]" = "_my_app" ]; then"#));
    }

    #[test]
    fn test_request_command_follows_description_switch() {
        assert!(script("app", true).contains(r#"requestComp="${words[1]} __complete ${words[2,-1]}""#));
        assert!(script("app", false).contains(r#"requestComp="${words[1]} __completeNoDesc ${words[2,-1]}""#));
    }

    #[test]
    fn test_directives_inlined() {
        let out = script("app", true);
        assert!(out.contains("local shellCompDirectiveFilterFileExt=8"));
        assert!(out.contains("local shellCompDirectiveFilterDirs=16"));
        assert!(!out.contains("@FUNC@"));
        assert!(!out.contains("@DIR_"));
    }
}
