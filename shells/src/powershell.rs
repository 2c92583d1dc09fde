//! PowerShell script that completes through the `__complete` protocol.

use std::io::Write;

use tracing::debug;

use command_router_complete::{COMPLETE_CMD, COMPLETE_NO_DESC_CMD};
use command_router_core::CommandTree;

use crate::error::Result;
use crate::naming::{check_program, render};
use crate::{Shell, ShellGenerator};

const TEMPLATE: &str = r##"# powershell completion for @PROG@                         -*- shell-script -*-

function __@FUNC@_debug {
    if ($env:BASH_COMP_DEBUG_FILE) {
        "$args" | Out-File -Append -FilePath "$env:BASH_COMP_DEBUG_FILE"
    }
}

filter __@FUNC@_escapeStringWithSpecialChars {
    $_ -replace '\s|#|@|\$|;|,|''|\{|\}|\(|\)|"|`|\||<|>|&','`$&'
}

[scriptblock]${__@FUNC@CompleterBlock} = {
    param(
        $WordToComplete,
        $CommandAst,
        $CursorPosition
    )

    # Everything typed up to the cursor.
    $Command = $CommandAst.CommandElements
    $Command = "$Command"

    __@FUNC@_debug ""
    __@FUNC@_debug "========= starting completion logic =========="
    __@FUNC@_debug "WordToComplete: $WordToComplete Command: $Command CursorPosition: $CursorPosition"

    if ($Command.Length -gt $CursorPosition) {
        $Command = $Command.Substring(0, $CursorPosition)
    }
    __@FUNC@_debug "Truncated command: $Command"

    $ShellCompDirectiveError=@DIR_ERROR@
    $ShellCompDirectiveNoSpace=@DIR_NO_SPACE@
    $ShellCompDirectiveNoFileComp=@DIR_NO_FILE_COMP@
    $ShellCompDirectiveFilterFileExt=@DIR_FILTER_FILE_EXT@
    $ShellCompDirectiveFilterDirs=@DIR_FILTER_DIRS@
    $ShellCompDirectiveKeepOrder=@DIR_KEEP_ORDER@

    $Program, $Arguments = $Command.Split(" ", 2)
    $RequestComp = "$Program @COMPCMD@ $Arguments"
    __@FUNC@_debug "RequestComp: $RequestComp"

    # A trailing space means the next word is still empty.
    if ($WordToComplete -ne "") {
        $WordToComplete = $Arguments.Split(" ")[-1]
    }
    __@FUNC@_debug "New WordToComplete: $WordToComplete"

    $IsEqualFlag = ($WordToComplete -Like "--*=*" )
    if ( $IsEqualFlag ) {
        __@FUNC@_debug "Completing equal sign flag"
        $Flag, $WordToComplete = $WordToComplete.Split("=", 2)
    }

    if ( $WordToComplete -eq "" -And ( -Not $IsEqualFlag )) {
        __@FUNC@_debug "Adding extra empty parameter"
        if ($PSVersionTable.PsVersion -lt [version]'7.2.0' -or
            ($PSVersionTable.PsVersion -lt [version]'7.3.0' -and -not [ExperimentalFeature]::IsEnabled("PSNativeCommandArgumentPassing")) -or
            (($PSVersionTable.PsVersion -ge [version]'7.3.0' -or [ExperimentalFeature]::IsEnabled("PSNativeCommandArgumentPassing")) -and
              $PSNativeCommandArgumentPassing -eq 'Legacy')) {
             $RequestComp="$RequestComp" + ' `"`"'
        } else {
             $RequestComp="$RequestComp" + ' ""'
        }
    }

    __@FUNC@_debug "Calling $RequestComp"
    $Out = Invoke-Expression -Command "$RequestComp" 2>&1 | Where-Object { $_ -is [string] }
    __@FUNC@_debug "Output: $Out"

    [int]$Directive = 0
    $DirectiveLine = $Out | Select-Object -Last 1
    if ($DirectiveLine -like ":*") {
        $Directive = $DirectiveLine.TrimStart(':')
        $Out = $Out | Select-Object -SkipLast 1
    }
    __@FUNC@_debug "The completion directive is: $Directive"

    if (($Directive -band $ShellCompDirectiveError) -ne 0 ) {
        __@FUNC@_debug "Completion request failed, ignoring candidates"
        return
    }

    $Longest = 0
    [Array]$Values = $Out | ForEach-Object {
        $Name, $Description = $_.Split("`t", 2)
        __@FUNC@_debug "Name: $Name Description: $Description"

        if ($Longest -lt $Name.Length) {
            $Longest = $Name.Length
        }

        # The tooltip may not be empty.
        if (-Not $Description) {
            $Description = " "
        }
        @{Name="$Name";Description="$Description"}
    }

    $Space = " "
    if (($Directive -band $ShellCompDirectiveNoSpace) -ne 0 ) {
        __@FUNC@_debug "ShellCompDirectiveNoSpace is called"
        $Space = ""
    }

    if ((($Directive -band $ShellCompDirectiveFilterFileExt) -ne 0 ) -or
       (($Directive -band $ShellCompDirectiveFilterDirs) -ne 0 ))  {
        __@FUNC@_debug "ShellCompDirectiveFilterFileExt and ShellCompDirectiveFilterDirs are not supported"
        return
    }

    # Active Help lines are not candidates.
    $Values = $Values | Where-Object { -Not $_.Name.StartsWith("@ACTIVE_HELP@") }

    # Keep candidates that match the typed prefix.
    $Values = $Values | Where-Object { $_.Name -like "$WordToComplete*" }

    if (($Directive -band $ShellCompDirectiveKeepOrder) -eq 0) {
        $Values = $Values | Sort-Object -Property Name
    }

    if (($Directive -band $ShellCompDirectiveNoFileComp) -ne 0 ) {
        __@FUNC@_debug "ShellCompDirectiveNoFileComp is called"

        if ($Values.Length -eq 0) {
            # Stops PowerShell from falling back to files.
            ""
            return
        }
    }

    $Mode = (Get-PSReadLineKeyHandler | Where-Object {$_.Key -eq "Tab" }).Function
    __@FUNC@_debug "Mode: $Mode"

    $Values | ForEach-Object {
        $comp = $_

        # CompletionResult(text, listItemText, resultType, toolTip)
        Switch ($Mode) {
            "Complete" {
                if ($Values.Length -eq 1) {
                    __@FUNC@_debug "Only one completion left"
                    [System.Management.Automation.CompletionResult]::new($($comp.Name | __@FUNC@_escapeStringWithSpecialChars) + $Space, "$($comp.Name)", 'ParameterValue', "$($comp.Description)")
                } else {
                    while($comp.Name.Length -lt $Longest) {
                        $comp.Name = $comp.Name + " "
                    }
                    if ($($comp.Description) -eq " " ) {
                        $Description = ""
                    } else {
                        $Description = "  ($($comp.Description))"
                    }
                    [System.Management.Automation.CompletionResult]::new("$($comp.Name)$Description", "$($comp.Name)$Description", 'ParameterValue', "$($comp.Description)")
                }
             }

            "MenuComplete" {
                # Trailing space is added by PowerShell itself in menu mode.
                [System.Management.Automation.CompletionResult]::new($($comp.Name | __@FUNC@_escapeStringWithSpecialChars) + $Space, "$($comp.Name)", 'ParameterValue', "$($comp.Description)")
            }

            Default {
                [System.Management.Automation.CompletionResult]::new($($comp.Name | __@FUNC@_escapeStringWithSpecialChars), "$($comp.Name)", 'ParameterValue', "$($comp.Description)")
            }
        }
    }
}

Register-ArgumentCompleter -CommandName '@PROG@' -ScriptBlock ${__@FUNC@CompleterBlock}
"##;

/// PowerShell generator using the completion protocol.
#[derive(Debug, Clone, Copy)]
pub struct PowerShell {
    with_descriptions: bool,
}

impl PowerShell {
    pub fn new(with_descriptions: bool) -> Self {
        Self { with_descriptions }
    }
}

impl ShellGenerator for PowerShell {
    fn shell(&self) -> Shell {
        Shell::PowerShell
    }

    fn generate(&self, tree: &CommandTree, out: &mut dyn Write) -> Result<()> {
        let program = tree.name(tree.root());
        check_program(program)?;
        let complete_cmd = if self.with_descriptions {
            COMPLETE_CMD
        } else {
            COMPLETE_NO_DESC_CMD
        };
        debug!(program, complete_cmd, "generating powershell script");
        out.write_all(render(TEMPLATE, program, complete_cmd).as_bytes())?;
        Ok(())
    }
}
