//! Names and quoting shared by the generators.

use command_router_core::{
    ACTIVE_HELP_MARKER, CommandId, CommandTree, FlagId, ShellCompDirective, effective_flags,
};

use crate::error::{Result, ScriptError};

/// Shell function stem for `program`: `-` and `:` become `_`.
///
/// # Examples
///
/// ```
/// use command_router_shells::function_name;
///
/// assert_eq!(function_name("kubectl-plugin:v2"), "kubectl_plugin_v2");
/// ```
pub fn function_name(program: &str) -> String {
    program.replace(['-', ':'], "_")
}

/// Rejects program names that would need quoting inside a script.
pub(crate) fn check_program(program: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':');
    if program.is_empty() || !program.chars().all(allowed) {
        return Err(ScriptError::InvalidProgramName(program.to_string()));
    }
    Ok(())
}

/// Fills the placeholders of a script template: `@PROG@`, `@FUNC@`,
/// `@COMPCMD@`, `@ACTIVE_HELP@` and one `@DIR_*@` per directive bit.
pub(crate) fn render(template: &str, program: &str, complete_cmd: &str) -> String {
    let directives = [
        ("@DIR_ERROR@", ShellCompDirective::ERROR),
        ("@DIR_NO_SPACE@", ShellCompDirective::NO_SPACE),
        ("@DIR_NO_FILE_COMP@", ShellCompDirective::NO_FILE_COMP),
        ("@DIR_FILTER_FILE_EXT@", ShellCompDirective::FILTER_FILE_EXT),
        ("@DIR_FILTER_DIRS@", ShellCompDirective::FILTER_DIRS),
        ("@DIR_KEEP_ORDER@", ShellCompDirective::KEEP_ORDER),
    ];
    let mut script = template
        .replace("@PROG@", program)
        .replace("@FUNC@", &function_name(program))
        .replace("@COMPCMD@", complete_cmd)
        .replace("@ACTIVE_HELP@", ACTIVE_HELP_MARKER);
    for (placeholder, directive) in directives {
        script = script.replace(placeholder, &directive.bits().to_string());
    }
    script
}

/// First line of a description, trimmed.
pub(crate) fn one_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

/// Wraps `text` in single quotes for bash or zsh.
pub(crate) fn sh_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Wraps `text` in single quotes for fish, which escapes `\` and `'`.
pub(crate) fn fish_quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', r"\\").replace('\'', r"\'"))
}

/// Flags a command sees, required ones first, without hidden or
/// deprecated flags.
pub(crate) fn visible_flags(tree: &CommandTree, command: CommandId) -> Vec<FlagId> {
    let mut ids: Vec<FlagId> = effective_flags(tree, command)
        .sorted_ids(tree.flag_arena())
        .into_iter()
        .filter(|id| tree.flag(*id).is_completable())
        .collect();
    ids.sort_by_key(|id| !tree.flag(*id).is_required());
    ids
}
