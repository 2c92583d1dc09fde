//! Active Help configuration.
//!
//! Active Help lines are hints mixed into the candidate stream, marked with
//! [`ACTIVE_HELP_MARKER`](command_router_core::ACTIVE_HELP_MARKER). A program
//! reads an opaque configuration string from `<PROGRAM>_ACTIVE_HELP`; the
//! value `0` there, or in `COBRA_ACTIVE_HELP`, turns the hints off.

/// Global variable that disables Active Help for every program.
pub const GLOBAL_ENV_VAR: &str = "COBRA_ACTIVE_HELP";

/// Value that disables Active Help.
pub const DISABLED: &str = "0";

/// Name of the per-program variable: upper-cased, `-` replaced by `_`.
///
/// # Examples
///
/// ```
/// use command_router_complete::active_help_env_var;
///
/// assert_eq!(active_help_env_var("my-tool"), "MY_TOOL_ACTIVE_HELP");
/// ```
pub fn active_help_env_var(program: &str) -> String {
    format!("{program}_ACTIVE_HELP")
        .to_uppercase()
        .replace('-', "_")
}

/// The Active Help setting in effect for one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveHelpConfig {
    value: String,
}

impl ActiveHelpConfig {
    /// Reads the configuration for `program` from the process environment.
    pub fn from_env(program: &str) -> Self {
        Self::from_lookup(program, |key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps variable names to
    /// values.
    pub fn from_lookup(program: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut value = lookup(&active_help_env_var(program)).unwrap_or_default();
        if value != DISABLED && lookup(GLOBAL_ENV_VAR).as_deref() == Some(DISABLED) {
            value = DISABLED.to_string();
        }
        Self { value }
    }

    /// A configuration with Active Help turned off.
    pub fn disabled() -> Self {
        Self {
            value: DISABLED.to_string(),
        }
    }

    /// The configuration string passed through to completers.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_enabled(&self) -> bool {
        self.value != DISABLED
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_program_value_is_passed_through() {
        let config = ActiveHelpConfig::from_lookup("kubectl", lookup(&[("KUBECTL_ACTIVE_HELP", "verbose")]));
        assert_eq!(config.value(), "verbose");
        assert!(config.is_enabled());
    }

    #[test]
    fn test_global_kill_switch_overrides_program() {
        let config = ActiveHelpConfig::from_lookup(
            "kubectl",
            lookup(&[("KUBECTL_ACTIVE_HELP", "verbose"), (GLOBAL_ENV_VAR, "0")]),
        );
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_program_can_disable_itself() {
        let config = ActiveHelpConfig::from_lookup("my-app", lookup(&[("MY_APP_ACTIVE_HELP", "0")]));
        assert!(!config.is_enabled());
        assert!(ActiveHelpConfig::from_lookup("my-app", lookup(&[])).is_enabled());
    }
}
