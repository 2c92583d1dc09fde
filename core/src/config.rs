//! Routing configuration.
//!
//! Every matching toggle lives in one immutable [`RouterConfig`] value that
//! callers hand to the resolver, the execution path and the completion
//! dispatcher. There is no process-wide state.
//!
//! # Example YAML
//!
//! ```yaml
//! prefix_matching: true
//! case_insensitive: false
//! sort_commands: true
//! traverse_children: false
//! disable_suggestions: false
//! suggestions_minimum_distance: 2
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Toggles controlling command matching and suggestion behaviour.
///
/// # Examples
///
/// ```
/// use command_router_core::RouterConfig;
///
/// let config: RouterConfig = serde_yaml::from_str("prefix_matching: true").unwrap();
/// assert!(config.prefix_matching);
/// assert!(config.sort_commands);
/// assert_eq!(config.suggestions_minimum_distance, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Accept an unambiguous prefix of a command name or alias.
    pub prefix_matching: bool,
    /// Match command names and aliases ignoring case.
    pub case_insensitive: bool,
    /// Present children sorted by name rather than insertion order.
    pub sort_commands: bool,
    /// Parse each level's flags while descending (Traverse instead of Find).
    pub traverse_children: bool,
    /// Omit "Did you mean this?" suggestions from errors.
    pub disable_suggestions: bool,
    /// Largest edit distance still offered as a suggestion.
    pub suggestions_minimum_distance: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            prefix_matching: false,
            case_insensitive: false,
            sort_commands: true,
            traverse_children: false,
            disable_suggestions: false,
            suggestions_minimum_distance: 2,
        }
    }
}

impl RouterConfig {
    /// Loads configuration from a YAML file; missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::RouterError::IoError) if the file cannot be
    /// read, or [`YamlError`](crate::RouterError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn with_prefix_matching(mut self, enabled: bool) -> Self {
        self.prefix_matching = enabled;
        self
    }

    pub fn with_case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn with_traverse_children(mut self, enabled: bool) -> Self {
        self.traverse_children = enabled;
        self
    }

    pub fn with_sort_commands(mut self, enabled: bool) -> Self {
        self.sort_commands = enabled;
        self
    }
}
