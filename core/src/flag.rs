//! Flag definitions and typed value slots.
//!
//! A [`Flag`] lives in the tree's flag arena and is addressed by [`FlagId`].
//! Commands never own flags by value; their flag sets hold ids, which is what
//! lets a descendant's merged view share `changed` state with the ancestor
//! that defined a persistent flag.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Annotation marking a flag as required.
pub const ANNOTATION_REQUIRED: &str = "cobra_annotation_bash_completion_one_required_flag";
/// Annotation carrying the file extensions a flag value is completed with.
pub const ANNOTATION_FILENAME_EXT: &str = "cobra_annotation_bash_completion_filename_extensions";
/// Annotation requesting directory completion, optionally rooted at one directory.
pub const ANNOTATION_SUBDIRS_IN_DIR: &str = "cobra_annotation_bash_completion_subdirs_in_dir";
/// Annotation naming a shell-native function that completes the flag value.
pub const ANNOTATION_CUSTOM: &str = "cobra_annotation_bash_completion_custom";

/// Index of a flag in the tree's flag arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagId(pub(crate) usize);

/// Value type of a flag.
///
/// Slice, array and map kinds are *repeatable*: they may be supplied more than
/// once and stay eligible for completion after being set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FlagKind {
    Bool,
    #[default]
    String,
    Int,
    Float,
    StringSlice,
    StringArray,
    IntSlice,
    StringToString,
}

impl FlagKind {
    /// Type name as reported in diagnostics.
    pub fn type_name(self) -> &'static str {
        match self {
            FlagKind::Bool => "bool",
            FlagKind::String => "string",
            FlagKind::Int => "int",
            FlagKind::Float => "float64",
            FlagKind::StringSlice => "stringSlice",
            FlagKind::StringArray => "stringArray",
            FlagKind::IntSlice => "intSlice",
            FlagKind::StringToString => "stringToString",
        }
    }

    /// Whether the flag may be given several times.
    pub fn is_repeatable(self) -> bool {
        matches!(
            self,
            FlagKind::StringSlice
                | FlagKind::StringArray
                | FlagKind::IntSlice
                | FlagKind::StringToString
        )
    }
}

/// The current value held by a flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    String(String),
    Int(i64),
    Float(f64),
    StringSlice(Vec<String>),
    StringArray(Vec<String>),
    IntSlice(Vec<i64>),
    StringToString(BTreeMap<String, String>),
}

impl FlagValue {
    /// The zero value for a kind.
    pub fn zero(kind: FlagKind) -> Self {
        match kind {
            FlagKind::Bool => FlagValue::Bool(false),
            FlagKind::String => FlagValue::String(String::new()),
            FlagKind::Int => FlagValue::Int(0),
            FlagKind::Float => FlagValue::Float(0.0),
            FlagKind::StringSlice => FlagValue::StringSlice(Vec::new()),
            FlagKind::StringArray => FlagValue::StringArray(Vec::new()),
            FlagKind::IntSlice => FlagValue::IntSlice(Vec::new()),
            FlagKind::StringToString => FlagValue::StringToString(BTreeMap::new()),
        }
    }

    /// Parses `raw` as a fresh value of `kind`.
    pub fn parse(kind: FlagKind, raw: &str) -> Result<Self, String> {
        let mut value = FlagValue::zero(kind);
        value.apply(raw, true)?;
        Ok(value)
    }

    pub fn kind(&self) -> FlagKind {
        match self {
            FlagValue::Bool(_) => FlagKind::Bool,
            FlagValue::String(_) => FlagKind::String,
            FlagValue::Int(_) => FlagKind::Int,
            FlagValue::Float(_) => FlagKind::Float,
            FlagValue::StringSlice(_) => FlagKind::StringSlice,
            FlagValue::StringArray(_) => FlagKind::StringArray,
            FlagValue::IntSlice(_) => FlagKind::IntSlice,
            FlagValue::StringToString(_) => FlagKind::StringToString,
        }
    }

    /// Applies one occurrence of the flag.
    ///
    /// For repeatable kinds the first occurrence replaces the default and
    /// later ones append.
    fn apply(&mut self, raw: &str, first: bool) -> Result<(), String> {
        match self {
            FlagValue::Bool(b) => *b = parse_bool(raw)?,
            FlagValue::String(s) => *s = raw.to_string(),
            FlagValue::Int(i) => *i = raw.parse().map_err(|e| format!("{e}"))?,
            FlagValue::Float(f) => *f = raw.parse().map_err(|e| format!("{e}"))?,
            FlagValue::StringSlice(items) => {
                if first {
                    items.clear();
                }
                items.extend(split_csv(raw));
            }
            FlagValue::StringArray(items) => {
                if first {
                    items.clear();
                }
                items.push(raw.to_string());
            }
            FlagValue::IntSlice(items) => {
                let parsed = split_csv(raw)
                    .map(|item| item.parse::<i64>().map_err(|e| format!("{e}")))
                    .collect::<Result<Vec<_>, _>>()?;
                if first {
                    items.clear();
                }
                items.extend(parsed);
            }
            FlagValue::StringToString(map) => {
                let mut parsed = BTreeMap::new();
                for pair in split_csv(raw) {
                    let (key, value) = pair
                        .split_once('=')
                        .ok_or_else(|| format!("{pair} must be formatted as key=value"))?;
                    parsed.insert(key.to_string(), value.to_string());
                }
                if first {
                    map.clear();
                }
                map.extend(parsed);
            }
        }
        Ok(())
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{b}"),
            FlagValue::String(s) => f.write_str(s),
            FlagValue::Int(i) => write!(f, "{i}"),
            FlagValue::Float(x) => write!(f, "{x}"),
            FlagValue::StringSlice(items) | FlagValue::StringArray(items) => {
                write!(f, "[{}]", items.join(","))
            }
            FlagValue::IntSlice(items) => {
                let items: Vec<String> = items.iter().map(i64::to_string).collect();
                write!(f, "[{}]", items.join(","))
            }
            FlagValue::StringToString(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "[{}]", pairs.join(","))
            }
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(format!("strconv.ParseBool: parsing {other:?}: invalid syntax")),
    }
}

fn split_csv(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .filter(|item| !item.is_empty())
        .map(|item| item.trim().to_string())
}

/// A named flag with a typed value slot.
///
/// # Examples
///
/// ```
/// use command_router_core::{Flag, FlagKind};
///
/// let verbose = Flag::bool("verbose").shorthand('v').usage("Enable verbose output");
/// assert_eq!(verbose.name(), "verbose");
/// assert_eq!(verbose.kind(), FlagKind::Bool);
/// assert_eq!(verbose.no_opt_default(), Some("true"));
/// ```
#[derive(Debug, Clone)]
pub struct Flag {
    name: String,
    shorthand: Option<char>,
    usage: String,
    value: FlagValue,
    default: FlagValue,
    no_opt_default: Option<String>,
    changed: bool,
    hidden: bool,
    deprecated: Option<String>,
    annotations: BTreeMap<String, Vec<String>>,
}

impl Flag {
    /// Creates a flag of `kind` holding the kind's zero value.
    pub fn new(name: &str, kind: FlagKind) -> Self {
        let value = FlagValue::zero(kind);
        Self {
            name: name.to_string(),
            shorthand: None,
            usage: String::new(),
            default: value.clone(),
            value,
            no_opt_default: (kind == FlagKind::Bool).then(|| "true".to_string()),
            changed: false,
            hidden: false,
            deprecated: None,
            annotations: BTreeMap::new(),
        }
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, FlagKind::Bool)
    }

    pub fn string(name: &str, default: &str) -> Self {
        Self::new(name, FlagKind::String).with_default(FlagValue::String(default.to_string()))
    }

    pub fn int(name: &str, default: i64) -> Self {
        Self::new(name, FlagKind::Int).with_default(FlagValue::Int(default))
    }

    pub fn string_slice(name: &str) -> Self {
        Self::new(name, FlagKind::StringSlice)
    }

    /// Sets the default; the current value is reset to it.
    ///
    /// A default of a different kind than the flag is ignored.
    pub fn with_default(mut self, default: FlagValue) -> Self {
        if default.kind() == self.kind() {
            self.value = default.clone();
            self.default = default;
        }
        self
    }

    pub fn shorthand(mut self, c: char) -> Self {
        self.shorthand = Some(c);
        self
    }

    pub fn usage(mut self, usage: &str) -> Self {
        self.usage = usage.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deprecated(mut self, message: &str) -> Self {
        self.deprecated = Some(message.to_string());
        self
    }

    /// Value implied when the flag is given without one (`--flag`).
    pub fn with_no_opt_default(mut self, value: &str) -> Self {
        self.no_opt_default = Some(value.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shorthand_char(&self) -> Option<char> {
        self.shorthand
    }

    pub fn usage_text(&self) -> &str {
        &self.usage
    }

    pub fn kind(&self) -> FlagKind {
        self.value.kind()
    }

    pub fn value(&self) -> &FlagValue {
        &self.value
    }

    pub fn default_value(&self) -> &FlagValue {
        &self.default
    }

    pub fn no_opt_default(&self) -> Option<&str> {
        self.no_opt_default.as_deref()
    }

    /// Whether the flag was supplied since the last reset.
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    /// Hidden and deprecated flags are never offered as completions.
    pub fn is_completable(&self) -> bool {
        !self.hidden && self.deprecated.is_none()
    }

    pub fn annotations(&self) -> &BTreeMap<String, Vec<String>> {
        &self.annotations
    }

    pub fn annotation(&self, key: &str) -> Option<&[String]> {
        self.annotations.get(key).map(Vec::as_slice)
    }

    /// Whether the flag carries the required marker.
    pub fn is_required(&self) -> bool {
        self.annotation(ANNOTATION_REQUIRED)
            .and_then(|values| values.first())
            .is_some_and(|v| v == "true")
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub(crate) fn set_annotation(&mut self, key: &str, values: Vec<String>) {
        self.annotations.insert(key.to_string(), values);
    }

    pub(crate) fn push_annotation(&mut self, key: &str, value: String) {
        let values = self.annotations.entry(key.to_string()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Applies one occurrence from the command line and marks the flag changed.
    pub fn set(&mut self, raw: &str) -> Result<(), String> {
        let first = !self.changed;
        self.value.apply(raw, first)?;
        self.changed = true;
        Ok(())
    }

    /// Restores the default value and clears `changed`.
    pub fn reset(&mut self) {
        self.value = self.default.clone();
        self.changed = false;
    }

    /// `--name` plus `-s` when a shorthand exists.
    pub fn display_names(&self) -> String {
        match self.shorthand {
            Some(c) => format!("-{c}, --{}", self.name),
            None => format!("--{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_flag_has_implied_value() {
        let flag = Flag::bool("verbose");
        assert_eq!(flag.no_opt_default(), Some("true"));
        assert_eq!(flag.value(), &FlagValue::Bool(false));
    }

    #[test]
    fn test_set_marks_changed_and_reset_restores_default() {
        let mut flag = Flag::string("name", "anon");
        flag.set("bob").unwrap();
        assert!(flag.changed());
        assert_eq!(flag.value(), &FlagValue::String("bob".into()));

        flag.reset();
        assert!(!flag.changed());
        assert_eq!(flag.value(), &FlagValue::String("anon".into()));
    }

    #[test]
    fn test_slice_first_occurrence_replaces_default() {
        let mut flag = Flag::string_slice("tag")
            .with_default(FlagValue::StringSlice(vec!["default".into()]));
        flag.set("a,b").unwrap();
        flag.set("c").unwrap();
        assert_eq!(
            flag.value(),
            &FlagValue::StringSlice(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn test_invalid_int_is_rejected() {
        let mut flag = Flag::int("port", 80);
        assert!(flag.set("eighty").is_err());
        assert!(!flag.changed());
    }

    #[test]
    fn test_string_to_string_parses_pairs() {
        let value = FlagValue::parse(FlagKind::StringToString, "a=1,b=2").unwrap();
        assert_eq!(value.to_string(), "[a=1,b=2]");
        assert!(FlagValue::parse(FlagKind::StringToString, "broken").is_err());
    }

    #[test]
    fn test_repeatable_kinds() {
        assert!(FlagKind::StringArray.is_repeatable());
        assert!(FlagKind::StringToString.is_repeatable());
        assert!(!FlagKind::String.is_repeatable());
    }
}
