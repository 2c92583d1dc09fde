//! Declarative tree definitions.
//!
//! A [`TreeDefinition`] describes a command tree in YAML or JSON so a tree can
//! be routed and completed without writing Rust. Definitions carry no
//! behaviour: every runnable command gets a [`NoopAction`].
//!
//! # Example YAML
//!
//! ```yaml
//! config:
//!   prefix_matching: true
//! root:
//!   use: kubectl
//!   persistent_flags:
//!     - name: namespace
//!       shorthand: n
//!       values: [default, kube-system]
//!   commands:
//!     - use: get [resource]
//!       aliases: [g]
//!       args: { type: only_valid }
//!       valid_args: ["pods\tRunning pods", nodes]
//!       flags:
//!         - name: filename
//!           shorthand: f
//!           filename_extensions: [yaml, yml]
//! ```

use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::args::{ArgsSpec, ArgsValidator};
use crate::command::{Command, CommandId, NoopAction};
use crate::completion::StaticCompleter;
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::flag::{Flag, FlagKind, FlagValue};
use crate::groups::GroupKind;
use crate::tree::CommandTree;

/// A complete tree plus the configuration to route it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDefinition {
    #[serde(default)]
    pub config: RouterConfig,
    pub root: CommandDef,
}

/// One command and its subtree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandDef {
    #[serde(rename = "use")]
    pub use_line: String,
    pub aliases: Vec<String>,
    pub short: String,
    pub hidden: bool,
    pub deprecated: Option<String>,
    pub suggest_for: Vec<String>,
    /// `false` makes this a topic command that only groups subcommands.
    #[serde(default = "default_true")]
    pub runnable: bool,
    pub args: Option<ArgsSpec>,
    pub valid_args: Vec<String>,
    pub arg_aliases: Vec<String>,
    pub repeatable_args: bool,
    pub disable_flag_parsing: bool,
    pub whitelist_unknown_flags: bool,
    pub flags: Vec<FlagDef>,
    pub persistent_flags: Vec<FlagDef>,
    pub groups: Vec<GroupDef>,
    pub commands: Vec<CommandDef>,
}

/// A flag declaration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagDef {
    pub name: String,
    pub shorthand: Option<char>,
    pub kind: FlagKind,
    /// Default in command-line syntax, parsed according to `kind`.
    pub default: Option<String>,
    pub no_opt_default: Option<String>,
    pub usage: String,
    pub required: bool,
    pub hidden: bool,
    pub deprecated: Option<String>,
    pub filename_extensions: Vec<String>,
    pub dirname: bool,
    pub subdirs_in: Option<String>,
    pub custom_function: Option<String>,
    /// Fixed completion candidates for the flag's value.
    pub values: Vec<String>,
}

/// A flag group declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDef {
    pub kind: GroupKind,
    pub flags: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl TreeDefinition {
    /// Loads a definition, choosing JSON or YAML by file extension.
    ///
    /// # Errors
    ///
    /// [`InvalidDefinition`](RouterError::InvalidDefinition) for an
    /// unrecognised extension, otherwise I/O and parse errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let reader = || -> Result<BufReader<std::fs::File>> {
            Ok(BufReader::new(std::fs::File::open(path)?))
        };
        match extension.as_deref() {
            Some("json") => Ok(serde_json::from_reader(reader()?)?),
            Some("yaml" | "yml") => Ok(serde_yaml::from_reader(reader()?)?),
            _ => Err(RouterError::InvalidDefinition(format!(
                "unsupported definition file {}: expected .json, .yaml or .yml",
                path.display()
            ))),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the command tree this definition describes.
    pub fn build(&self) -> Result<CommandTree> {
        let mut tree = CommandTree::new(self.root.to_command())?;
        let root = tree.root();
        self.root.attach(&mut tree, root)?;
        debug!(commands = tree.walk(root).len(), "built tree from definition");
        Ok(tree)
    }
}

impl CommandDef {
    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.use_line)
            .aliases(self.aliases.iter().cloned())
            .short(&self.short)
            .valid_args(self.valid_args.iter().cloned())
            .arg_aliases(self.arg_aliases.iter().cloned());
        if self.hidden {
            cmd = cmd.hidden();
        }
        if let Some(message) = &self.deprecated {
            cmd = cmd.deprecated(message);
        }
        for word in &self.suggest_for {
            cmd = cmd.suggest_for(word);
        }
        if self.runnable {
            cmd = cmd.run(NoopAction);
        }
        if let Some(spec) = &self.args {
            cmd = cmd.args(ArgsValidator::from(spec));
        }
        if self.repeatable_args {
            cmd = cmd.repeatable_args();
        }
        if self.disable_flag_parsing {
            cmd = cmd.disable_flag_parsing();
        }
        if self.whitelist_unknown_flags {
            cmd = cmd.whitelist_unknown_flags();
        }
        cmd
    }

    /// Adds flags, groups and children to the already inserted `id`.
    fn attach(&self, tree: &mut CommandTree, id: CommandId) -> Result<()> {
        for def in &self.flags {
            tree.add_flag(id, def.to_flag()?)?;
            def.annotate(tree, id)?;
        }
        for def in &self.persistent_flags {
            tree.add_persistent_flag(id, def.to_flag()?)?;
            def.annotate(tree, id)?;
        }
        for group in &self.groups {
            let names: Vec<&str> = group.flags.iter().map(String::as_str).collect();
            tree.register_group(id, group.kind, &names)?;
        }
        for child in &self.commands {
            let child_id = tree.add_command(id, child.to_command())?;
            child.attach(tree, child_id)?;
        }
        Ok(())
    }
}

impl FlagDef {
    fn to_flag(&self) -> Result<Flag> {
        let mut flag = Flag::new(&self.name, self.kind).usage(&self.usage);
        if let Some(raw) = &self.default {
            let value = FlagValue::parse(self.kind, raw).map_err(|reason| {
                RouterError::InvalidDefinition(format!(
                    "default {raw:?} for flag --{} is not a valid {}: {reason}",
                    self.name,
                    self.kind.type_name()
                ))
            })?;
            flag = flag.with_default(value);
        }
        if let Some(c) = self.shorthand {
            flag = flag.shorthand(c);
        }
        if let Some(implied) = &self.no_opt_default {
            flag = flag.with_no_opt_default(implied);
        }
        if self.hidden {
            flag = flag.hidden();
        }
        if let Some(message) = &self.deprecated {
            flag = flag.deprecated(message);
        }
        Ok(flag)
    }

    fn annotate(&self, tree: &mut CommandTree, id: CommandId) -> Result<()> {
        if self.required {
            tree.mark_flag_required(id, &self.name)?;
        }
        if !self.filename_extensions.is_empty() {
            let exts: Vec<&str> = self.filename_extensions.iter().map(String::as_str).collect();
            tree.mark_flag_filename(id, &self.name, &exts)?;
        }
        if let Some(dir) = &self.subdirs_in {
            tree.mark_flag_subdirs_in(id, &self.name, dir)?;
        } else if self.dirname {
            tree.mark_flag_dirname(id, &self.name)?;
        }
        if let Some(function) = &self.custom_function {
            tree.mark_flag_custom(id, &self.name, function)?;
        }
        if !self.values.is_empty() {
            tree.register_flag_completion(id, &self.name, StaticCompleter::new(&self.values))?;
        }
        Ok(())
    }
}
