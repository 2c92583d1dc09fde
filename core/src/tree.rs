//! Arena-backed command tree.
//!
//! Commands and flags live in two flat arenas owned by [`CommandTree`].
//! Parents are stored as ids, never as owning references, and attaching a
//! child is checked so the tree stays acyclic and single-parent.
//!
//! Ids are only meaningful for the tree that issued them; passing an id from
//! another tree panics on lookup like any out-of-range index.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::command::{Command, CommandId};
use crate::completion::Completer;
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::flag::{
    ANNOTATION_CUSTOM, ANNOTATION_FILENAME_EXT, ANNOTATION_REQUIRED, ANNOTATION_SUBDIRS_IN_DIR,
    Flag, FlagId,
};
use crate::flagset::FlagSet;
use crate::groups::FlagGroup;

pub(crate) struct Node {
    pub(crate) command: Command,
    pub(crate) parent: Option<CommandId>,
    pub(crate) children: Vec<CommandId>,
    pub(crate) local_flags: FlagSet,
    pub(crate) persistent_flags: FlagSet,
    pub(crate) groups: Vec<FlagGroup>,
}

/// A tree of commands with their flags.
///
/// # Examples
///
/// ```
/// use command_router_core::{Command, CommandTree, Flag};
///
/// let mut tree = CommandTree::new(
///     Command::new("app").persistent_flag(Flag::bool("verbose").shorthand('v')),
/// )
/// .unwrap();
/// let root = tree.root();
/// let serve = tree.add_command(root, Command::new("serve")).unwrap();
///
/// assert_eq!(tree.command_path(serve), "app serve");
/// assert!(tree.find_flag(serve, "verbose").is_some());
/// ```
pub struct CommandTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) flags: Vec<Flag>,
    flag_completers: HashMap<FlagId, Arc<dyn Completer>>,
    root: CommandId,
}

impl CommandTree {
    /// Creates a tree whose root is `root`.
    pub fn new(root: Command) -> Result<Self> {
        let mut tree = Self {
            nodes: Vec::new(),
            flags: Vec::new(),
            flag_completers: HashMap::new(),
            root: CommandId(0),
        };
        tree.root = tree.insert(root)?;
        Ok(tree)
    }

    pub fn root(&self) -> CommandId {
        self.root
    }

    /// Moves a command into the arena without attaching it anywhere.
    ///
    /// Flags queued on the command are registered as it is inserted.
    pub fn insert(&mut self, mut command: Command) -> Result<CommandId> {
        let flags = std::mem::take(&mut command.pending_flags);
        let persistent = std::mem::take(&mut command.pending_persistent_flags);
        let id = CommandId(self.nodes.len());
        self.nodes.push(Node {
            command,
            parent: None,
            children: Vec::new(),
            local_flags: FlagSet::new(),
            persistent_flags: FlagSet::new(),
            groups: Vec::new(),
        });
        for flag in flags {
            self.add_flag(id, flag)?;
        }
        for flag in persistent {
            self.add_persistent_flag(id, flag)?;
        }
        Ok(id)
    }

    /// Attaches `child` under `parent`.
    ///
    /// # Errors
    ///
    /// [`SelfParent`](RouterError::SelfParent) when both are the same node,
    /// [`AlreadyParented`](RouterError::AlreadyParented) when `child` has a
    /// parent, and [`CycleDetected`](RouterError::CycleDetected) when `child`
    /// is the root or an ancestor of `parent`.
    pub fn add_child(&mut self, parent: CommandId, child: CommandId) -> Result<()> {
        if parent == child {
            return Err(RouterError::SelfParent(self.name(child).to_string()));
        }
        if self.nodes[child.0].parent.is_some() {
            return Err(RouterError::AlreadyParented(self.name(child).to_string()));
        }
        if child == self.root || self.ancestors(parent).any(|a| a == child) {
            return Err(RouterError::CycleDetected {
                parent: self.command_path(parent),
                child: self.name(child).to_string(),
            });
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Inserts `command` and attaches it under `parent`.
    pub fn add_command(&mut self, parent: CommandId, command: Command) -> Result<CommandId> {
        let id = self.insert(command)?;
        self.add_child(parent, id)?;
        Ok(id)
    }

    /// Detaches `child` from `parent`; the node stays in the arena.
    pub fn remove_child(&mut self, parent: CommandId, child: CommandId) -> bool {
        let children = &mut self.nodes[parent.0].children;
        let Some(pos) = children.iter().position(|c| *c == child) else {
            return false;
        };
        children.remove(pos);
        self.nodes[child.0].parent = None;
        true
    }

    pub fn command(&self, id: CommandId) -> &Command {
        &self.nodes[id.0].command
    }

    pub fn command_mut(&mut self, id: CommandId) -> &mut Command {
        &mut self.nodes[id.0].command
    }

    pub fn name(&self, id: CommandId) -> &str {
        self.command(id).name()
    }

    pub fn parent(&self, id: CommandId) -> Option<CommandId> {
        self.nodes[id.0].parent
    }

    /// Children in insertion order.
    pub fn children(&self, id: CommandId) -> &[CommandId] {
        &self.nodes[id.0].children
    }

    /// Children, sorted by name when the configuration asks for it.
    pub fn ordered_children(&self, id: CommandId, config: &RouterConfig) -> Vec<CommandId> {
        let mut children = self.children(id).to_vec();
        if config.sort_commands {
            children.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
        }
        children
    }

    /// `id` followed by each ancestor up to the root.
    pub fn ancestors(&self, id: CommandId) -> impl Iterator<Item = CommandId> + '_ {
        std::iter::successors(Some(id), move |current| self.parent(*current))
    }

    /// Space-separated names from the root down to `id`.
    pub fn command_path(&self, id: CommandId) -> String {
        let mut names: Vec<&str> = self.ancestors(id).map(|a| self.name(a)).collect();
        names.reverse();
        names.join(" ")
    }

    /// Visible, non-deprecated, and either runnable or a parent of such.
    pub fn is_available(&self, id: CommandId) -> bool {
        let command = self.command(id);
        if command.is_hidden() || command.deprecation().is_some() {
            return false;
        }
        command.is_runnable() || self.children(id).iter().any(|c| self.is_available(*c))
    }

    /// Depth-first walk from `id`, parents before children.
    pub fn walk(&self, id: CommandId) -> Vec<CommandId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Adds a local flag to `command`.
    pub fn add_flag(&mut self, command: CommandId, flag: Flag) -> Result<FlagId> {
        self.register_flag(command, flag, false)
    }

    /// Adds a flag that every descendant of `command` inherits.
    pub fn add_persistent_flag(&mut self, command: CommandId, flag: Flag) -> Result<FlagId> {
        self.register_flag(command, flag, true)
    }

    fn register_flag(&mut self, command: CommandId, flag: Flag, persistent: bool) -> Result<FlagId> {
        let node = &self.nodes[command.0];
        let clash = [&node.local_flags, &node.persistent_flags].iter().find_map(|set| {
            if set.contains(flag.name()) {
                return Some(flag.name().to_string());
            }
            flag.shorthand_char()
                .filter(|c| set.has_shorthand(*c))
                .map(|c| c.to_string())
        });
        if let Some(flag_name) = clash {
            return Err(RouterError::DuplicateFlag {
                command: self.command_path(command),
                flag: flag_name,
            });
        }

        let id = FlagId(self.flags.len());
        let node = &mut self.nodes[command.0];
        if persistent {
            node.persistent_flags.insert(id, &flag);
        } else {
            node.local_flags.insert(id, &flag);
        }
        self.flags.push(flag);
        Ok(id)
    }

    pub fn flag(&self, id: FlagId) -> &Flag {
        &self.flags[id.0]
    }

    pub fn flag_mut(&mut self, id: FlagId) -> &mut Flag {
        &mut self.flags[id.0]
    }

    /// The whole flag arena.
    pub fn flag_arena(&self) -> &[Flag] {
        &self.flags
    }

    pub fn local_flags(&self, command: CommandId) -> &FlagSet {
        &self.nodes[command.0].local_flags
    }

    pub fn persistent_flags(&self, command: CommandId) -> &FlagSet {
        &self.nodes[command.0].persistent_flags
    }

    /// Looks a flag up on the command itself (local, then persistent).
    pub fn own_flag(&self, command: CommandId, name: &str) -> Option<FlagId> {
        let node = &self.nodes[command.0];
        node.local_flags
            .lookup(name)
            .or_else(|| node.persistent_flags.lookup(name))
    }

    /// Looks a flag up in the command's effective set, ancestors included.
    pub fn find_flag(&self, command: CommandId, name: &str) -> Option<FlagId> {
        self.ancestors(command).enumerate().find_map(|(depth, id)| {
            let node = &self.nodes[id.0];
            let local = (depth == 0).then(|| node.local_flags.lookup(name)).flatten();
            local.or_else(|| node.persistent_flags.lookup(name))
        })
    }

    fn own_flag_or_err(&self, command: CommandId, name: &str) -> Result<FlagId> {
        self.own_flag(command, name)
            .ok_or_else(|| RouterError::NoSuchFlag {
                command: self.command_path(command),
                flag: name.to_string(),
            })
    }

    /// Marks a flag as required for the command to run.
    pub fn mark_flag_required(&mut self, command: CommandId, name: &str) -> Result<()> {
        let id = self.own_flag_or_err(command, name)?;
        self.flags[id.0].set_annotation(ANNOTATION_REQUIRED, vec!["true".to_string()]);
        Ok(())
    }

    /// Completes the flag's value with files matching `extensions`.
    pub fn mark_flag_filename(
        &mut self,
        command: CommandId,
        name: &str,
        extensions: &[&str],
    ) -> Result<()> {
        let id = self.own_flag_or_err(command, name)?;
        let exts = extensions.iter().map(|e| e.to_string()).collect();
        self.flags[id.0].set_annotation(ANNOTATION_FILENAME_EXT, exts);
        Ok(())
    }

    /// Completes the flag's value with directories.
    pub fn mark_flag_dirname(&mut self, command: CommandId, name: &str) -> Result<()> {
        let id = self.own_flag_or_err(command, name)?;
        self.flags[id.0].set_annotation(ANNOTATION_SUBDIRS_IN_DIR, Vec::new());
        Ok(())
    }

    /// Completes the flag's value with sub-directories of `dir`.
    pub fn mark_flag_subdirs_in(&mut self, command: CommandId, name: &str, dir: &str) -> Result<()> {
        let id = self.own_flag_or_err(command, name)?;
        self.flags[id.0].set_annotation(ANNOTATION_SUBDIRS_IN_DIR, vec![dir.to_string()]);
        Ok(())
    }

    /// Completes the flag's value by calling a shell function in generated scripts.
    pub fn mark_flag_custom(&mut self, command: CommandId, name: &str, function: &str) -> Result<()> {
        let id = self.own_flag_or_err(command, name)?;
        self.flags[id.0].set_annotation(ANNOTATION_CUSTOM, vec![function.to_string()]);
        Ok(())
    }

    /// Hides a flag from completions and generated scripts.
    pub fn mark_flag_hidden(&mut self, command: CommandId, name: &str) -> Result<()> {
        let id = self.own_flag_or_err(command, name)?;
        self.flags[id.0].set_hidden(true);
        Ok(())
    }

    /// Registers a completer for a flag's value.
    ///
    /// The flag is looked up in the effective set, so a subcommand may attach
    /// a completer to an inherited flag.
    pub fn register_flag_completion(
        &mut self,
        command: CommandId,
        name: &str,
        completer: impl Completer + 'static,
    ) -> Result<()> {
        let id = self
            .find_flag(command, name)
            .ok_or_else(|| RouterError::NoSuchFlag {
                command: self.command_path(command),
                flag: name.to_string(),
            })?;
        if self.flag_completers.contains_key(&id) {
            return Err(RouterError::DuplicateCompleter(name.to_string()));
        }
        self.flag_completers.insert(id, Arc::new(completer));
        Ok(())
    }

    pub fn flag_completer(&self, id: FlagId) -> Option<&Arc<dyn Completer>> {
        self.flag_completers.get(&id)
    }

    /// Restores every flag's default value and clears its `changed` state.
    ///
    /// Parsing leaves flags changed; callers that route several argument
    /// vectors through one tree reset in between.
    pub fn reset_flags(&mut self) {
        for flag in &mut self.flags {
            flag.reset();
        }
    }

    /// Names (and aliases) of siblings close to `typed`, for error messages.
    pub fn suggestions_for(&self, command: CommandId, typed: &str) -> Vec<String> {
        crate::resolve::suggestions(self, command, typed, &RouterConfig::default())
    }
}

impl fmt::Debug for CommandTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTree")
            .field("root", &self.command_path(self.root))
            .field("commands", &self.nodes.len())
            .field("flags", &self.flags.len())
            .field("flag_completers", &self.flag_completers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (CommandTree, CommandId, CommandId) {
        let mut tree = CommandTree::new(Command::new("root")).unwrap();
        let root = tree.root();
        let a = tree.add_command(root, Command::new("a")).unwrap();
        let b = tree.add_command(a, Command::new("b")).unwrap();
        (tree, a, b)
    }

    #[test]
    fn test_command_path() {
        let (tree, _, b) = tree();
        assert_eq!(tree.command_path(b), "root a b");
    }

    #[test]
    fn test_self_parent_rejected() {
        let (mut tree, a, _) = tree();
        assert!(matches!(tree.add_child(a, a), Err(RouterError::SelfParent(_))));
    }

    #[test]
    fn test_reparent_rejected() {
        let (mut tree, _, b) = tree();
        let root = tree.root();
        assert!(matches!(
            tree.add_child(root, b),
            Err(RouterError::AlreadyParented(_))
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut tree, a, b) = tree();
        let root = tree.root();
        assert!(tree.remove_child(root, a));
        assert!(matches!(
            tree.add_child(b, a),
            Err(RouterError::CycleDetected { .. })
        ));
        assert!(matches!(
            tree.add_child(b, root),
            Err(RouterError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_duplicate_flag_rejected() {
        let (mut tree, a, _) = tree();
        tree.add_flag(a, Flag::bool("force").shorthand('f')).unwrap();
        assert!(matches!(
            tree.add_persistent_flag(a, Flag::bool("force")),
            Err(RouterError::DuplicateFlag { .. })
        ));
        assert!(matches!(
            tree.add_flag(a, Flag::bool("fast").shorthand('f')),
            Err(RouterError::DuplicateFlag { .. })
        ));
    }

    #[test]
    fn test_find_flag_prefers_closest_definition() {
        let (mut tree, a, b) = tree();
        let root = tree.root();
        let outer = tree.add_persistent_flag(root, Flag::string("output", "")).unwrap();
        let inner = tree.add_persistent_flag(a, Flag::string("output", "")).unwrap();
        let local_on_root = tree.add_flag(root, Flag::bool("local")).unwrap();

        assert_eq!(tree.find_flag(b, "output"), Some(inner));
        assert_eq!(tree.find_flag(root, "output"), Some(outer));
        assert_eq!(tree.find_flag(root, "local"), Some(local_on_root));
        assert_eq!(tree.find_flag(b, "local"), None);
    }

    #[test]
    fn test_mark_required_unknown_flag() {
        let (mut tree, a, _) = tree();
        assert!(matches!(
            tree.mark_flag_required(a, "missing"),
            Err(RouterError::NoSuchFlag { .. })
        ));
    }

    #[test]
    fn test_is_available() {
        use crate::command::NoopAction;

        let mut tree = CommandTree::new(Command::new("root")).unwrap();
        let root = tree.root();
        let topic = tree.add_command(root, Command::new("topic")).unwrap();
        assert!(!tree.is_available(topic));
        tree.add_command(topic, Command::new("leaf").run(NoopAction))
            .unwrap();
        assert!(tree.is_available(topic));
        let hidden = tree
            .add_command(root, Command::new("secret").hidden().run(NoopAction))
            .unwrap();
        assert!(!tree.is_available(hidden));
    }

    #[test]
    fn test_walk_is_depth_first_in_insertion_order() {
        let (mut tree, a, b) = tree();
        let root = tree.root();
        let c = tree.add_command(root, Command::new("c")).unwrap();
        assert_eq!(tree.walk(root), vec![root, a, b, c]);
    }
}
