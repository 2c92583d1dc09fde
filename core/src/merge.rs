//! Persistent-flag inheritance.
//!
//! A command sees its own local and persistent flags plus every persistent
//! flag declared on an ancestor. Walking from the command upward, the first
//! definition of a name wins, so closer definitions shadow farther ones.
//! Merged sets hold the same [`FlagId`](crate::FlagId) as the defining
//! command, which is what makes `changed` state visible at both ends.
//!
//! # Example
//!
//! ```
//! use command_router_core::*;
//!
//! let mut tree = CommandTree::new(
//!     Command::new("app").persistent_flag(Flag::string("config", "")),
//! )
//! .unwrap();
//! let root = tree.root();
//! let run = tree
//!     .add_command(root, Command::new("run").flag(Flag::bool("dry-run")))
//!     .unwrap();
//!
//! let effective = effective_flags(&tree, run);
//! assert!(effective.contains("config"));
//! assert!(effective.contains("dry-run"));
//! assert!(inherited_flags(&tree, run).contains("config"));
//! assert!(!inherited_flags(&tree, run).contains("dry-run"));
//! ```

use crate::command::CommandId;
use crate::flagset::FlagSet;
use crate::tree::CommandTree;

/// Every flag visible to `command`: local, own persistent, then inherited.
pub fn effective_flags(tree: &CommandTree, command: CommandId) -> FlagSet {
    let mut merged = non_inherited_flags(tree, command);
    add_inherited(tree, command, &mut merged);
    merged
}

/// Persistent flags declared on ancestors and not shadowed closer down.
pub fn inherited_flags(tree: &CommandTree, command: CommandId) -> FlagSet {
    let mut shadow = non_inherited_flags(tree, command);
    let mut inherited = FlagSet::new();
    for ancestor in tree.ancestors(command).skip(1) {
        for id in tree.persistent_flags(ancestor).ids() {
            let flag = tree.flag(*id);
            if shadow.insert(*id, flag) {
                inherited.insert(*id, flag);
            }
        }
    }
    inherited
}

/// Flags declared on `command` itself, local and persistent.
pub fn non_inherited_flags(tree: &CommandTree, command: CommandId) -> FlagSet {
    let mut set = FlagSet::new();
    for source in [tree.local_flags(command), tree.persistent_flags(command)] {
        for id in source.ids() {
            set.insert(*id, tree.flag(*id));
        }
    }
    set
}

/// Local flags that are not persistent; they never reach a child.
pub fn local_non_persistent_flags(tree: &CommandTree, command: CommandId) -> FlagSet {
    let mut set = FlagSet::new();
    for id in tree.local_flags(command).ids() {
        set.insert(*id, tree.flag(*id));
    }
    set
}

fn add_inherited(tree: &CommandTree, command: CommandId, merged: &mut FlagSet) {
    for ancestor in tree.ancestors(command).skip(1) {
        for id in tree.persistent_flags(ancestor).ids() {
            merged.insert(*id, tree.flag(*id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::flag::Flag;

    #[test]
    fn test_closer_definition_shadows_ancestor() {
        let mut tree = CommandTree::new(
            Command::new("root").persistent_flag(Flag::string("output", "text").shorthand('o')),
        )
        .unwrap();
        let root = tree.root();
        let child = tree
            .add_command(root, Command::new("child").flag(Flag::string("output", "json")))
            .unwrap();

        let effective = effective_flags(&tree, child);
        let id = effective.lookup("output").unwrap();
        assert_eq!(tree.flag(id).default_value().to_string(), "json");
        assert_eq!(effective.len(), 1);
        assert!(inherited_flags(&tree, child).is_empty());
        // A shadowed flag brings none of its names along.
        assert_eq!(effective.lookup_shorthand('o'), None);
    }

    #[test]
    fn test_merged_flag_shares_identity_with_ancestor() {
        let mut tree =
            CommandTree::new(Command::new("root").persistent_flag(Flag::bool("verbose"))).unwrap();
        let root = tree.root();
        let mid = tree.add_command(root, Command::new("mid")).unwrap();
        let leaf = tree.add_command(mid, Command::new("leaf")).unwrap();

        let from_leaf = effective_flags(&tree, leaf).lookup("verbose").unwrap();
        let from_root = tree.own_flag(root, "verbose").unwrap();
        assert_eq!(from_leaf, from_root);

        tree.flag_mut(from_leaf).set("true").unwrap();
        assert!(tree.flag(from_root).changed());
    }

    #[test]
    fn test_local_flags_are_not_inherited() {
        let mut tree =
            CommandTree::new(Command::new("root").flag(Flag::bool("root-only"))).unwrap();
        let root = tree.root();
        let child = tree.add_command(root, Command::new("child")).unwrap();

        assert!(effective_flags(&tree, root).contains("root-only"));
        assert!(!effective_flags(&tree, child).contains("root-only"));
        assert!(local_non_persistent_flags(&tree, root).contains("root-only"));
    }
}
