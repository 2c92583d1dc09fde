//! Flag groups: constraints over sets of flags checked after parsing.
//!
//! A group is registered on one command and applies only when that command
//! is the one invoked. Each member flag is also annotated with the group's
//! key so generated scripts and tooling can see the membership.
//!
//! Groups are evaluated in ascending order of their key (member names joined
//! by a single space); the first violation is reported.
//!
//! # Example
//!
//! ```
//! use command_router_core::*;
//!
//! let mut tree = CommandTree::new(
//!     Command::new("app")
//!         .flag(Flag::string("json", ""))
//!         .flag(Flag::string("yaml", "")),
//! )
//! .unwrap();
//! let root = tree.root();
//! tree.mark_flags_mutually_exclusive(root, &["json", "yaml"]).unwrap();
//!
//! tree.flag_mut(tree.find_flag(root, "json").unwrap()).set("a").unwrap();
//! assert!(validate_flag_groups(&tree, root).is_ok());
//!
//! tree.flag_mut(tree.find_flag(root, "yaml").unwrap()).set("b").unwrap();
//! assert!(validate_flag_groups(&tree, root).is_err());
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::CommandId;
use crate::error::{Result, RouterError};
use crate::flag::FlagId;
use crate::merge::effective_flags;
use crate::tree::CommandTree;

/// Annotation listing the required-together groups a flag belongs to.
pub const ANNOTATION_REQUIRED_TOGETHER: &str = "cobra_annotation_required_if_others_set";
/// Annotation listing the mutually-exclusive groups a flag belongs to.
pub const ANNOTATION_MUTUALLY_EXCLUSIVE: &str = "cobra_annotation_mutually_exclusive";
/// Annotation listing the one-required groups a flag belongs to.
pub const ANNOTATION_ONE_REQUIRED: &str = "cobra_annotation_one_required";
/// Annotation listing the if-present-then-required groups a flag belongs to.
pub const ANNOTATION_IF_PRESENT_THEN_REQUIRED: &str = "cobra_annotation_if_present_then_required";

/// Constraint applied to a flag group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    /// If any member is set, all must be.
    RequiredTogether,
    /// At most one member may be set.
    MutuallyExclusive,
    /// At least one member must be set.
    OneRequired,
    /// If the first member is set, every other member must be.
    IfPresentThenRequired,
}

impl GroupKind {
    pub fn annotation_key(self) -> &'static str {
        match self {
            GroupKind::RequiredTogether => ANNOTATION_REQUIRED_TOGETHER,
            GroupKind::MutuallyExclusive => ANNOTATION_MUTUALLY_EXCLUSIVE,
            GroupKind::OneRequired => ANNOTATION_ONE_REQUIRED,
            GroupKind::IfPresentThenRequired => ANNOTATION_IF_PRESENT_THEN_REQUIRED,
        }
    }
}

/// A registered group: its constraint and member flag names in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagGroup {
    pub kind: GroupKind,
    pub flags: Vec<String>,
}

impl FlagGroup {
    /// Canonical key: member names joined by a single space.
    pub fn key(&self) -> String {
        self.flags.join(" ")
    }

    fn violation(&self, set: &HashSet<&str>) -> Option<RouterError> {
        let is_set = |name: &String| set.contains(name.as_str());
        let mut offending: Vec<String> = match self.kind {
            GroupKind::RequiredTogether => {
                if !self.flags.iter().any(is_set) {
                    return None;
                }
                self.flags.iter().filter(|f| !is_set(*f)).cloned().collect()
            }
            GroupKind::MutuallyExclusive => {
                let present: Vec<String> = self.flags.iter().filter(|f| is_set(*f)).cloned().collect();
                if present.len() < 2 {
                    return None;
                }
                present
            }
            GroupKind::OneRequired => {
                if self.flags.iter().any(is_set) {
                    return None;
                }
                return Some(self.error(Vec::new()));
            }
            GroupKind::IfPresentThenRequired => {
                let (trigger, dependents) = self.flags.split_first()?;
                if !is_set(trigger) {
                    return None;
                }
                dependents.iter().filter(|f| !is_set(*f)).cloned().collect()
            }
        };
        if offending.is_empty() {
            return None;
        }
        offending.sort();
        Some(self.error(offending))
    }

    fn error(&self, flags: Vec<String>) -> RouterError {
        RouterError::FlagGroup {
            kind: self.kind,
            group: self.flags.clone(),
            flags,
        }
    }
}

impl CommandTree {
    /// If any of `flags` is set on an invocation of `command`, all must be.
    pub fn mark_flags_required_together(&mut self, command: CommandId, flags: &[&str]) -> Result<()> {
        self.register_group(command, GroupKind::RequiredTogether, flags)
    }

    /// At most one of `flags` may be set.
    pub fn mark_flags_mutually_exclusive(&mut self, command: CommandId, flags: &[&str]) -> Result<()> {
        self.register_group(command, GroupKind::MutuallyExclusive, flags)
    }

    /// At least one of `flags` must be set.
    pub fn mark_flags_one_required(&mut self, command: CommandId, flags: &[&str]) -> Result<()> {
        self.register_group(command, GroupKind::OneRequired, flags)
    }

    /// When `flags[0]` is set, the remaining flags must be set too.
    pub fn mark_if_present_then_required(&mut self, command: CommandId, flags: &[&str]) -> Result<()> {
        self.register_group(command, GroupKind::IfPresentThenRequired, flags)
    }

    /// Registers a group on `command`; every member must be visible to it.
    pub fn register_group(&mut self, command: CommandId, kind: GroupKind, flags: &[&str]) -> Result<()> {
        if flags.len() < 2 {
            return Err(RouterError::InvalidDefinition(format!(
                "a flag group needs at least two flags, got [{}]",
                flags.join(" ")
            )));
        }
        let mut ids = Vec::with_capacity(flags.len());
        for name in flags {
            let id = self.find_flag(command, name).ok_or_else(|| RouterError::NoSuchFlag {
                command: self.command_path(command),
                flag: name.to_string(),
            })?;
            ids.push(id);
        }

        let group = FlagGroup {
            kind,
            flags: flags.iter().map(|f| f.to_string()).collect(),
        };
        let key = group.key();
        for id in ids {
            self.flag_mut(id).push_annotation(kind.annotation_key(), key.clone());
        }
        let groups = &mut self.nodes[command.0].groups;
        if !groups.contains(&group) {
            groups.push(group);
        }
        Ok(())
    }

    /// Groups registered directly on `command`.
    pub fn flag_groups(&self, command: CommandId) -> &[FlagGroup] {
        &self.nodes[command.0].groups
    }
}

/// Checks every group registered on `command` against the parsed flags.
pub fn validate_flag_groups(tree: &CommandTree, command: CommandId) -> Result<()> {
    let effective = effective_flags(tree, command);
    let set: HashSet<&str> = effective
        .ids()
        .iter()
        .map(|id| tree.flag(*id))
        .filter(|flag| flag.changed())
        .map(|flag| flag.name())
        .collect();

    let mut groups: Vec<&FlagGroup> = tree
        .flag_groups(command)
        .iter()
        .filter(|group| group.flags.iter().all(|f| effective.contains(f)))
        .collect();
    groups.sort_by(|a, b| a.key().cmp(&b.key()).then(a.kind.cmp(&b.kind)));

    for group in groups {
        if let Some(err) = group.violation(&set) {
            debug!(group = %group.key(), kind = ?group.kind, "flag group violated");
            return Err(err);
        }
    }
    Ok(())
}

/// How groups change flag-name completion for the current state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupHints {
    /// Flags that become required given what is already set.
    pub required: HashSet<FlagId>,
    /// Flags excluded because a mutually-exclusive sibling is set.
    pub hidden: HashSet<FlagId>,
}

/// Derives completion hints from the groups registered on `command`.
pub fn completion_hints(tree: &CommandTree, command: CommandId) -> GroupHints {
    let effective = effective_flags(tree, command);
    let mut hints = GroupHints::default();
    for group in tree.flag_groups(command) {
        let members: Vec<FlagId> = group
            .flags
            .iter()
            .filter_map(|name| effective.lookup(name))
            .collect();
        if members.len() != group.flags.len() {
            continue;
        }
        let changed = |id: &FlagId| tree.flag(*id).changed();
        let unset = members.iter().filter(|id| !changed(*id)).copied();
        match group.kind {
            GroupKind::RequiredTogether if members.iter().any(changed) => {
                hints.required.extend(unset);
            }
            GroupKind::OneRequired if !members.iter().any(changed) => {
                hints.required.extend(unset);
            }
            GroupKind::MutuallyExclusive if members.iter().any(changed) => {
                hints.hidden.extend(unset);
            }
            GroupKind::IfPresentThenRequired if changed(&members[0]) => {
                hints.required.extend(unset);
            }
            _ => {}
        }
    }
    hints
}
