//! Completion directives.
//!
//! A directive is a small bitmask returned alongside completion candidates
//! that tells the shell script how to present them.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Bitmask instructing the shell how to handle completion candidates.
///
/// # Examples
///
/// ```
/// use command_router_core::ShellCompDirective;
///
/// let d = ShellCompDirective::NO_FILE_COMP | ShellCompDirective::NO_SPACE;
/// assert_eq!(d.bits(), 6);
/// assert_eq!(ShellCompDirective::from_bits(6), Some(d));
/// assert!(d.contains(ShellCompDirective::NO_SPACE));
/// assert!(!d.contains(ShellCompDirective::FILTER_DIRS));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShellCompDirective(u32);

impl ShellCompDirective {
    /// Let the shell perform its default behaviour.
    pub const DEFAULT: Self = Self(0);
    /// An error occurred; candidates should be ignored.
    pub const ERROR: Self = Self(1 << 0);
    /// Do not add a space after the completion.
    pub const NO_SPACE: Self = Self(1 << 1);
    /// Do not fall back to file completion.
    pub const NO_FILE_COMP: Self = Self(1 << 2);
    /// Candidates are file extensions to filter on.
    pub const FILTER_FILE_EXT: Self = Self(1 << 3);
    /// Complete directories only; a single candidate names the base directory.
    pub const FILTER_DIRS: Self = Self(1 << 4);
    /// Keep candidate order instead of letting the shell sort.
    pub const KEEP_ORDER: Self = Self(1 << 5);

    const ALL: u32 = (1 << 6) - 1;

    const NAMED: [(Self, &'static str); 6] = [
        (Self::ERROR, "ShellCompDirectiveError"),
        (Self::NO_SPACE, "ShellCompDirectiveNoSpace"),
        (Self::NO_FILE_COMP, "ShellCompDirectiveNoFileComp"),
        (Self::FILTER_FILE_EXT, "ShellCompDirectiveFilterFileExt"),
        (Self::FILTER_DIRS, "ShellCompDirectiveFilterDirs"),
        (Self::KEEP_ORDER, "ShellCompDirectiveKeepOrder"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Decodes a raw value, rejecting unknown bits.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_default(self) -> bool {
        self.0 == 0
    }

    /// Individual bits set in this directive, lowest first.
    pub fn flags(self) -> Vec<Self> {
        Self::NAMED
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(bit, _)| *bit)
            .collect()
    }

    /// Human-readable list of set bits, used in the protocol trailer.
    pub fn describe(self) -> String {
        if self.0 & !Self::ALL != 0 {
            return format!("ERROR: unexpected ShellCompDirective value: {}", self.0);
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            "ShellCompDirectiveDefault".to_string()
        } else {
            names.join(", ")
        }
    }
}

impl BitOr for ShellCompDirective {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ShellCompDirective {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ShellCompDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combination_decodes_to_exact_bits() {
        let combined = ShellCompDirective::NO_FILE_COMP | ShellCompDirective::NO_SPACE;
        let decoded = ShellCompDirective::from_bits(combined.bits()).unwrap();
        assert_eq!(
            decoded.flags(),
            vec![
                ShellCompDirective::NO_SPACE,
                ShellCompDirective::NO_FILE_COMP
            ]
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            ShellCompDirective::DEFAULT.describe(),
            "ShellCompDirectiveDefault"
        );
        assert_eq!(
            (ShellCompDirective::NO_SPACE | ShellCompDirective::KEEP_ORDER).describe(),
            "ShellCompDirectiveNoSpace, ShellCompDirectiveKeepOrder"
        );
    }

    #[test]
    fn test_unknown_bits_are_rejected() {
        assert!(ShellCompDirective::from_bits(64).is_none());
        assert!(ShellCompDirective::from_bits(63).is_some());
    }
}
