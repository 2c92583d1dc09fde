//! Ordered flag sets and POSIX-style flag parsing.
//!
//! A [`FlagSet`] indexes flag ids by long name and shorthand. Parsing walks an
//! argument vector, writes values into the flag arena, and returns whatever
//! positional arguments remain.
//!
//! Cases the parser leaves alone:
//!
//! - `-` by itself is a positional argument (the usual stdin marker).
//! - A flag that needs a value takes the next token even when it starts
//!   with `-`, so `--name -x` sets `name` to `-x`.
//! - `-5` is a shorthand cluster, not a negative number; write
//!   `--count=-5` or `--count -5`.
//! - Long names are never abbreviated.
//! - During traversal `--` ends the search for subcommands; the command
//!   reached so far parses it along with everything after it.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Result, RouterError};
use crate::flag::{Flag, FlagId};

/// An ordered, name-indexed collection of flag ids.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    order: Vec<FlagId>,
    by_name: HashMap<String, FlagId>,
    by_shorthand: HashMap<char, FlagId>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flag unless its name is already present.
    ///
    /// The shorthand is indexed only when no earlier flag claimed it, so the
    /// closer definition keeps the letter when sets are merged.
    pub(crate) fn insert(&mut self, id: FlagId, flag: &Flag) -> bool {
        if self.by_name.contains_key(flag.name()) {
            return false;
        }
        self.by_name.insert(flag.name().to_string(), id);
        if let Some(c) = flag.shorthand_char() {
            self.by_shorthand.entry(c).or_insert(id);
        }
        self.order.push(id);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<FlagId> {
        self.by_name.get(name).copied()
    }

    pub fn lookup_shorthand(&self, c: char) -> Option<FlagId> {
        self.by_shorthand.get(&c).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn has_shorthand(&self, c: char) -> bool {
        self.by_shorthand.contains_key(&c)
    }

    /// Flag ids in insertion order.
    pub fn ids(&self) -> &[FlagId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Flag ids ordered by flag name.
    pub fn sorted_ids(&self, arena: &[Flag]) -> Vec<FlagId> {
        let mut ids = self.order.clone();
        ids.sort_by(|a, b| arena[a.0].name().cmp(arena[b.0].name()));
        ids
    }
}

/// Positional arguments left over after flag parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub positional: Vec<String>,
    /// Number of positional arguments seen before a `--` terminator.
    pub dash_at: Option<usize>,
}

/// Whether `token` is a flag whose value is the *next* argument.
///
/// Unknown `--long` flags are assumed to take a value, matching how the
/// parser would consume them.
pub(crate) fn consumes_next(arena: &[Flag], set: &FlagSet, token: &str) -> bool {
    if token.contains('=') {
        return false;
    }
    if let Some(name) = token.strip_prefix("--") {
        return !has_no_opt_default(arena, set.lookup(name));
    }
    let mut chars = token.chars();
    if chars.next() == Some('-') {
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return !has_no_opt_default(arena, set.lookup_shorthand(c));
        }
    }
    false
}

fn has_no_opt_default(arena: &[Flag], id: Option<FlagId>) -> bool {
    id.is_some_and(|id| arena[id.0].no_opt_default().is_some())
}

/// Whether a token looks like a complete flag (`--x`, `-x`, not `-` or `--`).
pub fn is_flag_arg(token: &str) -> bool {
    (token.len() >= 3 && token.starts_with("--"))
        || (token.len() >= 2 && token.starts_with('-') && !token.starts_with("--"))
}

/// Parses `args` against `set`, writing values into `arena`.
///
/// When `allow_unknown` is set, unknown flags are skipped along with a
/// following value-looking token instead of failing.
pub(crate) fn parse(
    arena: &mut [Flag],
    set: &FlagSet,
    args: &[String],
    allow_unknown: bool,
) -> Result<ParsedArgs> {
    let mut parsed = ParsedArgs::default();
    let mut i = 0;
    while i < args.len() {
        let token = &args[i];
        i += 1;

        if token.len() < 2 || !token.starts_with('-') {
            parsed.positional.push(token.clone());
            continue;
        }

        if token == "--" {
            parsed.dash_at = Some(parsed.positional.len());
            parsed.positional.extend(args[i..].iter().cloned());
            break;
        }

        if let Some(body) = token.strip_prefix("--") {
            i = parse_long(arena, set, body, args, i, allow_unknown)?;
        } else {
            i = parse_short(arena, set, token, args, i, allow_unknown)?;
        }
    }
    Ok(parsed)
}

fn parse_long(
    arena: &mut [Flag],
    set: &FlagSet,
    body: &str,
    args: &[String],
    mut next: usize,
    allow_unknown: bool,
) -> Result<usize> {
    if body.starts_with('-') || body.starts_with('=') {
        return Err(RouterError::BadFlagSyntax(format!("--{body}")));
    }
    let (name, inline) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (body, None),
    };

    let Some(id) = set.lookup(name) else {
        if !allow_unknown {
            return Err(RouterError::UnknownFlag(name.to_string()));
        }
        if inline.is_none() && next < args.len() && !args[next].starts_with('-') {
            next += 1;
        }
        return Ok(next);
    };

    let value = match inline {
        Some(value) => value.to_string(),
        None => match arena[id.0].no_opt_default() {
            Some(implied) => implied.to_string(),
            None if next < args.len() => {
                next += 1;
                args[next - 1].clone()
            }
            None => return Err(RouterError::MissingFlagValue(format!("--{name}"))),
        },
    };
    apply(&mut arena[id.0], &format!("--{name}"), &value)?;
    Ok(next)
}

fn parse_short(
    arena: &mut [Flag],
    set: &FlagSet,
    token: &str,
    args: &[String],
    mut next: usize,
    allow_unknown: bool,
) -> Result<usize> {
    let cluster: Vec<char> = token[1..].chars().collect();
    let mut pos = 0;
    while pos < cluster.len() {
        let c = cluster[pos];
        pos += 1;

        let Some(id) = set.lookup_shorthand(c) else {
            if !allow_unknown {
                return Err(RouterError::UnknownShorthand {
                    shorthand: c,
                    token: token.to_string(),
                });
            }
            if pos == cluster.len() && next < args.len() && !args[next].starts_with('-') {
                next += 1;
            }
            return Ok(next);
        };

        let value = if cluster.get(pos) == Some(&'=') {
            let rest: String = cluster[pos + 1..].iter().collect();
            pos = cluster.len();
            rest
        } else if let Some(implied) = arena[id.0].no_opt_default() {
            implied.to_string()
        } else if pos < cluster.len() {
            let rest: String = cluster[pos..].iter().collect();
            pos = cluster.len();
            rest
        } else if next < args.len() {
            next += 1;
            args[next - 1].clone()
        } else {
            return Err(RouterError::MissingFlagValue(format!("-{c}")));
        };
        apply(&mut arena[id.0], &format!("-{c}"), &value)?;
    }
    Ok(next)
}

fn apply(flag: &mut Flag, spelled: &str, value: &str) -> Result<()> {
    if let Some(message) = flag.deprecation() {
        warn!("Flag --{} has been deprecated, {}", flag.name(), message);
    }
    flag.set(value).map_err(|reason| RouterError::InvalidFlagValue {
        flag: spelled.to_string(),
        value: value.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use crate::flag::FlagValue;

    use super::*;

    fn fixture() -> (Vec<Flag>, FlagSet) {
        let arena = vec![
            Flag::bool("verbose").shorthand('v'),
            Flag::string("name", "").shorthand('n'),
            Flag::bool("all").shorthand('a'),
            Flag::int("count", 0).shorthand('c'),
        ];
        let mut set = FlagSet::new();
        for (i, flag) in arena.iter().enumerate() {
            set.insert(FlagId(i), flag);
        }
        (arena, set)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_long_forms_and_positionals() {
        let (mut arena, set) = fixture();
        let parsed = parse(
            &mut arena,
            &set,
            &args(&["one", "--name", "bob", "--verbose", "two", "--count=3"]),
            false,
        )
        .unwrap();
        assert_eq!(parsed.positional, args(&["one", "two"]));
        assert_eq!(arena[1].value(), &FlagValue::String("bob".into()));
        assert!(arena[0].changed());
        assert_eq!(arena[3].value(), &FlagValue::Int(3));
    }

    #[test]
    fn test_parse_short_cluster_with_trailing_value() {
        let (mut arena, set) = fixture();
        parse(&mut arena, &set, &args(&["-vanbob"]), false).unwrap();
        assert!(arena[0].changed());
        assert!(arena[2].changed());
        assert_eq!(arena[1].value(), &FlagValue::String("bob".into()));
    }

    #[test]
    fn test_double_dash_terminates_flags() {
        let (mut arena, set) = fixture();
        let parsed = parse(&mut arena, &set, &args(&["a", "--", "--verbose"]), false).unwrap();
        assert_eq!(parsed.positional, args(&["a", "--verbose"]));
        assert_eq!(parsed.dash_at, Some(1));
        assert!(!arena[0].changed());
    }

    #[test]
    fn test_lone_dash_and_dash_leading_values() {
        let (mut arena, set) = fixture();
        let parsed = parse(&mut arena, &set, &args(&["-", "--name", "-x", "--count", "-5"]), false)
            .unwrap();
        assert_eq!(parsed.positional, args(&["-"]));
        assert_eq!(arena[1].value(), &FlagValue::String("-x".into()));
        assert_eq!(arena[3].value(), &FlagValue::Int(-5));

        let err = parse(&mut arena, &set, &args(&["-5"]), false).unwrap_err();
        assert!(matches!(err, RouterError::UnknownShorthand { shorthand: '5', .. }));
    }

    #[test]
    fn test_unknown_flag_is_error_unless_whitelisted() {
        let (mut arena, set) = fixture();
        let err = parse(&mut arena, &set, &args(&["--nope"]), false).unwrap_err();
        assert!(matches!(err, RouterError::UnknownFlag(name) if name == "nope"));

        let parsed = parse(&mut arena, &set, &args(&["--nope", "x", "y"]), true).unwrap();
        assert_eq!(parsed.positional, args(&["y"]));
    }

    #[test]
    fn test_missing_value_is_reported() {
        let (mut arena, set) = fixture();
        let err = parse(&mut arena, &set, &args(&["--name"]), false).unwrap_err();
        assert!(matches!(err, RouterError::MissingFlagValue(flag) if flag == "--name"));
    }

    #[test]
    fn test_consumes_next_distinguishes_bool_flags() {
        let (arena, set) = fixture();
        assert!(consumes_next(&arena, &set, "--name"));
        assert!(consumes_next(&arena, &set, "-n"));
        assert!(!consumes_next(&arena, &set, "--verbose"));
        assert!(!consumes_next(&arena, &set, "--name=x"));
        assert!(consumes_next(&arena, &set, "--unknown"));
        assert!(!consumes_next(&arena, &set, "-vn"));
    }
}
