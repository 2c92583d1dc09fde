//! Property-based tests for resolution and flag-group invariants.

use command_router_core::*;
use proptest::prelude::*;

const NAMES: [&str; 6] = ["status", "stash", "start", "commit", "config", "clone"];

fn tree_with_children() -> CommandTree {
    let mut tree = CommandTree::new(
        Command::new("git").persistent_flag(Flag::string("config-file", "").shorthand('c')),
    )
    .unwrap();
    let root = tree.root();
    for name in NAMES {
        let child = tree
            .add_command(root, Command::new(name).alias(&format!("x{name}")).run(NoopAction))
            .unwrap();
        tree.add_command(child, Command::new("list").run(NoopAction))
            .unwrap();
    }
    tree
}

fn group_tree(kind: GroupKind) -> CommandTree {
    let mut tree = CommandTree::new(
        Command::new("app")
            .flag(Flag::bool("a"))
            .flag(Flag::bool("b"))
            .flag(Flag::bool("c"))
            .flag(Flag::bool("d"))
            .run(NoopAction),
    )
    .unwrap();
    let root = tree.root();
    tree.register_group(root, kind, &["a", "b", "c"]).unwrap();
    tree
}

fn token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(NAMES.to_vec()).prop_map(String::from),
        Just("list".to_string()),
        Just("--config-file".to_string()),
        Just("-c".to_string()),
        Just("--".to_string()),
        "[a-z]{1,6}",
    ]
}

fn prefix_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(NAMES.to_vec())
        .prop_flat_map(|name| (Just(name), 1..=name.len()))
        .prop_map(|(name, len)| name[..len].to_string())
}

fn flags_for(set: &[bool; 4]) -> Vec<String> {
    ["a", "b", "c", "d"]
        .iter()
        .zip(set)
        .filter(|(_, on)| **on)
        .map(|(name, _)| format!("--{name}"))
        .collect()
}

proptest! {
    #[test]
    fn find_is_deterministic(
        args in prop::collection::vec(token_strategy(), 0..6),
        prefix in any::<bool>(),
        fold in any::<bool>(),
    ) {
        let tree = tree_with_children();
        let config = RouterConfig::default()
            .with_prefix_matching(prefix)
            .with_case_insensitive(fold);
        let first = tree.find(&config, &args).map_err(|e| e.to_string());
        let second = tree.find(&config, &args).map_err(|e| e.to_string());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prefix_ambiguity_iff_enabled_and_shared(token in prefix_strategy(), enabled in any::<bool>()) {
        let tree = tree_with_children();
        let config = RouterConfig::default().with_prefix_matching(enabled);
        let sharing = NAMES.iter().filter(|name| name.starts_with(token.as_str())).count();

        let result = tree.find(&config, &[token.clone()]);
        let ambiguous = matches!(result, Err(RouterError::AmbiguousCommand { .. }));
        prop_assert_eq!(ambiguous, enabled && sharing >= 2);
    }

    #[test]
    fn required_together_set_semantics(set in prop::array::uniform4(any::<bool>())) {
        let mut tree = group_tree(GroupKind::RequiredTogether);
        let result = tree.prepare(&RouterConfig::default(), &flags_for(&set));

        let members = &set[..3];
        let any = members.iter().any(|on| *on);
        let all = members.iter().all(|on| *on);
        let expected_missing: Vec<String> = ["a", "b", "c"]
            .iter()
            .zip(members)
            .filter(|(_, on)| !**on)
            .map(|(name, _)| name.to_string())
            .collect();

        match result {
            Err(RouterError::FlagGroup { flags, .. }) => {
                prop_assert!(any && !all);
                prop_assert_eq!(flags, expected_missing);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
            Ok(_) => prop_assert!(!any || all),
        }
    }

    #[test]
    fn mutually_exclusive_set_semantics(set in prop::array::uniform4(any::<bool>())) {
        let mut tree = group_tree(GroupKind::MutuallyExclusive);
        let result = tree.prepare(&RouterConfig::default(), &flags_for(&set));

        let present: Vec<String> = ["a", "b", "c"]
            .iter()
            .zip(&set[..3])
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.to_string())
            .collect();

        match result {
            Err(RouterError::FlagGroup { flags, .. }) => {
                prop_assert!(present.len() >= 2);
                prop_assert_eq!(flags, present);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
            Ok(_) => prop_assert!(present.len() < 2),
        }
    }
}

#[test]
fn say_resolves_to_echo() {
    let mut tree = CommandTree::new(Command::new("root")).unwrap();
    let root = tree.root();
    let echo = tree
        .add_command(root, Command::new("echo").alias("say").run(NoopAction))
        .unwrap();
    tree.add_command(root, Command::new("print").run(NoopAction))
        .unwrap();

    let args = vec!["say".to_string(), "hello".to_string()];
    let found = tree.find(&RouterConfig::default(), &args).unwrap();
    assert_eq!(found.command, echo);
    assert_eq!(found.called_as, "say");
    assert_eq!(found.args, vec!["hello"]);

    let invocation = tree.execute(&RouterConfig::default(), &args).unwrap();
    assert_eq!(invocation.called_as, "say");
}

#[test]
fn persistent_flag_parsed_at_child_is_visible_at_root() {
    let mut tree = CommandTree::new(
        Command::new("root").persistent_flag(Flag::string("profile", "default")),
    )
    .unwrap();
    let root = tree.root();
    let child = tree
        .add_command(root, Command::new("child").run(NoopAction))
        .unwrap();

    let args = ["child", "--profile", "prod"].map(String::from);
    let invocation = tree.execute(&RouterConfig::default(), &args).unwrap();
    assert_eq!(invocation.command, child);

    let at_root = tree.own_flag(root, "profile").unwrap();
    assert!(tree.flag(at_root).changed());
    assert_eq!(tree.flag(at_root).value().to_string(), "prod");
}
