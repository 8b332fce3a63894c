use fleetpush_core::merge::merge_bindings;
use fleetpush_core::{Binding, Variable};
use proptest::prelude::*;
use serde_json::json;

fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("UUID".to_string()),
        Just("PATH".to_string()),
        Just("KEY".to_string()),
        Just("CACHE".to_string()),
        "[A-Z]{1,4}",
    ]
}

fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), Just("  ".to_string()), "[a-z0-9]{1,6}"]
}

fn binding_strategy() -> impl Strategy<Value = Binding> {
    (name_strategy(), "[a-z]{0,6}", any::<bool>()).prop_map(|(name, text, plain)| {
        if plain {
            Binding::plain_text(name, text)
        } else {
            serde_json::from_value(json!({
                "name": name,
                "type": "kv_namespace",
                "namespace_id": text,
            }))
            .unwrap()
        }
    })
}

/// Existing binding lists with unique names, as the remote guarantees.
fn existing_strategy() -> impl Strategy<Value = Vec<Binding>> {
    prop::collection::vec(binding_strategy(), 0..8).prop_map(|bindings| {
        let mut seen = std::collections::HashSet::new();
        bindings
            .into_iter()
            .filter(|binding| seen.insert(binding.name.clone()))
            .collect()
    })
}

fn declared_strategy() -> impl Strategy<Value = Vec<Variable>> {
    prop::collection::vec(
        (name_strategy(), value_strategy()).prop_map(|(key, value)| Variable::new(key, value)),
        0..8,
    )
}

proptest! {
    #[test]
    fn merge_is_idempotent(existing in existing_strategy(), declared in declared_strategy()) {
        let once = merge_bindings(existing, &declared);
        let twice = merge_bindings(once.clone(), &declared);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_keeps_names_unique(existing in existing_strategy(), declared in declared_strategy()) {
        let merged = merge_bindings(existing, &declared);
        let mut names: Vec<_> = merged.iter().map(|b| b.name.clone()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        prop_assert_eq!(names.len(), total);
    }

    #[test]
    fn undeclared_bindings_are_untouched(
        existing in existing_strategy(),
        declared in declared_strategy(),
    ) {
        let merged = merge_bindings(existing.clone(), &declared);
        let applied: Vec<&str> = declared
            .iter()
            .filter(|v| v.has_value())
            .map(|v| v.key.as_str())
            .collect();

        for (index, binding) in existing.iter().enumerate() {
            if !applied.contains(&binding.name.as_str()) {
                prop_assert_eq!(&merged[index], binding);
            } else {
                prop_assert_eq!(&merged[index].name, &binding.name);
                prop_assert!(merged[index].is_plain_text());
            }
        }
    }

    #[test]
    fn blank_values_change_nothing(existing in existing_strategy(), keys in prop::collection::vec(name_strategy(), 0..6)) {
        let declared: Vec<_> = keys.into_iter().map(|key| Variable::new(key, " ")).collect();
        prop_assert_eq!(merge_bindings(existing.clone(), &declared), existing);
    }
}
