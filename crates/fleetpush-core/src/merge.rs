use crate::types::{Binding, Variable};

/// Upserts declared variables into a target's bindings.
///
/// Declared variables are applied in order. Those with a blank value are
/// skipped. A variable whose name matches an existing binding replaces that
/// binding in place as `plain_text`; otherwise it is appended. Bindings not
/// named by any applied variable keep their position and content.
pub fn merge_bindings(existing: Vec<Binding>, declared: &[Variable]) -> Vec<Binding> {
    let mut merged = existing;

    for variable in declared.iter().filter(|variable| variable.has_value()) {
        let replacement = Binding::plain_text(&variable.key, &variable.value);
        match merged
            .iter_mut()
            .find(|binding| binding.name == variable.key)
        {
            Some(slot) => *slot = replacement,
            None => merged.push(replacement),
        }
    }

    merged
}
