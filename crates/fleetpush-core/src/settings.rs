//! Variable-set reconciliation against a template's defaults.
//!
//! This is presentation-side bookkeeping: it fills in defaults and generates
//! identity values before a set is saved or submitted. The merge step never
//! calls into it.

use uuid::Uuid;

use crate::templates::TemplateConfig;
use crate::types::Variable;

/// Builds the editable variable list for a template.
///
/// Default variables come first in registry order, taking their saved value
/// when present. An empty identity variable receives a fresh UUID. Saved
/// custom variables follow in saved order.
pub fn reconcile_variables(template: &TemplateConfig, saved: Option<Vec<Variable>>) -> Vec<Variable> {
    let mut saved = saved.unwrap_or_default();
    let mut reconciled = Vec::with_capacity(template.default_variables.len() + saved.len());

    for &key in template.default_variables {
        let value = match saved.iter().position(|variable| variable.key == key) {
            Some(index) => saved.remove(index).value,
            None => String::new(),
        };
        let value = if value.is_empty() && key == template.identity_variable {
            new_identity()
        } else {
            value
        };
        reconciled.push(Variable::new(key, value));
    }

    for variable in saved {
        if !reconciled.iter().any(|existing| existing.key == variable.key) {
            reconciled.push(variable);
        }
    }

    reconciled
}

pub fn reset_variables(template: &TemplateConfig) -> Vec<Variable> {
    reconcile_variables(template, None)
}

/// Gives the identity variable a new UUID. Returns `false` if it is missing.
pub fn refresh_identity(template: &TemplateConfig, variables: &mut [Variable]) -> bool {
    let mut found = false;
    for variable in variables
        .iter_mut()
        .filter(|variable| variable.key == template.identity_variable)
    {
        variable.value = new_identity();
        found = true;
    }
    found
}

pub fn upsert_variable(variables: &mut Vec<Variable>, key: &str, value: &str) {
    match variables.iter_mut().find(|variable| variable.key == key) {
        Some(existing) => existing.value = value.to_string(),
        None => variables.push(Variable::new(key, value)),
    }
}

pub fn remove_variable(variables: &mut Vec<Variable>, key: &str) -> bool {
    let before = variables.len();
    variables.retain(|variable| variable.key != key);
    variables.len() != before
}

/// Normalizes a submitted set: trims keys and values, drops blank keys.
pub fn normalize_submission(variables: Vec<Variable>) -> Vec<Variable> {
    variables
        .into_iter()
        .filter_map(|variable| {
            let key = variable.key.trim();
            (!key.is_empty()).then(|| Variable::new(key, variable.value.trim()))
        })
        .collect()
}

/// Parses a `KEY=VALUE` pair. The value may be empty or contain `=`.
pub fn parse_assignment(input: &str) -> Option<Variable> {
    let (key, value) = input.split_once('=')?;
    let key = key.trim();
    (!key.is_empty()).then(|| Variable::new(key, value.trim()))
}

fn new_identity() -> String {
    Uuid::new_v4().to_string()
}
