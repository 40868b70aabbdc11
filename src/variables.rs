//! Variable resolution - merges scopes and substitutes `{{key}}` templates

use std::collections::HashMap;

use regex::{Captures, Regex};

use crate::models::Variable;

/// Merge scopes lowest precedence first; a later scope overrides the same key
pub fn merge_scopes<S: AsRef<[Variable]>>(scopes: &[S]) -> HashMap<String, String> {
    let mut merged = HashMap::new();
    for scope in scopes {
        for variable in scope.as_ref() {
            merged.insert(variable.key.clone(), variable.value.clone());
        }
    }
    merged
}

/// Flatten scopes into a single variable list, keeping first-seen key order
pub fn flatten_scopes<S: AsRef<[Variable]>>(scopes: &[S]) -> Vec<Variable> {
    let mut flat: Vec<Variable> = Vec::new();
    for variable in scopes.iter().flat_map(|s| s.as_ref()) {
        match flat.iter_mut().find(|v| v.key == variable.key) {
            Some(existing) => existing.value = variable.value.clone(),
            None => flat.push(variable.clone()),
        }
    }
    flat
}

/// Substitutes `{{key}}` occurrences against a merged scope chain.
///
/// Keys are matched literally. Unknown keys are left in place.
pub struct Resolver {
    values: HashMap<String, String>,
    pattern: Option<Regex>,
}

impl Resolver {
    pub fn new<S: AsRef<[Variable]>>(scopes: &[S]) -> Self {
        let values = merge_scopes(scopes);

        let mut keys: Vec<&String> = values.keys().filter(|k| !k.is_empty()).collect();
        // Longest first so a key never shadows a longer one sharing its prefix
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let pattern = if keys.is_empty() {
            None
        } else {
            let alternation = keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            match Regex::new(&format!(r"\{{\{{({})\}}\}}", alternation)) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(error = %e, "Variable pattern too large, substitution disabled");
                    None
                }
            }
        };

        Resolver { values, pattern }
    }

    /// Replace every `{{key}}` in one pass
    pub fn resolve(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };
        pattern
            .replace_all(text, |caps: &Captures| {
                self.values
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Resolve `text` against `scopes` (lowest precedence first)
pub fn resolve<S: AsRef<[Variable]>>(text: &str, scopes: &[S]) -> String {
    Resolver::new(scopes).resolve(text)
}
