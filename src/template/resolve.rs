//! Fixed-point resolution of self-referential documents.
//!
//! The document is rendered against itself in permissive mode until a pass
//! changes nothing, then once more in strict mode so any reference that never
//! resolved fails loudly.

use super::engine::{Engine, Mode, Scope};
use super::marker::Phase;
use super::render::{NodePath, render};
use crate::error::{Result, TemplaterError};
use serde_json::Value;

/// Maximum number of permissive passes before giving up.
pub const MAX_ITERATIONS: usize = 64;

/// Resolve `document` against itself.
///
/// # Returns
///
/// * `Ok(Value)` - The stabilized document
/// * `Err(TemplaterError::NonConvergence)` - The document kept changing
/// * `Err(TemplaterError::UnresolvedReference)` - A reference has no binding
pub fn resolve_fixed_point(engine: &Engine, document: &Value, label: &str) -> Result<Value> {
    resolve_with_limit(engine, document, label, MAX_ITERATIONS)
}

pub(crate) fn resolve_with_limit(
    engine: &Engine,
    document: &Value,
    label: &str,
    max_iterations: usize,
) -> Result<Value> {
    let path = NodePath::new(label);
    let mut current = document.clone();

    for iteration in 1..=max_iterations {
        let scope = Scope::from_value(&current);
        let next = render(engine, &current, &scope, &path, Mode::Permissive, Phase::default())?;
        if next == current {
            tracing::debug!(iterations = iteration, "{} stabilized", label);
            let scope = Scope::from_value(&next);
            return render(engine, &next, &scope, &path, Mode::Strict, Phase::default());
        }
        current = next;
    }

    Err(TemplaterError::NonConvergence {
        iterations: max_iterations,
    })
}
