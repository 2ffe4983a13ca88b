//! Variable context for template rendering.
//!
//! Renders see an overlay of, in order:
//!
//! 1. common values, shared by the whole run and mutated in place as
//!    artifacts obtain identifiers (`issuekey_<name>`);
//! 2. per-iteration values bound by foreach expansion;
//! 3. self-reference values (`issuekey_self`).
//!
//! Later layers shadow earlier ones on key collisions.

mod ask;
mod hook;
mod load;

pub use ask::{Prompter, TerminalPrompter, resolve_asks};
pub use hook::{CommandHook, VarsHook};
pub use load::load_common_values;

use crate::template::Scope;
use serde_json::{Map, Value};

/// Key under which an artifact sees its own identifier.
pub const SELF_KEY: &str = "issuekey_self";

/// Prefix of the common key holding an artifact's identifier.
pub const IDENTIFIER_PREFIX: &str = "issuekey_";

/// Common key holding the resume command text.
pub const RESUME_COMMAND_KEY: &str = "update_issues_cmd";

/// Common key set to the run timestamp when resuming.
pub const UPDATING_KEY: &str = "updating";

/// Common key under which `name`'s identifier is published.
pub fn identifier_key(name: &str) -> String {
    format!("{}{}", IDENTIFIER_PREFIX, name)
}

/// The shared, mutable common values plus overlay construction.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    common: Map<String, Value>,
}

impl VariableContext {
    pub fn new(common: Map<String, Value>) -> Self {
        Self { common }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.common.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.common.insert(key.into(), value);
    }

    /// Publish an artifact identifier to every later render.
    pub fn bind_identifier(&mut self, name: &str, identifier: &str) {
        self.set(identifier_key(name), Value::String(identifier.to_string()));
    }

    /// Common values overlaid with per-iteration bindings.
    pub fn item_scope(&self, bindings: &Map<String, Value>) -> Scope {
        self.scope(bindings, None)
    }

    /// Full overlay: common values, per-iteration bindings, then self identifier.
    pub fn scope(&self, bindings: &Map<String, Value>, identifier: Option<&str>) -> Scope {
        let mut vars = self.common.clone();
        for (key, value) in bindings {
            vars.insert(key.clone(), value.clone());
        }
        if let Some(id) = identifier {
            vars.insert(SELF_KEY.to_string(), Value::String(id.to_string()));
        }
        Scope::new(vars)
    }
}
