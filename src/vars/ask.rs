//! Interactive `ask` markers in common values.
//!
//! A common value of `_workflow_templater_ask:bool` or
//! `_workflow_templater_ask:str` is replaced by the operator's answer before
//! any template is rendered.

use crate::error::{Result, TemplaterError};
use crate::template::{AskKind, Marker};
use serde_json::{Map, Value};

/// Source of interactive answers.
pub trait Prompter {
    fn ask_bool(&mut self, label: &str) -> Result<bool>;
    fn ask_str(&mut self, label: &str) -> Result<String>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read(prompt: String) -> Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| TemplaterError::Io(format!("failed to read answer: {}", e)))
    }
}

impl Prompter for TerminalPrompter {
    fn ask_bool(&mut self, label: &str) -> Result<bool> {
        let answer = Self::read(format!("{} (y/yes/n/no)?", label))?;
        Ok(is_yes(&answer))
    }

    fn ask_str(&mut self, label: &str) -> Result<String> {
        Self::read(format!("{} (enter value)", label))
    }
}

/// Whether a free-text answer means yes.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Replace every `ask` marker in `value` with an answer from `prompter`.
///
/// `label` names the root; nested labels are `label.key` and `label[i]`.
pub fn resolve_asks(value: Value, label: &str, prompter: &mut dyn Prompter) -> Result<Value> {
    match value {
        Value::String(s) => {
            match Marker::parse_ask(&s).map_err(TemplaterError::Configuration)? {
                Marker::Ask(AskKind::Bool) => Ok(Value::Bool(prompter.ask_bool(label)?)),
                Marker::Ask(AskKind::Str) => Ok(Value::String(prompter.ask_str(label)?)),
                _ => Ok(Value::String(s)),
            }
        }
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| resolve_asks(item, &format!("{}[{}]", label, i), prompter))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, item) in map {
                let resolved = resolve_asks(item, &format!("{}.{}", label, key), prompter)?;
                out.insert(key, resolved);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other),
    }
}
