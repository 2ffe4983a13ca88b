//! ForEach expansion and conditional inclusion.
//!
//! One template file becomes zero or more named instances. Each instance
//! gets a name `<stem>_<suffix>` (just `<stem>` for a null item) and binds
//! its item under `foreach_key`. Items whose `if` predicate renders to
//! `false`, `no` or an empty string (case-insensitive) never exist.

use crate::artifact::{ArtifactSpec, ForeachSource};
use crate::error::{Result, TemplaterError};
use crate::template::{Engine, Mode, NodePath, Phase, render};
use crate::vars::VariableContext;
use serde_json::{Map, Value};

/// Rendered predicate texts that exclude an item.
const FALSY: &[&str] = &["false", "no", ""];

/// One expanded template instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub name: String,
    /// Per-item bindings (`{foreach_key: item}`, empty for a null item).
    pub bindings: Map<String, Value>,
}

/// Expand `spec` into its instances, in item order.
pub fn expand(spec: &ArtifactSpec, engine: &Engine, ctx: &VariableContext) -> Result<Vec<Instance>> {
    let items = resolve_items(spec, engine, ctx)?;
    let mut instances = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let suffix = name_suffix(spec, &item, index)?;
        let name = match suffix {
            Some(suffix) => format!("{}_{}", spec.stem, suffix),
            None => spec.stem.clone(),
        };

        let mut bindings = Map::new();
        if !item.is_null() {
            bindings.insert(spec.foreach_key.clone(), item);
        }

        if let Some(predicate) = &spec.if_predicate {
            let scope = ctx.item_scope(&bindings);
            let path = NodePath::new(spec.source_file.clone()).key("if");
            let rendered = render(engine, predicate, &scope, &path, Mode::Strict, Phase::default())?;
            if !predicate_holds(&rendered) {
                tracing::debug!("{}: skipped by condition", name);
                continue;
            }
        }

        instances.push(Instance { name, bindings });
    }

    Ok(instances)
}

/// Whether a rendered `if` predicate includes its item.
pub fn predicate_holds(rendered: &Value) -> bool {
    match rendered {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(text) => !FALSY.contains(&text.to_lowercase().as_str()),
        _ => true,
    }
}

fn resolve_items(spec: &ArtifactSpec, engine: &Engine, ctx: &VariableContext) -> Result<Vec<Value>> {
    let invalid = |message: String| TemplaterError::InvalidTemplate {
        file: spec.source_file.clone(),
        message,
    };

    let resolved = match &spec.foreach {
        ForeachSource::Single => return Ok(vec![Value::Null]),
        ForeachSource::FromVar(var) => ctx
            .get(var)
            .cloned()
            .ok_or_else(|| invalid(format!("foreach_fromvar: variable '{}' is not defined", var)))?,
        ForeachSource::Items(node) => {
            let scope = ctx.item_scope(&Map::new());
            let path = NodePath::new(spec.source_file.clone()).key("foreach");
            render(engine, node, &scope, &path, Mode::Strict, Phase::default())?
        }
    };

    match resolved {
        Value::Array(items) => Ok(items),
        other => Err(invalid(format!("foreach must be a sequence, got {}", other))),
    }
}

fn name_suffix(spec: &ArtifactSpec, item: &Value, index: usize) -> Result<Option<String>> {
    if let Some(namevar) = &spec.foreach_namevar {
        let value = item.as_object().and_then(|m| m.get(namevar)).ok_or_else(|| {
            TemplaterError::InvalidTemplate {
                file: spec.source_file.clone(),
                message: format!("foreach item {} has no field '{}' (foreach_namevar)", index, namevar),
            }
        })?;
        return Ok(scalar_suffix(value));
    }

    Ok(match item {
        Value::Null => None,
        Value::String(_) => scalar_suffix(item),
        _ => Some(index.to_string()),
    })
}

fn scalar_suffix(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
