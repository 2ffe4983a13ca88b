//! Recursive document renderer.
//!
//! Walks a document depth-first and evaluates every string scalar as a
//! template. Shape is preserved except where markers say otherwise:
//!
//! - a rendered string starting with the JSON-decode marker becomes the
//!   decoded value (no further evaluation inside it);
//! - a mapping entry whose key carries an exclusion suffix, or a sequence
//!   element whose rendered string carries an exclusion prefix, is dropped
//!   when the [`Phase`] says so and unmarked otherwise.

use super::engine::{Engine, Mode, Scope};
use super::marker::{Marker, Phase};
use crate::error::{Result, TemplaterError};
use minijinja::ErrorKind;
use serde_json::{Map, Value};
use std::fmt;

/// Location of a node inside a document, for error messages.
#[derive(Debug, Clone)]
pub struct NodePath {
    root: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

impl NodePath {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    /// A child path under `key`.
    pub fn key(&self, key: &str) -> Self {
        let mut path = self.clone();
        path.segments.push(Segment::Key(key.to_string()));
        path
    }

    fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    fn pop(&mut self) {
        self.segments.pop();
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        let mut first = true;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) if first => write!(f, ": {}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(i) if first => write!(f, ": [{}]", i)?,
                Segment::Index(i) => write!(f, "[{}]", i)?,
            }
            first = false;
        }
        Ok(())
    }
}

/// One render pass: engine, scope, evaluation mode and phase flags.
pub struct Renderer<'a> {
    engine: &'a Engine,
    scope: &'a Scope,
    mode: Mode,
    phase: Phase,
}

impl<'a> Renderer<'a> {
    pub fn new(engine: &'a Engine, scope: &'a Scope, mode: Mode, phase: Phase) -> Self {
        Self {
            engine,
            scope,
            mode,
            phase,
        }
    }

    /// Render a whole document rooted at `path`.
    pub fn render(&self, node: &Value, path: &NodePath) -> Result<Value> {
        let mut path = path.clone();
        self.render_node(node, &mut path)
    }

    fn render_node(&self, node: &Value, path: &mut NodePath) -> Result<Value> {
        match node {
            Value::Object(map) => self.render_mapping(map, path).map(Value::Object),
            Value::Array(items) => self.render_sequence(items, path).map(Value::Array),
            Value::String(source) => self.render_scalar(source, path),
            other => Ok(other.clone()),
        }
    }

    fn render_mapping(&self, map: &Map<String, Value>, path: &mut NodePath) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for (key, value) in map {
            path.push(Segment::Key(key.clone()));
            let rendered = self.render_node(value, path)?;
            path.pop();

            let (marker, bare) = Marker::parse_key(key);
            if self.phase.excludes(&marker) {
                continue;
            }
            out.insert(bare.to_string(), rendered);
        }
        Ok(out)
    }

    fn render_sequence(&self, items: &[Value], path: &mut NodePath) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            path.push(Segment::Index(i));
            let rendered = self.render_node(item, path)?;
            path.pop();

            if let Some(kept) = self.filter_element(rendered) {
                out.push(kept);
            }
        }
        Ok(out)
    }

    /// Apply value-prefix exclusion markers to one sequence element.
    fn filter_element(&self, rendered: Value) -> Option<Value> {
        let Value::String(text) = &rendered else {
            return Some(rendered);
        };
        match Marker::parse_value(text) {
            (marker @ (Marker::ExcludeSoft | Marker::ExcludeForce), rest) => {
                if self.phase.excludes(&marker) {
                    None
                } else {
                    Some(Value::String(rest.to_string()))
                }
            }
            _ => Some(rendered),
        }
    }

    fn render_scalar(&self, source: &str, path: &NodePath) -> Result<Value> {
        let name = path.root.as_str();
        let rendered = self
            .engine
            .render_str(name, source, self.scope, self.mode)
            .map_err(|err| {
                let message = err.to_string();
                tracing::error!(path = %path, "template error: {}", message);
                if err.kind() == ErrorKind::UndefinedError {
                    TemplaterError::UnresolvedReference {
                        path: path.to_string(),
                        message,
                    }
                } else {
                    TemplaterError::TemplateEvaluation {
                        path: path.to_string(),
                        message,
                    }
                }
            })?;

        match Marker::parse_value(&rendered) {
            (Marker::JsonDecode, payload) => {
                serde_json::from_str(payload).map_err(|e| TemplaterError::TemplateEvaluation {
                    path: path.to_string(),
                    message: format!("invalid JSON after parse marker: {}", e),
                })
            }
            _ => Ok(Value::String(rendered)),
        }
    }
}

/// Render `node` in one call.
pub fn render(
    engine: &Engine,
    node: &Value,
    scope: &Scope,
    path: &NodePath,
    mode: Mode,
    phase: Phase,
) -> Result<Value> {
    Renderer::new(engine, scope, mode, phase).render(node, path)
}
