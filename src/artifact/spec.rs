//! Parsed content of one template file.

use super::Variant;
use crate::error::{Result, TemplaterError};
use serde_json::{Map, Value};
use std::path::Path;

/// Where a file's foreach items come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ForeachSource {
    /// No `foreach`: a single null item.
    Single,
    /// A literal or templated sequence, rendered once against common values.
    Items(Value),
    /// The value of a common variable, looked up without fallback.
    FromVar(String),
}

/// Backend-agnostic content of one template file.
///
/// Directives are stripped from `fields` when parsing.
#[derive(Debug, Clone)]
pub struct ArtifactSpec {
    /// File name the spec was read from.
    pub source_file: String,
    /// File name without the variant extension.
    pub stem: String,
    pub variant: Variant,
    pub fields: Value,
    /// Tracker `update` actions, rendered only for updates.
    pub update_fields: Option<Value>,
    pub watchers: Option<Value>,
    /// Templated inclusion predicate (`if`).
    pub if_predicate: Option<Value>,
    pub foreach: ForeachSource,
    pub foreach_key: String,
    pub foreach_namevar: Option<String>,
    /// Skip the update step for artifacts supplied by the resume map.
    pub no_update: bool,
    /// Skip the update step unconditionally.
    pub force_no_update: bool,
}

impl ArtifactSpec {
    /// Read and parse a template file.
    pub fn load(path: &Path, variant: Variant) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TemplaterError::Io(format!("failed to read template '{}': {}", path.display(), e))
        })?;
        Self::parse(&file_name, variant, &content)
    }

    /// Parse template file content.
    pub fn parse(file_name: &str, variant: Variant, content: &str) -> Result<Self> {
        let invalid = |message: String| TemplaterError::InvalidTemplate {
            file: file_name.to_string(),
            message,
        };

        let document: Value = if content.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_yaml::from_str(content).map_err(|e| invalid(format!("failed to parse YAML: {}", e)))?
        };
        let Value::Object(mut data) = document else {
            return Err(invalid("template must be a mapping".to_string()));
        };

        let if_predicate = data.remove("if");
        let no_update = take_bool(&mut data, "no_update").map_err(&invalid)?;
        let force_no_update = take_bool(&mut data, "force_no_update").map_err(&invalid)?;
        let items = data.remove("foreach");
        let from_var = take_string(&mut data, "foreach_fromvar").map_err(&invalid)?;
        let foreach_key = take_string(&mut data, "foreach_key")
            .map_err(&invalid)?
            .unwrap_or_else(|| "item".to_string());
        let foreach_namevar = take_string(&mut data, "foreach_namevar").map_err(&invalid)?;

        let foreach = match (from_var, items) {
            (Some(var), _) => ForeachSource::FromVar(var),
            (None, Some(items)) => ForeachSource::Items(items),
            (None, None) => ForeachSource::Single,
        };

        let (update_fields, watchers) = match variant {
            Variant::TrackerIssue => (data.remove("update"), data.remove("watchers")),
            Variant::Email => (None, None),
        };

        Ok(Self {
            source_file: file_name.to_string(),
            stem: variant.stem(file_name).to_string(),
            variant,
            fields: Value::Object(data),
            update_fields,
            watchers,
            if_predicate,
            foreach,
            foreach_key,
            foreach_namevar,
            no_update,
            force_no_update,
        })
    }
}

fn take_bool(data: &mut Map<String, Value>, key: &str) -> std::result::Result<bool, String> {
    match data.remove(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(format!("'{}' must be a boolean, got {}", key, other)),
    }
}

fn take_string(data: &mut Map<String, Value>, key: &str) -> std::result::Result<Option<String>, String> {
    match data.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(format!("'{}' must be a string, got {}", key, other)),
    }
}
