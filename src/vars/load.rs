//! Loading common values from the template directory.

use crate::error::{Result, TemplaterError};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::Path;

/// Candidate common-values files; the last one that exists wins.
pub const COMMON_VARS_FILES: &[&str] = &["0_common.yaml", "00_common.yaml", "common.yaml"];

/// Load common values.
///
/// With `vars_file` set, that file (relative to `template_dir`) must exist.
/// Otherwise the [`COMMON_VARS_FILES`] are tried and missing files are skipped.
pub fn load_common_values(template_dir: &Path, vars_file: Option<&str>) -> Result<Map<String, Value>> {
    if let Some(name) = vars_file {
        let path = template_dir.join(name);
        let content = fs::read_to_string(&path).map_err(|e| {
            TemplaterError::Io(format!("failed to read vars file '{}': {}", path.display(), e))
        })?;
        return parse_values(name, &content);
    }

    let mut common = Map::new();
    for name in COMMON_VARS_FILES {
        let path = template_dir.join(name);
        match fs::read_to_string(&path) {
            Ok(content) => {
                tracing::debug!("loading common values from {}", path.display());
                common = parse_values(name, &content)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(TemplaterError::Io(format!(
                    "failed to read '{}': {}",
                    path.display(),
                    e
                )));
            }
        }
    }
    Ok(common)
}

fn parse_values(name: &str, content: &str) -> Result<Map<String, Value>> {
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_yaml::from_str(content).map_err(|e| TemplaterError::InvalidTemplate {
        file: name.to_string(),
        message: format!("failed to parse YAML: {}", e),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(TemplaterError::InvalidTemplate {
            file: name.to_string(),
            message: "common values must be a mapping".to_string(),
        }),
    }
}
