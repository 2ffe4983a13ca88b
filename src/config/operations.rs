//! Config loading, layering, and validation.

use super::model::RunConfig;
use crate::error::{Result, TemplaterError};
use crate::template::{Engine, resolve_fixed_point};
use crate::transport::parse_smtp_address;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Label used for errors raised while stabilizing the merged settings.
const CONFIG_LABEL: &str = "config&args";

/// `<user config dir>/workflow-templater/config.yaml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("workflow-templater").join("config.yaml"))
}

/// Read the config file layer.
///
/// An explicit `path` must exist. Without one the default location is tried
/// and its absence yields an empty layer.
pub fn load_config_file(path: Option<&Path>) -> Result<Map<String, Value>> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return Ok(Map::new()),
        },
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
            tracing::debug!(path = %path.display(), "no config file");
            return Ok(Map::new());
        }
        Err(e) => {
            return Err(TemplaterError::Configuration(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            )));
        }
    };

    parse_layer(&content).map_err(|message| {
        TemplaterError::Configuration(format!("{}: {}", path.display(), message))
    })
}

fn parse_layer(content: &str) -> std::result::Result<Map<String, Value>, String> {
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_yaml::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err("config file must contain a mapping".to_string()),
        Err(e) => Err(format!("failed to parse config YAML: {}", e)),
    }
}

impl RunConfig {
    /// Merge the file layer with command-line overrides and stabilize the result.
    ///
    /// # Returns
    ///
    /// * `Ok(RunConfig)` - Merged, resolved and validated settings
    /// * `Err(TemplaterError::NonConvergence)` - Settings reference each other cyclically
    /// * `Err(TemplaterError::UnresolvedReference)` - A setting references an unknown key
    /// * `Err(TemplaterError::Configuration)` - A setting has the wrong type or format
    pub fn from_layers(file: Map<String, Value>, overrides: Map<String, Value>) -> Result<Self> {
        let mut merged = file;
        for (key, value) in overrides {
            merged.insert(key, value);
        }

        let resolved = resolve_fixed_point(&Engine::new(), &Value::Object(merged), CONFIG_LABEL)?;
        let mut config: RunConfig = serde_json::from_value(resolved)
            .map_err(|e| TemplaterError::Configuration(format!("invalid setting: {}", e)))?;

        if config.jira_keyring_service_name.is_none() {
            config.jira_keyring_service_name = config.jira.clone();
        }
        if config.email_keyring_service_name.is_none() {
            config.email_keyring_service_name = config.email_smtp.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse the identifier map of a previous run.
    pub fn resume_map(&self) -> Result<Map<String, Value>> {
        let Some(raw) = self.update.as_deref() else {
            return Ok(Map::new());
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                if let Some((name, _)) = map.iter().find(|(_, v)| !v.is_string()) {
                    return Err(TemplaterError::Configuration(format!(
                        "--update: identifier of '{}' must be a string",
                        name
                    )));
                }
                Ok(map)
            }
            Ok(_) => Err(TemplaterError::Configuration(
                "--update must be a JSON object".to_string(),
            )),
            Err(e) => Err(TemplaterError::Configuration(format!(
                "--update is not valid JSON: {}",
                e
            ))),
        }
    }

    /// Validate setting formats.
    pub fn validate(&self) -> Result<()> {
        if let Some(address) = &self.email_smtp {
            parse_smtp_address(address)?;
        }
        if self.template_dir.as_deref().is_none_or(str::is_empty) {
            return Err(TemplaterError::Configuration(
                "template directory is required".to_string(),
            ));
        }
        self.resume_map()?;
        Ok(())
    }
}
