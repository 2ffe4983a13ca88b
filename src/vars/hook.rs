//! Programmatic preprocessing of common values.
//!
//! A hook receives the loaded common values and returns their replacement.
//! [`CommandHook`] runs an external command: common values go to its stdin
//! as JSON and its stdout is parsed as the replacement JSON.

use crate::error::{Result, TemplaterError};
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Stdio};

/// Transform applied once to the common values before rendering.
pub trait VarsHook {
    fn transform(&mut self, vars: Value) -> Result<Value>;
}

/// Hook backed by an external command line.
#[derive(Debug, Clone)]
pub struct CommandHook {
    command: String,
}

impl CommandHook {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl VarsHook for CommandHook {
    fn transform(&mut self, vars: Value) -> Result<Value> {
        let args = shell_words::split(&self.command).map_err(|e| {
            TemplaterError::Configuration(format!(
                "failed to parse vars hook command '{}': {}",
                self.command, e
            ))
        })?;
        let Some((program, rest)) = args.split_first() else {
            return Err(TemplaterError::Configuration(
                "vars hook command is empty".to_string(),
            ));
        };

        tracing::debug!("running vars hook: {}", self.command);
        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                TemplaterError::Configuration(format!(
                    "failed to start vars hook '{}': {}",
                    program, e
                ))
            })?;

        let input = serde_json::to_vec(&vars)
            .map_err(|e| TemplaterError::Io(format!("failed to encode common values: {}", e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).map_err(|e| {
                TemplaterError::Io(format!("failed to write to vars hook: {}", e))
            })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| TemplaterError::Io(format!("vars hook failed: {}", e)))?;
        if !output.status.success() {
            return Err(TemplaterError::Configuration(format!(
                "vars hook '{}' exited with {:?}",
                self.command,
                output.status.code()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            TemplaterError::Configuration(format!("vars hook printed invalid JSON: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_hook_returns_input() {
        let mut hook = CommandHook::new("cat");
        let vars = json!({"release": "1.0", "hosts": ["a"]});
        assert_eq!(hook.transform(vars.clone()).unwrap(), vars);
    }

    #[test]
    fn hook_output_replaces_values() {
        let mut hook = CommandHook::new(r#"sh -c 'cat >/dev/null; echo "{\"generated\": true}"'"#);
        let out = hook.transform(json!({"x": 1})).unwrap();
        assert_eq!(out, json!({"generated": true}));
    }

    #[test]
    fn failing_hook_is_an_error() {
        let mut hook = CommandHook::new("sh -c 'cat >/dev/null; exit 3'");
        let err = hook.transform(json!({})).unwrap_err();
        assert!(matches!(err, TemplaterError::Configuration(_)));
    }

    #[test]
    fn empty_command_is_rejected() {
        let mut hook = CommandHook::new("   ");
        assert!(hook.transform(json!({})).is_err());
    }
}
