//! Password lookup for transports.

use crate::error::{Result, TemplaterError};
use std::collections::HashMap;

/// Environment variable consulted before prompting.
pub const PASSWORD_ENV: &str = "WORKFLOW_TEMPLATER_PASSWORD";

/// Supplies passwords for a service/user pair.
pub trait CredentialSource {
    /// `refresh` is set when the previous password was rejected.
    fn password(&mut self, service: &str, user: &str, refresh: bool) -> Result<String>;
}

/// Reads `WORKFLOW_TEMPLATER_PASSWORD`, otherwise prompts once per service
/// and user and remembers the answer for the rest of the run.
#[derive(Debug, Default)]
pub struct PromptCredentials {
    cache: HashMap<(String, String), String>,
}

impl CredentialSource for PromptCredentials {
    fn password(&mut self, service: &str, user: &str, refresh: bool) -> Result<String> {
        let key = (service.to_string(), user.to_string());
        if !refresh {
            if let Some(password) = self.cache.get(&key) {
                return Ok(password.clone());
            }
            if let Ok(password) = std::env::var(PASSWORD_ENV) {
                return Ok(password);
            }
        }

        let password = dialoguer::Password::new()
            .with_prompt(format!("Password for {} ({})", service, user))
            .interact()
            .map_err(|e| TemplaterError::Io(format!("failed to read password: {}", e)))?;
        self.cache.insert(key, password.clone());
        Ok(password)
    }
}
