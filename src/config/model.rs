//! RunConfig struct definition.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Settings for one run.
///
/// Unknown keys are kept in `extra` so config values can reference them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Render everything, contact nothing.
    pub dry_run: bool,

    pub verbose: bool,

    /// Common values file, relative to the template directory.
    pub vars: Option<String>,

    /// Command that rewrites the common values (JSON on stdin and stdout).
    pub vars_hook: Option<String>,

    /// Identifier map of a previous run, as JSON.
    pub update: Option<String>,

    /// Tracker API base URL.
    pub jira: Option<String>,
    pub jira_user: Option<String>,
    pub jira_keyring_service_name: Option<String>,

    /// SMTP server as `host:port`.
    pub email_smtp: Option<String>,
    pub email_user: Option<String>,
    pub email_keyring_service_name: Option<String>,
    pub email_from: Option<String>,

    pub template_dir: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
