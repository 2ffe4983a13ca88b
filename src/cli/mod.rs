//! CLI argument parsing for workflow-templater.
//!
//! Uses clap derive macros. Flags given on the command line override the
//! config file; flags left out leave the config file value in place, which
//! is why every setting is optional here.

use clap::{ArgAction, Parser};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Workflow Templater: create tracker issues and emails from YAML templates.
///
/// Every `*.jira.yaml` and `*.email.yaml` file in TEMPLATE_DIR becomes one
/// or more artifacts. At the end a command is printed that re-runs the same
/// templates against the artifacts just created, updating them in place.
#[derive(Parser, Debug)]
#[command(name = "workflow-templater")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Do not post anything to the tracker or send emails, just render templates.
    #[arg(long, overrides_with = "no_dry_run")]
    pub dry_run: bool,

    /// Disable dry run if it was enabled in the config file.
    #[arg(long, overrides_with = "dry_run")]
    pub no_dry_run: bool,

    /// Be verbose.
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Read variables from FILE instead of *common.yaml.
    #[arg(long, value_name = "FILE")]
    pub vars: Option<String>,

    /// Command that receives the variables as JSON on stdin and prints replacements.
    #[arg(long, value_name = "CMD")]
    pub vars_hook: Option<String>,

    /// Update existing artifacts instead of creating them.
    ///
    /// JSON like {"file_1": "KEY-1", "file_2": "KEY-2"}. The command printed at
    /// the end of every run already carries it.
    #[arg(long, value_name = "JSON")]
    pub update: Option<String>,

    /// Tracker API url, ex. https://jira.example.com
    #[arg(long, value_name = "URL")]
    pub jira: Option<String>,

    #[arg(long, value_name = "USER")]
    pub jira_user: Option<String>,

    #[arg(long, value_name = "SERVICE")]
    pub jira_keyring_service_name: Option<String>,

    /// SMTP server host:port
    #[arg(long, value_name = "HOST:PORT")]
    pub email_smtp: Option<String>,

    #[arg(long, value_name = "USER")]
    pub email_user: Option<String>,

    #[arg(long, value_name = "SERVICE")]
    pub email_keyring_service_name: Option<String>,

    #[arg(long, value_name = "ADDR")]
    pub email_from: Option<String>,

    /// Config file path (default: <user config dir>/workflow-templater/config.yaml).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the directory with templates.
    pub template_dir: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Settings given on the command line, keyed like the config file.
    pub fn overrides(&self) -> Map<String, Value> {
        let mut map = Map::new();

        if self.dry_run {
            map.insert("dry_run".to_string(), Value::Bool(true));
        } else if self.no_dry_run {
            map.insert("dry_run".to_string(), Value::Bool(false));
        }
        if self.verbose {
            map.insert("verbose".to_string(), Value::Bool(true));
        }

        let strings = [
            ("vars", &self.vars),
            ("vars_hook", &self.vars_hook),
            ("update", &self.update),
            ("jira", &self.jira),
            ("jira_user", &self.jira_user),
            ("jira_keyring_service_name", &self.jira_keyring_service_name),
            ("email_smtp", &self.email_smtp),
            ("email_user", &self.email_user),
            ("email_keyring_service_name", &self.email_keyring_service_name),
            ("email_from", &self.email_from),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::String(value.clone()));
            }
        }

        map.insert(
            "template_dir".to_string(),
            Value::String(self.template_dir.clone()),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_minimal() {
        let cli = Cli::try_parse_from(["workflow-templater", "release"]).unwrap();
        assert_eq!(cli.template_dir, "release");
        assert!(!cli.dry_run);
        assert_eq!(cli.config, None);

        let overrides = cli.overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.get("template_dir"), Some(&json!("release")));
    }

    #[test]
    fn parse_full() {
        let cli = Cli::try_parse_from([
            "workflow-templater",
            "--dry-run",
            "-v",
            "--vars",
            "prod.yaml",
            "--update",
            r#"{"a":"OPS-1"}"#,
            "--jira",
            "https://jira.example.com",
            "--jira-user",
            "alice",
            "--email-smtp",
            "smtp.example.com:587",
            "--email-from",
            "bot@example.com",
            "--config",
            "/tmp/wt.yaml",
            "release",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/wt.yaml")));
        let overrides = cli.overrides();
        assert_eq!(overrides.get("dry_run"), Some(&json!(true)));
        assert_eq!(overrides.get("verbose"), Some(&json!(true)));
        assert_eq!(overrides.get("vars"), Some(&json!("prod.yaml")));
        assert_eq!(overrides.get("update"), Some(&json!(r#"{"a":"OPS-1"}"#)));
        assert_eq!(overrides.get("jira_user"), Some(&json!("alice")));
        assert_eq!(overrides.get("email_smtp"), Some(&json!("smtp.example.com:587")));
        assert!(!overrides.contains_key("email_user"));
        assert!(!overrides.contains_key("config"));
    }

    #[test]
    fn last_dry_run_flag_wins() {
        let cli = Cli::try_parse_from(["workflow-templater", "--dry-run", "--no-dry-run", "d"]).unwrap();
        assert_eq!(cli.overrides().get("dry_run"), Some(&json!(false)));

        let cli = Cli::try_parse_from(["workflow-templater", "--no-dry-run", "--dry-run", "d"]).unwrap();
        assert_eq!(cli.overrides().get("dry_run"), Some(&json!(true)));
    }

    #[test]
    fn template_dir_is_required() {
        assert!(Cli::try_parse_from(["workflow-templater", "--dry-run"]).is_err());
    }
}
