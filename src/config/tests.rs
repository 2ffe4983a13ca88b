//! Tests for config layering.

use crate::config::{RunConfig, load_config_file};
use crate::error::TemplaterError;
use serde_json::{Map, Value, json};
use std::path::Path;
use tempfile::TempDir;

fn layer(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn cli(value: Value) -> Map<String, Value> {
    let mut map = layer(value);
    map.entry("template_dir").or_insert(json!("templates"));
    map
}

#[test]
fn test_defaults() {
    let config = RunConfig::from_layers(Map::new(), cli(json!({}))).unwrap();

    assert!(!config.dry_run);
    assert!(!config.verbose);
    assert_eq!(config.jira, None);
    assert_eq!(config.email_smtp, None);
    assert_eq!(config.template_dir.as_deref(), Some("templates"));
    assert!(config.extra.is_empty());
}

#[test]
fn test_cli_overrides_file() {
    let file = layer(json!({"dry_run": true, "jira": "https://jira.example.com", "verbose": true}));
    let config = RunConfig::from_layers(file, cli(json!({"dry_run": false}))).unwrap();

    assert!(!config.dry_run);
    assert!(config.verbose);
    assert_eq!(config.jira.as_deref(), Some("https://jira.example.com"));
}

#[test]
fn test_settings_reference_each_other() {
    let file = layer(json!({
        "company": "acme",
        "email_user": "bot",
        "email_from": "{{ email_user }}@{{ company }}.example",
        "jira_user": "{{ email_user }}",
    }));
    let config = RunConfig::from_layers(file, cli(json!({}))).unwrap();

    assert_eq!(config.email_from.as_deref(), Some("bot@acme.example"));
    assert_eq!(config.jira_user.as_deref(), Some("bot"));
    assert_eq!(config.extra.get("company"), Some(&json!("acme")));
}

#[test]
fn test_cli_value_feeds_file_reference() {
    let file = layer(json!({"vars": "{{ env_name }}.yaml", "env_name": "staging"}));
    let config = RunConfig::from_layers(file, cli(json!({"env_name": "prod"}))).unwrap();

    assert_eq!(config.vars.as_deref(), Some("prod.yaml"));
}

#[test]
fn test_keyring_service_defaults() {
    let file = layer(json!({"jira": "https://jira.example.com", "email_smtp": "smtp.example.com:587"}));
    let config = RunConfig::from_layers(file, cli(json!({}))).unwrap();

    assert_eq!(
        config.jira_keyring_service_name.as_deref(),
        Some("https://jira.example.com")
    );
    assert_eq!(
        config.email_keyring_service_name.as_deref(),
        Some("smtp.example.com:587")
    );

    let file = layer(json!({"jira": "https://jira.example.com", "jira_keyring_service_name": "work"}));
    let config = RunConfig::from_layers(file, cli(json!({}))).unwrap();
    assert_eq!(config.jira_keyring_service_name.as_deref(), Some("work"));
}

#[test]
fn test_invalid_smtp_address() {
    let file = layer(json!({"email_smtp": "smtp.example.com"}));
    let err = RunConfig::from_layers(file, cli(json!({}))).unwrap_err();
    assert!(matches!(err, TemplaterError::Configuration(_)));
}

#[test]
fn test_missing_template_dir() {
    let err = RunConfig::from_layers(Map::new(), Map::new()).unwrap_err();
    assert!(matches!(err, TemplaterError::Configuration(_)));
}

#[test]
fn test_wrong_setting_type() {
    let file = layer(json!({"dry_run": "sometimes"}));
    let err = RunConfig::from_layers(file, cli(json!({}))).unwrap_err();
    assert!(matches!(err, TemplaterError::Configuration(_)));
}

#[test]
fn test_unknown_reference_fails() {
    let file = layer(json!({"jira_user": "{{ nobody }}"}));
    let err = RunConfig::from_layers(file, cli(json!({}))).unwrap_err();
    assert!(matches!(err, TemplaterError::UnresolvedReference { .. }));
}

#[test]
fn test_cyclic_settings_do_not_converge() {
    let file = layer(json!({"a": "{{ b }}x", "b": "{{ a }}y"}));
    let err = RunConfig::from_layers(file, cli(json!({}))).unwrap_err();
    assert!(matches!(err, TemplaterError::NonConvergence { iterations: 64 }));
}

#[test]
fn test_resume_map() {
    let config = RunConfig::from_layers(
        Map::new(),
        cli(json!({"update": r#"{"a": "OPS-1", "b_x": "OPS-2"}"#})),
    )
    .unwrap();
    let map = config.resume_map().unwrap();
    assert_eq!(map.get("a"), Some(&json!("OPS-1")));
    assert_eq!(map.len(), 2);

    let config = RunConfig::from_layers(Map::new(), cli(json!({}))).unwrap();
    assert!(config.resume_map().unwrap().is_empty());
}

#[test]
fn test_invalid_resume_map() {
    for raw in [r#"["a"]"#, "not json", r#"{"a": 1}"#] {
        let err = RunConfig::from_layers(Map::new(), cli(json!({"update": raw}))).unwrap_err();
        assert!(matches!(err, TemplaterError::Configuration(_)), "{}", raw);
    }
}

#[test]
fn test_load_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "jira: https://jira.example.com\nteam: core\n").unwrap();

    let map = load_config_file(Some(&path)).unwrap();
    assert_eq!(map.get("jira"), Some(&json!("https://jira.example.com")));
    assert_eq!(map.get("team"), Some(&json!("core")));
}

#[test]
fn test_load_empty_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "\n").unwrap();

    assert!(load_config_file(Some(&path)).unwrap().is_empty());
}

#[test]
fn test_explicit_config_file_must_exist() {
    let err = load_config_file(Some(Path::new("/nonexistent/workflow-templater.yaml"))).unwrap_err();
    assert!(matches!(err, TemplaterError::Configuration(_)));
}

#[test]
fn test_config_file_must_be_mapping() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "- a\n- b\n").unwrap();

    let err = load_config_file(Some(&path)).unwrap_err();
    assert!(matches!(err, TemplaterError::Configuration(_)));
}

#[test]
fn test_defaults_and_conditionals_in_settings() {
    let file = layer(json!({
        "jira_user": "{{ login | default('bot') }}",
        "email_user": "{% if login is defined %}{{ login }}{% else %}mailer{% endif %}",
        "email_from": "{% if sender %}{{ sender }}{% else %}noreply@example.com{% endif %}",
    }));
    let config = RunConfig::from_layers(file, cli(json!({}))).unwrap();

    assert_eq!(config.jira_user.as_deref(), Some("bot"));
    assert_eq!(config.email_user.as_deref(), Some("mailer"));
    assert_eq!(config.email_from.as_deref(), Some("noreply@example.com"));

    let file = layer(json!({"jira_user": "{{ login | default('bot') }}", "login": "alice"}));
    let config = RunConfig::from_layers(file, cli(json!({}))).unwrap();
    assert_eq!(config.jira_user.as_deref(), Some("alice"));
}
