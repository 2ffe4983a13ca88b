//! The templating command.
//!
//! Layers the configuration, prepares the common values, wires the
//! transports and drives a [`Run`]. Whatever happens, once an artifact exists
//! the operator is shown how to resume.

use crate::artifact::{Backends, EmailBackend, TrackerBackend, Variant};
use crate::cli::Cli;
use crate::config::{RunConfig, load_config_file};
use crate::error::{Result, TemplaterError};
use crate::logging;
use crate::pretty::pretty_dump;
use crate::resume::Invocation;
use crate::run::{Run, template_files};
use crate::transport::{JiraClient, MailTransport, PromptCredentials, SmtpMailer};
use crate::vars::{CommandHook, Prompter, TerminalPrompter, VarsHook, load_common_values, resolve_asks};
use serde_json::{Map, Value};
use std::path::Path;

/// Root label for common-value prompts and errors.
const COMMON_LABEL: &str = "common_vars";

/// Execute one run as described by the command line.
pub fn cmd_run(cli: &Cli) -> Result<()> {
    let file = load_config_file(cli.config.as_deref())?;
    let config = RunConfig::from_layers(file, cli.overrides())?;
    logging::init(config.verbose).map_err(|e| TemplaterError::Configuration(e.to_string()))?;

    let template_dir = config.template_dir.clone().unwrap_or_default();
    let variants: Vec<Variant> = template_files(Path::new(&template_dir))?
        .into_iter()
        .map(|(_, variant)| variant)
        .collect();
    let mut backends = build_backends(&config, &variants)?;

    let common = prepare_common_values(&config, Path::new(&template_dir), &mut TerminalPrompter)?;
    let resume = match config.update {
        Some(_) => Some(config.resume_map()?),
        None => None,
    };

    let mut run = Run::new(&template_dir, common, resume, Invocation::from_env());
    let outcome = run.execute(&mut backends);
    if let Err(err) = &outcome {
        tracing::error!("{}", err);
    }
    if let Some(report) = final_report(&run, &outcome) {
        println!("{}", report);
    }
    outcome
}

/// Text printed when a run ends: the resume command followed by `SUCCESS` or
/// `FAIL`. A run that failed before binding any artifact prints nothing.
pub fn final_report(run: &Run, outcome: &Result<()>) -> Option<String> {
    let (heading, status) = match outcome {
        Ok(()) => ("To update existing issues", "SUCCESS"),
        Err(_) if run.artifacts().is_empty() => return None,
        Err(_) => (
            "Error happened, but some issues have already been created. To update existing issues",
            "FAIL",
        ),
    };
    Some(format!(
        "\n{}, edit templates/vars, then execute:\n\n{}\n\n{}",
        heading,
        run.resume_text(),
        status
    ))
}

/// Load the common values, answer `ask` markers, then apply the vars hook.
pub fn prepare_common_values(
    config: &RunConfig,
    template_dir: &Path,
    prompter: &mut dyn Prompter,
) -> Result<Map<String, Value>> {
    let loaded = load_common_values(template_dir, config.vars.as_deref())?;
    let mut common = resolve_asks(Value::Object(loaded), COMMON_LABEL, prompter)?;

    if let Some(command) = &config.vars_hook {
        common = CommandHook::new(command.as_str()).transform(common)?;
    }

    match common {
        Value::Object(map) => {
            tracing::debug!("-- common_vars --\n\n{}", pretty_dump(&serde_json::Value::Object(map.clone())));
            Ok(map)
        }
        other => Err(TemplaterError::Configuration(format!(
            "common values must be a mapping, got {}",
            other
        ))),
    }
}

/// Transports for the configured services. Dry runs get none.
///
/// Outside a dry run, every service a template in `variants` needs must be
/// configured.
pub fn build_backends(config: &RunConfig, variants: &[Variant]) -> Result<Backends> {
    if config.dry_run {
        return Ok(Backends {
            tracker: TrackerBackend::dry_run(),
            email: EmailBackend::dry_run(),
        });
    }
    require_services(config, variants)?;

    let tracker = match &config.jira {
        Some(base) => {
            let service = config.jira_keyring_service_name.clone().unwrap_or_else(|| base.clone());
            let client = JiraClient::new(
                base,
                config.jira_user.clone(),
                service,
                Box::new(PromptCredentials::default()),
            )?;
            TrackerBackend::new(Some(Box::new(client)), false)
        }
        None => TrackerBackend::new(None, false),
    };

    let mailer = match &config.email_smtp {
        Some(address) => {
            let service = config
                .email_keyring_service_name
                .clone()
                .unwrap_or_else(|| address.clone());
            let mailer = SmtpMailer::new(
                address,
                config.email_user.clone(),
                service,
                Box::new(PromptCredentials::default()),
            )?;
            Some(Box::new(mailer) as Box<dyn MailTransport>)
        }
        None => None,
    };

    Ok(Backends {
        tracker,
        email: EmailBackend::new(mailer, config.email_from.clone(), false),
    })
}

fn require_services(config: &RunConfig, variants: &[Variant]) -> Result<()> {
    let mut required = Vec::new();
    if variants.contains(&Variant::TrackerIssue) {
        required.push(("jira", config.jira.is_some()));
    }
    if variants.contains(&Variant::Email) {
        required.push(("email_from", config.email_from.is_some()));
        required.push(("email_smtp", config.email_smtp.is_some()));
    }

    let missing: Vec<&str> = required
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TemplaterError::Configuration(format!(
            "templates need {} to be set (or use --dry-run)",
            missing.join(", ")
        )))
    }
}
