//! One templating run over a template directory.
//!
//! Template files are processed in file-name order. Every instance of every
//! file is bound (created, or taken from the resume map) before any update
//! happens, so update renders can reference the identifiers of all
//! artifacts, including ones from later files.


use crate::artifact::{Artifact, ArtifactSpec, Backends, Variant};
use crate::error::{Result, TemplaterError};
use crate::expand::expand;
use crate::resume::{Invocation, ResumeCommand, ShellDialect, identifier_map};
use crate::template::Engine;
use crate::vars::{RESUME_COMMAND_KEY, UPDATING_KEY, VariableContext};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// State of a run: context, bound artifacts, and what is needed to resume it.
pub struct Run {
    engine: Engine,
    ctx: VariableContext,
    template_dir: PathBuf,
    resume: Option<Map<String, Value>>,
    invocation: Invocation,
    dialect: ShellDialect,
    artifacts: Vec<Artifact>,
}

impl Run {
    /// # Arguments
    ///
    /// * `template_dir` - Directory holding `*.jira.yaml` / `*.email.yaml` files
    /// * `common` - Common values, asks and hook already applied
    /// * `resume` - Identifier map of a previous run, when resuming
    /// * `invocation` - Command line the resume command is derived from
    pub fn new(
        template_dir: impl Into<PathBuf>,
        common: Map<String, Value>,
        resume: Option<Map<String, Value>>,
        invocation: Invocation,
    ) -> Self {
        let template_dir = template_dir.into();
        let mut ctx = VariableContext::new(common);
        if resume.is_some() {
            ctx.set(UPDATING_KEY, Value::from(updating_timestamp()));
        }

        Self {
            engine: Engine::with_template_dir(&template_dir),
            ctx,
            template_dir,
            resume,
            invocation,
            dialect: ShellDialect::detect(),
            artifacts: Vec::new(),
        }
    }

    /// Dialect listed first in the resume text.
    #[cfg(test)]
    pub fn with_dialect(mut self, dialect: ShellDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Artifacts bound so far, in processing order.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    #[cfg(test)]
    pub fn context(&self) -> &VariableContext {
        &self.ctx
    }

    pub fn resume_command(&self) -> ResumeCommand {
        ResumeCommand::build(&self.invocation, &identifier_map(&self.artifacts))
    }

    /// Resume command for all dialects, the detected one first.
    pub fn resume_text(&self) -> String {
        self.resume_command().render_all(self.dialect)
    }

    /// Bind every artifact, publish the resume command, then update every artifact.
    ///
    /// Stops at the first error. Artifacts bound before the error stay
    /// available through [`Run::artifacts`] so the caller can still print a
    /// resume command.
    pub fn execute(&mut self, backends: &mut Backends) -> Result<()> {
        for (file_name, variant) in template_files(&self.template_dir)? {
            let spec = Rc::new(ArtifactSpec::load(&self.template_dir.join(&file_name), variant)?);
            let instances = expand(&spec, &self.engine, &self.ctx)?;
            tracing::debug!("{}: {} instance(s)", file_name, instances.len());

            for instance in instances {
                let supplied = self.supplied_identifier(&instance.name)?;
                let mut artifact = Artifact::new(instance, Rc::clone(&spec), supplied.is_some());
                artifact.bind(backends.for_variant(variant), &self.engine, &mut self.ctx, supplied)?;
                self.artifacts.push(artifact);
            }
        }

        let text = self.resume_text();
        self.ctx.set(RESUME_COMMAND_KEY, Value::String(text));

        for artifact in &mut self.artifacts {
            let variant = artifact.variant();
            artifact.update(backends.for_variant(variant), &self.engine, &mut self.ctx)?;
        }
        Ok(())
    }

    fn supplied_identifier(&self, name: &str) -> Result<Option<String>> {
        match self.resume.as_ref().and_then(|map| map.get(name)) {
            None => Ok(None),
            Some(Value::String(id)) => Ok(Some(id.clone())),
            Some(other) => Err(TemplaterError::Configuration(format!(
                "identifier of '{}' must be a string, got {}",
                name, other
            ))),
        }
    }
}

/// Template files in `dir` with a known variant, sorted by name.
pub fn template_files(dir: &Path) -> Result<Vec<(String, Variant)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        TemplaterError::Io(format!(
            "failed to read template directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TemplaterError::Io(e.to_string()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(variant) = Variant::from_file_name(&name) {
            files.push((name, variant));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Current UTC time as float seconds since the Unix epoch.
fn updating_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
