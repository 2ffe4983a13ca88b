//! Tracker issue variant.

use super::{Artifact, ArtifactBackend};
use crate::error::{Result, TemplaterError};
use crate::pretty::pretty_dump;
use crate::template::{Engine, Mode, Phase};
use crate::transport::TrackerApi;
use crate::vars::VariableContext;
use serde_json::{Value, json};

/// Identifier prefix assigned to issues in dry runs.
pub const FAKE_KEY_PREFIX: &str = "FAKE_JIRA_KEY-";

/// Creates and updates tracker issues.
///
/// Without an API client only dry runs are possible.
pub struct TrackerBackend {
    api: Option<Box<dyn TrackerApi>>,
    dry_run: bool,
}

impl TrackerBackend {
    pub fn new(api: Option<Box<dyn TrackerApi>>, dry_run: bool) -> Self {
        Self { api, dry_run }
    }

    pub fn dry_run() -> Self {
        Self::new(None, true)
    }

    fn api(&mut self) -> Result<&mut (dyn TrackerApi + 'static)> {
        match self.api.as_deref_mut() {
            Some(api) => Ok(api),
            None => Err(TemplaterError::Configuration(
                "tracker base address (jira) is required to create or update issues".to_string(),
            )),
        }
    }
}

/// Normalize rendered `update` content into a list of partial-update actions.
pub fn update_actions(rendered: Value) -> Vec<Value> {
    match rendered {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    }
}

impl ArtifactBackend for TrackerBackend {
    fn create(&mut self, artifact: &mut Artifact, engine: &Engine, ctx: &VariableContext) -> Result<String> {
        let phase = Phase::creation(artifact.is_resuming());
        let fields = artifact.render(engine, ctx, &artifact.spec().fields, Mode::Permissive, phase)?;
        artifact.set_preview(json!({ "fields": fields.clone() }));

        if self.dry_run {
            tracing::debug!("{}:\n{}", artifact.name(), pretty_dump(&fields));
            return Ok(format!("{}{}", FAKE_KEY_PREFIX, artifact.name()));
        }

        tracing::debug!("creating issue for {}", artifact.name());
        let key = self.api()?.create_issue(&fields)?;
        tracing::info!("created issue for {}, key: {}", artifact.name(), key);
        Ok(key)
    }

    fn update(
        &mut self,
        artifact: &mut Artifact,
        engine: &Engine,
        ctx: &VariableContext,
    ) -> Result<Option<String>> {
        let phase = Phase::update(artifact.is_resuming());
        let spec = artifact.spec();
        let fields = artifact.render(engine, ctx, &spec.fields, Mode::Strict, phase)?;
        let update = match &spec.update_fields {
            Some(node) => artifact.render(engine, ctx, node, Mode::Strict, phase)?,
            None => Value::Null,
        };
        let watchers = match &spec.watchers {
            Some(node) => update_actions(artifact.render(engine, ctx, node, Mode::Strict, phase)?),
            None => Vec::new(),
        };
        let actions = update_actions(update);

        artifact.set_preview(json!({
            "fields": fields.clone(),
            "update": actions.clone(),
            "watchers": watchers.clone(),
        }));

        let key = artifact
            .identifier()
            .map(str::to_string)
            .ok_or_else(|| TemplaterError::missing_field(artifact.name(), "identifier"))?;

        if self.dry_run {
            tracing::debug!("-----{}-----\n{}", key, pretty_dump(&fields));
            if !actions.is_empty() {
                tracing::debug!("{}", pretty_dump(&serde_json::Value::Array(actions.clone())));
            }
            tracing::debug!("{}", pretty_dump(&json!({ "watchers": watchers })));
            return Ok(None);
        }

        let api = self.api()?;
        let mut actions = actions.iter();
        api.update_issue(&key, Some(&fields), actions.next())?;
        for action in actions {
            api.update_issue(&key, None, Some(action))?;
        }
        for watcher in &watchers {
            api.add_watcher(&key, watcher)?;
        }
        tracing::info!("updated issue {} ({})", key, artifact.name());
        Ok(None)
    }
}
