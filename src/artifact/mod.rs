//! Artifacts: one externally visible side effect per expanded template instance.
//!
//! An [`Artifact`] is a single record type; its side effects are performed
//! by the [`ArtifactBackend`] matching its [`Variant`].
//!
//! # Lifecycle
//!
//! ```text
//! Unbound --bind--> Created --update--> Updated --update--> Updated ...
//! ```
//!
//! Binding either creates the artifact through its backend or takes the
//! identifier supplied by the resume map. Every identifier assignment is
//! published to the common values so later artifacts can reference it.

mod email;
mod spec;
mod tracker;

pub use email::EmailBackend;
pub use spec::{ArtifactSpec, ForeachSource};
pub use tracker::TrackerBackend;
#[cfg(test)]
pub use tracker::FAKE_KEY_PREFIX;

use crate::error::Result;
use crate::expand::Instance;
use crate::template::{Engine, Mode, NodePath, Phase, Scope, render};
use crate::vars::VariableContext;
use serde_json::{Map, Value};
use std::rc::Rc;

/// File extension to variant table.
pub const VARIANTS: &[(&str, Variant)] = &[
    (".jira.yaml", Variant::TrackerIssue),
    (".email.yaml", Variant::Email),
];

/// Kind of artifact a template file produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    TrackerIssue,
    Email,
}

impl Variant {
    /// Variant for a template file name, if its extension is recognized.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        VARIANTS
            .iter()
            .find(|(ext, _)| file_name.ends_with(ext))
            .map(|(_, variant)| *variant)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Variant::TrackerIssue => ".jira.yaml",
            Variant::Email => ".email.yaml",
        }
    }

    /// `file_name` without this variant's extension.
    pub fn stem<'a>(&self, file_name: &'a str) -> &'a str {
        file_name.strip_suffix(self.extension()).unwrap_or(file_name)
    }
}

/// Lifecycle state of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Unbound,
    Created,
    Updated,
}

/// Side effects of one artifact variant.
pub trait ArtifactBackend {
    /// Create the artifact and return its identifier.
    fn create(&mut self, artifact: &mut Artifact, engine: &Engine, ctx: &VariableContext) -> Result<String>;

    /// Perform the update side effect.
    ///
    /// Returns a refreshed identifier when the variant derives it from the
    /// rendered content.
    fn update(
        &mut self,
        artifact: &mut Artifact,
        engine: &Engine,
        ctx: &VariableContext,
    ) -> Result<Option<String>>;
}

/// One backend per variant.
pub struct Backends {
    pub tracker: TrackerBackend,
    pub email: EmailBackend,
}

impl Backends {
    pub fn for_variant(&mut self, variant: Variant) -> &mut dyn ArtifactBackend {
        match variant {
            Variant::TrackerIssue => &mut self.tracker,
            Variant::Email => &mut self.email,
        }
    }
}

/// Runtime entity for one expanded template instance.
#[derive(Debug, Clone)]
pub struct Artifact {
    name: String,
    spec: Rc<ArtifactSpec>,
    bindings: Map<String, Value>,
    identifier: Option<String>,
    state: ArtifactState,
    resuming: bool,
    preview: Option<Value>,
}

impl Artifact {
    /// `resuming` marks an artifact whose identifier comes from the resume map.
    pub fn new(instance: Instance, spec: Rc<ArtifactSpec>, resuming: bool) -> Self {
        Self {
            name: instance.name,
            spec,
            bindings: instance.bindings,
            identifier: None,
            state: ArtifactState::Unbound,
            resuming,
            preview: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ArtifactSpec {
        &self.spec
    }

    pub fn variant(&self) -> Variant {
        self.spec.variant
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }

    pub fn is_resuming(&self) -> bool {
        self.resuming
    }

    /// Last document rendered for this artifact.
    pub fn preview(&self) -> Option<&Value> {
        self.preview.as_ref()
    }

    pub(crate) fn set_preview(&mut self, preview: Value) {
        self.preview = Some(preview);
    }

    /// Whether the update step is skipped for this artifact.
    pub fn skips_update(&self) -> bool {
        self.spec.force_no_update || (self.spec.no_update && self.resuming)
    }

    /// Scope for this artifact's renders: common, loop bindings, own identifier.
    pub fn scope(&self, ctx: &VariableContext) -> Scope {
        ctx.scope(&self.bindings, self.identifier.as_deref())
    }

    /// Render one of this artifact's documents.
    pub fn render(
        &self,
        engine: &Engine,
        ctx: &VariableContext,
        node: &Value,
        mode: Mode,
        phase: Phase,
    ) -> Result<Value> {
        let scope = self.scope(ctx);
        let path = NodePath::new(self.spec.source_file.clone());
        render(engine, node, &scope, &path, mode, phase)
    }

    /// Bind an identifier: the supplied one, or a freshly created one.
    pub fn bind(
        &mut self,
        backend: &mut dyn ArtifactBackend,
        engine: &Engine,
        ctx: &mut VariableContext,
        supplied: Option<String>,
    ) -> Result<()> {
        let identifier = match supplied {
            Some(id) => {
                tracing::debug!("{}: using existing identifier {}", self.name, id);
                id
            }
            None => backend.create(self, engine, ctx)?,
        };
        self.assign_identifier(identifier, ctx);
        self.state = ArtifactState::Created;
        Ok(())
    }

    /// Run the update step unless suppressed.
    pub fn update(
        &mut self,
        backend: &mut dyn ArtifactBackend,
        engine: &Engine,
        ctx: &mut VariableContext,
    ) -> Result<()> {
        if self.skips_update() {
            tracing::debug!("{}: update skipped", self.name);
            return Ok(());
        }
        if let Some(identifier) = backend.update(self, engine, ctx)? {
            self.assign_identifier(identifier, ctx);
        }
        self.state = ArtifactState::Updated;
        Ok(())
    }

    fn assign_identifier(&mut self, identifier: String, ctx: &mut VariableContext) {
        ctx.bind_identifier(&self.name, &identifier);
        self.identifier = Some(identifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Backend counting calls and handing out sequential identifiers.
    #[derive(Default)]
    struct CountingBackend {
        creates: usize,
        updates: usize,
    }

    impl ArtifactBackend for CountingBackend {
        fn create(&mut self, artifact: &mut Artifact, _: &Engine, _: &VariableContext) -> Result<String> {
            self.creates += 1;
            Ok(format!("NEW-{}-{}", artifact.name(), self.creates))
        }

        fn update(&mut self, _: &mut Artifact, _: &Engine, _: &VariableContext) -> Result<Option<String>> {
            self.updates += 1;
            Ok(None)
        }
    }

    fn artifact(yaml: &str, resuming: bool) -> Artifact {
        let spec = ArtifactSpec::parse("t.jira.yaml", Variant::TrackerIssue, yaml).unwrap();
        let instance = Instance {
            name: "t".to_string(),
            bindings: Map::new(),
        };
        Artifact::new(instance, Rc::new(spec), resuming)
    }

    #[test]
    fn variant_table_matches_extensions() {
        assert_eq!(Variant::from_file_name("a.jira.yaml"), Some(Variant::TrackerIssue));
        assert_eq!(Variant::from_file_name("a.email.yaml"), Some(Variant::Email));
        assert_eq!(Variant::from_file_name("common.yaml"), None);
        assert_eq!(Variant::TrackerIssue.stem("deploy.jira.yaml"), "deploy");
    }

    #[test]
    fn supplied_identifier_skips_creation() {
        let mut backend = CountingBackend::default();
        let mut ctx = VariableContext::default();
        let mut a = artifact("summary: s\n", true);

        a.bind(&mut backend, &Engine::new(), &mut ctx, Some("OPS-9".to_string()))
            .unwrap();

        assert_eq!(backend.creates, 0);
        assert_eq!(a.identifier(), Some("OPS-9"));
        assert_eq!(a.state(), ArtifactState::Created);
        assert_eq!(ctx.get("issuekey_t"), Some(&json!("OPS-9")));
    }

    #[test]
    fn fresh_binding_creates_and_publishes() {
        let mut backend = CountingBackend::default();
        let mut ctx = VariableContext::default();
        let mut a = artifact("summary: s\n", false);

        a.bind(&mut backend, &Engine::new(), &mut ctx, None).unwrap();

        assert_eq!(backend.creates, 1);
        assert_eq!(ctx.get("issuekey_t"), Some(&json!("NEW-t-1")));
        assert_eq!(
            a.scope(&ctx).get(crate::vars::SELF_KEY),
            Some(&json!("NEW-t-1"))
        );
    }

    #[test]
    fn updated_state_is_reentered() {
        let mut backend = CountingBackend::default();
        let mut ctx = VariableContext::default();
        let engine = Engine::new();
        let mut a = artifact("summary: s\n", false);

        a.bind(&mut backend, &engine, &mut ctx, None).unwrap();
        a.update(&mut backend, &engine, &mut ctx).unwrap();
        a.update(&mut backend, &engine, &mut ctx).unwrap();

        assert_eq!(backend.updates, 2);
        assert_eq!(a.state(), ArtifactState::Updated);
    }

    #[test]
    fn no_update_only_applies_when_resuming() {
        let mut backend = CountingBackend::default();
        let mut ctx = VariableContext::default();
        let engine = Engine::new();

        let mut fresh = artifact("no_update: true\nsummary: s\n", false);
        fresh.bind(&mut backend, &engine, &mut ctx, None).unwrap();
        fresh.update(&mut backend, &engine, &mut ctx).unwrap();
        assert_eq!(backend.updates, 1);

        let mut resumed = artifact("no_update: true\nsummary: s\n", true);
        resumed
            .bind(&mut backend, &engine, &mut ctx, Some("K-1".to_string()))
            .unwrap();
        resumed.update(&mut backend, &engine, &mut ctx).unwrap();
        assert_eq!(backend.updates, 1);
        assert_eq!(resumed.state(), ArtifactState::Created);
    }

    #[test]
    fn force_no_update_always_skips() {
        let mut backend = CountingBackend::default();
        let mut ctx = VariableContext::default();
        let engine = Engine::new();
        let mut a = artifact("force_no_update: true\nsummary: s\n", false);

        a.bind(&mut backend, &engine, &mut ctx, None).unwrap();
        a.update(&mut backend, &engine, &mut ctx).unwrap();

        assert_eq!(backend.updates, 0);
    }
}
