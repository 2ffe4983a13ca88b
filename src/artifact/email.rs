//! Email variant.
//!
//! The identifier is the rendered `Message-ID`; creation has no side effect.
//! The update step composes the message and hands it to the mail transport.

use super::{Artifact, ArtifactBackend};
use crate::error::{Result, TemplaterError};
use crate::pretty::pretty_dump;
use crate::template::{Engine, Mode, Phase};
use crate::transport::{MailMessage, MailTransport};
use crate::vars::VariableContext;
use serde_json::{Map, Value};

const MESSAGE_ID: &str = "Message-ID";
const BODY: &str = "Body";
const BODY_HTML: &str = "Body_html";
const RECIPIENT_HEADERS: &[&str] = &["To", "Cc", "Bcc"];

/// Sends rendered emails.
pub struct EmailBackend {
    mailer: Option<Box<dyn MailTransport>>,
    from: Option<String>,
    dry_run: bool,
}

impl EmailBackend {
    pub fn new(mailer: Option<Box<dyn MailTransport>>, from: Option<String>, dry_run: bool) -> Self {
        Self {
            mailer,
            from,
            dry_run,
        }
    }

    pub fn dry_run() -> Self {
        Self::new(None, None, true)
    }
}

fn message_id(artifact: &str, rendered: &Value) -> Result<String> {
    match rendered.get(MESSAGE_ID) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(TemplaterError::missing_field(artifact, MESSAGE_ID)),
    }
}

fn header_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

/// Build a message from rendered email fields.
///
/// `Body_html` wins over `Body`; one of them and `To` are required.
pub fn compose_message(artifact: &str, rendered: &Value, from: Option<&str>) -> Result<MailMessage> {
    let empty = Map::new();
    let fields = rendered.as_object().unwrap_or(&empty);

    let (body, html) = match (fields.get(BODY_HTML), fields.get(BODY)) {
        (Some(html), _) => (html, true),
        (None, Some(plain)) => (plain, false),
        (None, None) => return Err(TemplaterError::missing_field(artifact, BODY)),
    };
    let body = match body {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };

    let mut headers = Vec::new();
    match fields.get("To").and_then(header_text) {
        Some(to) => headers.push(("To".to_string(), to)),
        None => return Err(TemplaterError::missing_field(artifact, "To")),
    }
    for name in &RECIPIENT_HEADERS[1..] {
        if let Some(value) = fields.get(*name).and_then(header_text) {
            headers.push((name.to_string(), value));
        }
    }
    for (name, value) in fields {
        if name == BODY || name == BODY_HTML || name == "From" || RECIPIENT_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if let Some(text) = header_text(value) {
            headers.push((name.clone(), text));
        }
    }

    Ok(MailMessage {
        from: from.map(str::to_string),
        headers,
        body,
        html,
    })
}

impl ArtifactBackend for EmailBackend {
    fn create(&mut self, artifact: &mut Artifact, engine: &Engine, ctx: &VariableContext) -> Result<String> {
        let phase = Phase::creation(artifact.is_resuming());
        let rendered = artifact.render(engine, ctx, &artifact.spec().fields, Mode::Permissive, phase)?;
        let id = message_id(artifact.name(), &rendered)?;
        artifact.set_preview(rendered);
        Ok(id)
    }

    fn update(
        &mut self,
        artifact: &mut Artifact,
        engine: &Engine,
        ctx: &VariableContext,
    ) -> Result<Option<String>> {
        let phase = Phase::update(artifact.is_resuming());
        let rendered = artifact.render(engine, ctx, &artifact.spec().fields, Mode::Strict, phase)?;
        let id = message_id(artifact.name(), &rendered)?;
        artifact.set_preview(rendered.clone());

        if self.dry_run {
            tracing::debug!("Email: {}", pretty_dump(&rendered));
            return Ok(Some(id));
        }

        let from = self.from.as_deref().ok_or_else(|| {
            TemplaterError::Configuration("email_from is required to send email".to_string())
        })?;
        let message = compose_message(artifact.name(), &rendered, Some(from))?;
        let mailer = self.mailer.as_deref_mut().ok_or_else(|| {
            TemplaterError::Configuration("email_smtp is required to send email".to_string())
        })?;
        mailer.send(&message)?;
        tracing::info!("sent email {} ({})", id, artifact.name());
        Ok(Some(id))
    }
}
