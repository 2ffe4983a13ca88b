//! Outgoing mail.

use super::credentials::CredentialSource;
use crate::error::{Result, TemplaterError};
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Mailbox, Mailboxes, MessageBuilder};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// A composed message, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: Option<String>,
    /// Headers in emission order; recipient lists are joined by `, `.
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub html: bool,
}

/// Delivers composed messages.
pub trait MailTransport {
    fn send(&mut self, message: &MailMessage) -> Result<()>;
}

/// Split `host:port`.
pub fn parse_smtp_address(address: &str) -> Result<(String, u16)> {
    let invalid = || {
        TemplaterError::Configuration(format!(
            "email_smtp must be host:port, got '{}'",
            address
        ))
    };
    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    if host.is_empty() {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}

/// SMTP with STARTTLS and login.
pub struct SmtpMailer {
    host: String,
    port: u16,
    user: Option<String>,
    service: String,
    credentials: Box<dyn CredentialSource>,
}

impl SmtpMailer {
    pub fn new(
        address: &str,
        user: Option<String>,
        service: String,
        credentials: Box<dyn CredentialSource>,
    ) -> Result<Self> {
        let (host, port) = parse_smtp_address(address)?;
        Ok(Self {
            host,
            port,
            user,
            service,
            credentials,
        })
    }
}

impl MailTransport for SmtpMailer {
    fn send(&mut self, message: &MailMessage) -> Result<()> {
        let email = to_lettre(message)?;
        let mut builder = SmtpTransport::starttls_relay(&self.host)
            .map_err(|e| TemplaterError::Transport(format!("SMTP setup failed: {}", e)))?
            .port(self.port);
        if let Some(user) = &self.user {
            let password = self.credentials.password(&self.service, user, false)?;
            builder = builder.credentials(Credentials::new(user.clone(), password));
        }
        let response = builder
            .build()
            .send(&email)
            .map_err(|e| TemplaterError::Transport(format!("SMTP send failed: {}", e)))?;
        tracing::debug!("SMTP response: {:?}", response.code());
        Ok(())
    }
}

fn mailbox(value: &str) -> Result<Mailbox> {
    value
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| TemplaterError::Configuration(format!("invalid address '{}': {}", value, e)))
}

/// Parse an address list; quoted display names may contain commas.
fn mailboxes(list: &str) -> Result<Vec<Mailbox>> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    list.trim()
        .parse::<Mailboxes>()
        .map(|parsed| parsed.into_iter().collect())
        .map_err(|e| TemplaterError::Configuration(format!("invalid address list '{}': {}", list, e)))
}

fn to_lettre(message: &MailMessage) -> Result<Message> {
    let from = message.from.as_deref().ok_or_else(|| {
        TemplaterError::Configuration("email_from is required to send email".to_string())
    })?;
    let mut builder: MessageBuilder = Message::builder().from(mailbox(from)?);

    for (name, value) in &message.headers {
        builder = match name.to_ascii_lowercase().as_str() {
            "to" => mailboxes(value)?.into_iter().fold(builder, MessageBuilder::to),
            "cc" => mailboxes(value)?.into_iter().fold(builder, MessageBuilder::cc),
            "bcc" => mailboxes(value)?.into_iter().fold(builder, MessageBuilder::bcc),
            "reply-to" => mailboxes(value)?.into_iter().fold(builder, MessageBuilder::reply_to),
            "subject" => builder.subject(value.clone()),
            "message-id" => builder.message_id(Some(value.clone())),
            _ => {
                let header = HeaderName::new_from_ascii(name.clone()).map_err(|e| {
                    TemplaterError::Configuration(format!("invalid header name '{}': {}", name, e))
                })?;
                builder.raw_header(HeaderValue::new(header, value.clone()))
            }
        };
    }

    let content_type = if message.html {
        ContentType::TEXT_HTML
    } else {
        ContentType::TEXT_PLAIN
    };
    builder
        .header(content_type)
        .body(message.body.clone())
        .map_err(|e| TemplaterError::Configuration(format!("failed to build email: {}", e)))
}
