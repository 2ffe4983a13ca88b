//! Collaborators performing the actual side effects.
//!
//! - **Tracker**: the issue-tracker REST API ([`TrackerApi`], [`JiraClient`])
//! - **Mail**: outgoing mail ([`MailTransport`], [`SmtpMailer`])
//! - **Credentials**: passwords for both ([`PromptCredentials`])

mod credentials;
mod mail;
mod tracker;

pub use credentials::PromptCredentials;
pub use mail::{MailMessage, MailTransport, SmtpMailer, parse_smtp_address};
pub use tracker::{JiraClient, TrackerApi};
