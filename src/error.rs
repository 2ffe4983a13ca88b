//! Error types for workflow-templater.
//!
//! Uses thiserror for derive macros. Every variant is fatal for the run; the
//! only recovered condition (tracker session refresh) never surfaces here.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for workflow-templater operations.
#[derive(Error, Debug)]
pub enum TemplaterError {
    /// A scalar failed to evaluate (syntax error, unknown filter or test, bad JSON payload).
    #[error("template error in {path}: {message}")]
    TemplateEvaluation { path: String, message: String },

    /// A strict render met a variable with no binding.
    #[error("unresolved reference in {path}: {message}")]
    UnresolvedReference { path: String, message: String },

    /// A field required by the backend is absent after rendering.
    #[error("{artifact}: required field '{field}' is missing")]
    MissingRequiredField { artifact: String, field: String },

    /// The tracker API or the mail transport reported a failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A run-level value is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A template file has an unusable layout (directives of the wrong type, bad foreach items).
    #[error("{file}: {message}")]
    InvalidTemplate { file: String, message: String },

    /// The self-referential configuration kept changing.
    #[error("configuration did not converge after {iterations} render passes (cyclic reference?)")]
    NonConvergence { iterations: usize },

    /// Filesystem failure while reading templates, variables or config.
    #[error("{0}")]
    Io(String),
}

impl TemplaterError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            TemplaterError::TemplateEvaluation { .. }
            | TemplaterError::UnresolvedReference { .. }
            | TemplaterError::MissingRequiredField { .. }
            | TemplaterError::NonConvergence { .. } => exit_codes::TEMPLATE_FAILURE,
            TemplaterError::Transport(_) => exit_codes::TRANSPORT_FAILURE,
            TemplaterError::Configuration(_)
            | TemplaterError::InvalidTemplate { .. }
            | TemplaterError::Io(_) => exit_codes::USER_ERROR,
        }
    }

    pub(crate) fn missing_field(artifact: &str, field: &str) -> Self {
        TemplaterError::MissingRequiredField {
            artifact: artifact.to_string(),
            field: field.to_string(),
        }
    }
}

/// Result type alias for workflow-templater operations.
pub type Result<T> = std::result::Result<T, TemplaterError>;
