//! Error taxonomy shared by every stage of the pipeline.

use std::path::Path;

use thiserror::Error;

use crate::validation::{ValidationError, ValidationViolation};

pub type CertResult<T> = Result<T, CertError>;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Composition error: {0}")]
    Compose(String),

    #[error("Render failed for '{participant}': {reason}")]
    Render { participant: String, reason: String },

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CertError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn compose(reason: impl std::fmt::Display) -> Self {
        Self::Compose(reason.to_string())
    }

    /// Scope any failure to a single participant.
    pub fn render(participant: &str, reason: impl std::fmt::Display) -> Self {
        Self::Render {
            participant: participant.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<ValidationViolation> for CertError {
    fn from(violation: ValidationViolation) -> Self {
        Self::Validation(violation.into())
    }
}

/// Attach a readable context to `std::io` failures.
pub trait IoContext<T> {
    fn io_context(self, action: &str, path: &Path) -> CertResult<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, action: &str, path: &Path) -> CertResult<T> {
        self.map_err(|e| CertError::io(format!("{} '{}'", action, path.display()), e))
    }
}
