//! Error types for recruit-onboard.

use std::time::Duration;

use crate::onboarding::model::{DraftField, Role};
use crate::onboarding::state::{OnboardingStep, StepAction};

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A required field was empty when an advance was requested.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Step {step} is incomplete: missing {}", format_fields(.missing))]
pub struct ValidationError {
    pub step: OnboardingStep,
    pub missing: Vec<DraftField>,
}

fn format_fields(fields: &[DraftField]) -> String {
    if fields.is_empty() {
        return "a resume file".to_string();
    }
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// An uploaded resume did not satisfy the PDF content-type constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rejected resume file {file_name}: expected application/pdf, got {content_type}")]
pub struct RejectedFileError {
    pub file_name: String,
    pub content_type: String,
}

/// The completion-time save failed.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Profile store rejected the update: {0}")]
    Store(#[from] DatabaseError),

    #[error("Profile store did not respond within {0:?}")]
    TimedOut(Duration),
}

/// Errors raised by the onboarding flow.
///
/// Most are local conditions the caller renders against the current step.
/// `AlreadyCompleted` raised at completion ends the flow.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    RejectedFile(#[from] RejectedFileError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Action {action} is not available on step {step}")]
    InvalidAction {
        step: OnboardingStep,
        action: StepAction,
    },

    #[error("Resume upload is not available on step {step}")]
    UploadNotAvailable { step: OnboardingStep },

    #[error("Step {step} cannot complete onboarding")]
    NotTerminal { step: OnboardingStep },

    #[error("A completion request is already in flight")]
    CompletionInFlight,

    #[error("Onboarding already completed for user {user_id}")]
    AlreadyCompleted { user_id: String },

    #[error("User {user_id} signed up as {stored}, not {requested}")]
    RoleMismatch {
        user_id: String,
        stored: Role,
        requested: Role,
    },

    #[error("Onboarding flow has already finished")]
    Finished,

    #[error("Could not load profile before onboarding: {0}")]
    Lookup(#[source] DatabaseError),
}

impl OnboardingError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::CompletionInFlight | Self::Lookup(_))
    }

    /// Message suitable for showing inline next to the current step.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => format!("Please fill in: {}", format_fields(&e.missing)),
            Self::RejectedFile(_) => "Please upload a PDF file".to_string(),
            Self::Persistence(_) => "Failed to save profile. Please try again.".to_string(),
            Self::InvalidAction { .. }
            | Self::NotTerminal { .. }
            | Self::UploadNotAvailable { .. } => {
                "That option is not available right now".to_string()
            }
            Self::CompletionInFlight => "Still saving your profile...".to_string(),
            Self::AlreadyCompleted { .. } | Self::Finished => {
                "Your profile setup is already complete".to_string()
            }
            Self::RoleMismatch { stored, .. } => {
                format!("Your account is registered as {}", stored.label())
            }
            Self::Lookup(_) => "Could not load your profile. Please try again.".to_string(),
        }
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
