/// Domain error taxonomy for the validation workflow engine.
///
/// Rule evaluation failures are not represented here: they are caught inside
/// the bot engine and surfaced as failed `ValidationResult`s.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication required: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unsupported signature method: {0}")]
    UnsupportedMethod(String),

    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn report_store(message: impl Into<String>) -> Self {
        CoreError::Collaborator {
            collaborator: "report store",
            message: message.into(),
        }
    }

    /// Whether the caller may retry the operation unchanged.
    ///
    /// Only collaborator outages qualify; every other variant needs the
    /// caller to re-read state or change its input first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Collaborator { .. })
    }
}
