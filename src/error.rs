use thiserror::Error;

/// Errors surfaced by the orchestration engine.
///
/// `NotFound`, `WrongTenant` and `Validation` abort a single mutation and are
/// returned to the caller untouched. `ExternalFailure` covers generation and
/// storage failures; the dispatcher converts it into a failed run request.
/// `PolicyViolation` marks an illegal state change.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Wrong workspace: {entity} {id} belongs to another workspace")]
    WrongTenant { entity: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External failure: {0}")]
    ExternalFailure(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),
}

impl BoardError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BoardError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn wrong_tenant(entity: &'static str, id: impl ToString) -> Self {
        BoardError::WrongTenant {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BoardError::NotFound { .. })
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for BoardError {
    fn from(err: sqlx::Error) -> Self {
        BoardError::ExternalFailure(format!("storage error: {err}"))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::migrate::MigrateError> for BoardError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        BoardError::ExternalFailure(format!("migration error: {err}"))
    }
}

pub type BoardResult<T> = Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_entity() {
        let err = BoardError::not_found("task", "abc");
        assert_eq!(err.to_string(), "task not found: abc");
        assert!(err.is_not_found());

        let err = BoardError::wrong_tenant("agent", "xyz");
        assert!(err.to_string().starts_with("Wrong workspace"));
        assert!(!err.is_not_found());
    }
}
