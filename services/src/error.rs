use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(msg) => ServiceError::NotFound(msg),
            other => ServiceError::Database(other),
        }
    }
}

/// True when `err` came from a primary key or unique index rejecting an insert.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(vec![message.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_not_found_maps_to_not_found() {
        let err: ServiceError = DbErr::RecordNotFound("Session 9 not found".into()).into();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "Session 9 not found"));
    }

    #[test]
    fn validation_errors_join_messages() {
        let err = ServiceError::Validation(vec!["A is required".into(), "B is too long".into()]);
        assert_eq!(err.to_string(), "A is required; B is too long");
    }
}
