//! Session errors and translation of low-level persistence errors into data access categories.

use derive_more::Display;
use std::sync::Arc;
use thiserror::Error;

pub type ExceptionTranslatorPtr = Arc<dyn PersistenceExceptionTranslator + Send + Sync>;

/// High-level category of a data access failure.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Display)]
pub enum DataAccessCategory {
    #[display(fmt = "bad SQL grammar")]
    BadSqlGrammar,
    #[display(fmt = "data integrity violation")]
    DataIntegrityViolation,
    #[display(fmt = "data access resource failure")]
    DataAccessResourceFailure,
    #[display(fmt = "transient data access resource failure")]
    TransientDataAccessResource,
    #[display(fmt = "concurrency failure")]
    ConcurrencyFailure,
    #[display(fmt = "uncategorized")]
    Uncategorized,
}

#[derive(Error, Clone, Debug)]
pub enum SessionError {
    #[error("{0}")]
    UnsupportedOperation(String),
    #[error("Persistence error (SQL state: {}): {message}", .sql_state.as_deref().unwrap_or("unknown"))]
    Persistence {
        sql_state: Option<String>,
        message: String,
    },
    #[error("Error invoking session operation: {0}")]
    Invocation(Box<SessionError>),
    #[error("{category}: {message}")]
    DataAccess {
        category: DataAccessCategory,
        message: String,
    },
    #[error("Cannot change the executor type from {current} to {requested} when there is an existing transaction")]
    ExecutorTypeChange {
        current: String,
        requested: String,
    },
    #[error("Transaction synchronization is not active")]
    SynchronizationInactive,
    #[error("Cannot activate transaction synchronization - already active")]
    SynchronizationAlreadyActive,
    #[error("Resource already bound for key {0}")]
    ResourceAlreadyBound(usize),
    #[error("Expected one result (or null) to be returned, but found: {0}")]
    TooManyResults(usize),
    #[error("Mapper '{0}' is not known to the mapper registry")]
    UnknownMapper(String),
    #[error("Mapper '{0}' is already known to the mapper registry")]
    DuplicateMapper(String),
    #[error("Mapper '{namespace}' has no method '{method}'")]
    UnknownMapperMethod { namespace: String, method: String },
    #[error("Mapper '{namespace}' conflicts with an existing, non-compatible bean definition named '{bean_name}'")]
    ConflictingMapperDefinition { bean_name: String, namespace: String },
    #[error("Value conversion error: {0}")]
    Conversion(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Strips nested invocation wrappers.
    pub fn unwrap_invocation(self) -> SessionError {
        let mut error = self;
        while let SessionError::Invocation(inner) = error {
            error = *inner;
        }

        error
    }

    #[inline]
    pub fn is_persistence(&self) -> bool {
        matches!(self, SessionError::Persistence { .. })
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(error: serde_json::Error) -> Self {
        SessionError::Conversion(error.to_string())
    }
}

/// Translates persistence errors into data access errors.
pub trait PersistenceExceptionTranslator {
    /// Returns `None` if the error cannot be translated.
    fn translate(&self, error: &SessionError) -> Option<SessionError>;
}

const BAD_SQL_GRAMMAR_CODES: [&str; 6] = ["07", "21", "2A", "37", "42", "65"];
const DATA_INTEGRITY_VIOLATION_CODES: [&str; 6] = ["01", "02", "22", "23", "27", "44"];
const DATA_ACCESS_RESOURCE_FAILURE_CODES: [&str; 5] = ["08", "53", "54", "57", "58"];
const TRANSIENT_DATA_ACCESS_RESOURCE_CODES: [&str; 3] = ["JW", "JZ", "S1"];
const CONCURRENCY_FAILURE_CODES: [&str; 2] = ["40", "61"];

/// Translator based on the class (first two characters) of the SQL state.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqlStateExceptionTranslator;

impl SqlStateExceptionTranslator {
    pub fn category(sql_state: &str) -> DataAccessCategory {
        let class = match sql_state.get(..2) {
            Some(class) => class,
            None => return DataAccessCategory::Uncategorized,
        };

        if BAD_SQL_GRAMMAR_CODES.contains(&class) {
            DataAccessCategory::BadSqlGrammar
        } else if DATA_INTEGRITY_VIOLATION_CODES.contains(&class) {
            DataAccessCategory::DataIntegrityViolation
        } else if DATA_ACCESS_RESOURCE_FAILURE_CODES.contains(&class) {
            DataAccessCategory::DataAccessResourceFailure
        } else if TRANSIENT_DATA_ACCESS_RESOURCE_CODES.contains(&class) {
            DataAccessCategory::TransientDataAccessResource
        } else if CONCURRENCY_FAILURE_CODES.contains(&class) {
            DataAccessCategory::ConcurrencyFailure
        } else {
            DataAccessCategory::Uncategorized
        }
    }
}

impl PersistenceExceptionTranslator for SqlStateExceptionTranslator {
    fn translate(&self, error: &SessionError) -> Option<SessionError> {
        match error {
            SessionError::Persistence { sql_state, message } => Some(SessionError::DataAccess {
                category: sql_state
                    .as_deref()
                    .map(Self::category)
                    .unwrap_or(DataAccessCategory::Uncategorized),
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{
        DataAccessCategory, PersistenceExceptionTranslator, SessionError,
        SqlStateExceptionTranslator,
    };

    fn persistence(sql_state: Option<&str>) -> SessionError {
        SessionError::Persistence {
            sql_state: sql_state.map(str::to_string),
            message: "failed".to_string(),
        }
    }

    #[test]
    fn should_categorize_sql_states() {
        assert_eq!(
            SqlStateExceptionTranslator::category("42000"),
            DataAccessCategory::BadSqlGrammar
        );
        assert_eq!(
            SqlStateExceptionTranslator::category("23505"),
            DataAccessCategory::DataIntegrityViolation
        );
        assert_eq!(
            SqlStateExceptionTranslator::category("08001"),
            DataAccessCategory::DataAccessResourceFailure
        );
        assert_eq!(
            SqlStateExceptionTranslator::category("40001"),
            DataAccessCategory::ConcurrencyFailure
        );
        assert_eq!(
            SqlStateExceptionTranslator::category("S1000"),
            DataAccessCategory::TransientDataAccessResource
        );
        assert_eq!(
            SqlStateExceptionTranslator::category("X"),
            DataAccessCategory::Uncategorized
        );
    }

    #[test]
    fn should_translate_only_persistence_errors() {
        let translator = SqlStateExceptionTranslator;

        assert!(matches!(
            translator.translate(&persistence(Some("23000"))),
            Some(SessionError::DataAccess {
                category: DataAccessCategory::DataIntegrityViolation,
                ..
            })
        ));
        assert!(matches!(
            translator.translate(&persistence(None)),
            Some(SessionError::DataAccess {
                category: DataAccessCategory::Uncategorized,
                ..
            })
        ));
        assert!(translator
            .translate(&SessionError::TooManyResults(2))
            .is_none());
    }

    #[test]
    fn should_unwrap_nested_invocation_errors() {
        let error = SessionError::Invocation(Box::new(SessionError::Invocation(Box::new(
            persistence(Some("42000")),
        ))));

        assert!(error.unwrap_invocation().is_persistence());
    }
}
