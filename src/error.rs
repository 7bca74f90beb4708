//! Error types shared by the store, the receipt extractor and the budget evaluator.
//!
//! Every failure is scoped to the single user action that triggered it; the
//! action loop prints the message and carries on.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinanceError {
    /// Bad input shape or value (non-numeric amount, empty category, limit <= 0)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The database could not be opened or reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The AI call failed or returned unusable data
    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// A statement failed on a reachable database
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl FinanceError {
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: identifier.into(),
        }
    }

    pub fn budget_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Budget",
            identifier: identifier.into(),
        }
    }

    pub fn total_overflow(category: impl std::fmt::Display, scope: impl std::fmt::Display) -> Self {
        FinanceError::Validation(format!("Total for {} in {} is out of range", category, scope))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_extraction(&self) -> bool {
        matches!(self, Self::Extraction(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for FinanceError {
    fn from(err: rusqlite::Error) -> Self {
        let unreachable = match &err {
            rusqlite::Error::SqliteFailure(e, _) => matches!(
                e.code,
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::PermissionDenied
            ),
            _ => false,
        };
        if unreachable {
            Self::Connection(err.to_string())
        } else {
            Self::Storage(err.to_string())
        }
    }
}

impl From<std::io::Error> for FinanceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type FinanceResult<T> = Result<T, FinanceError>;
