use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::dialect::Dialect;

pub type Result<T> = std::result::Result<T, Error>;

/// Categorized error types for driver-reported failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Syntax errors (SQLSTATE class 42 - syntax_error, etc.)
    Syntax,
    /// Semantic errors (missing table/column, ambiguous reference)
    Semantic,
    /// Execution/runtime errors (division by zero, constraint violation)
    Execution,
    /// Transaction state errors (e.g., transaction aborted)
    Transaction,
    /// Connection/communication errors
    Connection,
    /// Unknown or unclassified errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Syntax => write!(f, "Syntax Error"),
            ErrorCategory::Semantic => write!(f, "Semantic Error"),
            ErrorCategory::Execution => write!(f, "Execution Error"),
            ErrorCategory::Transaction => write!(f, "Transaction Error"),
            ErrorCategory::Connection => write!(f, "Connection Error"),
            ErrorCategory::Unknown => write!(f, "Error"),
        }
    }
}

/// Categorize a SQLSTATE code into an ErrorCategory.
pub fn categorize_sqlstate(code: &str) -> ErrorCategory {
    let Some(class) = code.get(..2) else {
        return ErrorCategory::Unknown;
    };
    match class {
        // Class 42: Syntax Error or Access Rule Violation
        "42" => {
            // 42601 = syntax_error, 42000 = generic (MySQL/SQL Server report this)
            if code == "42601" || code == "42000" {
                ErrorCategory::Syntax
            } else {
                // 42P01 = undefined_table, 42703 = undefined_column, etc.
                ErrorCategory::Semantic
            }
        }
        // Class 22: Data Exception, 23: Integrity Constraint Violation
        "22" | "23" => ErrorCategory::Execution,
        // Class 25: Invalid Transaction State, 40: Transaction Rollback
        "25" | "40" => ErrorCategory::Transaction,
        // Class 08: Connection Exception
        "08" => ErrorCategory::Connection,
        // Resources, limits, prerequisite state, operator intervention
        "53" | "54" | "55" | "57" => ErrorCategory::Execution,
        _ => ErrorCategory::Unknown,
    }
}

/// A failure reported by the database driver, kept verbatim.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub category: ErrorCategory,
    /// SQLSTATE (or vendor code) when the driver supplied one
    pub code: Option<String>,
    pub message: String,
}

impl ExecutionError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            category: categorize_sqlstate(&code),
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Request shapes that cannot be translated into SQL.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("unknown operator ({0}) provided")]
    UnknownOperator(String),
    #[error("malformed logical combinator ({0}): {1}")]
    MalformedCombinator(String, String),
    #[error("invalid operand for {op} on field ({field}): {reason}")]
    InvalidOperand {
        op: String,
        field: String,
        reason: String,
    },
    #[error("{feature} is not supported for database ({dialect})")]
    Unsupported {
        feature: &'static str,
        dialect: Dialect,
    },
    #[error("field ({0}) is targeted by more than one update operator")]
    ConflictingMutation(String),
    #[error("update request does not contain any mutation")]
    EmptyMutation,
    #[error("invalid document provided: {0}")]
    InvalidDocument(String),
    #[error("sql server cannot process skip operation, sort option is mandatory with skip")]
    SkipWithoutSort,
}

/// Transaction lifecycle step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStage::Begin => write!(f, "begin"),
            TxStage::Commit => write!(f, "commit"),
            TxStage::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("unable to {stage} transaction: {source}")]
    Transaction {
        stage: TxStage,
        #[source]
        source: ExecutionError,
    },
    #[error("{dialect}:{table} not found during inspection")]
    TableNotFound { dialect: Dialect, table: String },
    #[error("no such document found in table ({0})")]
    DocumentNotFound(String),
    #[error("statement timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn transaction(stage: TxStage, source: ExecutionError) -> Self {
        Error::Transaction { stage, source }
    }

    /// Category of the underlying driver failure, if this error came from one.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Error::Execution(e) | Error::Transaction { source: e, .. } => Some(e.category),
            Error::Timeout(_) => Some(ErrorCategory::Connection),
            _ => None,
        }
    }

    pub fn is_compile(&self) -> bool {
        matches!(self, Error::Compile(_))
    }
}

/// A batch that stopped before a successful commit.
///
/// `counts` is index-aligned with the batch input; slots past the failing
/// item stay zero.
#[derive(Debug, Error)]
#[error("batch failed: {error}")]
pub struct BatchFailure {
    pub counts: Vec<u64>,
    #[source]
    pub error: Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_sqlstate() {
        assert_eq!(categorize_sqlstate("42601"), ErrorCategory::Syntax);
        assert_eq!(categorize_sqlstate("42P01"), ErrorCategory::Semantic);
        assert_eq!(categorize_sqlstate("42703"), ErrorCategory::Semantic);
        assert_eq!(categorize_sqlstate("23505"), ErrorCategory::Execution);
        assert_eq!(categorize_sqlstate("22012"), ErrorCategory::Execution);
        assert_eq!(categorize_sqlstate("25001"), ErrorCategory::Transaction);
        assert_eq!(categorize_sqlstate("08006"), ErrorCategory::Connection);
        assert_eq!(categorize_sqlstate("XX000"), ErrorCategory::Unknown);
        assert_eq!(categorize_sqlstate("4"), ErrorCategory::Unknown);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Syntax.to_string(), "Syntax Error");
        assert_eq!(ErrorCategory::Connection.to_string(), "Connection Error");
        assert_eq!(ErrorCategory::Unknown.to_string(), "Error");
    }

    #[test]
    fn test_execution_error_keeps_message_verbatim() {
        let err = ExecutionError::with_code("23505", "duplicate key value violates unique constraint");
        assert_eq!(err.category, ErrorCategory::Execution);
        assert_eq!(
            Error::from(err).to_string(),
            "duplicate key value violates unique constraint"
        );
    }

    #[test]
    fn test_table_not_found_message() {
        let err = Error::TableNotFound {
            dialect: Dialect::Postgres,
            table: "users".into(),
        };
        assert_eq!(err.to_string(), "postgres:users not found during inspection");
        assert!(err.category().is_none());
    }

    #[test]
    fn test_transaction_error_category() {
        let err = Error::transaction(
            TxStage::Commit,
            ExecutionError::with_code("40001", "could not serialize access"),
        );
        assert_eq!(err.category(), Some(ErrorCategory::Transaction));
        assert!(err.to_string().starts_with("unable to commit transaction"));
    }

    #[test]
    fn test_categorize_non_ascii_code() {
        assert_eq!(categorize_sqlstate("é1"), ErrorCategory::Unknown);
        assert_eq!(categorize_sqlstate("1é"), ErrorCategory::Unknown);
        assert_eq!(categorize_sqlstate(""), ErrorCategory::Unknown);
        let err = ExecutionError::with_code("ü2000", "driver said no");
        assert_eq!(err.category, ErrorCategory::Unknown);
    }

    #[test]
    fn test_rollback_stage_message() {
        let err = Error::transaction(
            TxStage::Rollback,
            ExecutionError::new(ErrorCategory::Connection, "connection reset"),
        );
        assert_eq!(
            err.to_string(),
            "unable to rollback transaction: connection reset"
        );
    }
}
