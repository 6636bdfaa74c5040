use std::fmt;
use std::path::PathBuf;

use crate::lock::LockError;

/// Machine-readable error codes for callers that surface failures to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    RecordSourceUnreadable,
    MalformedRecord,
    StoreUnavailable,
    OperationFailed,
    CorruptGraphValue,
    LockContention,
    LockIoFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::RecordSourceUnreadable => "E2001",
            Self::MalformedRecord => "E2002",
            Self::StoreUnavailable => "E3001",
            Self::OperationFailed => "E3002",
            Self::CorruptGraphValue => "E3003",
            Self::LockContention => "E5002",
            Self::LockIoFailed => "E5003",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::RecordSourceUnreadable => "Record source unreadable",
            Self::MalformedRecord => "Malformed source record",
            Self::StoreUnavailable => "Graph store unavailable",
            Self::OperationFailed => "Graph store operation failed",
            Self::CorruptGraphValue => "Corrupt value in graph store",
            Self::LockContention => "Lock contention",
            Self::LockIoFailed => "Lock file I/O failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .eyegraph/config.toml and retry."),
            Self::RecordSourceUnreadable => {
                Some("Check that patients.json and diagnosis.json exist in the records dir.")
            }
            Self::MalformedRecord => Some("Re-export the collection as JSON and retry."),
            Self::StoreUnavailable => Some("Check the graph store path and permissions."),
            Self::OperationFailed => Some("Run `eyegraph build` again to rebuild the graph."),
            Self::CorruptGraphValue => Some("Run `eyegraph build` to recreate the graph."),
            Self::LockContention => {
                Some("Retry after the other `eyegraph build` process releases its lock.")
            }
            Self::LockIoFailed => Some("Check disk space and write permissions."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures reading the primary record store.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read records from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record #{position} in {path}: {source}")]
    Parse {
        path: PathBuf,
        position: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl SourceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::RecordSourceUnreadable,
            Self::Parse { .. } => ErrorCode::MalformedRecord,
        }
    }
}

/// Errors surfaced by the graph store, the rebuild engine, and the exporter.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("graph store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("graph operation `{operation}` failed: {source}")]
    OperationFailure {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("corrupt {what} for store id {store_id}: {source}")]
    CorruptValue {
        what: &'static str,
        store_id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl GraphError {
    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    pub(crate) const fn operation(operation: &'static str, source: rusqlite::Error) -> Self {
        Self::OperationFailure { operation, source }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            Self::OperationFailure { .. } => ErrorCode::OperationFailed,
            Self::CorruptValue { .. } => ErrorCode::CorruptGraphValue,
            Self::Source(err) => err.code(),
            Self::Lock(err) => err.code(),
        }
    }

    /// Returns `true` when no session could be obtained from the store.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, GraphError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::RecordSourceUnreadable,
            ErrorCode::MalformedRecord,
            ErrorCode::StoreUnavailable,
            ErrorCode::OperationFailed,
            ErrorCode::CorruptGraphValue,
            ErrorCode::LockContention,
            ErrorCode::LockIoFailed,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::StoreUnavailable.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn unavailable_maps_to_store_code() {
        let err = GraphError::unavailable("not connected");
        assert!(err.is_unavailable());
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
        assert!(err.code().hint().is_some());
    }

    #[test]
    fn operation_failure_is_not_unavailable() {
        let err = GraphError::operation("merge_node", rusqlite::Error::InvalidQuery);
        assert!(!err.is_unavailable());
        assert_eq!(err.code(), ErrorCode::OperationFailed);
        assert!(err.to_string().contains("merge_node"));
    }
}
