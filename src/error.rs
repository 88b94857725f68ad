use std::sync::PoisonError;

/// Custom Result type for TinyQuery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for TinyQuery
///
/// Every failure reported by the store, the planner, the evaluator or the job
/// registry is one of these kinds. Clone is required because a failed job
/// hands the same error back on every result fetch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Referenced project, dataset, table or job is absent
    #[error("not found: {0}")]
    NotFound(String),
    /// Create-if-absent violated, or WRITE_EMPTY against a non-empty table
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// Operand types that cannot be reconciled
    #[error("type error: {0}")]
    Type(String),
    /// Unparseable query text
    #[error("syntax error: {0}")]
    Syntax(String),
    /// Unresolved or ambiguous field reference
    #[error("name error: {0}")]
    Name(String),
    /// Runtime arithmetic fault (division by zero, overflow)
    #[error("evaluation error: {0}")]
    Evaluation(String),
    /// Malformed request payload
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Internal error (poisoned lock, broken invariant)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status the request facade should render for this error
    pub fn status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::AlreadyExists(_) => 409,
            Error::Type(_)
            | Error::Syntax(_)
            | Error::Name(_)
            | Error::Evaluation(_)
            | Error::InvalidArgument(_) => 400,
            Error::Internal(_) => 500,
        }
    }

    /// Reason code used in the emulated service's error payloads
    pub fn reason(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "notFound",
            Error::AlreadyExists(_) => "duplicate",
            Error::Type(_) | Error::Syntax(_) | Error::Name(_) | Error::Evaluation(_) => {
                "invalidQuery"
            }
            Error::InvalidArgument(_) => "invalid",
            Error::Internal(_) => "internalError",
        }
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(value: std::num::ParseIntError) -> Self {
        Error::Syntax(value.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(value: std::num::ParseFloatError) -> Self {
        Error::Syntax(value.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(value: PoisonError<T>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::InvalidArgument(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::NotFound("t".into()).status(), 404);
        assert_eq!(Error::AlreadyExists("t".into()).status(), 409);
        assert_eq!(Error::Syntax("x".into()).status(), 400);
        assert_eq!(Error::Internal("x".into()).status(), 500);
        assert_eq!(Error::Type("x".into()).reason(), "invalidQuery");
        assert!(Error::NotFound("table p:d.t".into()).to_string().contains("p:d.t"));
    }

    #[test]
    fn test_conversions() {
        let err: Error = "abc".parse::<i64>().unwrap_err().into();
        assert!(matches!(err, Error::Syntax(_)));

        let err: Error = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert_eq!(err.status(), 400);
    }
}
