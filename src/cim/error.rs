//! CIM status codes and the error type every `WbemConnection` operation returns.
//!
//! Only four status codes are considered *recoverable* when an operation is
//! fanned out across namespaces (see `WbemError::is_recoverable`). Everything
//! else, including transport level failures, aborts the whole command.

use std::fmt;
use thiserror::Error;

/// DMTF CIM status codes (DSP0200).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Failed,
    AccessDenied,
    InvalidNamespace,
    InvalidParameter,
    InvalidClass,
    NotFound,
    NotSupported,
    ClassHasChildren,
    ClassHasInstances,
    InvalidSuperclass,
    AlreadyExists,
    NoSuchProperty,
    TypeMismatch,
    QueryLanguageNotSupported,
    InvalidQuery,
    MethodNotAvailable,
    MethodNotFound,
    Other(u16),
}

impl StatusCode {
    pub fn code(&self) -> u16 {
        match self {
            StatusCode::Failed => 1,
            StatusCode::AccessDenied => 2,
            StatusCode::InvalidNamespace => 3,
            StatusCode::InvalidParameter => 4,
            StatusCode::InvalidClass => 5,
            StatusCode::NotFound => 6,
            StatusCode::NotSupported => 7,
            StatusCode::ClassHasChildren => 8,
            StatusCode::ClassHasInstances => 9,
            StatusCode::InvalidSuperclass => 10,
            StatusCode::AlreadyExists => 11,
            StatusCode::NoSuchProperty => 12,
            StatusCode::TypeMismatch => 13,
            StatusCode::QueryLanguageNotSupported => 14,
            StatusCode::InvalidQuery => 15,
            StatusCode::MethodNotAvailable => 16,
            StatusCode::MethodNotFound => 17,
            StatusCode::Other(c) => *c,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => StatusCode::Failed,
            2 => StatusCode::AccessDenied,
            3 => StatusCode::InvalidNamespace,
            4 => StatusCode::InvalidParameter,
            5 => StatusCode::InvalidClass,
            6 => StatusCode::NotFound,
            7 => StatusCode::NotSupported,
            8 => StatusCode::ClassHasChildren,
            9 => StatusCode::ClassHasInstances,
            10 => StatusCode::InvalidSuperclass,
            11 => StatusCode::AlreadyExists,
            12 => StatusCode::NoSuchProperty,
            13 => StatusCode::TypeMismatch,
            14 => StatusCode::QueryLanguageNotSupported,
            15 => StatusCode::InvalidQuery,
            16 => StatusCode::MethodNotAvailable,
            17 => StatusCode::MethodNotFound,
            other => StatusCode::Other(other),
        }
    }

    /// Symbolic DMTF name, e.g. `CIM_ERR_NOT_FOUND`.
    pub fn name(&self) -> &'static str {
        match self {
            StatusCode::Failed => "CIM_ERR_FAILED",
            StatusCode::AccessDenied => "CIM_ERR_ACCESS_DENIED",
            StatusCode::InvalidNamespace => "CIM_ERR_INVALID_NAMESPACE",
            StatusCode::InvalidParameter => "CIM_ERR_INVALID_PARAMETER",
            StatusCode::InvalidClass => "CIM_ERR_INVALID_CLASS",
            StatusCode::NotFound => "CIM_ERR_NOT_FOUND",
            StatusCode::NotSupported => "CIM_ERR_NOT_SUPPORTED",
            StatusCode::ClassHasChildren => "CIM_ERR_CLASS_HAS_CHILDREN",
            StatusCode::ClassHasInstances => "CIM_ERR_CLASS_HAS_INSTANCES",
            StatusCode::InvalidSuperclass => "CIM_ERR_INVALID_SUPERCLASS",
            StatusCode::AlreadyExists => "CIM_ERR_ALREADY_EXISTS",
            StatusCode::NoSuchProperty => "CIM_ERR_NO_SUCH_PROPERTY",
            StatusCode::TypeMismatch => "CIM_ERR_TYPE_MISMATCH",
            StatusCode::QueryLanguageNotSupported => "CIM_ERR_QUERY_LANGUAGE_NOT_SUPPORTED",
            StatusCode::InvalidQuery => "CIM_ERR_INVALID_QUERY",
            StatusCode::MethodNotAvailable => "CIM_ERR_METHOD_NOT_AVAILABLE",
            StatusCode::MethodNotFound => "CIM_ERR_METHOD_NOT_FOUND",
            StatusCode::Other(_) => "CIM_ERR_UNKNOWN",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Failure of a single operation against a WBEM server.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WbemError {
    /// The server answered with a CIM status code.
    #[error("{status}: {description}")]
    Cim {
        status: StatusCode,
        description: String,
    },

    /// The server does not implement a model the client relies on
    /// (e.g. the CIM_Namespace model used to enumerate namespaces).
    #[error("model error: {0}")]
    Model(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl WbemError {
    pub fn cim(status: StatusCode, description: impl Into<String>) -> Self {
        WbemError::Cim {
            status,
            description: description.into(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            WbemError::Cim { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Per-namespace configuration problems (missing class, wrong namespace,
    /// bad filter) that do not imply the server as a whole is unusable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.status(),
            Some(
                StatusCode::NotFound
                    | StatusCode::InvalidClass
                    | StatusCode::InvalidNamespace
                    | StatusCode::InvalidParameter
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_names() {
        assert_eq!(StatusCode::Failed.code(), 1);
        assert_eq!(StatusCode::NotFound.code(), 6);
        assert_eq!(StatusCode::MethodNotFound.code(), 17);
        assert_eq!(StatusCode::AlreadyExists.name(), "CIM_ERR_ALREADY_EXISTS");
        assert_eq!(StatusCode::Other(99).code(), 99);
        assert_eq!(StatusCode::Other(99).name(), "CIM_ERR_UNKNOWN");
        for code in 1..=18 {
            assert_eq!(StatusCode::from_code(code).code(), code);
        }
        assert_eq!(StatusCode::from_code(5), StatusCode::InvalidClass);
    }

    #[test]
    fn recoverable_classification() {
        assert!(WbemError::cim(StatusCode::NotFound, "x").is_recoverable());
        assert!(WbemError::cim(StatusCode::InvalidClass, "x").is_recoverable());
        assert!(WbemError::cim(StatusCode::InvalidNamespace, "x").is_recoverable());
        assert!(WbemError::cim(StatusCode::InvalidParameter, "x").is_recoverable());
        assert!(!WbemError::cim(StatusCode::Failed, "x").is_recoverable());
        assert!(!WbemError::cim(StatusCode::AccessDenied, "x").is_recoverable());
        assert!(!WbemError::Connection("refused".into()).is_recoverable());
        assert!(!WbemError::Model("no CIM_Namespace".into()).is_recoverable());
    }

    #[test]
    fn display_includes_symbolic_name() {
        let e = WbemError::cim(StatusCode::InvalidNamespace, "root/nope");
        assert_eq!(e.to_string(), "CIM_ERR_INVALID_NAMESPACE (3): root/nope");
    }
}
