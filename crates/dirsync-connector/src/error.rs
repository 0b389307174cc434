//! Connector framework error types
//!
//! Error definitions with transient/permanent classification so that callers
//! (and the retry helper in [`crate::resilience`]) can decide whether an
//! operation is worth repeating.

use thiserror::Error;

/// Error that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors (usually transient)
    /// Failed to establish connection to target system.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Target system is temporarily unavailable.
    #[error("target system unavailable: {message}")]
    TargetUnavailable { message: String },

    /// Network error during communication.
    #[error("network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Authentication errors (permanent until the configuration changes)
    /// Could not authenticate against the target system.
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Insufficient permissions for the operation.
    #[error("authorization failed: insufficient permissions for {operation}")]
    AuthorizationFailed { operation: String },

    // Configuration errors (permanent)
    /// Connector configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Object class is not handled by this connector.
    #[error("object class '{object_class}' is not supported")]
    ObjectClassNotSupported { object_class: String },

    /// The requested operation is not supported by this connector.
    #[error("unsupported operation: {message}")]
    UnsupportedOperation { message: String },

    // Operation errors
    /// Operation failed.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Object already exists in target system (create conflict).
    #[error("object already exists: {identifier}")]
    ObjectAlreadyExists { identifier: String },

    /// Object not found in target system (update/delete target missing).
    #[error("object not found: {identifier}")]
    ObjectNotFound { identifier: String },

    /// Invalid data format.
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    /// A required attribute was missing from the request.
    #[error("missing required attribute '{attribute}'")]
    MissingAttribute { attribute: String },

    /// Serialization error.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl ConnectorError {
    /// Check if this error is transient and the operation should be retried.
    ///
    /// Transient errors are caused by conditions that may resolve themselves,
    /// such as network issues or temporary unavailability of the target.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed { .. }
                | ConnectorError::TargetUnavailable { .. }
                | ConnectorError::NetworkError { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::TargetUnavailable { .. } => "TARGET_UNAVAILABLE",
            ConnectorError::NetworkError { .. } => "NETWORK_ERROR",
            ConnectorError::AuthenticationFailed { .. } => "AUTH_FAILED",
            ConnectorError::AuthorizationFailed { .. } => "AUTHORIZATION_FAILED",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::ObjectClassNotSupported { .. } => "OBJECT_CLASS_NOT_SUPPORTED",
            ConnectorError::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            ConnectorError::OperationFailed { .. } => "OPERATION_FAILED",
            ConnectorError::ObjectAlreadyExists { .. } => "OBJECT_EXISTS",
            ConnectorError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            ConnectorError::InvalidData { .. } => "INVALID_DATA",
            ConnectorError::MissingAttribute { .. } => "MISSING_ATTRIBUTE",
            ConnectorError::Serialization { .. } => "SERIALIZATION_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        ConnectorError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a missing attribute error.
    pub fn missing_attribute(attribute: impl Into<String>) -> Self {
        ConnectorError::MissingAttribute {
            attribute: attribute.into(),
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(ConnectorError::connection_failed("refused").is_transient());
        assert!(ConnectorError::TargetUnavailable {
            message: "503".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(ConnectorError::AuthenticationFailed {
            message: "no token".to_string()
        }
        .is_permanent());
        assert!(ConnectorError::ObjectAlreadyExists {
            identifier: "jdoe@contoso.com".to_string()
        }
        .is_permanent());
        assert!(ConnectorError::missing_attribute("immutableId").is_permanent());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ConnectorError::ObjectNotFound {
                identifier: "x".to_string()
            }
            .error_code(),
            "OBJECT_NOT_FOUND"
        );
        assert_eq!(
            ConnectorError::AuthenticationFailed {
                message: "token attempts exhausted".to_string()
            }
            .error_code(),
            "AUTH_FAILED"
        );
    }

    #[test]
    fn test_error_display_carries_message() {
        let err = ConnectorError::operation_failed("HTTP 400: bad property");
        assert_eq!(err.to_string(), "operation failed: HTTP 400: bad property");
    }

    #[test]
    fn test_json_error_becomes_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConnectorError = json_err.into();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}
