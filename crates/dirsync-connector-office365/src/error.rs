//! Error types for the Office 365 connector.

use dirsync_connector::error::ConnectorError;
use thiserror::Error;

/// Result type alias using `Office365Error`.
pub type Office365Result<T> = Result<T, Office365Error>;

/// Errors that can occur when talking to the directory or its token service.
#[derive(Debug, Error)]
pub enum Office365Error {
    /// Malformed identifier input (not 32 hex digits).
    #[error("Format error: {0}")]
    Format(String),

    /// Assertion signing failed or the symmetric key could not be decoded.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Token acquisition exhausted its attempts.
    #[error("Authentication failed after {attempts} attempt(s): {message}")]
    Auth { attempts: u32, message: String },

    /// The directory answered with an unexpected HTTP status.
    #[error("Directory error: HTTP {status}: {message}")]
    Directory {
        status: u16,
        message: String,
        body: String,
    },

    /// A user with the same principal name already exists.
    #[error("Object already exists: {message}")]
    AlreadyExists { message: String },

    /// Network or I/O failure before an HTTP status was received.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response whose body or headers could not be used.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The tenant reported a domain type this connector does not know.
    #[error("Unknown domain type '{domain_type}' for domain {domain}")]
    UnknownDomainType { domain: String, domain_type: String },

    /// The principal's domain is not a verified domain of the tenant.
    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    /// License specification could not be resolved or applied.
    #[error("License error: {0}")]
    License(String),

    /// An attribute value has the wrong shape for the directory.
    #[error("Invalid value for attribute {attribute}: {message}")]
    InvalidAttribute { attribute: String, message: String },

    /// A request lacked an attribute the operation requires.
    #[error("Missing required attribute: {0}")]
    MissingAttribute(String),

    /// The object class is not handled by this connector.
    #[error("Unsupported object class: {0}")]
    UnsupportedObjectClass(String),
}

impl Office365Error {
    /// Build a directory error from a status and the raw error body.
    pub(crate) fn directory(status: u16, message: impl Into<String>, body: impl Into<String>) -> Self {
        Office365Error::Directory {
            status,
            message: message.into(),
            body: body.into(),
        }
    }

    /// HTTP status for directory errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Office365Error::Directory { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error happened below the HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Office365Error::Transport(_))
    }
}

impl From<Office365Error> for ConnectorError {
    fn from(err: Office365Error) -> Self {
        match err {
            Office365Error::Format(message) | Office365Error::License(message) => {
                ConnectorError::InvalidData { message }
            }
            Office365Error::Crypto(message) => ConnectorError::AuthenticationFailed { message },
            Office365Error::Auth { attempts, message } => ConnectorError::AuthenticationFailed {
                message: format!("{message} (after {attempts} attempt(s))"),
            },
            Office365Error::AlreadyExists { message } => {
                ConnectorError::ObjectAlreadyExists { identifier: message }
            }
            Office365Error::Transport(e) => {
                ConnectorError::network_with_source("directory request failed", e)
            }
            Office365Error::Config(message) => ConnectorError::InvalidConfiguration { message },
            Office365Error::MissingAttribute(attribute) => ConnectorError::MissingAttribute { attribute },
            Office365Error::UnsupportedObjectClass(object_class) => {
                ConnectorError::ObjectClassNotSupported { object_class }
            }
            err @ Office365Error::InvalidAttribute { .. } => ConnectorError::InvalidData {
                message: err.to_string(),
            },
            Office365Error::DomainNotFound(domain) => ConnectorError::InvalidData {
                message: format!("domain not found: {domain}"),
            },
            err @ Office365Error::UnknownDomainType { .. } => {
                ConnectorError::operation_failed(err.to_string())
            }
            err @ Office365Error::InvalidResponse(_) => {
                ConnectorError::operation_failed(err.to_string())
            }
            Office365Error::Directory {
                status, message, ..
            } => match status {
                401 => ConnectorError::AuthenticationFailed {
                    message: format!("HTTP {status}: {message}"),
                },
                403 => ConnectorError::AuthorizationFailed {
                    operation: format!("HTTP {status}: {message}"),
                },
                404 => ConnectorError::ObjectNotFound {
                    identifier: format!("HTTP {status}: {message}"),
                },
                500..=599 => ConnectorError::TargetUnavailable {
                    message: format!("HTTP {status}: {message}"),
                },
                _ => ConnectorError::operation_failed(format!("HTTP {status}: {message}")),
            },
        }
    }
}
