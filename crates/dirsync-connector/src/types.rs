//! Connector Framework type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of connector for external system integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    /// Office 365 / Azure AD Graph directory
    Office365,
}

impl ConnectorType {
    /// Get the string representation used in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorType::Office365 => "office365",
        }
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConnectorType {
    type Err = ParseConnectorTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "office365" | "o365" => Ok(ConnectorType::Office365),
            _ => Err(ParseConnectorTypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown connector type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseConnectorTypeError(pub String);

impl fmt::Display for ParseConnectorTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown connector type: {}", self.0)
    }
}

impl std::error::Error for ParseConnectorTypeError {}
