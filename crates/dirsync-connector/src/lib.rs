//! # Connector Framework
//!
//! Core abstractions for pushing identities from an identity-management
//! system into an external directory.
//!
//! ## Architecture
//!
//! The framework uses a capability-based trait system inspired by `ConnId`:
//!
//! - [`traits::Connector`] - Base trait all connectors implement
//! - [`traits::CreateOp`], [`traits::UpdateOp`], [`traits::DeleteOp`] - CRUD operations
//! - [`traits::SearchOp`] - Read objects back
//! - [`traits::GroupOp`] - Group membership
//!
//! ## Example
//!
//! ```ignore
//! use dirsync_connector::prelude::*;
//!
//! connector.test_connection().await?;
//!
//! let attrs = AttributeSet::new()
//!     .with(NAME_ATTRIBUTE, "jdoe@contoso.com")
//!     .with("displayName", "John Doe");
//! let uid = connector.create("user", attrs).await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`types`] - Connector type enum
//! - [`error`] - Error types with transient/permanent classification
//! - [`traits`] - Connector capability traits
//! - [`operation`] - Operation types (Uid, `AttributeSet`, Filter)
//! - [`config`] - Configuration types and traits
//! - [`resilience`] - Bounded retry with pluggable backoff

pub mod config;
pub mod error;
pub mod operation;
pub mod resilience;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```
/// use dirsync_connector::prelude::*;
/// ```
pub mod prelude {
    pub use crate::types::ConnectorType;

    pub use crate::error::{ConnectorError, ConnectorResult};

    pub use crate::traits::{Connector, CreateOp, DeleteOp, GroupOp, SearchOp, UpdateOp};

    pub use crate::operation::{
        AttributeDelta, AttributeSet, AttributeValue, Filter, SearchResult, Uid, NAME_ATTRIBUTE,
        PASSWORD_ATTRIBUTE, UID_ATTRIBUTE,
    };

    pub use crate::config::{ConnectionSettings, ConnectorConfig};

    pub use crate::resilience::{Backoff, RetryExecutor, RetryFailure, RetryPolicy};
}

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
