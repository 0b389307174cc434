//! Office 365 Directory Connector
//!
//! Pushes users, groups and licenses into an Office 365 tenant through the
//! Azure AD Graph REST API (`api-version=2013-11-08`).
//!
//! # Features
//!
//! - Service-principal authentication with a self-signed JWT-bearer assertion
//! - User create/update/delete/read, including license assignment
//! - Security groups and group membership
//! - `immutableId` encoding for users in federated domains
//!
//! # Example
//!
//! ```no_run
//! use dirsync_connector::operation::{AttributeSet, NAME_ATTRIBUTE};
//! use dirsync_connector::traits::{Connector, CreateOp};
//! use dirsync_connector_office365::{Office365Config, Office365Connector, Office365Credentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Office365Config::builder()
//!     .tenant("contoso.onmicrosoft.com")
//!     .principal_id("your-service-principal-id")
//!     .build()?;
//!
//! let credentials = Office365Credentials::new("base64-symmetric-key");
//!
//! let connector = Office365Connector::new(config, credentials)?;
//! connector.test_connection().await?;
//!
//! let attrs = AttributeSet::new()
//!     .with(NAME_ATTRIBUTE, "jdoe@contoso.com")
//!     .with("displayName", "John Doe")
//!     .with("mailNickname", "jdoe")
//!     .with("accountEnabled", true)
//!     .with("usageLocation", "GB")
//!     .with("licenses", "ENTERPRISEPACK");
//! let _uid = connector.create("user", attrs).await?;
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod auth;
pub mod catalog;
pub mod config;
mod connector;
pub mod domains;
mod error;
pub mod graph_client;
pub mod groups;
pub mod immutable_id;
pub mod licenses;
pub mod schema;
pub mod users;

// Re-exports
pub use auth::TokenService;
pub use catalog::{DirectoryCatalog, DomainType, LicenseCatalog, SkuCatalogEntry, VerifiedDomain};
pub use config::{Office365Config, Office365ConfigBuilder, Office365Credentials};
pub use connector::Office365Connector;
pub use domains::DomainClassifier;
pub use error::{Office365Error, Office365Result};
pub use graph_client::{GraphClient, PostOutcome, SUCCESS_UID};
pub use immutable_id::ImmutableIdEncoding;
pub use licenses::{convert_license_to_json, LicenseReconciler, LicenseSpec};
