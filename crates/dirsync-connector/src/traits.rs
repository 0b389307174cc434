//! Connector Framework traits
//!
//! Capability-based trait definitions. A connector implements [`Connector`]
//! plus whichever operation traits its target system supports.

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::operation::{AttributeDelta, AttributeSet, Filter, SearchResult, Uid};
use crate::types::ConnectorType;

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Get the type of this connector.
    fn connector_type(&self) -> ConnectorType;

    /// Get the display name for this connector instance.
    fn display_name(&self) -> &str;

    /// Test the connection to the target system.
    ///
    /// Returns `Ok(())` if the target is reachable with the configured
    /// credentials, or an error describing what went wrong.
    async fn test_connection(&self) -> ConnectorResult<()>;

    /// Release any session state held by the connector.
    async fn dispose(&self) -> ConnectorResult<()>;
}

/// Capability for creating objects in the target system.
#[async_trait]
pub trait CreateOp: Connector {
    /// Create a new object and return its identifier in the target system.
    ///
    /// # Arguments
    /// * `object_class` - The type of object to create (e.g., "user", "group")
    /// * `attributes` - The attributes for the new object
    async fn create(&self, object_class: &str, attributes: AttributeSet) -> ConnectorResult<Uid>;
}

/// Capability for updating existing objects.
#[async_trait]
pub trait UpdateOp: Connector {
    /// Apply `changes` to the object and return its (possibly unchanged) UID.
    async fn update(
        &self,
        object_class: &str,
        uid: &Uid,
        changes: AttributeDelta,
    ) -> ConnectorResult<Uid>;
}

/// Capability for deleting objects.
#[async_trait]
pub trait DeleteOp: Connector {
    async fn delete(&self, object_class: &str, uid: &Uid) -> ConnectorResult<()>;
}

/// Capability for reading objects.
#[async_trait]
pub trait SearchOp: Connector {
    /// Search for objects matching `filter`.
    async fn search(
        &self,
        object_class: &str,
        filter: Option<Filter>,
    ) -> ConnectorResult<SearchResult>;

    /// Fetch a single object by UID.
    ///
    /// The default implementation issues an equality search on the UID.
    async fn get(&self, object_class: &str, uid: &Uid) -> ConnectorResult<Option<AttributeSet>> {
        let filter = Filter::eq(uid.attribute_name(), uid.value());
        let result = self.search(object_class, Some(filter)).await?;
        Ok(result.objects.into_iter().next())
    }
}

/// Capability for managing group membership.
#[async_trait]
pub trait GroupOp: Connector {
    async fn add_member(&self, group_uid: &Uid, member_uid: &Uid) -> ConnectorResult<()>;

    async fn remove_member(&self, group_uid: &Uid, member_uid: &Uid) -> ConnectorResult<()>;

    /// Groups the member belongs to, directly or transitively.
    async fn get_groups_for_member(&self, member_uid: &Uid) -> ConnectorResult<Vec<Uid>>;
}
