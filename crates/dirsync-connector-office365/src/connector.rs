//! Office 365 connector implementation.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use dirsync_connector::config::ConnectorConfig;
use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::operation::{
    AttributeDelta, AttributeSet, Filter, SearchResult, Uid, NAME_ATTRIBUTE, UID_ATTRIBUTE,
};
use dirsync_connector::traits::{Connector, CreateOp, DeleteOp, GroupOp, SearchOp, UpdateOp};
use dirsync_connector::types::ConnectorType;

use crate::auth::TokenService;
use crate::catalog::DirectoryCatalog;
use crate::config::{Office365Config, Office365Credentials};
use crate::domains::DomainClassifier;
use crate::error::{Office365Error, Office365Result};
use crate::graph_client::GraphClient;
use crate::licenses::LicenseReconciler;

/// Object classes understood by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectKind {
    User,
    Group,
}

impl ObjectKind {
    fn parse(object_class: &str) -> Office365Result<Self> {
        match object_class.to_ascii_lowercase().as_str() {
            "user" | "account" | "__account__" => Ok(ObjectKind::User),
            "group" | "__group__" => Ok(ObjectKind::Group),
            _ => Err(Office365Error::UnsupportedObjectClass(object_class.to_string())),
        }
    }
}

/// Connector for an Office 365 tenant's directory.
pub struct Office365Connector {
    config: Office365Config,
    display_name: String,
    tokens: Arc<TokenService>,
    client: Arc<GraphClient>,
    catalog: Arc<DirectoryCatalog>,
    classifier: DomainClassifier,
    reconciler: LicenseReconciler,
}

impl std::fmt::Debug for Office365Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Office365Connector")
            .field("config", &self.config.redacted())
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl Office365Connector {
    /// Creates a connector. No request is made until first use.
    pub fn new(config: Office365Config, credentials: Office365Credentials) -> ConnectorResult<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(config.connection.read_timeout())
            .connect_timeout(config.connection.connection_timeout())
            .build()
            .map_err(|e| ConnectorError::InvalidConfiguration {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        let tokens = Arc::new(TokenService::new(&config, &credentials, http_client.clone())?);
        let client = Arc::new(GraphClient::new(&config, Arc::clone(&tokens), http_client));
        let catalog = Arc::new(DirectoryCatalog::new(Arc::clone(&client)));

        Ok(Self {
            display_name: format!("Office 365: {}", config.tenant),
            classifier: DomainClassifier::new(Arc::clone(&catalog)),
            reconciler: LicenseReconciler::new(Arc::clone(&client), Arc::clone(&catalog)),
            config,
            tokens,
            client,
            catalog,
        })
    }

    pub fn config(&self) -> &Office365Config {
        &self.config
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    /// Subscribed SKUs and verified domains of the tenant.
    pub fn catalog(&self) -> &DirectoryCatalog {
        &self.catalog
    }

    pub fn classifier(&self) -> &DomainClassifier {
        &self.classifier
    }

    pub fn reconciler(&self) -> &LicenseReconciler {
        &self.reconciler
    }
}

/// The object id addressed by a lookup filter.
fn lookup_key(kind: ObjectKind, filter: &Filter) -> Option<&str> {
    filter
        .equality_value(UID_ATTRIBUTE)
        .or_else(|| filter.equality_value("objectId"))
        // Users are also addressable by principal name.
        .or_else(|| match kind {
            ObjectKind::User => filter.equality_value(NAME_ATTRIBUTE),
            ObjectKind::Group => None,
        })
}

#[async_trait]
impl Connector for Office365Connector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Office365
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Reads the tenant record and requires at least one assigned plan.
    #[instrument(skip(self))]
    async fn test_connection(&self) -> ConnectorResult<()> {
        let tenant = self.client.get("/tenantDetails").await?;
        let plans = tenant
            .get("value")
            .and_then(|v| v.get(0))
            .and_then(|t| t.get("assignedPlans"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        if plans == 0 {
            return Err(ConnectorError::connection_failed(format!(
                "tenant {} has no assigned plans",
                self.config.tenant
            )));
        }
        info!(tenant = %self.config.tenant, plans, "Connection test succeeded");
        Ok(())
    }

    async fn dispose(&self) -> ConnectorResult<()> {
        self.tokens.invalidate().await;
        info!("Office 365 connector disposed");
        Ok(())
    }
}

#[async_trait]
impl CreateOp for Office365Connector {
    #[instrument(skip(self, attributes))]
    async fn create(&self, object_class: &str, attributes: AttributeSet) -> ConnectorResult<Uid> {
        let uid = match ObjectKind::parse(object_class)? {
            ObjectKind::User => self.create_user(&attributes).await?,
            ObjectKind::Group => self.create_group(&attributes).await?,
        };
        Ok(uid)
    }
}

#[async_trait]
impl UpdateOp for Office365Connector {
    #[instrument(skip(self, changes))]
    async fn update(
        &self,
        object_class: &str,
        uid: &Uid,
        changes: AttributeDelta,
    ) -> ConnectorResult<Uid> {
        let uid = match ObjectKind::parse(object_class)? {
            ObjectKind::User => self.update_user(uid.value(), &changes).await?,
            ObjectKind::Group => self.update_group(uid.value(), &changes).await?,
        };
        Ok(uid)
    }
}

#[async_trait]
impl DeleteOp for Office365Connector {
    #[instrument(skip(self))]
    async fn delete(&self, object_class: &str, uid: &Uid) -> ConnectorResult<()> {
        match ObjectKind::parse(object_class)? {
            ObjectKind::User => self.delete_user(uid.value()).await?,
            ObjectKind::Group => self.delete_group(uid.value()).await?,
        }
        Ok(())
    }
}

#[async_trait]
impl SearchOp for Office365Connector {
    /// Looks up a single object by id. Enumeration is not supported.
    #[instrument(skip(self))]
    async fn search(
        &self,
        object_class: &str,
        filter: Option<Filter>,
    ) -> ConnectorResult<SearchResult> {
        let kind = ObjectKind::parse(object_class)?;
        let key = filter
            .as_ref()
            .and_then(|f| lookup_key(kind, f))
            .ok_or_else(|| ConnectorError::UnsupportedOperation {
                message: format!("{object_class} search requires an identifier equality filter"),
            })?;
        debug!(object_class, key, "Looking up object");

        let found = match kind {
            ObjectKind::User => self.get_user(key).await?,
            ObjectKind::Group => self.get_group(key).await?,
        };
        Ok(found.map_or_else(SearchResult::empty, |o| SearchResult::new(vec![o])))
    }
}

#[async_trait]
impl GroupOp for Office365Connector {
    async fn add_member(&self, group_uid: &Uid, member_uid: &Uid) -> ConnectorResult<()> {
        Ok(self
            .add_member_to_group(group_uid.value(), member_uid.value())
            .await?)
    }

    async fn remove_member(&self, group_uid: &Uid, member_uid: &Uid) -> ConnectorResult<()> {
        Ok(self
            .remove_member_from_group(group_uid.value(), member_uid.value())
            .await?)
    }

    async fn get_groups_for_member(&self, member_uid: &Uid) -> ConnectorResult<Vec<Uid>> {
        let groups = self.member_groups(member_uid.value()).await?;
        Ok(groups.into_iter().map(Uid::from_value).collect())
    }
}
