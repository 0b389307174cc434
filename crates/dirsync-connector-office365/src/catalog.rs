//! Tenant catalogs: subscribed SKUs and verified domains.
//!
//! Each catalog is read from the directory once, on first use, and then
//! served from memory for the life of the connection. A failed read is not
//! remembered, so the next access tries again.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::error::{Office365Error, Office365Result};
use crate::graph_client::GraphClient;

/// A service plan inside a SKU.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlan {
    pub service_plan_id: String,
    pub service_plan_name: String,
}

/// Reads an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Seat counts of a SKU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PrepaidUnits {
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suspended: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub warning: i64,
}

/// One subscribed SKU.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuCatalogEntry {
    pub sku_id: String,
    pub sku_part_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub object_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consumed_units: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prepaid_units: PrepaidUnits,
    /// In directory order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub service_plans: Vec<ServicePlan>,
}

/// SKUs by part number plus a plan-name index.
#[derive(Debug, Clone, Default)]
pub struct LicenseCatalog {
    skus: HashMap<String, SkuCatalogEntry>,
    plan_ids: HashMap<String, String>,
}

impl LicenseCatalog {
    /// Build the catalog from a `subscribedSkus` response.
    pub fn from_response(response: &Value) -> Office365Result<Self> {
        let entries: Vec<SkuCatalogEntry> = response
            .get("value")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Office365Error::InvalidResponse(format!("subscribedSkus: {e}")))?
            .ok_or_else(|| {
                Office365Error::InvalidResponse("subscribedSkus has no value array".to_string())
            })?;

        let mut catalog = Self::default();
        for entry in entries {
            for plan in &entry.service_plans {
                // Names shared between SKUs resolve to the last one read.
                catalog
                    .plan_ids
                    .insert(plan.service_plan_name.clone(), plan.service_plan_id.clone());
            }
            debug!(sku = %entry.sku_part_number, plans = entry.service_plans.len(), "Cataloged SKU");
            catalog.skus.insert(entry.sku_part_number.clone(), entry);
        }
        Ok(catalog)
    }

    /// SKU by part number (license name).
    pub fn sku(&self, part_number: &str) -> Option<&SkuCatalogEntry> {
        self.skus.get(part_number)
    }

    /// Plan id by plan name.
    pub fn plan_id(&self, plan_name: &str) -> Option<&str> {
        self.plan_ids.get(plan_name).map(String::as_str)
    }

    pub fn skus(&self) -> impl Iterator<Item = &SkuCatalogEntry> {
        self.skus.values()
    }

    pub fn len(&self) -> usize {
        self.skus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skus.is_empty()
    }
}

/// Authentication model of a verified domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainType {
    /// Sign-in delegated to an external identity provider.
    Federated,
    /// Passwords held by the directory.
    Managed,
}

/// A verified domain of the tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDomain {
    /// Lowercased.
    pub name: String,
    pub domain_type: DomainType,
    pub capabilities: Vec<String>,
    pub is_default: bool,
    pub is_initial: bool,
    pub id: String,
}

impl VerifiedDomain {
    pub fn is_federated(&self) -> bool {
        self.domain_type == DomainType::Federated
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(capability))
    }
}

#[derive(Deserialize)]
struct RawDomain {
    name: String,
    #[serde(rename = "type")]
    domain_type: String,
    #[serde(default)]
    capabilities: Option<String>,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    initial: bool,
    #[serde(default)]
    id: Option<String>,
}

/// Parse the verified domains of a `tenantDetails` response.
///
/// Domains of type `None` are left out. Any other unknown type fails the
/// whole read.
pub fn parse_verified_domains(response: &Value) -> Office365Result<HashMap<String, VerifiedDomain>> {
    let raw = response
        .get("value")
        .and_then(|v| v.get(0))
        .and_then(|t| t.get("verifiedDomains"))
        .cloned()
        .ok_or_else(|| {
            Office365Error::InvalidResponse("tenantDetails has no verifiedDomains".to_string())
        })?;
    let raw: Vec<RawDomain> = serde_json::from_value(raw)
        .map_err(|e| Office365Error::InvalidResponse(format!("verifiedDomains: {e}")))?;

    let mut domains = HashMap::new();
    for d in raw {
        let name = d.name.to_lowercase();
        let domain_type = match d.domain_type.as_str() {
            "Federated" => DomainType::Federated,
            "Managed" => DomainType::Managed,
            "None" => {
                debug!(domain = %name, "Skipping domain of type None");
                continue;
            }
            other => {
                return Err(Office365Error::UnknownDomainType {
                    domain: name,
                    domain_type: other.to_string(),
                })
            }
        };

        let capabilities = d
            .capabilities
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        domains.insert(
            name.clone(),
            VerifiedDomain {
                name,
                domain_type,
                capabilities,
                is_default: d.default,
                is_initial: d.initial,
                id: d.id.unwrap_or_default(),
            },
        );
    }
    Ok(domains)
}

/// Lazily populated SKU and domain catalogs.
#[derive(Debug)]
pub struct DirectoryCatalog {
    client: Arc<GraphClient>,
    licenses: OnceCell<LicenseCatalog>,
    domains: OnceCell<HashMap<String, VerifiedDomain>>,
}

impl DirectoryCatalog {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self {
            client,
            licenses: OnceCell::new(),
            domains: OnceCell::new(),
        }
    }

    /// The subscribed SKUs, read on first call.
    #[instrument(skip(self))]
    pub async fn license_plans(&self) -> Office365Result<&LicenseCatalog> {
        self.licenses
            .get_or_try_init(|| async {
                let response = self.client.get("/subscribedSkus").await?;
                let catalog = LicenseCatalog::from_response(&response)?;
                info!(skus = catalog.len(), "Loaded license catalog");
                Ok(catalog)
            })
            .await
    }

    /// The verified domains keyed by lowercased name, read on first call.
    #[instrument(skip(self))]
    pub async fn verified_domains(&self) -> Office365Result<&HashMap<String, VerifiedDomain>> {
        self.domains
            .get_or_try_init(|| async {
                let response = self.client.get("/tenantDetails").await?;
                let domains = parse_verified_domains(&response)?;
                info!(domains = domains.len(), "Loaded verified domains");
                Ok(domains)
            })
            .await
    }

    /// A verified domain by name, case-insensitively.
    pub async fn domain(&self, name: &str) -> Office365Result<Option<&VerifiedDomain>> {
        Ok(self.verified_domains().await?.get(&name.to_lowercase()))
    }
}
