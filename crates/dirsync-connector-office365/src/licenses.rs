//! License assignment.
//!
//! Licenses are requested with a compact spec, `SKU[:PLAN]*`. A bare SKU
//! enables every plan of the SKU. Listing plans enables only those plans and
//! disables the rest.
//!
//! The directory cannot change the plan set of an assigned SKU in place, so a
//! reassignment removes every assigned SKU first and then adds the new one.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{DirectoryCatalog, LicenseCatalog};
use crate::error::{Office365Error, Office365Result};
use crate::graph_client::{GraphClient, PostOutcome};

/// Parsed `SKU[:PLAN]*` spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseSpec {
    pub sku_part_number: String,
    /// Plans to keep enabled. Empty means all.
    pub enabled_plans: Vec<String>,
}

impl LicenseSpec {
    /// Parse a spec. Blank input means "no license".
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.trim().split(':');
        let sku = parts.next().map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self {
            sku_part_number: sku.to_string(),
            enabled_plans: parts
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Build the `assignLicense` body adding the license described by `spec`.
///
/// # Errors
///
/// [`Office365Error::License`] if the spec is blank or names an unknown SKU.
pub fn convert_license_to_json(spec: &str, catalog: &LicenseCatalog) -> Office365Result<Value> {
    let spec = LicenseSpec::parse(spec)
        .ok_or_else(|| Office365Error::License("empty license specification".to_string()))?;
    let sku = catalog.sku(&spec.sku_part_number).ok_or_else(|| {
        Office365Error::License(format!("unknown license SKU '{}'", spec.sku_part_number))
    })?;

    let disabled_plans: Vec<&str> = if spec.enabled_plans.is_empty() {
        Vec::new()
    } else {
        sku.service_plans
            .iter()
            .filter(|plan| !spec.enabled_plans.contains(&plan.service_plan_name))
            .filter_map(|plan| {
                let id = Some(plan.service_plan_id.as_str())
                    .filter(|id| !id.is_empty())
                    .or_else(|| catalog.plan_id(&plan.service_plan_name));
                if id.is_none() {
                    warn!(plan = %plan.service_plan_name, "No id for service plan, leaving it enabled");
                }
                id
            })
            .collect()
    };

    debug!(sku = %sku.sku_part_number, disabled = disabled_plans.len(), "Converted license spec");
    Ok(json!({
        "addLicenses": [{
            "skuId": sku.sku_id,
            "disabledPlans": disabled_plans,
        }],
        "removeLicenses": null,
    }))
}

/// The `assignLicense` body removing one SKU.
pub fn remove_license_json(sku_id: &str) -> Value {
    json!({
        "addLicenses": null,
        "removeLicenses": [sku_id],
    })
}

/// Applies license specs to users.
#[derive(Debug, Clone)]
pub struct LicenseReconciler {
    client: Arc<GraphClient>,
    catalog: Arc<DirectoryCatalog>,
}

impl LicenseReconciler {
    pub fn new(client: Arc<GraphClient>, catalog: Arc<DirectoryCatalog>) -> Self {
        Self { client, catalog }
    }

    /// SKU ids currently assigned to the user.
    pub async fn assigned_sku_ids(&self, user_id: &str) -> Office365Result<Vec<String>> {
        let user = self.client.get(&format!("/users/{user_id}")).await?;
        let assigned = user
            .get("assignedLicenses")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(assigned
            .iter()
            .filter_map(|license| match license.get("skuId").and_then(Value::as_str) {
                Some(id) => Some(id.to_string()),
                None => {
                    warn!(user_id, "Assigned license without skuId, skipping");
                    None
                }
            })
            .collect())
    }

    /// Replace the user's licenses with `spec`; `None` or a blank spec only
    /// removes.
    ///
    /// # Errors
    ///
    /// An unresolvable spec fails before anything is removed. Otherwise fails
    /// on the first removal that is rejected; licenses removed before it stay
    /// removed.
    #[instrument(skip(self))]
    pub async fn assign_license(&self, user_id: &str, spec: Option<&str>) -> Office365Result<()> {
        let path = format!("/users/{user_id}/assignLicense");

        let addition = match spec.filter(|s| !s.trim().is_empty()) {
            Some(spec) => {
                let catalog = self.catalog.license_plans().await?;
                Some((spec, convert_license_to_json(spec, catalog)?))
            }
            None => None,
        };

        for sku_id in self.assigned_sku_ids(user_id).await? {
            debug!(user_id, %sku_id, "Removing assigned license");
            if let Err(e) = self.client.post(&path, &remove_license_json(&sku_id)).await {
                error!(user_id, %sku_id, error = %e, "License removal failed, aborting reassignment");
                return Err(e);
            }
        }

        let Some((spec, body)) = addition else {
            info!(user_id, "Licenses cleared");
            return Ok(());
        };

        match self.client.post(&path, &body).await? {
            PostOutcome::LicenseAssigned => {
                info!(user_id, license = spec, "License assigned");
                Ok(())
            }
            PostOutcome::Created(id) => Err(Office365Error::InvalidResponse(format!(
                "assignLicense created object {id} instead of assigning"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> LicenseCatalog {
        LicenseCatalog::from_response(&json!({"value": [{
            "skuId": "6fd2c87f-b296-42f0-b197-1e91e994b900",
            "skuPartNumber": "ENTERPRISEPACK",
            "objectId": "o1",
            "consumedUnits": 1,
            "prepaidUnits": {"enabled": 10, "suspended": 0, "warning": 0},
            "servicePlans": [
                {"servicePlanId": "p1", "servicePlanName": "EXCHANGE_S_ENTERPRISE"},
                {"servicePlanId": "p2", "servicePlanName": "SHAREPOINTENTERPRISE"},
                {"servicePlanId": "p3", "servicePlanName": "MCOSTANDARD"}
            ]
        }]}))
        .unwrap()
    }

    #[test]
    fn test_parse_spec() {
        assert_eq!(
            LicenseSpec::parse("ENTERPRISEPACK:MCOSTANDARD"),
            Some(LicenseSpec {
                sku_part_number: "ENTERPRISEPACK".to_string(),
                enabled_plans: vec!["MCOSTANDARD".to_string()],
            })
        );
        assert_eq!(LicenseSpec::parse("  "), None);
        assert_eq!(LicenseSpec::parse(":X"), None);
    }

    #[test]
    fn test_sku_only_enables_all_plans() {
        let body = convert_license_to_json("ENTERPRISEPACK", &catalog()).unwrap();
        assert_eq!(
            body,
            json!({
                "addLicenses": [{
                    "skuId": "6fd2c87f-b296-42f0-b197-1e91e994b900",
                    "disabledPlans": []
                }],
                "removeLicenses": null
            })
        );
    }

    #[test]
    fn test_named_plans_disable_the_rest() {
        let body = convert_license_to_json("ENTERPRISEPACK:SHAREPOINTENTERPRISE", &catalog()).unwrap();
        assert_eq!(body["addLicenses"][0]["disabledPlans"], json!(["p1", "p3"]));

        let body = convert_license_to_json(
            "ENTERPRISEPACK:SHAREPOINTENTERPRISE:MCOSTANDARD",
            &catalog(),
        )
        .unwrap();
        assert_eq!(body["addLicenses"][0]["disabledPlans"], json!(["p1"]));
    }

    #[test]
    fn test_unknown_plan_name_disables_everything() {
        let body = convert_license_to_json("ENTERPRISEPACK:NOPE", &catalog()).unwrap();
        assert_eq!(body["addLicenses"][0]["disabledPlans"], json!(["p1", "p2", "p3"]));
    }

    #[test]
    fn test_unknown_sku_is_license_error() {
        let err = convert_license_to_json("UNKNOWN_SKU", &catalog()).unwrap_err();
        assert!(matches!(err, Office365Error::License(_)));
        assert!(convert_license_to_json("", &catalog()).is_err());
    }

    #[test]
    fn test_remove_payload() {
        assert_eq!(
            remove_license_json("sku-1"),
            json!({"addLicenses": null, "removeLicenses": ["sku-1"]})
        );
    }
}
