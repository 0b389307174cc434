//! Federated-domain checks for user principal names.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::catalog::DirectoryCatalog;
use crate::error::{Office365Error, Office365Result};

/// Domain part of a user principal name (text after the last `@`).
pub fn principal_domain(user_principal_name: &str) -> Option<&str> {
    user_principal_name
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}

/// Decides whether a principal's domain requires an immutable identifier.
#[derive(Debug, Clone)]
pub struct DomainClassifier {
    catalog: Arc<DirectoryCatalog>,
}

impl DomainClassifier {
    pub fn new(catalog: Arc<DirectoryCatalog>) -> Self {
        Self { catalog }
    }

    /// Whether the principal's domain is a federated verified domain.
    ///
    /// # Errors
    ///
    /// [`Office365Error::DomainNotFound`] when the name has no domain part or
    /// the domain is not verified for the tenant.
    #[instrument(skip(self))]
    pub async fn is_federated(&self, user_principal_name: &str) -> Office365Result<bool> {
        let domain = principal_domain(user_principal_name)
            .ok_or_else(|| Office365Error::DomainNotFound(user_principal_name.to_string()))?;

        let entry = self
            .catalog
            .domain(domain)
            .await?
            .ok_or_else(|| Office365Error::DomainNotFound(domain.to_lowercase()))?;

        debug!(domain = %entry.name, federated = entry.is_federated(), "Classified domain");
        Ok(entry.is_federated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_domain() {
        assert_eq!(principal_domain("jdoe@Contoso.com"), Some("Contoso.com"));
        assert_eq!(principal_domain("odd@name@contoso.com"), Some("contoso.com"));
        assert_eq!(principal_domain("jdoe"), None);
        assert_eq!(principal_domain("jdoe@"), None);
    }
}
