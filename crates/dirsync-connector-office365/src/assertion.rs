//! JWT-bearer assertion minting.
//!
//! The access control service accepts a self-issued HS256 token signed with
//! the tenant's shared symmetric key. No network I/O happens here.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;

use crate::config::{Office365Config, Office365Credentials};
use crate::error::{Office365Error, Office365Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct AssertionHeader {
    alg: &'static str,
    typ: &'static str,
}

/// Claims carried by the assertion body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionClaims {
    pub aud: String,
    pub iss: String,
    /// Not-before, seconds since the epoch.
    pub nbf: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// A signed assertion: `header.body.signature`, each segment base64.
pub struct SignedAssertion {
    header: String,
    body: String,
    signature: String,
}

impl SignedAssertion {
    /// The compact serialization posted to the token endpoint.
    pub fn compact(&self) -> SecretString {
        SecretString::from(format!("{}.{}.{}", self.header, self.body, self.signature))
    }
}

impl std::fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("header", &self.header)
            .field("body", &"[REDACTED]")
            .field("signature", &"[REDACTED]")
            .finish()
    }
}

/// Format a service principal name: `principal/host@realm`, dropping the
/// parts that are empty.
pub fn formatted_principal(principal: &str, host: Option<&str>, realm: &str) -> String {
    match host {
        Some(host) if !realm.trim().is_empty() => format!("{principal}/{host}@{realm}"),
        Some(host) => format!("{principal}/{host}"),
        None => format!("{principal}@{realm}"),
    }
}

/// Builds and signs assertions for one tenant.
#[derive(Clone)]
pub struct TokenMinter {
    issuer: String,
    audience: String,
    symmetric_key: SecretString,
}

impl TokenMinter {
    /// Derive issuer and audience from the tenant configuration.
    pub fn new(config: &Office365Config, credentials: &Office365Credentials) -> Office365Result<Self> {
        let auth_host = config.auth_host()?;
        Ok(Self {
            issuer: formatted_principal(&config.principal_id, None, &config.tenant),
            audience: formatted_principal(
                &config.acs_principal_id,
                Some(&auth_host),
                &config.tenant,
            ),
            symmetric_key: credentials.symmetric_key.clone(),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Claims for an assertion valid from `not_before` for `lifetime_secs`.
    pub fn claims(&self, not_before: DateTime<Utc>, lifetime_secs: i64) -> AssertionClaims {
        AssertionClaims {
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
            nbf: not_before.timestamp(),
            exp: (not_before + Duration::seconds(lifetime_secs)).timestamp(),
        }
    }

    /// Mint a signed assertion.
    ///
    /// # Errors
    ///
    /// Returns [`Office365Error::Crypto`] if the key is not valid base64 or
    /// the MAC cannot be initialised.
    pub fn mint(
        &self,
        not_before: DateTime<Utc>,
        lifetime_secs: i64,
    ) -> Office365Result<SignedAssertion> {
        let header = serde_json::to_vec(&AssertionHeader {
            alg: "HS256",
            typ: "JWT",
        })
        .map_err(|e| Office365Error::Crypto(format!("cannot encode header: {e}")))?;
        let body = serde_json::to_vec(&self.claims(not_before, lifetime_secs))
            .map_err(|e| Office365Error::Crypto(format!("cannot encode claims: {e}")))?;

        let header = STANDARD.encode(header);
        let body = STANDARD.encode(body);
        let signature = self.sign(&format!("{header}.{body}"))?;

        Ok(SignedAssertion {
            header,
            body,
            signature,
        })
    }

    fn sign(&self, raw_token: &str) -> Office365Result<String> {
        let key = STANDARD
            .decode(self.symmetric_key.expose_secret().trim())
            .map_err(|e| Office365Error::Crypto(format!("symmetric key is not base64: {e}")))?;
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&key)
            .map_err(|e| Office365Error::Crypto(format!("invalid symmetric key: {e}")))?;
        mac.update(raw_token.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for TokenMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenMinter")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("symmetric_key", &"[REDACTED]")
            .finish()
    }
}
