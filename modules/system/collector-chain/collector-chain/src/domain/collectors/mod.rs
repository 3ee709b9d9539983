//! Identity and authorization collectors.
//!
//! The set of collector kinds is closed; each phase dispatches over an enum.

pub mod access_token;
pub mod api_key;
pub mod client_certificate;
pub mod cookie_jwt;
pub mod static_user;

use std::fmt;
use std::sync::Arc;

use collector_chain_sdk::{Claims, ClaimTypeError, CollectorError, RequestContext};
use multiauth_security::{AuthoritySet, Identity};

pub use access_token::AccessTokenCollector;
pub use api_key::ApiKeyCollector;
pub use client_certificate::ClientCertificateCollector;
pub use cookie_jwt::CookieJwtCollector;
pub use static_user::StaticUserCollector;

/// Caller-supplied projection from verified claims to authorities.
pub type ClaimsMapper = Arc<dyn Fn(&Claims) -> Result<AuthoritySet, ClaimTypeError> + Send + Sync>;

/// How authorities are read from verified claims.
#[derive(Clone)]
pub enum AuthoritiesMapping {
    /// A list-of-strings claim. A missing claim grants nothing.
    Claim(String),
    Mapper(ClaimsMapper),
}

impl AuthoritiesMapping {
    pub(crate) fn apply(&self, claims: &Claims) -> Result<AuthoritySet, ClaimTypeError> {
        match self {
            Self::Claim(name) => Ok(claims
                .string_list(name)?
                .map(AuthoritySet::from_iter)
                .unwrap_or_default()),
            Self::Mapper(mapper) => mapper(claims),
        }
    }
}

impl fmt::Debug for AuthoritiesMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claim(name) => f.debug_tuple("Claim").field(name).finish(),
            Self::Mapper(_) => f.write_str("Mapper(..)"),
        }
    }
}

/// A collector allowed in the identity phase.
#[derive(Debug, Clone)]
pub enum IdentityCollector {
    CookieJwt(CookieJwtCollector),
    ApiKey(ApiKeyCollector),
    ClientCertificate(ClientCertificateCollector),
    StaticUser(StaticUserCollector),
}

impl IdentityCollector {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::CookieJwt(c) => c.name(),
            Self::ApiKey(c) => c.name(),
            Self::ClientCertificate(c) => c.name(),
            Self::StaticUser(c) => c.name(),
        }
    }

    /// Try to establish an identity.
    ///
    /// `Ok(None)` means no credential of this kind was presented.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError`] if a credential was presented and rejected.
    pub async fn attempt(&self, ctx: &RequestContext) -> Result<Option<Identity>, CollectorError> {
        match self {
            Self::CookieJwt(c) => c.identify(ctx),
            Self::ApiKey(c) => c.identify(ctx).await,
            Self::ClientCertificate(c) => c.identify(ctx),
            Self::StaticUser(c) => Ok(Some(c.identity())),
        }
    }
}

/// A collector allowed in the authorization phase.
#[derive(Debug, Clone)]
pub enum AuthorizationCollector {
    AccessToken(AccessTokenCollector),
    CookieJwt(CookieJwtCollector),
    ApiKey(ApiKeyCollector),
}

impl AuthorizationCollector {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::AccessToken(c) => c.name(),
            Self::CookieJwt(c) => c.name(),
            Self::ApiKey(c) => c.name(),
        }
    }

    /// Compute the authorities this collector grants to `identity`.
    ///
    /// `Ok(None)` means no credential of this kind was presented.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError`] if a credential was presented and rejected.
    pub async fn attempt(
        &self,
        ctx: &RequestContext,
        identity: &Identity,
    ) -> Result<Option<AuthoritySet>, CollectorError> {
        match self {
            Self::AccessToken(c) => c.authorize(ctx, identity),
            Self::CookieJwt(c) => c.authorize(ctx),
            Self::ApiKey(c) => c.authorize(ctx).await,
        }
    }
}

impl From<CookieJwtCollector> for IdentityCollector {
    fn from(c: CookieJwtCollector) -> Self {
        Self::CookieJwt(c)
    }
}

impl From<ApiKeyCollector> for IdentityCollector {
    fn from(c: ApiKeyCollector) -> Self {
        Self::ApiKey(c)
    }
}

impl From<ClientCertificateCollector> for IdentityCollector {
    fn from(c: ClientCertificateCollector) -> Self {
        Self::ClientCertificate(c)
    }
}

impl From<StaticUserCollector> for IdentityCollector {
    fn from(c: StaticUserCollector) -> Self {
        Self::StaticUser(c)
    }
}

impl From<AccessTokenCollector> for AuthorizationCollector {
    fn from(c: AccessTokenCollector) -> Self {
        Self::AccessToken(c)
    }
}

impl From<CookieJwtCollector> for AuthorizationCollector {
    fn from(c: CookieJwtCollector) -> Self {
        Self::CookieJwt(c)
    }
}

impl From<ApiKeyCollector> for AuthorizationCollector {
    fn from(c: ApiKeyCollector) -> Self {
        Self::ApiKey(c)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_authorities_claim_grants_nothing() {
        let claims: Claims = serde_json::from_value(json!({"sub": "toto"})).unwrap();
        let granted = AuthoritiesMapping::Claim("group".to_owned()).apply(&claims).unwrap();
        assert!(granted.is_empty());
    }

    #[test]
    fn mapper_overrides_claim_lookup() {
        let claims: Claims =
            serde_json::from_value(json!({"roles": {"repo": ["read", "write"]}})).unwrap();
        let mapping = AuthoritiesMapping::Mapper(Arc::new(|claims: &Claims| -> Result<AuthoritySet, ClaimTypeError> {
            let repo = claims
                .object("roles")?
                .and_then(|roles| roles.get("repo"))
                .and_then(|v| v.as_array())
                .map(|perms| {
                    perms
                        .iter()
                        .filter_map(|p| p.as_str())
                        .map(|p| format!("repo:{p}"))
                        .collect()
                })
                .unwrap_or_default();
            Ok(repo)
        }));

        let granted = mapping.apply(&claims).unwrap();
        assert!(granted.contains("repo:read"));
        assert!(granted.contains("repo:write"));
        assert_eq!(granted.len(), 2);
    }
}
