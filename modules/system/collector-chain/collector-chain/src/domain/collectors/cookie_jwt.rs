//! Signed token carried in a cookie.

use std::sync::Arc;

use collector_chain_sdk::{CollectorError, RequestContext};
use multiauth_security::{AuthoritySet, Identity};

use super::AuthoritiesMapping;
use crate::domain::error::IntoCollectorError;
use crate::domain::extract::CredentialSource;
use crate::domain::token::TokenVerifier;

/// Establishes an identity from a signed cookie token.
///
/// The username comes from `username_claim`, authorities from the
/// configured mapping. Used in the authorization phase it contributes the
/// same authorities without touching the username.
#[derive(Debug, Clone)]
pub struct CookieJwtCollector {
    name: String,
    source: CredentialSource,
    verifier: Arc<TokenVerifier>,
    username_claim: String,
    authorities: AuthoritiesMapping,
}

impl CookieJwtCollector {
    #[must_use]
    pub fn new(name: impl Into<String>, cookie: impl Into<String>, verifier: TokenVerifier) -> Self {
        Self {
            name: name.into(),
            source: CredentialSource::Cookie(cookie.into()),
            verifier: Arc::new(verifier),
            username_claim: "sub".to_owned(),
            authorities: AuthoritiesMapping::Claim("group".to_owned()),
        }
    }

    #[must_use]
    pub fn with_username_claim(mut self, claim: impl Into<String>) -> Self {
        self.username_claim = claim.into();
        self
    }

    #[must_use]
    pub fn with_authorities(mut self, mapping: AuthoritiesMapping) -> Self {
        self.authorities = mapping;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn identify(&self, ctx: &RequestContext) -> Result<Option<Identity>, CollectorError> {
        let Some(claims) = self.verified_claims(ctx)? else {
            return Ok(None);
        };

        let username = claims
            .string(&self.username_claim)
            .map_err(|e| e.into_collector_error(&self.name))?
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CollectorError::MalformedCredential {
                collector: self.name.clone(),
                reason: format!("claim '{}' is missing", self.username_claim),
            })?;
        let authorities = self
            .authorities
            .apply(&claims)
            .map_err(|e| e.into_collector_error(&self.name))?;

        tracing::debug!(collector = %self.name, username, "Cookie token verified");

        Ok(Some(
            Identity::builder()
                .username(username)
                .authorities(authorities)
                .origin(self.name.as_str())
                .build(),
        ))
    }

    pub(crate) fn authorize(&self, ctx: &RequestContext) -> Result<Option<AuthoritySet>, CollectorError> {
        let Some(claims) = self.verified_claims(ctx)? else {
            return Ok(None);
        };
        self.authorities
            .apply(&claims)
            .map(Some)
            .map_err(|e| e.into_collector_error(&self.name))
    }

    fn verified_claims(
        &self,
        ctx: &RequestContext,
    ) -> Result<Option<collector_chain_sdk::Claims>, CollectorError> {
        let token = self
            .source
            .extract(ctx)
            .map_err(|e| e.into_collector_error(&self.name))?
            .and_then(|credential| credential.secret());
        let Some(token) = token else {
            return Ok(None);
        };
        self.verifier
            .verify(token)
            .map(Some)
            .map_err(|e| e.into_collector_error(&self.name))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use collector_chain_sdk::ErrorKind;
    use http::{HeaderMap, HeaderValue, header::COOKIE};
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const SECRET: &[u8] = b"Qt5y2isMydGwVuREoIomK9Ei70EoFQKH0GpcbtJ4";

    fn collector() -> CookieJwtCollector {
        CookieJwtCollector::new("Cookie-SSO", "SSO", TokenVerifier::hmac(Algorithm::HS256, SECRET))
    }

    fn with_cookie(token: &str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("SSO={token}")).unwrap());
        RequestContext::new(headers)
    }

    fn sign(claims: &serde_json::Value) -> String {
        jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[test]
    fn abstains_without_cookie() {
        let ctx = RequestContext::new(HeaderMap::new());
        assert_eq!(collector().identify(&ctx).unwrap(), None);
        assert_eq!(collector().authorize(&ctx).unwrap(), None);
    }

    #[test]
    fn identifies_from_sub_and_group() {
        let token = sign(&json!({"sub": "toto", "group": ["admin", "clubFalafelKing"]}));
        let identity = collector().identify(&with_cookie(&token)).unwrap().unwrap();

        assert_eq!(identity.username(), "toto");
        assert_eq!(identity.origin(), "Cookie-SSO");
        assert!(identity.authorities().contains("admin"));
        assert!(identity.authorities().contains("clubFalafelKing"));
        assert!(identity.proof().is_none());
    }

    #[test]
    fn missing_sub_is_malformed() {
        let token = sign(&json!({"group": ["admin"]}));
        let err = collector().identify(&with_cookie(&token)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedCredential);
    }

    #[test]
    fn forged_token_fails_instead_of_abstaining() {
        let forged = jsonwebtoken::encode(
            &Header::default(),
            &json!({"sub": "toto"}),
            &EncodingKey::from_secret(b"guessed"),
        )
        .unwrap();
        let err = collector().identify(&with_cookie(&forged)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
        assert_eq!(err.collector(), "Cookie-SSO");
    }

    #[test]
    fn custom_claim_names() {
        let token = sign(&json!({"preferred_username": "toto", "roles": "ops dev"}));
        let identity = collector()
            .with_username_claim("preferred_username")
            .with_authorities(AuthoritiesMapping::Claim("roles".to_owned()))
            .identify(&with_cookie(&token))
            .unwrap()
            .unwrap();

        assert_eq!(identity.username(), "toto");
        assert_eq!(identity.authorities().len(), 2);
    }

    #[test]
    fn authorize_returns_groups_only() {
        let token = sign(&json!({"sub": "toto", "group": ["admin"]}));
        let granted = collector().authorize(&with_cookie(&token)).unwrap().unwrap();
        assert!(granted.contains("admin"));
        assert_eq!(granted.len(), 1);
    }
}
