//! Bearer access token with optional certificate binding.

use std::sync::Arc;

use collector_chain_sdk::{Claims, CollectorError, RequestContext};
use multiauth_security::{AuthoritySet, Identity};
use serde_json::Value;

use super::AuthoritiesMapping;
use crate::domain::error::IntoCollectorError;
use crate::domain::extract::CredentialSource;
use crate::domain::token::TokenVerifier;
use crate::domain::x509::{self, ThumbprintAlgorithm};

/// Confirmation claim of a certificate-bound token.
pub const CONFIRMATION_CLAIM: &str = "cnf";

/// Member of the confirmation claim holding the certificate thumbprint.
pub const THUMBPRINT_MEMBER: &str = "x5t#S256";

/// Grants the scopes of a bearer access token.
///
/// When the token carries a `cnf` claim it is only accepted if the
/// identity was established with the certificate it names.
#[derive(Debug, Clone)]
pub struct AccessTokenCollector {
    name: String,
    source: CredentialSource,
    verifier: Arc<TokenVerifier>,
    authorities: AuthoritiesMapping,
    thumbprint_algorithm: ThumbprintAlgorithm,
}

impl AccessTokenCollector {
    #[must_use]
    pub fn new(name: impl Into<String>, verifier: TokenVerifier) -> Self {
        Self {
            name: name.into(),
            source: CredentialSource::BearerToken,
            verifier: Arc::new(verifier),
            authorities: AuthoritiesMapping::Claim("scope".to_owned()),
            thumbprint_algorithm: ThumbprintAlgorithm::default(),
        }
    }

    #[must_use]
    pub fn with_authorities(mut self, mapping: AuthoritiesMapping) -> Self {
        self.authorities = mapping;
        self
    }

    #[must_use]
    pub fn with_thumbprint_algorithm(mut self, algorithm: ThumbprintAlgorithm) -> Self {
        self.thumbprint_algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn authorize(
        &self,
        ctx: &RequestContext,
        identity: &Identity,
    ) -> Result<Option<AuthoritySet>, CollectorError> {
        let token = self
            .source
            .extract(ctx)
            .map_err(|e| e.into_collector_error(&self.name))?
            .and_then(|credential| credential.secret());
        let Some(token) = token else {
            return Ok(None);
        };

        let claims = self
            .verifier
            .verify(token)
            .map_err(|e| e.into_collector_error(&self.name))?;
        self.check_binding(&claims, identity)?;

        let granted = self
            .authorities
            .apply(&claims)
            .map_err(|e| e.into_collector_error(&self.name))?;
        tracing::debug!(collector = %self.name, scopes = granted.len(), "Access token accepted");
        Ok(Some(granted))
    }

    fn check_binding(&self, claims: &Claims, identity: &Identity) -> Result<(), CollectorError> {
        let malformed = || CollectorError::MalformedBindingClaim {
            collector: self.name.clone(),
        };

        let confirmation = claims.object(CONFIRMATION_CLAIM).map_err(|_| malformed())?;
        let Some(confirmation) = confirmation else {
            return Ok(());
        };
        let Some(Value::String(expected)) = confirmation.get(THUMBPRINT_MEMBER) else {
            return Err(malformed());
        };

        let Some(proof) = identity.proof() else {
            return Err(CollectorError::BindingRequiresCertificate {
                collector: self.name.clone(),
            });
        };

        let actual = x509::thumbprint(proof.leaf(), self.thumbprint_algorithm);
        if actual.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            tracing::warn!(
                collector = %self.name,
                username = identity.username(),
                certificate = %actual,
                token = %expected,
                "Access token bound to another certificate"
            );
            Err(CollectorError::BindingMismatch {
                collector: self.name.clone(),
                certificate: actual,
                token: expected.clone(),
            })
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use collector_chain_sdk::ErrorKind;
    use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;

    use super::*;
    use crate::domain::x509::CertificateFormat;

    const SECRET: &[u8] = b"Qt5y2isMydGwVuREoIomK9Ei70EoFQKH0GpcbtJ4";
    const ALICE_PEM: &str = include_str!("../../../tests/fixtures/alice.pem");
    const ALICE_SHA256: &str = "dd021da477991569b7eb2718f61741f7fbdd0b2bead2566a93d23e97c66eb376";

    fn collector() -> AccessTokenCollector {
        AccessTokenCollector::new("stateless-access-token", TokenVerifier::hmac(Algorithm::HS256, SECRET))
    }

    fn bearer(claims: &Value) -> RequestContext {
        let token =
            jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        RequestContext::new(headers)
    }

    fn alice() -> Identity {
        let chain = x509::decode_chain(ALICE_PEM.as_bytes(), CertificateFormat::Pem).unwrap();
        Identity::builder().username("alice").proof(chain).build()
    }

    #[test]
    fn unbound_token_grants_scopes() {
        let ctx = bearer(&json!({"scope": ["accounts", "payments"]}));
        let granted = collector().authorize(&ctx, &Identity::anonymous()).unwrap().unwrap();
        assert!(granted.contains("accounts"));
        assert!(granted.contains("payments"));
    }

    #[test]
    fn bound_token_matches_certificate() {
        let ctx = bearer(&json!({"scope": "accounts", "cnf": {"x5t#S256": ALICE_SHA256.to_uppercase()}}));
        let granted = collector().authorize(&ctx, &alice()).unwrap().unwrap();
        assert!(granted.contains("accounts"));
    }

    #[test]
    fn bound_token_without_certificate_identity() {
        let ctx = bearer(&json!({"scope": "accounts", "cnf": {"x5t#S256": ALICE_SHA256}}));
        let err = collector().authorize(&ctx, &Identity::anonymous()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BindingRequiresCertificate);
    }

    #[test]
    fn bound_token_for_another_certificate() {
        let ctx = bearer(&json!({"scope": "accounts", "cnf": {"x5t#S256": "00ff"}}));
        let err = collector().authorize(&ctx, &alice()).unwrap_err();
        assert_eq!(
            err,
            CollectorError::BindingMismatch {
                collector: "stateless-access-token".to_owned(),
                certificate: ALICE_SHA256.to_owned(),
                token: "00ff".to_owned(),
            }
        );
    }

    #[test]
    fn cnf_without_thumbprint_is_malformed() {
        for cnf in [json!({"jkt": "abc"}), json!({"x5t#S256": 42}), json!("x5t")] {
            let ctx = bearer(&json!({"scope": "accounts", "cnf": cnf}));
            let err = collector().authorize(&ctx, &alice()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedBindingClaim, "{cnf}");
        }
    }

    #[test]
    fn sha1_binding_when_configured() {
        let ctx = bearer(&json!({"cnf": {"x5t#S256": "c1c4f050f1e1bedec987ceb4ab98e2c83e6653f5"}}));
        let sha1 = collector().with_thumbprint_algorithm(ThumbprintAlgorithm::Sha1);

        assert!(sha1.authorize(&ctx, &alice()).is_ok());
        assert_eq!(
            collector().authorize(&ctx, &alice()).unwrap_err().kind(),
            ErrorKind::BindingMismatch
        );
    }
}
