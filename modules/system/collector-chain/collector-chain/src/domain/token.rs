//! Signed token verification.

use std::collections::HashSet;
use std::fmt;

use collector_chain_sdk::Claims;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;

use crate::config::TokenVerifierConfig;
use crate::domain::error::ConfigError;

/// Why a token was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not a well-formed compact JWS.
    #[error("{0}")]
    Malformed(String),

    /// Signature or algorithm check failed.
    #[error("{0}")]
    SignatureInvalid(String),

    /// Signature is valid but a registered claim check failed.
    #[error("{0}")]
    Rejected(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        let reason = e.to_string();
        match e.kind() {
            JwtErrorKind::InvalidToken
            | JwtErrorKind::Base64(_)
            | JwtErrorKind::Json(_)
            | JwtErrorKind::Utf8(_) => Self::Malformed(reason),
            JwtErrorKind::ExpiredSignature
            | JwtErrorKind::ImmatureSignature
            | JwtErrorKind::InvalidIssuer
            | JwtErrorKind::InvalidAudience
            | JwtErrorKind::InvalidSubject
            | JwtErrorKind::MissingRequiredClaim(_) => Self::Rejected(reason),
            _ => Self::SignatureInvalid(reason),
        }
    }
}

/// Verifies compact JWS tokens against a single key.
///
/// `exp` and `nbf` are enforced when present but not required.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// HMAC verifier keyed with the raw bytes of `secret`.
    #[must_use]
    pub fn hmac(algorithm: Algorithm, secret: &[u8]) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), algorithm, &TokenVerifierConfig::default())
    }

    /// Build a verifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the key material is missing or
    /// does not match the algorithm family.
    pub fn from_config(cfg: &TokenVerifierConfig) -> Result<Self, ConfigError> {
        let key = match cfg.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = cfg
                    .secret
                    .as_ref()
                    .ok_or_else(|| invalid_key(cfg.algorithm, "a `secret` is required"))?;
                DecodingKey::from_secret(secret.expose_secret().as_bytes())
            }
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(public_key(cfg)?)
                .map_err(|e| invalid_key(cfg.algorithm, &e.to_string()))?,
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(public_key(cfg)?)
                .map_err(|e| invalid_key(cfg.algorithm, &e.to_string()))?,
            Algorithm::EdDSA => DecodingKey::from_ed_pem(public_key(cfg)?)
                .map_err(|e| invalid_key(cfg.algorithm, &e.to_string()))?,
        };
        Ok(Self::with_key(key, cfg.algorithm, cfg))
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm, cfg: &TokenVerifierConfig) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims = HashSet::new();
        validation.validate_nbf = true;
        validation.leeway = cfg.leeway_secs;
        if cfg.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(cfg.audience.as_slice());
        }
        if let Some(issuer) = &cfg.issuer {
            validation.set_issuer(&[issuer]);
        }
        Self { key, validation }
    }

    /// Check the signature and registered claims of `token`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] describing which check failed.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

fn public_key(cfg: &TokenVerifierConfig) -> Result<&[u8], ConfigError> {
    cfg.public_key_pem
        .as_deref()
        .map(str::as_bytes)
        .ok_or_else(|| invalid_key(cfg.algorithm, "a `public_key_pem` is required"))
}

fn invalid_key(algorithm: Algorithm, reason: &str) -> ConfigError {
    ConfigError::InvalidKey(format!("{algorithm:?}: {reason}"))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::{Value, json};

    use super::*;

    const SECRET: &[u8] = b"Qt5y2isMydGwVuREoIomK9Ei70EoFQKH0GpcbtJ4";

    fn sign(claims: &Value) -> String {
        jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn now() -> u64 {
        jsonwebtoken::get_current_timestamp()
    }

    #[test]
    fn accepts_token_without_exp() {
        let verifier = TokenVerifier::hmac(Algorithm::HS256, SECRET);
        let claims = verifier.verify(&sign(&json!({"sub": "toto"}))).unwrap();
        assert_eq!(claims.string("sub").unwrap(), Some("toto"));
    }

    #[test]
    fn wrong_key_is_signature_invalid() {
        let verifier = TokenVerifier::hmac(Algorithm::HS256, b"another secret entirely");
        let err = verifier.verify(&sign(&json!({"sub": "toto"}))).unwrap_err();
        assert!(matches!(err, TokenError::SignatureInvalid(_)), "{err:?}");
    }

    #[test]
    fn garbage_is_malformed() {
        let verifier = TokenVerifier::hmac(Algorithm::HS256, SECRET);
        for token in ["", "abc", "a.b"] {
            let err = verifier.verify(token).unwrap_err();
            assert!(matches!(err, TokenError::Malformed(_)), "{token}: {err:?}");
        }
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = TokenVerifier::hmac(Algorithm::HS256, SECRET);
        let token = sign(&json!({"sub": "toto", "exp": now() - 3600}));
        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Rejected(_)), "{err:?}");
    }

    #[test]
    fn not_yet_valid_token_is_rejected() {
        let verifier = TokenVerifier::hmac(Algorithm::HS256, SECRET);
        let token = sign(&json!({"sub": "toto", "nbf": now() + 3600}));
        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Rejected(_)), "{err:?}");
    }

    #[test]
    fn issuer_and_audience_are_enforced_when_configured() {
        let cfg: TokenVerifierConfig = serde_json::from_value(json!({
            "secret": std::str::from_utf8(SECRET).unwrap(),
            "issuer": "https://sso.example",
            "audience": ["payments"]
        }))
        .unwrap();
        let verifier = TokenVerifier::from_config(&cfg).unwrap();

        let good = sign(&json!({"iss": "https://sso.example", "aud": "payments"}));
        assert!(verifier.verify(&good).is_ok());

        let other_issuer = sign(&json!({"iss": "https://evil.example", "aud": "payments"}));
        assert!(matches!(verifier.verify(&other_issuer), Err(TokenError::Rejected(_))));

        let other_audience = sign(&json!({"iss": "https://sso.example", "aud": "accounts"}));
        assert!(matches!(verifier.verify(&other_audience), Err(TokenError::Rejected(_))));
    }

    #[test]
    fn algorithm_mismatch_is_signature_invalid() {
        let verifier = TokenVerifier::hmac(Algorithm::HS512, SECRET);
        let err = verifier.verify(&sign(&json!({"sub": "toto"}))).unwrap_err();
        assert!(matches!(err, TokenError::SignatureInvalid(_)), "{err:?}");
    }

    #[test]
    fn missing_key_material_fails_construction() {
        let hmac = TokenVerifierConfig::default();
        assert!(matches!(TokenVerifier::from_config(&hmac), Err(ConfigError::InvalidKey(_))));

        let rsa = TokenVerifierConfig {
            algorithm: Algorithm::RS256,
            public_key_pem: Some("not a key".to_owned()),
            ..TokenVerifierConfig::default()
        };
        assert!(matches!(TokenVerifier::from_config(&rsa), Err(ConfigError::InvalidKey(_))));
    }
}
