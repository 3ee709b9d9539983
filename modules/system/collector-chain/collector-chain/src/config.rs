//! Configuration for the collector chain.
//!
//! A chain is declared as two ordered lists. Entries are tagged by `kind`:
//!
//! ```yaml
//! identity:
//!   - kind: cookie_jwt
//!     cookie: SSO
//!     verifier: { algorithm: HS256, secret: "..." }
//!   - kind: api_key
//!     header: key
//!     validator: api-keys
//!   - kind: static_user
//! authorization:
//!   - kind: access_token
//!     verifier: { algorithm: HS256, secret: "..." }
//! ```

use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use multiauth_security::constants::{ANONYMOUS_USERNAME, STATIC_ORIGIN};

use crate::domain::x509::{CertificateFormat, ThumbprintAlgorithm};

/// Chain configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainConfig {
    /// Identity collectors, tried in order. Must end with `static_user`.
    pub identity: Vec<IdentityCollectorConfig>,

    /// Authorization collectors, all run in order after identity resolution.
    pub authorization: Vec<AuthorizationCollectorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityCollectorConfig {
    CookieJwt(CookieJwtConfig),
    ApiKey(ApiKeyConfig),
    ClientCertificate(ClientCertificateConfig),
    StaticUser(StaticUserConfig),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthorizationCollectorConfig {
    AccessToken(AccessTokenConfig),
    CookieJwt(CookieJwtConfig),
    ApiKey(ApiKeyConfig),
}

/// Signature verification settings shared by token collectors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenVerifierConfig {
    /// JWS algorithm the token must be signed with.
    pub algorithm: Algorithm,

    /// Shared secret for the HMAC family, used as its UTF-8 bytes.
    #[serde(deserialize_with = "deserialize_secret")]
    pub secret: Option<SecretString>,

    /// PEM-encoded public key for the RSA, ECDSA and `EdDSA` families.
    pub public_key_pem: Option<String>,

    /// Required `iss` value, if any.
    pub issuer: Option<String>,

    /// Accepted `aud` values. When empty the audience is not checked.
    pub audience: Vec<String>,

    /// Clock skew tolerated on `exp` and `nbf`.
    pub leeway_secs: u64,
}

impl Default for TokenVerifierConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            secret: None,
            public_key_pem: None,
            issuer: None,
            audience: Vec::new(),
            leeway_secs: 0,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(SecretString::from))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CookieJwtConfig {
    pub name: String,

    /// Cookie carrying the token.
    pub cookie: String,

    pub verifier: TokenVerifierConfig,

    /// Claim holding the username.
    pub username_claim: String,

    /// Claim holding the authorities list.
    pub authorities_claim: String,

    /// Registered claims mapper used instead of `authorities_claim`.
    pub authorities_mapper: Option<String>,
}

impl Default for CookieJwtConfig {
    fn default() -> Self {
        Self {
            name: "Cookie-SSO".to_owned(),
            cookie: "SSO".to_owned(),
            verifier: TokenVerifierConfig::default(),
            username_claim: "sub".to_owned(),
            authorities_claim: "group".to_owned(),
            authorities_mapper: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiKeyConfig {
    pub name: String,

    /// Header carrying the key.
    pub header: String,

    /// Name the validator was registered under.
    pub validator: String,

    /// Upper bound on a single validator call.
    pub timeout_ms: Option<u64>,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            name: "API-Key".to_owned(),
            header: "key".to_owned(),
            validator: "api-keys".to_owned(),
            timeout_ms: None,
        }
    }
}

/// Where the client certificate chain is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateSource {
    /// A header set by the TLS-terminating gateway.
    #[default]
    Header,
    /// The chain negotiated by the host's own TLS listener.
    Tls,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientCertificateConfig {
    pub name: String,
    pub source: CertificateSource,

    /// Header name, used with `source: header`.
    pub header: String,

    /// Encoding of the header value.
    pub format: CertificateFormat,
}

impl Default for ClientCertificateConfig {
    fn default() -> Self {
        Self {
            name: "x509-cert".to_owned(),
            source: CertificateSource::Header,
            header: "x-cert".to_owned(),
            format: CertificateFormat::Pem,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticUserConfig {
    pub name: String,
    pub username: String,
    pub authorities: Vec<String>,
}

impl Default for StaticUserConfig {
    fn default() -> Self {
        Self {
            name: STATIC_ORIGIN.to_owned(),
            username: ANONYMOUS_USERNAME.to_owned(),
            authorities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessTokenConfig {
    pub name: String,
    pub verifier: TokenVerifierConfig,

    /// Claim holding the granted scopes.
    pub scope_claim: String,

    /// Registered claims mapper used instead of `scope_claim`.
    pub authorities_mapper: Option<String>,

    /// Digest used to compare the certificate with the `cnf` thumbprint.
    pub thumbprint_algorithm: ThumbprintAlgorithm,
}

impl Default for AccessTokenConfig {
    fn default() -> Self {
        Self {
            name: "stateless-access-token".to_owned(),
            verifier: TokenVerifierConfig::default(),
            scope_claim: "scope".to_owned(),
            authorities_mapper: None,
            thumbprint_algorithm: ThumbprintAlgorithm::Sha256,
        }
    }
}
