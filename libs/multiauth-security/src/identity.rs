use serde::Serialize;

use crate::authority::AuthoritySet;
use crate::certificate::CertificateChain;
use crate::constants::{ANONYMOUS_USERNAME, STATIC_ORIGIN};

/// `Identity` is the single resolved principal of a request.
///
/// Built by an identity collector, then augmented (authorities only) by the
/// authorization collectors. Serializes as `{"username": .., "authorities": [..]}`;
/// the origin and proof stay in-process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Authenticated username.
    username: String,
    /// Granted authorities, deduplicated.
    authorities: AuthoritySet,
    /// Name of the collector that established this identity.
    #[serde(skip)]
    origin: String,
    /// Client certificate chain the identity was established with, if any.
    /// Anchor for token-binding checks.
    #[serde(skip)]
    proof: Option<CertificateChain>,
}

impl Identity {
    /// Create a new `Identity` builder
    #[must_use]
    pub fn builder() -> IdentityBuilder {
        IdentityBuilder::default()
    }

    /// The fallback identity: `anonymous`, no authorities, no proof.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::builder()
            .username(ANONYMOUS_USERNAME)
            .origin(STATIC_ORIGIN)
            .build()
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn authorities(&self) -> &AuthoritySet {
        &self.authorities
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn proof(&self) -> Option<&CertificateChain> {
        self.proof.as_ref()
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.username == ANONYMOUS_USERNAME && self.proof.is_none()
    }

    /// Union `delta` into the granted authorities.
    ///
    /// This is the only mutation available after construction; the username,
    /// origin and proof are fixed once the identity is resolved.
    pub fn grant(&mut self, delta: &AuthoritySet) {
        self.authorities.merge(delta);
    }
}

#[derive(Default)]
pub struct IdentityBuilder {
    username: Option<String>,
    authorities: AuthoritySet,
    origin: Option<String>,
    proof: Option<CertificateChain>,
}

impl IdentityBuilder {
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn authorities(mut self, authorities: AuthoritySet) -> Self {
        self.authorities = authorities;
        self
    }

    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn proof(mut self, chain: CertificateChain) -> Self {
        self.proof = Some(chain);
        self
    }

    #[must_use]
    pub fn build(self) -> Identity {
        Identity {
            username: self
                .username
                .unwrap_or_else(|| ANONYMOUS_USERNAME.to_owned()),
            authorities: self.authorities,
            origin: self.origin.unwrap_or_default(),
            proof: self.proof,
        }
    }
}
