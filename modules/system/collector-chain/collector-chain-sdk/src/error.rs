//! Error types for the collector chain.

use thiserror::Error;

/// Failure category of a collector, independent of the collector that raised it.
///
/// Abstention is not an error and has no kind: collectors express it by
/// returning `Ok(None)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credential present but unparsable (bad token structure, bad certificate encoding).
    MalformedCredential,
    /// Credential parsed but the cryptographic check failed.
    SignatureInvalid,
    /// Signature valid but the token is expired, not yet valid, or for another issuer/audience.
    CredentialRejected,
    /// The caller-supplied validator failed, errored or timed out.
    ExternalValidatorFailure,
    /// `cnf` claim present without a certificate thumbprint.
    MalformedBindingClaim,
    /// Token is certificate-bound but the identity was not established with a certificate.
    BindingRequiresCertificate,
    /// Token is bound to a different certificate.
    BindingMismatch,
}

/// Errors raised by a single collector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    #[error("collector '{collector}': malformed credential: {reason}")]
    MalformedCredential { collector: String, reason: String },

    #[error("collector '{collector}': invalid signature: {reason}")]
    SignatureInvalid { collector: String, reason: String },

    #[error("collector '{collector}': credential rejected: {reason}")]
    CredentialRejected { collector: String, reason: String },

    #[error("collector '{collector}': external validator failed: {reason}")]
    ExternalValidatorFailure { collector: String, reason: String },

    #[error(
        "collector '{collector}': claim 'x5t#S256' is not defined but cnf present, access token format is invalid"
    )]
    MalformedBindingClaim { collector: String },

    #[error("collector '{collector}': request not authenticated with a client certificate")]
    BindingRequiresCertificate { collector: String },

    #[error(
        "collector '{collector}': the thumbprint from the client certificate '{certificate}' doesn't match the one in the access token '{token}'"
    )]
    BindingMismatch {
        collector: String,
        certificate: String,
        token: String,
    },
}

impl CollectorError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedCredential { .. } => ErrorKind::MalformedCredential,
            Self::SignatureInvalid { .. } => ErrorKind::SignatureInvalid,
            Self::CredentialRejected { .. } => ErrorKind::CredentialRejected,
            Self::ExternalValidatorFailure { .. } => ErrorKind::ExternalValidatorFailure,
            Self::MalformedBindingClaim { .. } => ErrorKind::MalformedBindingClaim,
            Self::BindingRequiresCertificate { .. } => ErrorKind::BindingRequiresCertificate,
            Self::BindingMismatch { .. } => ErrorKind::BindingMismatch,
        }
    }

    /// Name of the collector that raised the error.
    #[must_use]
    pub fn collector(&self) -> &str {
        match self {
            Self::MalformedCredential { collector, .. }
            | Self::SignatureInvalid { collector, .. }
            | Self::CredentialRejected { collector, .. }
            | Self::ExternalValidatorFailure { collector, .. }
            | Self::MalformedBindingClaim { collector }
            | Self::BindingRequiresCertificate { collector }
            | Self::BindingMismatch { collector, .. } => collector,
        }
    }
}

/// Terminal failure of a chain resolution.
///
/// The phase tells the host how to answer: identity failures are
/// authentication errors (401), authorization failures are 403.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("authentication failed: {0}")]
    Authentication(#[source] CollectorError),

    #[error("authorization failed: {0}")]
    Authorization(#[source] CollectorError),
}

impl ChainError {
    #[must_use]
    pub fn collector_error(&self) -> &CollectorError {
        match self {
            Self::Authentication(e) | Self::Authorization(e) => e,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.collector_error().kind()
    }

    /// HTTP status a host is expected to answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Authentication(_) => 401,
            Self::Authorization(_) => 403,
        }
    }
}

/// A claim exists but does not have the expected JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("claim '{claim}' is not {expected}")]
pub struct ClaimTypeError {
    pub claim: String,
    pub expected: &'static str,
}

/// Failure reported by a caller-supplied API key validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ApiKeyValidationError(String);

impl ApiKeyValidationError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.0
    }
}
