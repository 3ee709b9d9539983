//! Domain errors for the collector chain.

use collector_chain_sdk::{ApiKeyValidationError, ClaimTypeError, CollectorError};

use crate::domain::extract::ExtractError;
use crate::domain::token::TokenError;

/// Errors detected while assembling a chain.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("identity chain must end with a static_user collector")]
    MissingFallback,

    #[error("static_user collector '{0}' must be the last identity collector")]
    FallbackNotLast(String),

    #[error("collector name must not be empty")]
    EmptyName,

    #[error("duplicate {phase} collector name '{name}'")]
    DuplicateName { name: String, phase: &'static str },

    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("collector '{collector}': {source}")]
    Collector {
        collector: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("no API key validator registered under '{0}'")]
    UnknownValidator(String),

    #[error("no claims mapper registered under '{0}'")]
    UnknownMapper(String),
}

impl ConfigError {
    pub(crate) fn in_collector(self, collector: &str) -> Self {
        Self::Collector {
            collector: collector.to_owned(),
            source: Box::new(self),
        }
    }
}

/// Attach the collector name to lower-level failures.
pub(crate) trait IntoCollectorError {
    fn into_collector_error(self, collector: &str) -> CollectorError;
}

impl IntoCollectorError for TokenError {
    fn into_collector_error(self, collector: &str) -> CollectorError {
        let collector = collector.to_owned();
        match self {
            Self::Malformed(reason) => CollectorError::MalformedCredential { collector, reason },
            Self::SignatureInvalid(reason) => CollectorError::SignatureInvalid { collector, reason },
            Self::Rejected(reason) => CollectorError::CredentialRejected { collector, reason },
        }
    }
}

impl IntoCollectorError for ExtractError {
    fn into_collector_error(self, collector: &str) -> CollectorError {
        CollectorError::MalformedCredential {
            collector: collector.to_owned(),
            reason: self.to_string(),
        }
    }
}

impl IntoCollectorError for ClaimTypeError {
    fn into_collector_error(self, collector: &str) -> CollectorError {
        CollectorError::MalformedCredential {
            collector: collector.to_owned(),
            reason: self.to_string(),
        }
    }
}

impl IntoCollectorError for ApiKeyValidationError {
    fn into_collector_error(self, collector: &str) -> CollectorError {
        CollectorError::ExternalValidatorFailure {
            collector: collector.to_owned(),
            reason: self.reason().to_owned(),
        }
    }
}
