//! Client certificate, from a gateway header or the TLS handshake.

use collector_chain_sdk::{CollectorError, RequestContext};
use http::HeaderName;
use multiauth_security::Identity;

use crate::domain::error::IntoCollectorError;
use crate::domain::extract::CredentialSource;
use crate::domain::x509::{self, CertificateFormat};

/// Establishes an identity named after the leaf certificate's CN.
///
/// The chain is kept on the identity as proof so access tokens bound to
/// the certificate can be checked later. A certificate without a CN, or
/// with an empty one, is logged and the collector abstains.
#[derive(Debug, Clone)]
pub struct ClientCertificateCollector {
    name: String,
    source: CredentialSource,
}

impl ClientCertificateCollector {
    /// Read the chain from `header`, encoded as `format`.
    #[must_use]
    pub fn from_header(name: impl Into<String>, header: HeaderName, format: CertificateFormat) -> Self {
        Self {
            name: name.into(),
            source: CredentialSource::CertificateHeader { header, format },
        }
    }

    /// Read the chain negotiated by the host's TLS listener.
    #[must_use]
    pub fn from_tls(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: CredentialSource::NegotiatedCertificate,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn identify(&self, ctx: &RequestContext) -> Result<Option<Identity>, CollectorError> {
        let chain = self
            .source
            .extract(ctx)
            .map_err(|e| e.into_collector_error(&self.name))?
            .and_then(collector_chain_sdk::Credential::into_certificate_chain);
        let Some(chain) = chain else {
            return Ok(None);
        };

        let subject = x509::subject(chain.leaf()).map_err(|e| CollectorError::MalformedCredential {
            collector: self.name.clone(),
            reason: e.to_string(),
        })?;
        let Some(common_name) = subject.common_name.filter(|cn| !cn.trim().is_empty()) else {
            tracing::warn!(
                collector = %self.name,
                subject = %subject.display,
                "Couldn't read CN from certificate subject"
            );
            return Ok(None);
        };

        tracing::debug!(collector = %self.name, username = %common_name, "Client certificate accepted");

        Ok(Some(
            Identity::builder()
                .username(common_name)
                .origin(self.name.as_str())
                .proof(chain)
                .build(),
        ))
    }
}
