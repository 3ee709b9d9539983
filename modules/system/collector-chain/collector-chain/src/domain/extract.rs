//! Credential extraction from a request.

use std::borrow::Cow;

use collector_chain_sdk::{Credential, RequestContext};
use http::HeaderName;

use crate::domain::error::ConfigError;
use crate::domain::x509::{self, CertificateError, CertificateFormat};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("header '{0}' is not valid text")]
    NotText(HeaderName),

    #[error("header '{header}': {source}")]
    Certificate {
        header: HeaderName,
        #[source]
        source: CertificateError,
    },
}

/// Where a collector looks for its credential.
///
/// An absent or blank value yields `Ok(None)`, which the collector turns
/// into an abstention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Cookie(String),
    BearerToken,
    ApiKeyHeader(HeaderName),
    CertificateHeader {
        header: HeaderName,
        format: CertificateFormat,
    },
    NegotiatedCertificate,
}

impl CredentialSource {
    /// Parse a header name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHeaderName`] if `name` is not a valid
    /// HTTP header name.
    pub fn header_name(name: &str) -> Result<HeaderName, ConfigError> {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(name.to_owned()))
    }

    /// Pull this source's credential out of `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when a value is present but unusable.
    pub fn extract<'a>(&'a self, ctx: &'a RequestContext) -> Result<Option<Credential<'a>>, ExtractError> {
        let credential = match self {
            Self::Cookie(name) => ctx
                .cookie(name)
                .filter(|v| !v.is_empty())
                .map(|value| Credential::CookieToken {
                    name: name.as_str(),
                    value,
                }),
            Self::BearerToken => ctx.bearer_token().map(|value| Credential::HeaderToken {
                name: "authorization",
                value,
            }),
            Self::ApiKeyHeader(header) => header_text(ctx, header)?.map(Credential::ApiKey),
            Self::CertificateHeader { header, format } => match ctx.header(header.as_str()) {
                Some(raw) if !raw.as_bytes().iter().all(u8::is_ascii_whitespace) => {
                    let chain = x509::decode_chain(raw.as_bytes(), *format).map_err(|source| {
                        ExtractError::Certificate {
                            header: header.clone(),
                            source,
                        }
                    })?;
                    Some(Credential::CertificateChain(Cow::Owned(chain)))
                }
                _ => None,
            },
            Self::NegotiatedCertificate => ctx
                .client_certificates()
                .map(|chain| Credential::CertificateChain(Cow::Borrowed(chain))),
        };
        Ok(credential)
    }
}

fn header_text<'a>(ctx: &'a RequestContext, header: &HeaderName) -> Result<Option<&'a str>, ExtractError> {
    let Some(value) = ctx.header(header.as_str()) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| ExtractError::NotText(header.clone()))?
        .trim();
    Ok((!text.is_empty()).then_some(text))
}
