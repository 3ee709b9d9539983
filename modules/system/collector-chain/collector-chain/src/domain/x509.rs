//! X.509 decoding, subject inspection and thumbprints.

use std::borrow::Cow;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use multiauth_security::{CertificateChain, CertificateDer};
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use x509_parser::pem::Pem;
use x509_parser::prelude::{FromDer, X509Certificate};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Encoding of a certificate chain carried in a header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateFormat {
    /// PEM text, optionally URL-encoded or folded onto one line.
    #[default]
    Pem,
    /// Base64 of one or more concatenated DER certificates.
    Der,
}

/// Digest used to fingerprint a certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbprintAlgorithm {
    #[default]
    Sha256,
    /// For issuers that still bind tokens with a SHA-1 fingerprint.
    Sha1,
}

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate header is not valid text")]
    NotText,

    #[error("invalid PEM: {0}")]
    Pem(String),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid X.509 certificate: {0}")]
    X509(String),

    #[error("no certificate found")]
    Empty,
}

/// Subject of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectName {
    /// First CN attribute, if present and a string.
    pub common_name: Option<String>,
    /// RFC 4514 rendering of the whole subject.
    pub display: String,
}

/// Decode a header value into a certificate chain, leaf first.
///
/// # Errors
///
/// Returns [`CertificateError`] if the value cannot be decoded, holds no
/// certificate, or any certificate fails to parse.
pub fn decode_chain(raw: &[u8], format: CertificateFormat) -> Result<CertificateChain, CertificateError> {
    let certificates = match format {
        CertificateFormat::Pem => decode_pem(raw)?,
        CertificateFormat::Der => decode_der(raw)?,
    };
    CertificateChain::new(certificates).ok_or(CertificateError::Empty)
}

fn decode_pem(raw: &[u8]) -> Result<Vec<CertificateDer<'static>>, CertificateError> {
    let unescaped: Cow<'_, [u8]> = if raw.contains(&b'%') {
        urlencoding::decode_binary(raw)
    } else {
        Cow::Borrowed(raw)
    };
    let text = std::str::from_utf8(&unescaped).map_err(|_| CertificateError::NotText)?;
    let text = unfold_pem(text);

    let mut certificates = Vec::new();
    for block in Pem::iter_from_buffer(text.as_bytes()) {
        let pem = block.map_err(|e| CertificateError::Pem(e.to_string()))?;
        if pem.label != "CERTIFICATE" {
            continue;
        }
        ensure_parses(&pem.contents)?;
        certificates.push(CertificateDer::from(pem.contents));
    }
    Ok(certificates)
}

/// Restore line breaks in PEM folded onto a single line.
///
/// Header values cannot carry newlines, so gateways commonly replace them
/// with spaces.
fn unfold_pem(text: &str) -> Cow<'_, str> {
    if text.contains('\n') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 64);
    for block in text.split(PEM_END) {
        let Some((_, body)) = block.split_once(PEM_BEGIN) else {
            continue;
        };
        out.push_str(PEM_BEGIN);
        out.push('\n');
        for chunk in body.split_whitespace() {
            out.push_str(chunk);
            out.push('\n');
        }
        out.push_str(PEM_END);
        out.push('\n');
    }

    if out.is_empty() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(out)
    }
}

fn decode_der(raw: &[u8]) -> Result<Vec<CertificateDer<'static>>, CertificateError> {
    let text = std::str::from_utf8(raw).map_err(|_| CertificateError::NotText)?;
    let compact: String = text.split_whitespace().collect();
    let der = match STANDARD.decode(&compact) {
        Ok(der) => der,
        Err(standard_err) => URL_SAFE_NO_PAD
            .decode(compact.trim_end_matches('='))
            .map_err(|_| standard_err)?,
    };

    let mut certificates = Vec::new();
    let mut rest = der.as_slice();
    while !rest.is_empty() {
        let (remaining, _) =
            X509Certificate::from_der(rest).map_err(|e| CertificateError::X509(e.to_string()))?;
        let consumed = rest.len() - remaining.len();
        certificates.push(CertificateDer::from(rest[..consumed].to_vec()));
        rest = remaining;
    }
    Ok(certificates)
}

fn ensure_parses(der: &[u8]) -> Result<(), CertificateError> {
    X509Certificate::from_der(der)
        .map(|_| ())
        .map_err(|e| CertificateError::X509(e.to_string()))
}

/// Read the subject of `cert`.
///
/// # Errors
///
/// Returns [`CertificateError::X509`] if the certificate cannot be parsed.
pub fn subject(cert: &CertificateDer<'_>) -> Result<SubjectName, CertificateError> {
    let (_, parsed) =
        X509Certificate::from_der(cert.as_ref()).map_err(|e| CertificateError::X509(e.to_string()))?;
    let subject = parsed.subject();

    let common_name = subject
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_owned);

    Ok(SubjectName {
        common_name,
        display: subject.to_string(),
    })
}

/// Lowercase hex digest of the DER encoding of `cert`.
#[must_use]
pub fn thumbprint(cert: &CertificateDer<'_>, algorithm: ThumbprintAlgorithm) -> String {
    let der: &[u8] = cert.as_ref();
    match algorithm {
        ThumbprintAlgorithm::Sha256 => hex::encode(Sha256::digest(der)),
        ThumbprintAlgorithm::Sha1 => hex::encode(Sha1::digest(der)),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const ALICE_PEM: &str = include_str!("../../tests/fixtures/alice.pem");
    const BOB_PEM: &str = include_str!("../../tests/fixtures/bob.pem");
    const NO_CN_PEM: &str = include_str!("../../tests/fixtures/nocn.pem");
    const ALICE_DER_B64: &str = include_str!("../../tests/fixtures/alice.der.b64");

    const ALICE_SHA1: &str = "c1c4f050f1e1bedec987ceb4ab98e2c83e6653f5";
    const ALICE_SHA256: &str = "dd021da477991569b7eb2718f61741f7fbdd0b2bead2566a93d23e97c66eb376";

    fn alice() -> CertificateChain {
        decode_chain(ALICE_PEM.as_bytes(), CertificateFormat::Pem).unwrap()
    }

    #[test]
    fn pem_subject_common_name() {
        let chain = alice();
        assert_eq!(chain.len(), 1);
        let name = subject(chain.leaf()).unwrap();
        assert_eq!(name.common_name.as_deref(), Some("alice"));
        assert!(name.display.contains("CN=alice"), "{}", name.display);
    }

    #[test]
    fn thumbprints_are_lowercase_hex() {
        let chain = alice();
        assert_eq!(thumbprint(chain.leaf(), ThumbprintAlgorithm::Sha1), ALICE_SHA1);
        assert_eq!(thumbprint(chain.leaf(), ThumbprintAlgorithm::Sha256), ALICE_SHA256);
    }

    #[test]
    fn url_encoded_pem_decodes() {
        let encoded = urlencoding::encode(ALICE_PEM);
        let chain = decode_chain(encoded.as_bytes(), CertificateFormat::Pem).unwrap();
        assert_eq!(chain, alice());
    }

    #[test]
    fn single_line_pem_decodes() {
        let folded = ALICE_PEM.replace('\n', " ");
        let chain = decode_chain(folded.as_bytes(), CertificateFormat::Pem).unwrap();
        assert_eq!(chain, alice());
    }

    #[test]
    fn pem_chain_keeps_leaf_first() {
        let bundle = format!("{ALICE_PEM}{BOB_PEM}");
        let chain = decode_chain(bundle.as_bytes(), CertificateFormat::Pem).unwrap();
        assert_eq!(chain.len(), 2);
        let leaf = subject(chain.leaf()).unwrap();
        assert_eq!(leaf.common_name.as_deref(), Some("alice"));
    }

    #[test]
    fn base64_der_decodes() {
        let chain = decode_chain(ALICE_DER_B64.trim().as_bytes(), CertificateFormat::Der).unwrap();
        assert_eq!(chain, alice());
    }

    #[test]
    fn subject_without_common_name() {
        let chain = decode_chain(NO_CN_PEM.as_bytes(), CertificateFormat::Pem).unwrap();
        let name = subject(chain.leaf()).unwrap();
        assert_eq!(name.common_name, None);
        assert!(name.display.contains("no-common-name"), "{}", name.display);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            decode_chain(b"not a certificate", CertificateFormat::Pem),
            Err(CertificateError::Empty)
        ));
        assert!(decode_chain(b"!!!", CertificateFormat::Der).is_err());
        assert!(matches!(
            decode_chain(STANDARD.encode(b"0123").as_bytes(), CertificateFormat::Der),
            Err(CertificateError::X509(_))
        ));
    }
}
