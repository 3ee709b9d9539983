use rustls_pki_types::CertificateDer;

/// An ordered X.509 certificate chain, leaf first.
///
/// Never empty. Identities established from a client certificate carry it
/// as their proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certificates: Vec<CertificateDer<'static>>,
}

impl CertificateChain {
    /// Build a chain from DER certificates ordered leaf first.
    ///
    /// Returns `None` when `certificates` is empty.
    #[must_use]
    pub fn new(certificates: Vec<CertificateDer<'static>>) -> Option<Self> {
        if certificates.is_empty() {
            None
        } else {
            Some(Self { certificates })
        }
    }

    /// The end-entity certificate (index 0).
    #[must_use]
    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.certificates[0]
    }

    #[must_use]
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Always `false` for a constructed chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

impl From<CertificateDer<'static>> for CertificateChain {
    fn from(leaf: CertificateDer<'static>) -> Self {
        Self {
            certificates: vec![leaf],
        }
    }
}
