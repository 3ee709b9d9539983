//! Builds the simulated request from command line arguments.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Args;
use collector_chain::domain::x509::{self, CertificateFormat};
use collector_chain_sdk::RequestContext;
use http::header::{AUTHORIZATION, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};

#[derive(Debug, Default, Args)]
pub struct RequestArgs {
    /// Request header, as `name: value`. Repeatable.
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Cookie, as `name=value`. Repeatable.
    #[arg(short = 'b', long = "cookie", value_name = "NAME=VALUE")]
    pub cookies: Vec<String>,

    /// Sent as `Authorization: Bearer <TOKEN>`.
    #[arg(long, value_name = "TOKEN")]
    pub bearer: Option<String>,

    /// PEM client certificate chain, presented as if negotiated over TLS.
    #[arg(long, value_name = "FILE")]
    pub client_cert: Option<PathBuf>,

    /// Forward `--client-cert` URL-encoded in this header instead, as a
    /// TLS-terminating gateway would.
    #[arg(long, value_name = "NAME", requires = "client_cert")]
    pub client_cert_header: Option<String>,
}

/// Assemble the request context described by `args`.
///
/// # Errors
///
/// Fails on malformed header or cookie arguments, or an unreadable
/// certificate file.
pub fn build(args: &RequestArgs) -> anyhow::Result<RequestContext> {
    let mut headers = HeaderMap::new();

    for raw in &args.headers {
        let Some((name, value)) = raw.split_once(':') else {
            bail!("header '{raw}' is not in 'name: value' form");
        };
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("invalid header name in '{raw}'"))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("invalid header value in '{raw}'"))?;
        headers.append(name, value);
    }

    if !args.cookies.is_empty() {
        for cookie in &args.cookies {
            if !cookie.contains('=') {
                bail!("cookie '{cookie}' is not in 'name=value' form");
            }
        }
        let value = HeaderValue::from_str(&args.cookies.join("; ")).context("invalid cookie value")?;
        headers.append(COOKIE, value);
    }

    if let Some(token) = &args.bearer {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).context("invalid bearer token")?;
        headers.insert(AUTHORIZATION, value);
    }

    let Some(path) = &args.client_cert else {
        return Ok(RequestContext::new(headers));
    };
    let pem = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;

    if let Some(header) = &args.client_cert_header {
        let name = HeaderName::from_bytes(header.as_bytes())
            .with_context(|| format!("invalid header name '{header}'"))?;
        let encoded = String::from_utf8(pem).context("certificate file is not PEM text")?;
        let value = HeaderValue::from_str(&urlencoding::encode(&encoded)).context("invalid certificate header")?;
        headers.insert(name, value);
        return Ok(RequestContext::new(headers));
    }

    let chain = x509::decode_chain(&pem, CertificateFormat::Pem)
        .with_context(|| format!("cannot decode {}", path.display()))?;
    Ok(RequestContext::new(headers).with_client_certificates(chain))
}
