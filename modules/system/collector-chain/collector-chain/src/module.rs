//! Chain assembly from configuration.
//!
//! Configuration can only name callbacks. Hosts register API key
//! validators and claims mappers in a [`Callbacks`] registry under those
//! names before building the chain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use collector_chain_sdk::{ApiKeyValidator, ClaimTypeError, Claims};
use multiauth_security::AuthoritySet;

use crate::config::{
    AccessTokenConfig, ApiKeyConfig, AuthorizationCollectorConfig, CertificateSource, ChainConfig,
    ClientCertificateConfig, CookieJwtConfig, IdentityCollectorConfig, StaticUserConfig,
};
use crate::domain::collectors::api_key::ApiKeyResolver;
use crate::domain::collectors::{
    AccessTokenCollector, ApiKeyCollector, AuthoritiesMapping, AuthorizationCollector, ClaimsMapper,
    ClientCertificateCollector, CookieJwtCollector, IdentityCollector, StaticUserCollector,
};
use crate::domain::error::ConfigError;
use crate::domain::extract::CredentialSource;
use crate::domain::service::CollectorChain;
use crate::domain::token::TokenVerifier;

/// Named callbacks referenced by configuration.
#[derive(Clone, Default)]
pub struct Callbacks {
    api_key_validators: HashMap<String, ApiKeyResolver>,
    claims_mappers: HashMap<String, ClaimsMapper>,
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an API key validator and the projections of its principal.
    pub fn register_api_key_validator<V, U, A>(
        &mut self,
        name: impl Into<String>,
        validator: V,
        username: U,
        authorities: A,
    ) -> &mut Self
    where
        V: ApiKeyValidator,
        U: Fn(&V::Principal) -> String + Send + Sync + 'static,
        A: Fn(&V::Principal) -> AuthoritySet + Send + Sync + 'static,
    {
        self.api_key_validators
            .insert(name.into(), ApiKeyResolver::new(validator, username, authorities));
        self
    }

    /// Register a mapper computing authorities from verified claims.
    pub fn register_claims_mapper<F>(&mut self, name: impl Into<String>, mapper: F) -> &mut Self
    where
        F: Fn(&Claims) -> Result<AuthoritySet, ClaimTypeError> + Send + Sync + 'static,
    {
        self.claims_mappers.insert(name.into(), Arc::new(mapper));
        self
    }

    fn api_key_validator(&self, name: &str) -> Result<ApiKeyResolver, ConfigError> {
        self.api_key_validators
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownValidator(name.to_owned()))
    }

    fn authorities(&self, mapper: Option<&str>, claim: &str) -> Result<AuthoritiesMapping, ConfigError> {
        match mapper {
            Some(name) => self
                .claims_mappers
                .get(name)
                .cloned()
                .map(AuthoritiesMapping::Mapper)
                .ok_or_else(|| ConfigError::UnknownMapper(name.to_owned())),
            None => Ok(AuthoritiesMapping::Claim(claim.to_owned())),
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("api_key_validators", &self.api_key_validators.keys().collect::<Vec<_>>())
            .field("claims_mappers", &self.claims_mappers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CollectorChain {
    /// Build a chain from configuration.
    ///
    /// Keys, header names and callback references are all resolved here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first invalid entry.
    pub fn from_config(cfg: &ChainConfig, callbacks: &Callbacks) -> Result<Self, ConfigError> {
        let identity = cfg
            .identity
            .iter()
            .map(|entry| build_identity(entry, callbacks))
            .collect::<Result<Vec<_>, _>>()?;
        let authorization = cfg
            .authorization
            .iter()
            .map(|entry| build_authorization(entry, callbacks))
            .collect::<Result<Vec<_>, _>>()?;

        let chain = Self::new(identity, authorization)?;
        tracing::info!(
            identity = ?chain.identity_collectors().collect::<Vec<_>>(),
            authorization = ?chain.authorization_collectors().collect::<Vec<_>>(),
            "Collector chain configured"
        );
        Ok(chain)
    }
}

fn build_identity(entry: &IdentityCollectorConfig, callbacks: &Callbacks) -> Result<IdentityCollector, ConfigError> {
    Ok(match entry {
        IdentityCollectorConfig::CookieJwt(cfg) => cookie_jwt(cfg, callbacks)?.into(),
        IdentityCollectorConfig::ApiKey(cfg) => api_key(cfg, callbacks)?.into(),
        IdentityCollectorConfig::ClientCertificate(cfg) => client_certificate(cfg)?.into(),
        IdentityCollectorConfig::StaticUser(cfg) => static_user(cfg).into(),
    })
}

fn build_authorization(
    entry: &AuthorizationCollectorConfig,
    callbacks: &Callbacks,
) -> Result<AuthorizationCollector, ConfigError> {
    Ok(match entry {
        AuthorizationCollectorConfig::AccessToken(cfg) => access_token(cfg, callbacks)?.into(),
        AuthorizationCollectorConfig::CookieJwt(cfg) => cookie_jwt(cfg, callbacks)?.into(),
        AuthorizationCollectorConfig::ApiKey(cfg) => api_key(cfg, callbacks)?.into(),
    })
}

fn cookie_jwt(cfg: &CookieJwtConfig, callbacks: &Callbacks) -> Result<CookieJwtCollector, ConfigError> {
    let build = || -> Result<CookieJwtCollector, ConfigError> {
        let verifier = TokenVerifier::from_config(&cfg.verifier)?;
        let authorities = callbacks.authorities(cfg.authorities_mapper.as_deref(), &cfg.authorities_claim)?;
        Ok(CookieJwtCollector::new(cfg.name.as_str(), cfg.cookie.as_str(), verifier)
            .with_username_claim(cfg.username_claim.as_str())
            .with_authorities(authorities))
    };
    build().map_err(|e| e.in_collector(&cfg.name))
}

fn api_key(cfg: &ApiKeyConfig, callbacks: &Callbacks) -> Result<ApiKeyCollector, ConfigError> {
    let build = || -> Result<ApiKeyCollector, ConfigError> {
        let header = CredentialSource::header_name(&cfg.header)?;
        let resolver = callbacks.api_key_validator(&cfg.validator)?;
        let collector = ApiKeyCollector::new(cfg.name.as_str(), header, resolver);
        Ok(match cfg.timeout_ms {
            Some(ms) => collector.with_timeout(Duration::from_millis(ms)),
            None => collector,
        })
    };
    build().map_err(|e| e.in_collector(&cfg.name))
}

fn client_certificate(cfg: &ClientCertificateConfig) -> Result<ClientCertificateCollector, ConfigError> {
    match cfg.source {
        CertificateSource::Header => {
            let header = CredentialSource::header_name(&cfg.header).map_err(|e| e.in_collector(&cfg.name))?;
            Ok(ClientCertificateCollector::from_header(
                cfg.name.as_str(),
                header,
                cfg.format,
            ))
        }
        CertificateSource::Tls => Ok(ClientCertificateCollector::from_tls(cfg.name.as_str())),
    }
}

fn static_user(cfg: &StaticUserConfig) -> StaticUserCollector {
    StaticUserCollector::new(
        cfg.name.as_str(),
        cfg.username.as_str(),
        cfg.authorities.iter().map(String::as_str).collect(),
    )
}

fn access_token(cfg: &AccessTokenConfig, callbacks: &Callbacks) -> Result<AccessTokenCollector, ConfigError> {
    let build = || -> Result<AccessTokenCollector, ConfigError> {
        let verifier = TokenVerifier::from_config(&cfg.verifier)?;
        let authorities = callbacks.authorities(cfg.authorities_mapper.as_deref(), &cfg.scope_claim)?;
        Ok(AccessTokenCollector::new(cfg.name.as_str(), verifier)
            .with_authorities(authorities)
            .with_thumbprint_algorithm(cfg.thumbprint_algorithm))
    };
    build().map_err(|e| e.in_collector(&cfg.name))
}
