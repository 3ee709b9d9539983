//! Chain orchestration.

use std::collections::HashSet;

use async_trait::async_trait;
use collector_chain_sdk::{
    ChainError, IdentityResolver, Outcome, Phase, RequestContext, Resolution, TraceEntry,
};
use multiauth_security::Identity;

use crate::domain::collectors::{AuthorizationCollector, IdentityCollector, StaticUserCollector};
use crate::domain::error::ConfigError;

/// Ordered identity and authorization collectors.
///
/// Identity collectors are tried in order until one succeeds or fails;
/// abstentions move on to the next one. The trailing static collector
/// guarantees an identity. Every authorization collector then runs in
/// order and the authorities it grants are merged into the identity.
/// Any failure ends the resolution.
///
/// A chain holds no per-request state and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct CollectorChain {
    identity: Vec<IdentityCollector>,
    fallback: StaticUserCollector,
    authorization: Vec<AuthorizationCollector>,
}

impl CollectorChain {
    /// Assemble a chain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the identity collectors do not end with a
    /// single static collector, or a collector name is empty or repeated
    /// within a phase.
    pub fn new(
        mut identity: Vec<IdentityCollector>,
        authorization: Vec<AuthorizationCollector>,
    ) -> Result<Self, ConfigError> {
        let Some(IdentityCollector::StaticUser(fallback)) = identity.pop() else {
            return Err(ConfigError::MissingFallback);
        };
        if let Some(misplaced) = identity
            .iter()
            .find(|c| matches!(c, IdentityCollector::StaticUser(_)))
        {
            return Err(ConfigError::FallbackNotLast(misplaced.name().to_owned()));
        }

        let identity_names = identity
            .iter()
            .map(IdentityCollector::name)
            .chain(std::iter::once(fallback.name()));
        check_names(identity_names, "identity")?;
        check_names(authorization.iter().map(AuthorizationCollector::name), "authorization")?;

        Ok(Self {
            identity,
            fallback,
            authorization,
        })
    }

    /// Names of the identity collectors, in order, fallback last.
    pub fn identity_collectors(&self) -> impl Iterator<Item = &str> {
        self.identity
            .iter()
            .map(IdentityCollector::name)
            .chain(std::iter::once(self.fallback.name()))
    }

    /// Names of the authorization collectors, in order.
    pub fn authorization_collectors(&self) -> impl Iterator<Item = &str> {
        self.authorization.iter().map(AuthorizationCollector::name)
    }

    async fn identify(&self, ctx: &RequestContext, trace: &mut Vec<TraceEntry>) -> Result<Identity, ChainError> {
        for collector in &self.identity {
            match collector.attempt(ctx).await {
                Ok(Some(identity)) => {
                    trace.push(entry(collector.name(), Phase::Identity, Outcome::Succeeded));
                    return Ok(identity);
                }
                Ok(None) => {
                    tracing::trace!(collector = collector.name(), "Identity collector abstained");
                    trace.push(entry(collector.name(), Phase::Identity, Outcome::Abstained));
                }
                Err(e) => {
                    tracing::warn!(collector = collector.name(), kind = ?e.kind(), error = %e, "Authentication failed");
                    trace.push(entry(collector.name(), Phase::Identity, Outcome::Failed(e.kind())));
                    return Err(ChainError::Authentication(e));
                }
            }
        }

        trace.push(entry(self.fallback.name(), Phase::Identity, Outcome::Succeeded));
        Ok(self.fallback.identity())
    }

    async fn authorize(
        &self,
        ctx: &RequestContext,
        identity: &mut Identity,
        trace: &mut Vec<TraceEntry>,
    ) -> Result<(), ChainError> {
        for collector in &self.authorization {
            match collector.attempt(ctx, identity).await {
                Ok(Some(granted)) => {
                    trace.push(entry(collector.name(), Phase::Authorization, Outcome::Succeeded));
                    identity.grant(&granted);
                }
                Ok(None) => {
                    tracing::trace!(collector = collector.name(), "Authorization collector abstained");
                    trace.push(entry(collector.name(), Phase::Authorization, Outcome::Abstained));
                }
                Err(e) => {
                    tracing::warn!(collector = collector.name(), kind = ?e.kind(), error = %e, "Authorization failed");
                    trace.push(entry(collector.name(), Phase::Authorization, Outcome::Failed(e.kind())));
                    return Err(ChainError::Authorization(e));
                }
            }
        }
        Ok(())
    }
}

fn check_names<'a>(names: impl Iterator<Item = &'a str>, phase: &'static str) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                name: name.to_owned(),
                phase,
            });
        }
    }
    Ok(())
}

fn entry(collector: &str, phase: Phase, outcome: Outcome) -> TraceEntry {
    TraceEntry {
        collector: collector.to_owned(),
        phase,
        outcome,
    }
}

#[async_trait]
impl IdentityResolver for CollectorChain {
    async fn resolve(&self, ctx: &RequestContext) -> Result<Identity, ChainError> {
        self.resolve_traced(ctx).await.map(|resolution| resolution.identity)
    }

    #[tracing::instrument(skip_all, fields(username = tracing::field::Empty, origin = tracing::field::Empty))]
    async fn resolve_traced(&self, ctx: &RequestContext) -> Result<Resolution, ChainError> {
        let mut trace = Vec::with_capacity(self.identity.len() + 1 + self.authorization.len());

        let mut identity = self.identify(ctx, &mut trace).await?;
        let span = tracing::Span::current();
        span.record("username", identity.username());
        span.record("origin", identity.origin());

        self.authorize(ctx, &mut identity, &mut trace).await?;

        tracing::debug!(authorities = identity.authorities().len(), "Identity resolved");
        Ok(Resolution { identity, trace })
    }
}
