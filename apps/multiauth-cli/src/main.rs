//! `multiauth`: run a simulated request through a collector chain and print
//! the resolved identity.

mod config;
mod request;
mod static_keys;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use collector_chain::{Callbacks, CollectorChain};
use collector_chain_sdk::{ChainError, IdentityResolver, Outcome, Resolution};
use serde_json::{Value, json};
use tracing::metadata::LevelFilter;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::CliConfig;
use crate::request::RequestArgs;
use crate::static_keys::StaticApiKeys;

#[derive(Debug, Parser)]
#[command(name = "multiauth", version, about = "Resolve the identity of a simulated request")]
struct Cli {
    /// YAML configuration file. Without one only the anonymous fallback is configured.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Include the per-collector outcomes in the output.
    #[arg(long)]
    trace: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    log_json: bool,

    #[command(flatten)]
    request: RequestArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_json)?;

    let config = CliConfig::load(cli.config.as_deref())?;
    let mut callbacks = Callbacks::new();
    StaticApiKeys::from_config(&config.api_keys).register(&mut callbacks);
    let chain = CollectorChain::from_config(&config.chain, &callbacks).context("invalid collector chain")?;

    let ctx = request::build(&cli.request)?;
    let (output, code) = match chain.resolve_traced(&ctx).await {
        Ok(resolution) => (render_resolution(&resolution, cli.trace), ExitCode::SUCCESS),
        Err(err) => (render_error(&err), ExitCode::FAILURE),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(code)
}

fn init_logging(json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()?;
    }
    Ok(())
}

fn render_resolution(resolution: &Resolution, with_trace: bool) -> Value {
    let identity = json!(resolution.identity);
    if !with_trace {
        return identity;
    }

    let trace: Vec<Value> = resolution
        .trace
        .iter()
        .map(|step| {
            json!({
                "collector": step.collector,
                "phase": format!("{:?}", step.phase),
                "outcome": render_outcome(step.outcome),
            })
        })
        .collect();
    json!({"identity": identity, "trace": trace})
}

fn render_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Abstained => "abstained".to_owned(),
        Outcome::Succeeded => "succeeded".to_owned(),
        Outcome::Failed(kind) => format!("failed: {kind:?}"),
    }
}

fn render_error(err: &ChainError) -> Value {
    json!({
        "status": err.status_code(),
        "kind": format!("{:?}", err.kind()),
        "collector": err.collector_error().collector(),
        "error": err.to_string(),
    })
}
