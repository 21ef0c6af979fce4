mod batch;
mod indicators;
mod reconcile;
mod sources;

use std::sync::Arc;
use std::time::Instant;

use crossquote_core::{
    Envelope, EnvelopeError, ProviderId, ReconcileConfig, ReconcileEngine, SourceReport,
    SourceSelectorBuilder,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::Metadata;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub providers: Vec<ProviderId>,
}

impl CommandResult {
    pub fn ok(data: Value, providers: Vec<ProviderId>) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            providers,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let started = Instant::now();
    let config = load_config(cli)?;
    let engine = Arc::new(build_engine(cli, config)?);

    let outcome = match &cli.command {
        Command::Reconcile(args) => reconcile::run(args, &engine).await,
        Command::Batch(args) => batch::run(args, &engine).await,
        Command::Indicators(args) => indicators::run(args, &engine).await,
        Command::Sources(args) => sources::run(args, &engine),
    };

    if let Err(error) = engine.shutdown().await {
        warn!(%error, "engine shutdown failed");
    }

    let CommandResult {
        data,
        warnings,
        errors,
        providers,
    } = outcome?;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut metadata =
        Metadata::new(cli.command.name(), latency_ms, cli.mock).with_providers(providers);
    for warning in warnings {
        metadata.push_warning(warning);
    }
    let meta = metadata.into_envelope_meta()?;

    Envelope::with_errors(meta, data, errors).map_err(CliError::from)
}

/// Config file first, then flag overrides. The engine validates the result.
fn load_config(cli: &Cli) -> Result<ReconcileConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => ReconcileConfig::from_json_file(path)?,
        None => ReconcileConfig::default(),
    };
    if let Some(timeout_ms) = cli.timeout_ms {
        config.collect_timeout_ms = timeout_ms;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.batch_delay_ms = delay_ms;
    }
    debug!(?config, "configuration loaded");
    Ok(config)
}

fn build_engine(cli: &Cli, config: ReconcileConfig) -> Result<ReconcileEngine, CliError> {
    let selector = if cli.mock {
        SourceSelectorBuilder::new().with_mock_mode().build()
    } else {
        SourceSelectorBuilder::new().with_real_clients().build()
    };
    Ok(ReconcileEngine::new(selector, config)?)
}

/// One warning per provider that returned nothing.
fn source_warnings(symbol: &str, sources: &[SourceReport]) -> Vec<String> {
    sources
        .iter()
        .filter(|source| !source.succeeded)
        .map(|source| {
            format!(
                "{symbol}: {} failed: {}",
                source.provider,
                source.error.as_deref().unwrap_or("no data")
            )
        })
        .collect()
}
