use std::sync::Arc;

use crossquote_core::{BatchOrchestrator, EnvelopeError, ProviderId, ReconcileEngine};

use crate::cli::BatchArgs;
use crate::error::CliError;

use super::{source_warnings, CommandResult};

pub async fn run(
    args: &BatchArgs,
    engine: &Arc<ReconcileEngine>,
) -> Result<CommandResult, CliError> {
    let report = BatchOrchestrator::new(Arc::clone(engine))
        .run(&args.symbols)
        .await;

    let mut providers: Vec<ProviderId> = Vec::new();
    let mut warnings = Vec::new();
    for (identifier, record) in report.iter() {
        for source in &record.sources {
            if !providers.contains(&source.provider) {
                providers.push(source.provider);
            }
        }
        warnings.extend(source_warnings(identifier, &record.sources));
    }

    let errors = report
        .failures
        .iter()
        .map(|failure| {
            EnvelopeError::new(failure.code.as_str(), failure.message.as_str())
                .map(|error| error.with_symbol(failure.identifier.as_str()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let data = serde_json::to_value(&report)?;
    Ok(CommandResult::ok(data, providers)
        .with_warnings(warnings)
        .with_errors(errors))
}
