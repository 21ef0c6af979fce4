use crossquote_core::{EnvelopeError, ReconcileEngine, ReconcileError};
use serde_json::Value;

use crate::cli::ReconcileArgs;
use crate::error::CliError;

use super::{source_warnings, CommandResult};

pub async fn run(
    args: &ReconcileArgs,
    engine: &ReconcileEngine,
) -> Result<CommandResult, CliError> {
    let error = match engine.reconcile(&args.symbol).await {
        Ok(record) => {
            let providers = record.sources.iter().map(|source| source.provider).collect();
            let warnings = source_warnings(record.symbol.as_str(), &record.sources);
            let data = serde_json::to_value(&record)?;
            return Ok(CommandResult::ok(data, providers).with_warnings(warnings));
        }
        Err(error) => error,
    };

    let code = error.code();
    match error {
        ReconcileError::Invalid(error) => Err(CliError::Validation(error)),
        ReconcileError::TotalFailure(failure) => {
            let symbol = failure.symbol.as_str();
            let errors = vec![
                EnvelopeError::new(code, failure.primary_error.as_str())?
                    .with_symbol(symbol)
                    .with_source(failure.primary),
                EnvelopeError::new(code, failure.secondary_error.as_str())?
                    .with_symbol(symbol)
                    .with_source(failure.secondary),
            ];
            Ok(
                CommandResult::ok(Value::Null, vec![failure.primary, failure.secondary])
                    .with_errors(errors),
            )
        }
        error @ (ReconcileError::Select(_) | ReconcileError::NoHistory { .. }) => {
            let envelope_error =
                EnvelopeError::new(code, error.to_string())?.with_symbol(args.symbol.trim());
            Ok(CommandResult::ok(Value::Null, Vec::new()).with_errors(vec![envelope_error]))
        }
    }
}
