use crossquote_core::{EnvelopeError, ReconcileEngine, ReconcileError};
use serde_json::Value;

use crate::cli::IndicatorsArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(
    args: &IndicatorsArgs,
    engine: &ReconcileEngine,
) -> Result<CommandResult, CliError> {
    let error = match engine.indicators(&args.symbol).await {
        Ok(snapshot) => {
            let providers = vec![snapshot.provider];
            let data = serde_json::to_value(&snapshot)?;
            return Ok(CommandResult::ok(data, providers));
        }
        Err(error) => error,
    };

    match error {
        ReconcileError::Invalid(error) => Err(CliError::Validation(error)),
        error => {
            let envelope_error = EnvelopeError::new(error.code(), error.to_string())?
                .with_symbol(args.symbol.trim());
            Ok(CommandResult::ok(Value::Null, Vec::new()).with_errors(vec![envelope_error]))
        }
    }
}
