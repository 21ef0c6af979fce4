use std::io::{self, Write};

use crossquote_core::Envelope;
use serde_json::Value;

use crate::error::CliError;

/// Writes the envelope to stdout as a single JSON document.
pub fn render(envelope: &Envelope<Value>, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{payload}")?;
    stdout.flush()?;
    Ok(())
}
