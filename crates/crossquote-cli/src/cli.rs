//! CLI argument definitions for crossquote.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `reconcile` | Reconcile one instrument across two providers |
//! | `batch` | Reconcile several instruments sequentially |
//! | `indicators` | RSI, moving averages and disparity from daily history |
//! | `sources` | Show provider chains and why each candidate is taken or skipped |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Use deterministic offline collectors |
//! | `--config` | - | JSON policy file (tolerances, scores, timeouts) |
//! | `--timeout-ms` | config | Per-provider collection timeout |
//! | `--delay-ms` | config | Pause between batch identifiers |
//!
//! # Examples
//!
//! ```bash
//! crossquote reconcile 005930 --pretty
//! crossquote batch AAPL MSFT 035720.KQ --delay-ms 500
//! crossquote indicators AAPL
//! crossquote sources --market us
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use crossquote_core::Market;

/// Cross-source quote reconciliation
///
/// Collects the same instrument from two independent providers, merges the
/// records field by field and reports how far they agree.
#[derive(Debug, Parser)]
#[command(
    name = "crossquote",
    author,
    version,
    about = "Cross-source quote reconciliation",
    long_about = "crossquote fetches one instrument from a primary and a secondary provider \
in parallel, reconciles every field within category tolerances and scores the result.\n\
\n\
Provider keys are read from CROSSQUOTE_* environment variables. Logs go to stderr \
(filter with RUST_LOG); stdout carries only the JSON envelope."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Answer from deterministic fixture collectors instead of the network.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Reconciliation policy file (JSON). Missing keys keep their defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Per-provider collection timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Pause between successive batch identifiers in milliseconds.
    #[arg(long, global = true)]
    pub delay_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile one instrument.
    ///
    /// # Examples
    ///
    ///   crossquote reconcile 005930
    ///   crossquote reconcile AAPL --timeout-ms 5000
    Reconcile(ReconcileArgs),

    /// Reconcile several instruments one after another.
    ///
    /// Duplicates are reconciled once. Failures are reported per identifier
    /// and never stop the batch.
    Batch(BatchArgs),

    /// Compute RSI(14), MA5-MA120 and disparity from daily history.
    ///
    /// History comes from the selected primary, or from the secondary
    /// baseline when the primary has none.
    Indicators(IndicatorsArgs),

    /// Show provider selection per market.
    Sources(SourcesArgs),
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Reconcile(_) => "reconcile",
            Self::Batch(_) => "batch",
            Self::Indicators(_) => "indicators",
            Self::Sources(_) => "sources",
        }
    }
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Instrument identifier (six-digit KRX code, optional .KS/.KQ suffix, or ticker).
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct IndicatorsArgs {
    /// Instrument identifier.
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct SourcesArgs {
    /// Limit output to one market.
    #[arg(long, value_enum)]
    pub market: Option<MarketArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarketArg {
    Kr,
    Us,
}

impl From<MarketArg> for Market {
    fn from(value: MarketArg) -> Self {
        match value {
            MarketArg::Kr => Market::Korea,
            MarketArg::Us => Market::Us,
        }
    }
}
