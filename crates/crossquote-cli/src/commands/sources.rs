use crossquote_core::selector::{CandidateRole, Decision};
use crossquote_core::{Market, Provenance, ProviderId, ReconcileEngine};
use serde::Serialize;

use crate::cli::SourcesArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    markets: Vec<MarketSources>,
    registered: Vec<ProviderId>,
}

#[derive(Debug, Serialize)]
struct MarketSources {
    market: Market,
    primary: Option<ProviderId>,
    secondary: Option<ProviderId>,
    candidates: Vec<CandidateSummary>,
}

#[derive(Debug, Serialize)]
struct CandidateSummary {
    provider: ProviderId,
    provenance: Provenance,
    role: CandidateRole,
    decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

pub fn run(args: &SourcesArgs, engine: &ReconcileEngine) -> Result<CommandResult, CliError> {
    let selector = engine.selector();
    let markets = match args.market {
        Some(market) => vec![Market::from(market)],
        None => Market::ALL.to_vec(),
    };

    let mut providers = Vec::new();
    let markets = markets
        .into_iter()
        .map(|market| {
            let plan = selector.plan(market);
            providers.extend(plan.primary());
            providers.extend(plan.secondary());

            let candidates = plan
                .candidates
                .iter()
                .map(|candidate| {
                    let (decision, reason) = match candidate.decision {
                        Decision::Selected => ("selected", None),
                        Decision::Standby => ("standby", None),
                        Decision::Skipped(reason) => ("skipped", Some(reason.to_string())),
                    };
                    CandidateSummary {
                        provider: candidate.provider,
                        provenance: candidate.provider.provenance(),
                        role: candidate.role,
                        decision,
                        reason,
                    }
                })
                .collect();

            MarketSources {
                market,
                primary: plan.primary(),
                secondary: plan.secondary(),
                candidates,
            }
        })
        .collect();

    let data = serde_json::to_value(SourcesResponseData {
        markets,
        registered: selector.registered(),
    })?;
    Ok(CommandResult::ok(data, providers))
}
