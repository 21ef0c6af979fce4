//! Behaviour tests for provider fallback chains

use std::sync::Arc;

use crossquote_core::market::classify;
use crossquote_core::selector::{CandidateRole, Decision, SkipReason};
use crossquote_core::{
    Collector, Credential, FixtureCollector, Market, ProviderId, RuntimeCapabilities,
    SelectError, SourceSelector, Symbol,
};

fn all_fixtures() -> Vec<Arc<dyn Collector>> {
    ProviderId::ALL
        .into_iter()
        .map(|provider| Arc::new(FixtureCollector::new(provider)) as Arc<dyn Collector>)
        .collect()
}

fn pair(selector: &SourceSelector, market: Market) -> (ProviderId, ProviderId) {
    let pair = selector.select(market).expect("pair");
    (pair.primary.id(), pair.secondary.id())
}

#[test]
fn identifiers_are_classified_by_code_shape() {
    let market = |raw: &str| classify(&Symbol::parse(raw).expect("valid symbol"));

    assert_eq!(market("005930"), Market::Korea);
    assert_eq!(market("005930.KS"), Market::Korea);
    assert_eq!(market("035720.kq"), Market::Korea);
    assert_eq!(market("AAPL"), Market::Us);
    assert_eq!(market("12345"), Market::Us);
    assert_eq!(market("BRK.B"), Market::Us);
}

#[test]
fn without_credentials_the_keyless_fallbacks_are_primary() {
    let selector = SourceSelector::new(all_fixtures(), RuntimeCapabilities::none());

    assert_eq!(pair(&selector, Market::Korea), (ProviderId::Yahoo, ProviderId::Naver));
    assert_eq!(pair(&selector, Market::Us), (ProviderId::Stooq, ProviderId::Yahoo));
}

#[test]
fn with_every_credential_the_preferred_providers_are_primary() {
    let capabilities = RuntimeCapabilities::none()
        .with_credential(Credential::Kis)
        .with_credential(Credential::AlphaVantage)
        .with_credential(Credential::Vision);
    let selector = SourceSelector::new(all_fixtures(), capabilities);

    assert_eq!(pair(&selector, Market::Korea), (ProviderId::Kis, ProviderId::Naver));
    assert_eq!(pair(&selector, Market::Us), (ProviderId::Alphavantage, ProviderId::Yahoo));
}

#[test]
fn vision_is_skipped_on_serverless_runtimes() {
    // Given: only the vision key is configured
    let capabilities = RuntimeCapabilities::none().with_credential(Credential::Vision);

    // When: the runtime is persistent, vision wins; when serverless, it is skipped
    let persistent = SourceSelector::new(all_fixtures(), capabilities.clone());
    let serverless = SourceSelector::new(all_fixtures(), capabilities.with_serverless(true));

    // Then
    assert_eq!(pair(&persistent, Market::Korea).0, ProviderId::Vision);
    assert_eq!(pair(&serverless, Market::Korea).0, ProviderId::Yahoo);

    let plan = serverless.plan(Market::Korea);
    let vision = plan
        .candidates
        .iter()
        .find(|candidate| candidate.provider == ProviderId::Vision)
        .expect("vision evaluated");
    assert_eq!(vision.decision, Decision::Skipped(SkipReason::ServerlessRuntime));
}

#[test]
fn secondary_is_independent_of_the_primary_choice() {
    for capabilities in [
        RuntimeCapabilities::none(),
        RuntimeCapabilities::none().with_credential(Credential::Kis),
        RuntimeCapabilities::none().with_credential(Credential::Vision),
    ] {
        let selector = SourceSelector::new(all_fixtures(), capabilities);
        let (primary, secondary) = pair(&selector, Market::Korea);

        assert_eq!(secondary, ProviderId::Naver);
        assert_ne!(primary, secondary);
    }
}

#[test]
fn plan_lists_the_whole_chain_in_order() {
    let selector = SourceSelector::new(
        all_fixtures(),
        RuntimeCapabilities::none().with_credential(Credential::AlphaVantage),
    );

    let plan = selector.plan(Market::Us);

    let providers: Vec<_> = plan.candidates.iter().map(|candidate| candidate.provider).collect();
    assert_eq!(
        providers,
        vec![
            ProviderId::Alphavantage,
            ProviderId::Vision,
            ProviderId::Stooq,
            ProviderId::Yahoo
        ]
    );
    assert_eq!(plan.candidates[0].decision, Decision::Selected);
    assert_eq!(
        plan.candidates[1].decision,
        Decision::Skipped(SkipReason::MissingCredential(Credential::Vision))
    );
    assert_eq!(plan.candidates[2].decision, Decision::Standby);
    assert_eq!(plan.candidates[3].role, CandidateRole::Secondary);
}

#[test]
fn an_unregistered_baseline_is_a_selection_error() {
    let collectors: Vec<Arc<dyn Collector>> = vec![
        Arc::new(FixtureCollector::new(ProviderId::Stooq)),
        Arc::new(FixtureCollector::new(ProviderId::Alphavantage)),
    ];
    let selector = SourceSelector::new(collectors, RuntimeCapabilities::none());

    let error = selector.select(Market::Us).expect_err("yahoo missing");

    assert!(matches!(
        error,
        SelectError::SecondaryUnavailable {
            provider: ProviderId::Yahoo,
            ..
        }
    ));
}

#[test]
fn capabilities_are_read_from_configuration() {
    let capabilities = RuntimeCapabilities::from_lookup(|name| match name {
        "ALPHAVANTAGE_API_KEY" => Some(String::from("key")),
        "CROSSQUOTE_KIS_APP_KEY" => Some(String::from("app")),
        "VERCEL" => Some(String::from("1")),
        _ => None,
    });

    assert!(capabilities.has(Credential::AlphaVantage));
    // The app secret is missing.
    assert!(!capabilities.has(Credential::Kis));
    assert!(capabilities.is_serverless());
}
