use std::sync::Arc;
use std::time::Duration;

use crossquote_core::{
    AlphaVantageSource, Collector, FixtureCollector, NaverSource, NoopHttpClient, Provenance,
    ProviderId, SnapshotCollector, StooqSource, Symbol, YahooSource,
};

struct CollectorCase {
    id: ProviderId,
    collector: Arc<dyn Collector>,
}

fn fixture_cases() -> Vec<CollectorCase> {
    ProviderId::ALL
        .into_iter()
        .map(|id| CollectorCase {
            id,
            collector: Arc::new(FixtureCollector::new(id)),
        })
        .collect()
}

/// Reference HTTP collectors wired to a client that never reaches the network.
fn offline_cases() -> Vec<CollectorCase> {
    let http = Arc::new(NoopHttpClient);
    vec![
        CollectorCase {
            id: ProviderId::Yahoo,
            collector: Arc::new(SnapshotCollector::new(YahooSource::new(http.clone()))),
        },
        CollectorCase {
            id: ProviderId::Naver,
            collector: Arc::new(SnapshotCollector::new(NaverSource::new(http.clone()))),
        },
        CollectorCase {
            id: ProviderId::Stooq,
            collector: Arc::new(SnapshotCollector::new(StooqSource::new(http.clone()))),
        },
        CollectorCase {
            id: ProviderId::Alphavantage,
            collector: Arc::new(SnapshotCollector::new(AlphaVantageSource::new(
                http,
                "demo-key",
            ))),
        },
    ]
}

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

#[tokio::test]
async fn every_operation_reports_its_provider() {
    let samsung = symbol("005930");

    for case in fixture_cases() {
        let collector = case.collector.as_ref();
        assert_eq!(collector.id(), case.id);

        let basic = collector.basic_info(&samsung).await;
        let price = collector.price_data(&samsung).await;
        let valuation = collector.valuation_data(&samsung).await;
        let financial = collector.financial_data(&samsung).await;
        let flows = collector.supply_demand_data(&samsung).await;
        let market = collector.market_data(&samsung).await;

        assert_eq!(basic.provider, case.id, "provider '{}': basic info", case.id);
        assert_eq!(price.provider, case.id, "provider '{}': price", case.id);
        assert_eq!(valuation.provider, case.id, "provider '{}': valuation", case.id);
        assert_eq!(financial.provider, case.id, "provider '{}': financial", case.id);
        assert_eq!(flows.provider, case.id, "provider '{}': flows", case.id);
        assert_eq!(market.provider, case.id, "provider '{}': market", case.id);
        assert_eq!(price.provenance, case.id.provenance());
        assert!(price.succeeded, "provider '{}': price succeeded", case.id);
    }
}

#[tokio::test]
async fn collect_all_carries_every_sub_record() {
    for case in fixture_cases() {
        let outcome = case.collector.collect_all(&symbol("035720.KQ")).await;

        assert!(outcome.succeeded, "provider '{}': collect_all", case.id);
        assert!(outcome.error.is_none());
        let quote = outcome.payload.expect("payload on success");
        assert_eq!(quote.basic_info.symbol.as_deref(), Some("035720.KQ"));
        assert!(quote.price_data.current_price.is_some());
        assert!(quote.valuation_data.per.is_some());
        assert!(quote.financial_data.revenue.is_some());
        assert!(quote.supply_demand_data.foreign_ownership.is_some());
        assert!(quote.market_data.market_cap.is_some());
    }
}

#[tokio::test]
async fn failure_is_an_outcome_not_a_panic() {
    let collector = FixtureCollector::new(ProviderId::Kis).with_failure("token expired");

    let outcome = collector.collect_all(&symbol("000660")).await;

    assert!(!outcome.succeeded);
    assert!(outcome.payload.is_none());
    assert_eq!(outcome.provenance, Provenance::Api);
    assert!(outcome.error_message().contains("token expired"));
}

#[tokio::test]
async fn latency_is_measured() {
    let collector =
        FixtureCollector::new(ProviderId::Stooq).with_latency(Duration::from_millis(30));

    let outcome = collector.price_data(&symbol("MSFT")).await;

    assert!(outcome.succeeded);
    assert!(outcome.latency_ms >= 30);
}

#[tokio::test]
async fn reference_collectors_fail_soft_without_network() {
    for case in offline_cases() {
        let raw = if case.id == ProviderId::Naver { "005930" } else { "AAPL" };

        let outcome = case.collector.collect_all(&symbol(raw)).await;

        assert_eq!(outcome.provider, case.id);
        assert!(!outcome.succeeded, "provider '{}': offline collect_all", case.id);
        assert!(outcome.payload.is_none());
        assert!(
            !outcome.error_message().is_empty(),
            "provider '{}': error text",
            case.id
        );
    }
}

#[tokio::test]
async fn reference_collectors_reject_foreign_markets() {
    let http = Arc::new(NoopHttpClient);
    let naver = SnapshotCollector::new(NaverSource::new(http.clone()));
    let stooq = SnapshotCollector::new(StooqSource::new(http));

    let naver_us = naver.collect_all(&symbol("AAPL")).await;
    let stooq_kr = stooq.collect_all(&symbol("005930")).await;

    assert!(!naver_us.succeeded);
    assert!(!stooq_kr.succeeded);
}
