//! Sequential multi-identifier reconciliation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{info, warn};

use crate::pipeline::{ReconcileEngine, ValidatedRecord};
use crate::Symbol;

/// One identifier that produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub identifier: String,
    pub code: String,
    pub message: String,
}

/// Records in input order, keyed by normalized identifier, plus failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    #[serde(serialize_with = "ordered_map")]
    records: Vec<(String, ValidatedRecord)>,
    pub failures: Vec<BatchFailure>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&ValidatedRecord> {
        let key = normalized_key(identifier);
        self.records
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, record)| record)
    }

    /// Keys in the order their identifiers were first seen.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValidatedRecord)> {
        self.records.iter().map(|(key, record)| (key.as_str(), record))
    }

    pub fn into_records(self) -> Vec<(String, ValidatedRecord)> {
        self.records
    }
}

fn ordered_map<S>(records: &[(String, ValidatedRecord)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(records.len()))?;
    for (key, record) in records {
        map.serialize_entry(key, record)?;
    }
    map.end()
}

/// Normalized symbol when the identifier parses, the trimmed input otherwise.
fn normalized_key(identifier: &str) -> String {
    Symbol::parse(identifier)
        .map(|symbol| symbol.as_str().to_owned())
        .unwrap_or_else(|_| identifier.trim().to_owned())
}

/// Runs identifiers one at a time through the engine.
///
/// Third-party rate limits are respected by never overlapping identifiers and
/// by pausing between successive ones. The pause applies whether or not the
/// previous identifier succeeded; failures are logged and recorded but never
/// abort the batch.
pub struct BatchOrchestrator {
    engine: Arc<ReconcileEngine>,
    delay: Duration,
}

impl BatchOrchestrator {
    /// Uses the engine config's batch delay.
    pub fn new(engine: Arc<ReconcileEngine>) -> Self {
        let delay = engine.config().batch_delay();
        Self { engine, delay }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn run<I, S>(&self, identifiers: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let started = Instant::now();
        let mut seen: Vec<String> = Vec::new();
        let mut report = BatchReport::default();

        for identifier in identifiers {
            let identifier = identifier.as_ref();
            let key = normalized_key(identifier);
            if seen.contains(&key) {
                continue;
            }
            if !seen.is_empty() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            seen.push(key.clone());

            match self.engine.reconcile(identifier).await {
                Ok(record) => report.records.push((key, record)),
                Err(error) => {
                    warn!(identifier = %key, code = error.code(), %error, "identifier skipped");
                    report.failures.push(BatchFailure {
                        identifier: key,
                        code: error.code().to_owned(),
                        message: error.to_string(),
                    });
                }
            }
        }

        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            requested = seen.len(),
            reconciled = report.len(),
            failed = report.failures.len(),
            elapsed_ms = report.elapsed_ms,
            "batch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FixtureCollector;
    use crate::collector::Collector;
    use crate::config::ReconcileConfig;
    use crate::selector::{RuntimeCapabilities, SourceSelector};
    use crate::ProviderId;

    fn orchestrator(delay: Duration) -> BatchOrchestrator {
        let collectors: Vec<Arc<dyn Collector>> = vec![
            Arc::new(FixtureCollector::new(ProviderId::Stooq)),
            Arc::new(FixtureCollector::new(ProviderId::Yahoo)),
            Arc::new(FixtureCollector::new(ProviderId::Naver)),
        ];
        let engine = ReconcileEngine::new(
            SourceSelector::new(collectors, RuntimeCapabilities::none()),
            ReconcileConfig::default(),
        )
        .expect("default config is valid");
        BatchOrchestrator::new(Arc::new(engine)).with_delay(delay)
    }

    #[tokio::test]
    async fn keeps_input_order_and_deduplicates() {
        let batch = orchestrator(Duration::ZERO);

        let report = batch.run(["msft", "005930", "AAPL", "MSFT", "005930"]).await;

        assert_eq!(report.identifiers().collect::<Vec<_>>(), ["MSFT", "005930", "AAPL"]);
        assert!(report.failures.is_empty());
        assert!(report.get("aapl").is_some());
    }

    #[tokio::test]
    async fn invalid_identifier_is_recorded_and_skipped() {
        let batch = orchestrator(Duration::ZERO);

        let report = batch.run(["AAPL", "not valid!", "MSFT"]).await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].identifier, "not valid!");
        assert_eq!(report.failures[0].code, "reconcile.invalid_identifier");
    }

    #[tokio::test]
    async fn delay_applies_between_every_pair() {
        let batch = orchestrator(Duration::from_millis(40));
        let started = Instant::now();

        let report = batch.run(["AAPL", "bad id", "MSFT"]).await;

        assert_eq!(report.len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn serializes_records_as_ordered_object() {
        let batch = orchestrator(Duration::ZERO);

        let report = batch.run(["MSFT", "AAPL"]).await;
        let json = serde_json::to_string(&report).expect("serializes");

        let msft = json.find("\"MSFT\":").expect("msft key");
        let aapl = json.find("\"AAPL\":").expect("aapl key");
        assert!(msft < aapl);
        assert!(json.contains("\"failures\":[]"));
    }
}
