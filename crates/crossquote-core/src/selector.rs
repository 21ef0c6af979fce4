//! Per-market provider selection.
//!
//! Each market has an ordered primary chain and a fixed secondary baseline.
//! The first chain candidate whose prerequisites hold and whose collector is
//! registered becomes primary; the baseline is always the secondary so the
//! two outcomes come from independent data paths.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::adapters::{
    AlphaVantageSource, FixtureCollector, NaverSource, OpenAiScreenshotReader, SnapshotCollector,
    StooqSource, VisionSource, YahooSource,
};
use crate::browser::SharedBrowser;
use crate::cache::CacheStore;
use crate::collector::Collector;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::{Market, ProviderId};

/// Secret that gates a keyed provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    /// KIS app key and app secret.
    Kis,
    AlphaVantage,
    /// API key of the vision model that reads screenshots.
    Vision,
}

impl Credential {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kis => "kis_app_key",
            Self::AlphaVantage => "alphavantage_api_key",
            Self::Vision => "vision_api_key",
        }
    }
}

impl Display for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider credentials read from process configuration.
///
/// # Environment Variables
///
/// | Credential | Primary Env Var | Fallback Env Var |
/// |------------|-----------------|------------------|
/// | KIS app key | `CROSSQUOTE_KIS_APP_KEY` | - |
/// | KIS app secret | `CROSSQUOTE_KIS_APP_SECRET` | - |
/// | Alpha Vantage | `CROSSQUOTE_ALPHAVANTAGE_API_KEY` | `ALPHAVANTAGE_API_KEY` |
/// | Vision model | `CROSSQUOTE_VISION_API_KEY` | `OPENAI_API_KEY` |
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    pub kis_app_key: Option<String>,
    pub kis_app_secret: Option<String>,
    pub alphavantage_api_key: Option<String>,
    pub vision_api_key: Option<String>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("kis", &self.kis_app_key.is_some())
            .field("alphavantage", &self.alphavantage_api_key.is_some())
            .field("vision", &self.vision_api_key.is_some())
            .finish()
    }
}

impl ProviderCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads credentials through `lookup`; blank values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |primary: &str, fallback: Option<&str>| {
            lookup(primary)
                .or_else(|| fallback.and_then(&lookup))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        Self {
            kis_app_key: read("CROSSQUOTE_KIS_APP_KEY", None),
            kis_app_secret: read("CROSSQUOTE_KIS_APP_SECRET", None),
            alphavantage_api_key: read(
                "CROSSQUOTE_ALPHAVANTAGE_API_KEY",
                Some("ALPHAVANTAGE_API_KEY"),
            ),
            vision_api_key: read("CROSSQUOTE_VISION_API_KEY", Some("OPENAI_API_KEY")),
        }
    }

    pub fn has(&self, credential: Credential) -> bool {
        match credential {
            Credential::Kis => self.kis_app_key.is_some() && self.kis_app_secret.is_some(),
            Credential::AlphaVantage => self.alphavantage_api_key.is_some(),
            Credential::Vision => self.vision_api_key.is_some(),
        }
    }
}

/// Read-only capability map consulted by the selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeCapabilities {
    credentials: HashSet<Credential>,
    serverless: bool,
}

impl RuntimeCapabilities {
    /// Nothing configured, persistent runtime.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let credentials = ProviderCredentials::from_lookup(&lookup);
        Self::from_credentials(&credentials, detect_serverless(&lookup))
    }

    pub fn from_credentials(credentials: &ProviderCredentials, serverless: bool) -> Self {
        let credentials = [Credential::Kis, Credential::AlphaVantage, Credential::Vision]
            .into_iter()
            .filter(|credential| credentials.has(*credential))
            .collect();
        Self {
            credentials,
            serverless,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials.insert(credential);
        self
    }

    pub fn with_serverless(mut self, serverless: bool) -> Self {
        self.serverless = serverless;
        self
    }

    pub fn has(&self, credential: Credential) -> bool {
        self.credentials.contains(&credential)
    }

    pub const fn is_serverless(&self) -> bool {
        self.serverless
    }
}

/// `CROSSQUOTE_SERVERLESS` (truthy) or a platform marker variable.
fn detect_serverless(lookup: impl Fn(&str) -> Option<String>) -> bool {
    let explicit = lookup("CROSSQUOTE_SERVERLESS").map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    });
    if let Some(explicit) = explicit {
        return explicit;
    }

    ["VERCEL", "AWS_LAMBDA_FUNCTION_NAME"]
        .into_iter()
        .any(|name| lookup(name).is_some_and(|value| !value.trim().is_empty()))
}

/// Condition a provider needs before it can be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    Credential(Credential),
    /// Browser automation cannot run on ephemeral runtimes.
    PersistentRuntime,
}

impl Prerequisite {
    pub fn is_met(self, capabilities: &RuntimeCapabilities) -> bool {
        match self {
            Self::Credential(credential) => capabilities.has(credential),
            Self::PersistentRuntime => !capabilities.is_serverless(),
        }
    }
}

/// Static description of one provider for selection purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub prerequisites: &'static [Prerequisite],
}

impl ProviderDescriptor {
    pub const fn of(id: ProviderId) -> Self {
        let prerequisites: &'static [Prerequisite] = match id {
            ProviderId::Kis => &[Prerequisite::Credential(Credential::Kis)],
            ProviderId::Alphavantage => &[Prerequisite::Credential(Credential::AlphaVantage)],
            ProviderId::Vision => &[
                Prerequisite::Credential(Credential::Vision),
                Prerequisite::PersistentRuntime,
            ],
            ProviderId::Yahoo | ProviderId::Naver | ProviderId::Stooq => &[],
        };
        Self { id, prerequisites }
    }

    /// First prerequisite that does not hold.
    pub fn unmet(&self, capabilities: &RuntimeCapabilities) -> Option<Prerequisite> {
        self.prerequisites
            .iter()
            .copied()
            .find(|prerequisite| !prerequisite.is_met(capabilities))
    }

    pub fn is_available(&self, capabilities: &RuntimeCapabilities) -> bool {
        self.unmet(capabilities).is_none()
    }
}

/// Chain for one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketChain {
    pub primary: Vec<ProviderId>,
    pub secondary: ProviderId,
}

/// Fallback chains for every market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub korea: MarketChain,
    pub us: MarketChain,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            korea: MarketChain {
                primary: vec![ProviderId::Kis, ProviderId::Vision, ProviderId::Yahoo],
                secondary: ProviderId::Naver,
            },
            us: MarketChain {
                primary: vec![ProviderId::Alphavantage, ProviderId::Vision, ProviderId::Stooq],
                secondary: ProviderId::Yahoo,
            },
        }
    }
}

impl SelectionPolicy {
    pub fn for_market(&self, market: Market) -> &MarketChain {
        match market {
            Market::Korea => &self.korea,
            Market::Us => &self.us,
        }
    }
}

/// Why a candidate was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingCredential(Credential),
    ServerlessRuntime,
    NotRegistered,
    SameAsSecondary,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential(credential) => write!(f, "missing credential {credential}"),
            Self::ServerlessRuntime => f.write_str("serverless runtime"),
            Self::NotRegistered => f.write_str("no collector registered"),
            Self::SameAsSecondary => f.write_str("already the secondary baseline"),
        }
    }
}

impl From<Prerequisite> for SkipReason {
    fn from(prerequisite: Prerequisite) -> Self {
        match prerequisite {
            Prerequisite::Credential(credential) => Self::MissingCredential(credential),
            Prerequisite::PersistentRuntime => Self::ServerlessRuntime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateRole {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Selected,
    /// Usable, but an earlier candidate won.
    Standby,
    Skipped(SkipReason),
}

/// One evaluated chain entry, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateDecision {
    pub provider: ProviderId,
    pub role: CandidateRole,
    pub decision: Decision,
}

/// Full selection trace for one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPlan {
    pub market: Market,
    pub candidates: Vec<CandidateDecision>,
}

impl SelectionPlan {
    pub fn primary(&self) -> Option<ProviderId> {
        self.selected(CandidateRole::Primary)
    }

    pub fn secondary(&self) -> Option<ProviderId> {
        self.selected(CandidateRole::Secondary)
    }

    fn selected(&self, role: CandidateRole) -> Option<ProviderId> {
        self.candidates
            .iter()
            .find(|candidate| candidate.role == role && candidate.decision == Decision::Selected)
            .map(|candidate| candidate.provider)
    }
}

/// Selection failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("no primary provider available for market '{market}' (tried {tried})")]
    NoPrimary { market: Market, tried: String },
    #[error("secondary provider '{provider}' for market '{market}' is unavailable: {reason}")]
    SecondaryUnavailable {
        market: Market,
        provider: ProviderId,
        reason: SkipReason,
    },
}

/// Concrete collectors chosen for one reconciliation.
#[derive(Clone)]
pub struct SourcePair {
    pub primary: Arc<dyn Collector>,
    pub secondary: Arc<dyn Collector>,
}

impl std::fmt::Debug for SourcePair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourcePair")
            .field("primary", &self.primary.id())
            .field("secondary", &self.secondary.id())
            .finish()
    }
}

/// Collector registry plus selection policy.
pub struct SourceSelector {
    collectors: HashMap<ProviderId, Arc<dyn Collector>>,
    capabilities: RuntimeCapabilities,
    policy: SelectionPolicy,
}

impl SourceSelector {
    pub fn new(collectors: Vec<Arc<dyn Collector>>, capabilities: RuntimeCapabilities) -> Self {
        let collectors = collectors
            .into_iter()
            .map(|collector| (collector.id(), collector))
            .collect();
        Self {
            collectors,
            capabilities,
            policy: SelectionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Registers or replaces the collector for its provider id.
    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        self.collectors.insert(collector.id(), collector);
    }

    pub fn capabilities(&self) -> &RuntimeCapabilities {
        &self.capabilities
    }

    pub fn registered(&self) -> Vec<ProviderId> {
        let mut providers = self.collectors.keys().copied().collect::<Vec<_>>();
        providers.sort();
        providers
    }

    /// Evaluates the chain for `market` without resolving collectors.
    pub fn plan(&self, market: Market) -> SelectionPlan {
        let chain = self.policy.for_market(market);
        let mut candidates = Vec::with_capacity(chain.primary.len() + 1);
        let mut primary_taken = false;

        for provider in &chain.primary {
            let decision = if *provider == chain.secondary {
                Decision::Skipped(SkipReason::SameAsSecondary)
            } else {
                match self.skip_reason(*provider) {
                    Some(reason) => Decision::Skipped(reason),
                    None if primary_taken => Decision::Standby,
                    None => {
                        primary_taken = true;
                        Decision::Selected
                    }
                }
            };

            if let Decision::Skipped(reason) = decision {
                debug!(%market, provider = %provider, %reason, "skipping primary candidate");
            }
            candidates.push(CandidateDecision {
                provider: *provider,
                role: CandidateRole::Primary,
                decision,
            });
        }

        let secondary_decision = match self.skip_reason(chain.secondary) {
            Some(reason) => Decision::Skipped(reason),
            None => Decision::Selected,
        };
        candidates.push(CandidateDecision {
            provider: chain.secondary,
            role: CandidateRole::Secondary,
            decision: secondary_decision,
        });

        SelectionPlan { market, candidates }
    }

    /// Picks the (primary, secondary) collector pair for `market`.
    pub fn select(&self, market: Market) -> Result<SourcePair, SelectError> {
        let plan = self.plan(market);
        let chain = self.policy.for_market(market);

        let secondary_id = chain.secondary;
        let secondary = match plan.secondary().and_then(|id| self.collectors.get(&id)) {
            Some(collector) => Arc::clone(collector),
            None => {
                let reason = self
                    .skip_reason(secondary_id)
                    .unwrap_or(SkipReason::NotRegistered);
                return Err(SelectError::SecondaryUnavailable {
                    market,
                    provider: secondary_id,
                    reason,
                });
            }
        };

        let primary = plan
            .primary()
            .and_then(|id| self.collectors.get(&id))
            .map(Arc::clone)
            .ok_or_else(|| SelectError::NoPrimary {
                market,
                tried: chain
                    .primary
                    .iter()
                    .map(|provider| provider.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        debug!(
            %market,
            primary = %primary.id(),
            secondary = %secondary.id(),
            "selected provider pair"
        );
        Ok(SourcePair { primary, secondary })
    }

    fn skip_reason(&self, provider: ProviderId) -> Option<SkipReason> {
        if let Some(prerequisite) = ProviderDescriptor::of(provider).unmet(&self.capabilities) {
            return Some(prerequisite.into());
        }
        if !self.collectors.contains_key(&provider) {
            return Some(SkipReason::NotRegistered);
        }
        None
    }
}

/// Builder for creating a `SourceSelector` with the reference collectors.
///
/// ```rust,ignore
/// use crossquote_core::SourceSelectorBuilder;
///
/// // Real HTTP collectors, credentials and runtime flags from the environment
/// let selector = SourceSelectorBuilder::new().with_real_clients().build();
///
/// // Deterministic offline collectors
/// let offline = SourceSelectorBuilder::new().with_mock_mode().build();
/// ```
///
/// KIS has no reference collector; hosts register their own with
/// [`with_collector`](Self::with_collector). The vision collector is only
/// registered when a shared browser handle is supplied.
pub struct SourceSelectorBuilder {
    use_mock: bool,
    credentials: ProviderCredentials,
    serverless: bool,
    http_client: Option<Arc<dyn HttpClient>>,
    cache: CacheStore,
    browser: Option<Arc<SharedBrowser>>,
    extra: Vec<Arc<dyn Collector>>,
    policy: SelectionPolicy,
}

impl Default for SourceSelectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceSelectorBuilder {
    pub fn new() -> Self {
        Self {
            use_mock: false,
            credentials: ProviderCredentials::default(),
            serverless: false,
            http_client: None,
            cache: CacheStore::with_default_ttl(),
            browser: None,
            extra: Vec::new(),
            policy: SelectionPolicy::default(),
        }
    }

    /// Every provider answers from a deterministic `FixtureCollector`.
    pub fn with_mock_mode(mut self) -> Self {
        self.use_mock = true;
        self
    }

    /// Reads credentials and the serverless flag from environment variables.
    pub fn with_real_clients(mut self) -> Self {
        self.use_mock = false;
        self.credentials = ProviderCredentials::from_env();
        self.serverless = detect_serverless(|name| std::env::var(name).ok());
        self
    }

    pub fn with_credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_serverless(mut self, serverless: bool) -> Self {
        self.serverless = serverless;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_browser(mut self, browser: Arc<SharedBrowser>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Registers a host-provided collector, replacing any reference one.
    pub fn with_collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.extra.push(collector);
        self
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> SourceSelector {
        let capabilities = RuntimeCapabilities::from_credentials(&self.credentials, self.serverless);
        let mut collectors: Vec<Arc<dyn Collector>> = Vec::new();

        if self.use_mock {
            for provider in ProviderId::ALL {
                collectors.push(Arc::new(FixtureCollector::new(provider)));
            }
        } else {
            let http_client = self
                .http_client
                .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
            let cache = self.cache;

            collectors.push(Arc::new(
                SnapshotCollector::new(YahooSource::new(Arc::clone(&http_client)))
                    .with_cache(cache.clone()),
            ));
            collectors.push(Arc::new(
                SnapshotCollector::new(NaverSource::new(Arc::clone(&http_client)))
                    .with_cache(cache.clone()),
            ));
            collectors.push(Arc::new(
                SnapshotCollector::new(StooqSource::new(Arc::clone(&http_client)))
                    .with_cache(cache.clone()),
            ));

            if let Some(key) = &self.credentials.alphavantage_api_key {
                collectors.push(Arc::new(
                    SnapshotCollector::new(AlphaVantageSource::new(
                        Arc::clone(&http_client),
                        key.clone(),
                    ))
                    .with_cache(cache.clone()),
                ));
            }

            if let (Some(browser), Some(key)) = (&self.browser, &self.credentials.vision_api_key) {
                let reader = OpenAiScreenshotReader::new(Arc::clone(&http_client), key.clone());
                collectors.push(Arc::new(
                    SnapshotCollector::new(VisionSource::new(Arc::clone(browser), Arc::new(reader)))
                        .with_cache(cache),
                ));
            }
        }

        let mut selector = SourceSelector::new(collectors, capabilities).with_policy(self.policy);
        for collector in self.extra {
            selector.register(collector);
        }
        selector
    }
}
