//! # Crossquote Core
//!
//! Two-provider quote reconciliation for home-market (KRX) and foreign
//! listings.
//!
//! ## Overview
//!
//! For one instrument identifier the engine:
//!
//! 1. classifies the market (six-digit codes are home market),
//! 2. selects a primary provider from a fallback chain and a fixed secondary,
//! 3. collects both records concurrently, each bounded by a timeout,
//! 4. reconciles every field against a category tolerance,
//! 5. classifies the agreement and scores confidence.
//!
//! [`ReconcileEngine::indicators`] separately computes RSI, moving averages
//! and disparity from the selected providers' daily history.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Reference collectors (fixture, Yahoo, Naver, Alpha Vantage, Stooq, vision) |
//! | [`batch`] | Sequential multi-identifier runs |
//! | [`browser`] | Shared browser handle with explicit shutdown |
//! | [`cache`] | TTL snapshot cache keyed by provider, market and symbol |
//! | [`collector`] | Collector contract and outcomes |
//! | [`config`] | Tolerances, scoring policy and timeouts |
//! | [`domain`] | Symbol, quote record and timestamps |
//! | [`envelope`] | Machine-readable output envelope |
//! | [`fields`] | Qualified field names |
//! | [`indicators`] | RSI, moving averages and disparity over daily bars |
//! | [`market`] | Market classification |
//! | [`parallel`] | Concurrent two-provider collection |
//! | [`pipeline`] | Single-instrument engine and validated record |
//! | [`reconcile`] | Field reconciler |
//! | [`scoring`] | Status classifier and confidence |
//! | [`selector`] | Provider chains and runtime capabilities |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crossquote_core::{ReconcileConfig, ReconcileEngine, SourceSelectorBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let selector = SourceSelectorBuilder::new().with_real_clients().build();
//!     let engine = ReconcileEngine::new(selector, ReconcileConfig::default())?;
//!
//!     let record = engine.reconcile("005930").await?;
//!     println!("{} {:.2}", record.validation.status, record.validation.confidence);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Security
//!
//! - Provider keys are read from environment variables only and never logged
//! - HTTP requests go through the [`HttpClient`] seam (reqwest by default)

pub mod adapters;
pub mod batch;
pub mod browser;
pub mod cache;
pub mod circuit_breaker;
pub mod collector;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod http_client;
pub mod indicators;
pub mod market;
pub mod parallel;
pub mod pipeline;
pub mod provider_policy;
pub mod reconcile;
pub mod scoring;
pub mod selector;
pub mod source;
pub mod throttling;

pub use adapters::{
    AlphaVantageSource, FixtureCollector, HistoryFuture, NaverSource, OpenAiScreenshotReader,
    ScreenshotReader, SnapshotCollector, SnapshotSource, StooqSource, VisionSource, YahooSource,
};
pub use batch::{BatchFailure, BatchOrchestrator, BatchReport};
pub use browser::{BrowserError, BrowserLauncher, BrowserSession, SharedBrowser};
pub use cache::{CacheKey, CacheStore};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use collector::{CollectFuture, Collector, CollectorOutcome, SourceError, SourceErrorKind};
pub use config::{BaseScores, ReconcileConfig, ScoringPolicy, ToleranceBands};
pub use domain::{
    BasicInfo, ComprehensiveQuote, FinancialData, MarketData, PriceData, SupplyDemandData, Symbol,
    UtcDateTime, ValuationData,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};
pub use error::{CoreError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use indicators::{MovingAverages, PriceBar, TechnicalSnapshot};
pub use market::Market;
pub use parallel::{CollectedPair, ParallelCollector, TotalFailure};
pub use pipeline::{ReconcileEngine, ReconcileError, SourceReport, ValidatedRecord};
pub use provider_policy::{BackoffPolicy, ProviderPolicy};
pub use reconcile::{FieldTag, Reconciliation};
pub use scoring::{ValidationResult, ValidationStatus};
pub use selector::{
    Credential, ProviderCredentials, RuntimeCapabilities, SelectError, SelectionPlan,
    SelectionPolicy, SourcePair, SourceSelector, SourceSelectorBuilder,
};
pub use source::{Provenance, ProviderId};
pub use throttling::ThrottlingQueue;
