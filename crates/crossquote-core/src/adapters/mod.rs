mod alphavantage;
mod fixture;
mod naver;
mod snapshot;
mod stooq;
mod vision;
mod yahoo;

pub use alphavantage::AlphaVantageSource;
pub use fixture::FixtureCollector;
pub use naver::NaverSource;
pub use snapshot::{HistoryFuture, SnapshotCollector, SnapshotFuture, SnapshotSource};
pub use stooq::StooqSource;
pub use vision::{OpenAiScreenshotReader, ReadFuture, ScreenshotReader, VisionSource};
pub use yahoo::YahooSource;
