use std::sync::Arc;

use serde::Deserialize;

use super::snapshot::{parse_figure, text, SnapshotFuture, SnapshotSource, Upstream};
use crate::collector::SourceError;
use crate::http_client::{HttpClient, HttpRequest};
use crate::market::{classify, Market};
use crate::{BasicInfo, ComprehensiveQuote, PriceData, ProviderId, Symbol};

/// Stooq delayed quote CSV. Keyless, price figures only.
pub struct StooqSource {
    upstream: Upstream,
}

impl StooqSource {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Stooq, http_client),
        }
    }

    /// Stooq ticker for a foreign listing, e.g. `brk.b.us`.
    pub fn ticker(symbol: &Symbol) -> String {
        format!("{}.us", symbol.as_str().to_ascii_lowercase())
    }
}

impl SnapshotSource for StooqSource {
    fn provider(&self) -> ProviderId {
        ProviderId::Stooq
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> SnapshotFuture<'a> {
        Box::pin(async move {
            if classify(symbol) != Market::Us {
                return Err(SourceError::invalid_request(format!(
                    "stooq does not carry home-market listings, got {symbol}"
                )));
            }

            let endpoint = format!(
                "https://stooq.com/q/l/?s={}&f=sd2t2ohlcvn&h&e=csv",
                urlencoding::encode(&Self::ticker(symbol))
            );
            let body = self.upstream.fetch_text(HttpRequest::get(endpoint)).await?;
            let quote = normalize(symbol, parse_row(&body)?);
            // Unknown tickers come back as a row of N/D.
            if quote.price_data == PriceData::default() {
                return Err(SourceError::not_found(format!("stooq has no quote for {symbol}")));
            }
            Ok(quote)
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Row {
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
    name: String,
}

fn parse_row(body: &str) -> Result<Row, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    match reader.deserialize::<Row>().next() {
        Some(Ok(row)) => Ok(row),
        Some(Err(error)) => Err(SourceError::parse(format!("stooq csv row: {error}"))),
        None => Err(SourceError::parse("stooq csv body empty")),
    }
}

fn normalize(symbol: &Symbol, row: Row) -> ComprehensiveQuote {
    ComprehensiveQuote {
        basic_info: BasicInfo {
            symbol: Some(symbol.as_str().to_owned()),
            name: text(Some(row.name.as_str())).filter(|name| name != "N/D"),
            ..BasicInfo::default()
        },
        price_data: PriceData {
            current_price: parse_figure(&row.close),
            open: parse_figure(&row.open),
            high: parse_figure(&row.high),
            low: parse_figure(&row.low),
            volume: parse_figure(&row.volume),
            ..PriceData::default()
        },
        ..ComprehensiveQuote::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::SourceErrorKind;
    use crate::http_client::ScriptedHttpClient;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).expect("valid symbol")
    }

    #[test]
    fn tickers_are_lowercase_with_market_suffix() {
        assert_eq!(StooqSource::ticker(&symbol("AAPL")), "aapl.us");
    }

    #[tokio::test]
    async fn parses_quote_row() {
        let client = Arc::new(ScriptedHttpClient::new().route(
            "s=aapl.us",
            200,
            "Symbol,Date,Time,Open,High,Low,Close,Volume,Name\r\n\
             AAPL.US,2024-11-08,22:00:11,227.17,228.66,226.405,226.96,38328824,APPLE\r\n",
        ));
        let source = StooqSource::new(client);

        let quote = source.fetch(&symbol("AAPL")).await.expect("row parses");

        assert_eq!(quote.price_data.current_price, Some(226.96));
        assert_eq!(quote.price_data.low, Some(226.405));
        assert_eq!(quote.price_data.volume, Some(38_328_824.0));
        assert_eq!(quote.basic_info.name.as_deref(), Some("APPLE"));
        assert_eq!(quote.valuation_data.per, None);
    }

    #[tokio::test]
    async fn unknown_ticker_is_not_found() {
        let client = Arc::new(ScriptedHttpClient::new().route(
            "s=zzzz.us",
            200,
            "Symbol,Date,Time,Open,High,Low,Close,Volume,Name\nZZZZ.US,N/D,N/D,N/D,N/D,N/D,N/D,N/D,N/D\n",
        ));
        let source = StooqSource::new(client);

        let error = source.fetch(&symbol("ZZZZ")).await.expect_err("all N/D");

        assert_eq!(error.kind(), SourceErrorKind::NotFound);
    }

    #[tokio::test]
    async fn empty_body_is_a_parse_error() {
        let client = Arc::new(ScriptedHttpClient::new().route("s=msft.us", 200, ""));
        let source = StooqSource::new(client);

        let error = source.fetch(&symbol("MSFT")).await.expect_err("no rows");

        assert_eq!(error.kind(), SourceErrorKind::Parse);
        assert!(error.message().contains("csv body empty"));
    }

    #[tokio::test]
    async fn rejects_home_market_codes() {
        let source = StooqSource::new(Arc::new(ScriptedHttpClient::new()));

        let error = source.fetch(&symbol("005930")).await.expect_err("not carried");

        assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
    }
}
