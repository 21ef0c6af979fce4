use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;

use super::snapshot::{SnapshotFuture, SnapshotSource, Upstream};
use crate::browser::{BrowserError, SharedBrowser};
use crate::collector::SourceError;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::market::{classify, Market};
use crate::{ComprehensiveQuote, ProviderId, Symbol};

pub type ReadFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ComprehensiveQuote, SourceError>> + Send + 'a>>;

/// Turns a rendered quote page into a record.
pub trait ScreenshotReader: Send + Sync {
    fn read<'a>(&'a self, symbol: &'a Symbol, screenshot: &'a [u8]) -> ReadFuture<'a>;
}

/// Captures a public quote page with the shared browser and hands the
/// screenshot to a [`ScreenshotReader`].
pub struct VisionSource {
    browser: Arc<SharedBrowser>,
    reader: Arc<dyn ScreenshotReader>,
}

impl VisionSource {
    pub fn new(browser: Arc<SharedBrowser>, reader: Arc<dyn ScreenshotReader>) -> Self {
        Self { browser, reader }
    }

    pub fn page_url(symbol: &Symbol) -> String {
        match classify(symbol) {
            Market::Korea => format!(
                "https://finance.naver.com/item/main.naver?code={}",
                symbol.base_code()
            ),
            Market::Us => format!(
                "https://finance.yahoo.com/quote/{}",
                urlencoding::encode(symbol.as_str())
            ),
        }
    }
}

impl SnapshotSource for VisionSource {
    fn provider(&self) -> ProviderId {
        ProviderId::Vision
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> SnapshotFuture<'a> {
        Box::pin(async move {
            let url = Self::page_url(symbol);
            let screenshot = self.browser.capture(&url).await.map_err(|error| match error {
                BrowserError::Closed => SourceError::unavailable("vision browser has been shut down"),
                other => SourceError::unavailable(format!("vision capture of {url}: {other}")),
            })?;
            let mut quote = self.reader.read(symbol, &screenshot).await?;
            if quote.basic_info.symbol.is_none() && !quote.is_empty() {
                quote.basic_info.symbol = Some(symbol.as_str().to_owned());
            }
            Ok(quote)
        })
    }
}

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const PROMPT: &str = "Read the stock quote page in this screenshot. Reply with one JSON object \
using exactly these keys and omit any figure you cannot read: basicInfo{symbol,name,market,exchange}, \
priceData{currentPrice,previousClose,open,high,low,change,changePercent,volume,tradingValue,high52Week,low52Week}, \
valuationData{per,pbr,eps,bps,roe,dividendYield,forwardPer,forwardEps}, \
financialData{revenue,operatingIncome,netIncome,operatingMargin,netMargin,fiscalPeriod}, \
supplyDemandData{foreignOwnership,foreignNetBuy,institutionalNetBuy,individualNetBuy}, \
marketData{marketCap,sharesOutstanding,floatShares,beta}. \
Numbers are plain JSON numbers in full units (no thousands separators, no unit words); \
percentages are in percent.";

/// Vision model behind an OpenAI-compatible chat completions endpoint.
pub struct OpenAiScreenshotReader {
    upstream: Upstream,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiScreenshotReader {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Vision, http_client),
            api_key: api_key.into(),
            model: String::from(DEFAULT_MODEL),
            endpoint: String::from(CHAT_COMPLETIONS_URL),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request(&self, symbol: &Symbol, screenshot: &[u8]) -> HttpRequest {
        let body = json!({
            "model": self.model,
            "response_format": {"type": "json_object"},
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": format!("{PROMPT} Instrument: {symbol}.")},
                    {
                        "type": "image_url",
                        "image_url": {"url": format!("data:image/png;base64,{}", STANDARD.encode(screenshot))}
                    }
                ]
            }]
        });

        HttpRequest::post(&self.endpoint)
            .with_header("content-type", "application/json")
            .with_auth(&HttpAuth::BearerToken(self.api_key.clone()))
            .with_body(body.to_string())
            .with_timeout_ms(30_000)
    }
}

impl ScreenshotReader for OpenAiScreenshotReader {
    fn read<'a>(&'a self, symbol: &'a Symbol, screenshot: &'a [u8]) -> ReadFuture<'a> {
        Box::pin(async move {
            let completion: Completion = self
                .upstream
                .fetch_json(self.request(symbol, screenshot))
                .await?;
            let content = completion
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| SourceError::parse("vision model returned no content"))?;
            parse_reading(&content)
        })
    }
}

/// Accepts the reply with or without a fenced code block around it.
fn parse_reading(content: &str) -> Result<ComprehensiveQuote, SourceError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let value: serde_json::Value = serde_json::from_str(unfenced.trim())
        .map_err(|error| SourceError::parse(format!("vision reply is not json: {error}")))?;
    // Models sometimes emit null or strings for unreadable figures.
    let value = drop_non_numeric(value);
    serde_json::from_value(value)
        .map_err(|error| SourceError::parse(format!("vision reply has unexpected shape: {error}")))
}

fn drop_non_numeric(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(sections) => Value::Object(
            sections
                .into_iter()
                .map(|(name, section)| match section {
                    Value::Object(fields) => (
                        name,
                        Value::Object(
                            fields
                                .into_iter()
                                .filter(|(field, value)| keep_field(field, value))
                                .collect(),
                        ),
                    ),
                    other => (name, other),
                })
                .collect(),
        ),
        other => other,
    }
}

fn keep_field(field: &str, value: &serde_json::Value) -> bool {
    const TEXT_FIELDS: [&str; 5] = ["symbol", "name", "market", "exchange", "fiscalPeriod"];
    if TEXT_FIELDS.contains(&field) {
        value.is_string()
    } else {
        value.is_number()
    }
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}
