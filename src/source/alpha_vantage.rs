use crate::source::{parse_price, FetchError, PriceSource};
use crate::types::{PriceSeries, ProviderKind, Symbol};
use async_trait::async_trait;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

const SERIES_KEY: &str = "Time Series FX (1min)";
const CLOSE_KEY: &str = "4. close";

/// Alpha Vantage FX_INTRADAY (1min) for six-letter currency pairs such as `EURUSD`.
pub struct AlphaVantageSource {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageSource {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn intraday_url(&self, symbol: &Symbol) -> Result<url::Url, FetchError> {
        let (from, to) = split_pair(symbol)?;
        let base = format!("{}/query", self.base_url.trim_end_matches('/'));
        url::Url::parse_with_params(
            &base,
            &[
                ("function", "FX_INTRADAY"),
                ("from_symbol", from),
                ("to_symbol", to),
                ("interval", "1min"),
                ("outputsize", "compact"),
                ("apikey", self.api_key.as_str()),
            ],
        )
        .map_err(|e| FetchError::Malformed(format!("fx url: {e}")))
    }
}

#[async_trait]
impl PriceSource for AlphaVantageSource {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Forex
    }

    async fn fetch(&self, symbol: &Symbol, limit: usize) -> Result<PriceSeries, FetchError> {
        let url = self.intraday_url(symbol)?;
        // The query string carries the api key; keep it out of error messages.
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body: Value = resp.json().await.map_err(reqwest::Error::without_url)?;
        parse_fx_intraday(&body, limit)
    }
}

fn split_pair(symbol: &Symbol) -> Result<(&str, &str), FetchError> {
    let s = symbol.0.as_str();
    if s.len() != 6 || !s.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(FetchError::Malformed(format!("not a currency pair: {s}")));
    }
    Ok(s.split_at(3))
}

/// Extract the newest `limit` closes, returned oldest first.
///
/// The feed is keyed by timestamp; sorting newest-first before truncating keeps
/// the result independent of JSON object ordering.
pub fn parse_fx_intraday(body: &Value, limit: usize) -> Result<PriceSeries, FetchError> {
    let Some(series) = body.get(SERIES_KEY) else {
        // Rate limiting and bad keys come back as 200 with an explanatory field.
        for key in ["Error Message", "Note", "Information"] {
            if let Some(msg) = body.get(key).and_then(|m| m.as_str()) {
                return Err(FetchError::Upstream(msg.to_string()));
            }
        }
        return Err(FetchError::Malformed(format!("missing {SERIES_KEY:?}")));
    };
    let series = series
        .as_object()
        .ok_or_else(|| FetchError::Malformed(format!("{SERIES_KEY:?} is not an object")))?;

    let mut points = series
        .iter()
        .map(|(ts, bar)| -> Result<(String, f64), FetchError> {
            let close = bar
                .get(CLOSE_KEY)
                .ok_or_else(|| FetchError::Malformed(format!("bar {ts} missing close")))?;
            Ok((ts.clone(), parse_price(close)?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    // "YYYY-MM-DD HH:MM:SS" sorts lexicographically in time order.
    points.sort_by(|a, b| b.0.cmp(&a.0));

    let newest_first = points.into_iter().map(|(_, close)| close).collect();
    Ok(PriceSeries::from_newest_first(newest_first, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> Value {
        json!({
            "Meta Data": {"1. Information": "FX Intraday (1min) Time Series"},
            "Time Series FX (1min)": {
                "2024-03-01 12:03:00": {"1. open": "1.0800", "4. close": "1.0803"},
                "2024-03-01 12:01:00": {"1. open": "1.0800", "4. close": "1.0801"},
                "2024-03-01 12:02:00": {"1. open": "1.0800", "4. close": "1.0802"},
                "2024-03-01 12:00:00": {"1. open": "1.0800", "4. close": "1.0800"}
            }
        })
    }

    #[test]
    fn returns_oldest_first() {
        let series = parse_fx_intraday(&body(), 50).unwrap();
        assert_eq!(series.closes(), &[1.0800, 1.0801, 1.0802, 1.0803]);
    }

    #[test]
    fn keeps_newest_samples_when_limited() {
        let series = parse_fx_intraday(&body(), 2).unwrap();
        assert_eq!(series.closes(), &[1.0802, 1.0803]);
    }

    #[test]
    fn rate_limit_note_is_an_upstream_error() {
        let body = json!({"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."});
        assert!(matches!(parse_fx_intraday(&body, 50), Err(FetchError::Upstream(_))));
        assert!(matches!(parse_fx_intraday(&json!({}), 50), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn splits_currency_pairs() {
        let src = AlphaVantageSource::new(reqwest::Client::new(), DEFAULT_BASE_URL, "demo");
        let url = src.intraday_url(&Symbol("GBPUSD".into())).unwrap();
        assert!(url.as_str().contains("from_symbol=GBP&to_symbol=USD"));
        assert!(split_pair(&Symbol("BTCUSDT".into())).is_err());
    }
}
