//! OKX market-data provider.
//!
//! Fetches candles from the public v5 REST API (`/api/v5/market/candles`).
//! Responses are cached by request key before parsing; transport failures
//! are retried with a linear backoff (`backoff * attempt`).
//!
//! Candle rows arrive newest first as arrays of strings:
//! `[ts, open, high, low, close, vol, volCcy, volCcyQuote, confirm]`.

use super::cache::ResponseCache;
use super::provider::{CandleProvider, DataError};
use crate::domain::{normalize, Candle};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CANDLES_PATH: &str = "/api/v5/market/candles";

/// Connection settings for the OKX REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OkxSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub backoff_secs: f64,
}

impl Default for OkxSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.okx.com".to_string(),
            timeout_secs: 15,
            retries: 3,
            backoff_secs: 0.7,
        }
    }
}

/// OKX candle provider.
pub struct OkxClient {
    client: reqwest::blocking::Client,
    settings: OkxSettings,
    cache: ResponseCache,
    cache_only: bool,
}

impl OkxClient {
    pub fn new(settings: OkxSettings, cache: ResponseCache) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            settings,
            cache,
            cache_only: false,
        })
    }

    /// Serve from the cache only; a miss is an error instead of a request.
    pub fn cache_only(mut self, cache_only: bool) -> Self {
        self.cache_only = cache_only;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// GET `path` with query `params`, through the cache.
    fn get_json(&self, path: &str, params: &BTreeMap<&str, Value>) -> Result<Value, DataError> {
        let url = format!("{}{path}", self.settings.base_url.trim_end_matches('/'));
        let key = request_key(&url, params);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        if self.cache_only {
            return Err(DataError::Cache(format!(
                "no fresh cached response for {key} (offline)"
            )));
        }

        let query: Vec<(&str, String)> = params
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => (*k, s.clone()),
                other => (*k, other.to_string()),
            })
            .collect();

        let mut attempt = 0u32;
        loop {
            match self.send_once(&url, &query) {
                Ok(body) => {
                    check_api_code(&body)?;
                    if let Err(e) = self.cache.set(&key, &body) {
                        warn!(error = %e, "failed to cache response");
                    }
                    return Ok(body);
                }
                Err(e) if e.is_transient() && attempt < self.settings.retries => {
                    attempt += 1;
                    let delay = Duration::from_secs_f64(
                        (self.settings.backoff_secs * f64::from(attempt)).max(0.0),
                    );
                    warn!(url = %url, attempt, error = %e, delay_ms = delay.as_millis() as u64, "request failed, retrying");
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn send_once(&self, url: &str, query: &[(&str, String)]) -> Result<Value, DataError> {
        debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| DataError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Network(format!("HTTP {status} for {url}")));
        }

        resp.json::<Value>()
            .map_err(|e| DataError::ResponseFormat(format!("failed to parse response from {url}: {e}")))
    }
}

impl CandleProvider for OkxClient {
    fn name(&self) -> &str {
        "okx"
    }

    fn fetch_candles(&self, inst: &str, bar: &str, limit: usize) -> Result<Vec<Candle>, DataError> {
        let params = BTreeMap::from([
            ("instId", json!(inst)),
            ("bar", json!(bar)),
            ("limit", json!(limit)),
        ]);
        let body = self.get_json(CANDLES_PATH, &params)?;
        let candles = parse_candles(inst, bar, &body)?;
        info!(inst, bar, count = candles.len(), "fetched candles");
        Ok(candles)
    }
}

/// Cache key: `url?{params as JSON with sorted keys}`.
pub fn request_key(url: &str, params: &BTreeMap<&str, Value>) -> String {
    let params = serde_json::to_string(params).unwrap_or_default();
    format!("{url}?{params}")
}

fn check_api_code(body: &Value) -> Result<(), DataError> {
    match body.get("code").and_then(Value::as_str) {
        None | Some("0") => Ok(()),
        Some(code) => Err(DataError::Api {
            code: code.to_string(),
            message: body
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
    }
}

/// Parse a candles response body into an ascending, de-duplicated series.
///
/// Unparseable price or volume fields become NaN. An unparseable timestamp
/// is a format error.
pub fn parse_candles(inst: &str, bar: &str, body: &Value) -> Result<Vec<Candle>, DataError> {
    check_api_code(body)?;
    let rows = match body.get("data") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(rows)) => rows.as_slice(),
        Some(other) => {
            return Err(DataError::ResponseFormat(format!(
                "expected data array, got {other}"
            )))
        }
    };

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = row
            .as_array()
            .ok_or_else(|| DataError::ResponseFormat(format!("candle row is not an array: {row}")))?;
        if fields.len() < 6 {
            return Err(DataError::ResponseFormat(format!(
                "candle row has {} fields, expected at least 6",
                fields.len()
            )));
        }

        let ts_ms = field_str(&fields[0])
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| DataError::ResponseFormat(format!("invalid timestamp: {}", fields[0])))?;
        let timestamp = DateTime::from_timestamp_millis(ts_ms)
            .ok_or_else(|| DataError::ResponseFormat(format!("timestamp out of range: {ts_ms}")))?;

        candles.push(Candle {
            timestamp,
            open: field_f64(&fields[1]),
            high: field_f64(&fields[2]),
            low: field_f64(&fields[3]),
            close: field_f64(&fields[4]),
            volume: field_f64(&fields[5]),
        });
    }

    if candles.is_empty() {
        return Err(DataError::NoCandles {
            inst: inst.to_string(),
            bar: bar.to_string(),
        });
    }

    Ok(normalize(candles))
}

fn field_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_f64(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}
