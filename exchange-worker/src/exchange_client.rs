// =============================================================================
// Exchange REST client (spec §4.8 "Task handling" / "Authentication")
// =============================================================================
//
// Shaped after the teacher's `binance/client.rs`: one `reqwest::Client` with
// the API key as a default header, `anyhow::Context`-chained requests, rate
// limit tracking off response headers. Signing itself is delegated to
// [`crate::signing`] rather than the teacher's inline HMAC (see DESIGN.md).
// =============================================================================

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, instrument};

use aurora_core::error::AppError;

use crate::rate_limit::RateLimitTracker;
use crate::signing::{self, SigningKeyMaterial};

const RECV_WINDOW: u64 = 5000;

// Approximate venue request weights (spec §4.8 "Rate limiting"), used to gate
// outgoing calls against `RateLimitTracker` before they're sent.
const WEIGHT_KLINES: u32 = 2;
const WEIGHT_SERVER_TIME: u32 = 1;
const WEIGHT_QUOTES: u32 = 2;
const WEIGHT_EXCHANGE_INFO: u32 = 20;
const WEIGHT_ACCOUNT: u32 = 20;

pub struct ExchangeClient {
    api_key: String,
    signing_key: Option<SigningKeyMaterial>,
    base_url: String,
    client: reqwest::Client,
    pub rate_limit: Arc<RateLimitTracker>,
}

impl ExchangeClient {
    pub fn new(api_key: impl Into<String>, signing_key: Option<SigningKeyMaterial>, base_url: impl Into<String>) -> Self {
        let api_key = api_key.into();

        let mut default_headers = HeaderMap::new();
        if let Ok(val) = HeaderValue::from_str(&api_key) {
            default_headers.insert("X-MBX-APIKEY", val);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            api_key,
            signing_key,
            base_url: base_url.into(),
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        }
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before UNIX epoch").as_millis() as u64
    }

    /// Build and sign a query string from ordered params, per spec §4.8:
    /// timestamp and recvWindow are appended, then the whole thing is signed
    /// once with the configured key, never re-ordered afterward.
    fn signed_query(&self, mut params: Vec<(String, String)>) -> Result<String> {
        let key = self.signing_key.as_ref().context("no signing key configured for private endpoint")?;
        params.push(("timestamp".to_string(), Self::timestamp_ms().to_string()));
        params.push(("recvWindow".to_string(), RECV_WINDOW.to_string()));
        let base = signing::build_query_string(&params);
        let signature = signing::sign(key, &base).map_err(|e| anyhow::anyhow!(e))?;
        Ok(format!("{base}&signature={signature}"))
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    #[instrument(skip(self), name = "exchange::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<serde_json::Value>> {
        if !self.rate_limit.can_send_request(WEIGHT_KLINES) {
            return Err(AppError::RateLimited.into());
        }
        let url = format!("{}/api/v3/klines?symbol={}&interval={}&limit={}", self.base_url, symbol, interval, limit);
        let resp = self.client.get(&url).send().await.context("GET klines failed")?;
        self.rate_limit.update_from_headers(resp.headers());
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse klines response")?;
        if !status.is_success() {
            anyhow::bail!("exchange GET klines returned {}: {}", status, body);
        }
        Ok(body.as_array().cloned().unwrap_or_default())
    }

    #[instrument(skip(self), name = "exchange::get_server_time")]
    pub async fn get_server_time(&self) -> Result<i64> {
        if !self.rate_limit.can_send_request(WEIGHT_SERVER_TIME) {
            return Err(AppError::RateLimited.into());
        }
        let url = format!("{}/api/v3/time", self.base_url);
        let resp = self.client.get(&url).send().await.context("GET server time failed")?;
        let body: serde_json::Value = resp.json().await.context("failed to parse server time response")?;
        body["serverTime"].as_i64().context("serverTime missing from response")
    }

    #[instrument(skip(self, symbols), name = "exchange::get_quotes")]
    pub async fn get_quotes(&self, symbols: &[String]) -> Result<serde_json::Value> {
        if !self.rate_limit.can_send_request(WEIGHT_QUOTES) {
            return Err(AppError::RateLimited.into());
        }
        let symbols_json = serde_json::to_string(symbols)?;
        let url = format!("{}/api/v3/ticker/price?symbols={}", self.base_url, urlencoding_minimal(&symbols_json));
        let resp = self.client.get(&url).send().await.context("GET quotes failed")?;
        self.rate_limit.update_from_headers(resp.headers());
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse quotes response")?;
        if !status.is_success() {
            anyhow::bail!("exchange GET quotes returned {}: {}", status, body);
        }
        Ok(body)
    }

    #[instrument(skip(self), name = "exchange::fetch_exchange_info")]
    pub async fn fetch_exchange_info(&self) -> Result<Vec<serde_json::Value>> {
        if !self.rate_limit.can_send_request(WEIGHT_EXCHANGE_INFO) {
            return Err(AppError::RateLimited.into());
        }
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let resp = self.client.get(&url).send().await.context("GET exchangeInfo failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse exchangeInfo response")?;
        if !status.is_success() {
            anyhow::bail!("exchange GET exchangeInfo returned {}: {}", status, body);
        }
        Ok(body["symbols"].as_array().cloned().unwrap_or_default())
    }

    // -------------------------------------------------------------------------
    // Private (signed) endpoints
    // -------------------------------------------------------------------------

    #[instrument(skip(self), name = "exchange::get_spot_account")]
    pub async fn get_spot_account(&self) -> Result<serde_json::Value> {
        let qs = self.signed_query(Vec::new())?;
        let url = format!("{}/api/v3/account?{}", self.base_url, qs);
        self.get_signed(&url).await
    }

    #[instrument(skip(self), name = "exchange::get_futures_account")]
    pub async fn get_futures_account(&self) -> Result<serde_json::Value> {
        let qs = self.signed_query(Vec::new())?;
        let url = format!("{}/fapi/v2/account?{}", self.base_url, qs);
        self.get_signed(&url).await
    }

    async fn get_signed(&self, url: &str) -> Result<serde_json::Value> {
        if !self.rate_limit.can_send_request(WEIGHT_ACCOUNT) {
            return Err(AppError::RateLimited.into());
        }
        let resp = self.client.get(url).send().await.context("signed GET request failed")?;
        self.rate_limit.update_from_headers(resp.headers());
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse signed response")?;
        if !status.is_success() {
            anyhow::bail!("exchange signed GET returned {}: {}", status, body);
        }
        debug!(api_key_prefix = &self.api_key[..self.api_key.len().min(4)], "signed request succeeded");
        Ok(body)
    }
}

/// Query params here never contain characters that need real percent
/// escaping beyond the venue's own JSON-array syntax; a full `url` crate
/// dependency isn't warranted for this one call site.
fn urlencoding_minimal(s: &str) -> String {
    s.replace('"', "%22").replace(' ', "%20")
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
