use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::analysis::{CandleHistory, DepthSource};
use crate::config::parse_interval_ms;
use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::depth::DepthBook;

use super::types::{parse_kline_row, BinanceApiErrorResponse, BinanceDepthResponse};

const MAX_KLINES_PER_REQUEST: usize = 1_500;
const DEPTH_LIMITS: [usize; 7] = [5, 10, 20, 50, 100, 500, 1000];

/// Public USD-M futures market data over blocking HTTP.
///
/// Must be built and called from the core worker thread, outside the tokio runtime.
pub struct BinanceRestClient {
    http: reqwest::blocking::Client,
    base_url: String,
    // Simple rate limiter: request count in current minute window
    request_count: AtomicU64,
    window_start: Mutex<Instant>,
}

impl BinanceRestClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, AppError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_count: AtomicU64::new(0),
            window_start: Mutex::new(Instant::now()),
        })
    }

    fn check_rate_limit(&self) {
        let mut start = self.window_start.lock().unwrap_or_else(|p| p.into_inner());
        if start.elapsed().as_secs() >= 60 {
            *start = Instant::now();
            self.request_count.store(0, Ordering::Relaxed);
        }
        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 1_920 {
            tracing::warn!(count, "Approaching rate limit (80% of 2400/min)");
        }
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, AppError> {
        self.check_rate_limit();
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).query(query).send()?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<BinanceApiErrorResponse>(&body) {
                return Err(AppError::BinanceApi {
                    code: err.code,
                    msg: err.msg,
                });
            }
            return Err(AppError::BinanceApi {
                code: i64::from(status.as_u16()),
                msg: body,
            });
        }
        let body = resp.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time_ms: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Candle>, AppError> {
        let mut query = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.clamp(1, MAX_KLINES_PER_REQUEST).to_string()),
        ];
        if let Some(start) = start_time_ms {
            query.push(("startTime", start.to_string()));
        }
        let rows: Vec<Vec<Value>> = self.get("/fapi/v1/klines", &query)?;
        let candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| parse_kline_row(symbol, row))
            .collect();
        if candles.len() < rows.len() {
            tracing::debug!(
                symbol,
                skipped = rows.len() - candles.len(),
                "Skipped malformed kline rows"
            );
        }
        Ok(candles)
    }

    pub fn order_book(&self, symbol: &str, levels: usize) -> Result<DepthBook, AppError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("limit", depth_limit(levels).to_string()),
        ];
        let resp: BinanceDepthResponse = self.get("/fapi/v1/depth", &query)?;
        tracing::debug!(
            symbol,
            last_update_id = resp.last_update_id,
            "Depth snapshot fetched"
        );
        Ok(resp.into_book())
    }
}

/// Smallest limit the depth endpoint accepts that covers `levels`.
pub fn depth_limit(levels: usize) -> usize {
    DEPTH_LIMITS
        .iter()
        .copied()
        .find(|l| *l >= levels)
        .unwrap_or(DEPTH_LIMITS[DEPTH_LIMITS.len() - 1])
}

impl CandleHistory for BinanceRestClient {
    fn recent_candles(
        &self,
        symbol: &str,
        lookback_ms: u64,
        interval: &str,
    ) -> Result<Vec<Candle>, AppError> {
        let interval_ms = parse_interval_ms(interval).map_err(|e| AppError::Unavailable {
            source_name: "klines",
            symbol: symbol.to_string(),
            msg: e.to_string(),
        })?;
        let limit = (lookback_ms / interval_ms).max(1) as usize;
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.klines(
            symbol,
            interval,
            Some(now_ms.saturating_sub(lookback_ms)),
            limit,
        )
    }
}

impl DepthSource for BinanceRestClient {
    fn depth(&self, symbol: &str, levels: usize) -> Result<DepthBook, AppError> {
        self.order_book(symbol, levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_limit_rounds_up_to_accepted_value() {
        assert_eq!(depth_limit(1), 5);
        assert_eq!(depth_limit(100), 100);
        assert_eq!(depth_limit(101), 500);
        assert_eq!(depth_limit(5_000), 1000);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = BinanceRestClient::new("https://fapi.binance.com/", 1_000).unwrap();
        assert_eq!(client.base_url, "https://fapi.binance.com");
    }
}
