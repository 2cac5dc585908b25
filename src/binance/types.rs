use serde::Deserialize;
use serde_json::Value;

use crate::model::candle::Candle;
use crate::model::depth::{DepthBook, DepthLevel};

/// Deserialize Binance string-encoded numbers to f64.
pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

/// Envelope of the combined-stream endpoint (`/stream?streams=a/b`).
#[derive(Debug, Deserialize)]
pub struct CombinedStreamMessage<T> {
    pub stream: String,
    pub data: T,
}

/// Binance kline stream event (symbol@kline_<interval>).
#[derive(Debug, Deserialize)]
pub struct BinanceKlineEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: BinanceKline,
}

#[derive(Debug, Deserialize)]
pub struct BinanceKline {
    #[serde(rename = "t")]
    pub open_time: u64,
    #[serde(rename = "T")]
    pub close_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o", deserialize_with = "string_to_f64")]
    pub open: f64,
    #[serde(rename = "h", deserialize_with = "string_to_f64")]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "string_to_f64")]
    pub low: f64,
    #[serde(rename = "c", deserialize_with = "string_to_f64")]
    pub close: f64,
    #[serde(rename = "v", deserialize_with = "string_to_f64")]
    pub volume: f64,
    /// Set on the final update of the interval.
    #[serde(rename = "x")]
    pub is_closed: bool,
}

impl BinanceKline {
    pub fn to_candle(&self) -> Candle {
        Candle {
            symbol: self.symbol.to_ascii_uppercase(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            open_time: self.open_time,
            close_time: self.close_time,
        }
    }
}

/// One row of GET /fapi/v1/klines:
/// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
pub fn parse_kline_row(symbol: &str, row: &[Value]) -> Option<Candle> {
    let num = |i: usize| -> Option<f64> {
        match row.get(i)? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    };
    Some(Candle {
        symbol: symbol.to_string(),
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
        open_time: row.first()?.as_u64()?,
        close_time: row.get(6)?.as_u64()?,
    })
}

#[derive(Debug, Deserialize)]
pub struct RawDepthLevel(
    #[serde(deserialize_with = "string_to_f64")] pub f64,
    #[serde(deserialize_with = "string_to_f64")] pub f64,
);

/// GET /fapi/v1/depth response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceDepthResponse {
    pub last_update_id: u64,
    pub bids: Vec<RawDepthLevel>,
    pub asks: Vec<RawDepthLevel>,
}

impl BinanceDepthResponse {
    pub fn into_book(self) -> DepthBook {
        let levels = |raw: Vec<RawDepthLevel>| {
            raw.into_iter()
                .map(|RawDepthLevel(price, qty)| DepthLevel { price, qty })
                .collect()
        };
        DepthBook {
            bids: levels(self.bids),
            asks: levels(self.asks),
        }
    }
}

/// Binance API error response.
#[derive(Debug, Deserialize)]
pub struct BinanceApiErrorResponse {
    pub code: i64,
    pub msg: String,
}
