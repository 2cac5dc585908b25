use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("binance API error (code {code}): {msg}")]
    BinanceApi { code: i64, msg: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// An analysis input could not be fetched; callers fall back to neutral values.
    #[error("{source_name} unavailable for {symbol}: {msg}")]
    Unavailable {
        source_name: &'static str,
        symbol: String,
        msg: String,
    },
}
