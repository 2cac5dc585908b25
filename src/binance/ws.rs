use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;

use super::types::{BinanceKlineEvent, CombinedStreamMessage};
use crate::event::WsConnectionStatus;
use crate::model::candle::Candle;

/// Exponential backoff for reconnection.
struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Combined kline stream for every subscribed symbol on one connection.
pub struct BinanceWsClient {
    url: String,
}

impl BinanceWsClient {
    pub fn new(ws_base_url: &str, symbols: &[String], interval: &str) -> Self {
        let streams = symbols
            .iter()
            .map(|s| format!("{}@kline_{}", s.to_ascii_lowercase(), interval))
            .collect::<Vec<_>>()
            .join("/");
        Self {
            url: format!(
                "{}/stream?streams={}",
                ws_base_url.trim_end_matches('/'),
                streams
            ),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and run the WebSocket loop with automatic reconnection.
    /// Closed candles go to `candle_tx`, connection state to `status_tx`.
    pub async fn connect_and_run(
        &self,
        candle_tx: mpsc::Sender<Candle>,
        status_tx: mpsc::Sender<WsConnectionStatus>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
            2.0,
        );
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self
                .connect_once(&candle_tx, &status_tx, &mut backoff, &mut shutdown)
                .await
            {
                Ok(()) => {
                    // Clean shutdown requested
                    let _ = status_tx.send(WsConnectionStatus::Disconnected).await;
                    break;
                }
                Err(e) => {
                    let _ = status_tx.send(WsConnectionStatus::Disconnected).await;
                    tracing::warn!(error = %e, attempt, "Kline stream error");

                    let delay = backoff.next_delay();
                    let _ = status_tx
                        .send(WsConnectionStatus::Reconnecting {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        })
                        .await;

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            tracing::info!("Shutdown during reconnect");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn connect_once(
        &self,
        candle_tx: &mpsc::Sender<Candle>,
        status_tx: &mpsc::Sender<WsConnectionStatus>,
        backoff: &mut ExponentialBackoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!(url = %self.url, "Connecting kline stream");

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(&self.url)
            .await
            .context("WebSocket connect failed")?;

        let _ = status_tx.send(WsConnectionStatus::Connected).await;
        backoff.reset();

        let (_write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            if !forward_closed_kline(&text, candle_tx).await {
                                // Core worker is gone; nothing left to feed.
                                return Ok(());
                            }
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tokio-tungstenite handles pong automatically
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(anyhow::anyhow!("WebSocket read error: {}", e));
                        }
                        None => {
                            return Err(anyhow::anyhow!("WebSocket stream ended"));
                        }
                    }
                }
                _ = shutdown.changed() => {
                    return Ok(());
                }
            }
        }
    }
}

/// Parses one combined-stream frame and forwards it if the kline is closed.
/// Returns `false` once the receiving side has been dropped.
pub async fn forward_closed_kline(text: &str, candle_tx: &mpsc::Sender<Candle>) -> bool {
    match serde_json::from_str::<CombinedStreamMessage<BinanceKlineEvent>>(text) {
        Ok(msg) if msg.data.kline.is_closed => {
            candle_tx.send(msg.data.kline.to_candle()).await.is_ok()
        }
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse WS message");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(closed: bool) -> String {
        format!(
            r#"{{"stream":"btcusdt@kline_5m","data":{{"e":"kline","E":1,"s":"BTCUSDT","k":{{"t":0,"T":299999,"s":"BTCUSDT","i":"5m","o":"1","h":"2","l":"0.5","c":"1.5","v":"10","x":{closed}}}}}}}"#
        )
    }

    #[test]
    fn stream_url_joins_lowercase_streams() {
        let client = BinanceWsClient::new(
            "wss://fstream.binance.com/",
            &["BTCUSDT".to_string(), "EthUsdt".to_string()],
            "5m",
        );
        assert_eq!(
            client.url(),
            "wss://fstream.binance.com/stream?streams=btcusdt@kline_5m/ethusdt@kline_5m"
        );
    }

    #[test]
    fn only_closed_klines_are_forwarded() {
        let (tx, mut rx) = mpsc::channel(4);
        tokio_test::block_on(async {
            assert!(forward_closed_kline(&frame(false), &tx).await);
            assert!(forward_closed_kline("not json", &tx).await);
            assert!(forward_closed_kline(&frame(true), &tx).await);
        });
        let candle = rx.try_recv().unwrap();
        assert_eq!(candle.symbol, "BTCUSDT");
        assert!((candle.close - 1.5).abs() < f64::EPSILON);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_stops_forwarding() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!tokio_test::block_on(forward_closed_kline(&frame(true), &tx)));
    }

    #[test]
    fn backoff_doubles_up_to_max_and_resets() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(4), 2.0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
