use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};

use swing_quant::binance::rest::BinanceRestClient;
use swing_quant::binance::ws::BinanceWsClient;
use swing_quant::config::Config;
use swing_quant::event::{CoreEvent, WsConnectionStatus};
use swing_quant::model::candle::Candle;
use swing_quant::runtime::Pipeline;

const CANDLE_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set SWING_QUANT_CONFIG or create config/default.toml");
            std::process::exit(1);
        }
    };

    let log_file = std::fs::File::create(&config.logging.file)
        .with_context(|| format!("failed to create log file {}", config.logging.file))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    let symbols = config.binance.subscribed_symbols();
    tracing::info!(
        symbols = ?symbols,
        reference = %config.binance.reference_symbol,
        interval = %config.binance.kline_interval,
        mode = ?config.pattern.mode,
        sizing = ?config.sizing.mode,
        "Starting swing-quant"
    );

    let (candle_tx, candle_rx) = mpsc::channel::<Candle>(CANDLE_CHANNEL_CAPACITY);
    let (status_tx, mut status_rx) = mpsc::channel::<WsConnectionStatus>(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let core_config = config.clone();
    let core = std::thread::Builder::new()
        .name("swing-core".to_string())
        .spawn(move || run_core(core_config, candle_rx))
        .context("failed to spawn core worker")?;

    let ws_client = BinanceWsClient::new(
        &config.binance.ws_base_url,
        &symbols,
        &config.binance.kline_interval,
    );
    let ws_task = tokio::spawn(async move {
        if let Err(e) = ws_client
            .connect_and_run(candle_tx, status_tx, shutdown_rx)
            .await
        {
            tracing::error!(error = %e, "Kline stream task failed");
        }
    });

    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            match status {
                WsConnectionStatus::Connected => tracing::info!("Kline stream connected"),
                WsConnectionStatus::Disconnected => tracing::warn!("Kline stream disconnected"),
                WsConnectionStatus::Reconnecting { attempt, delay_ms } => {
                    tracing::info!(attempt, delay_ms, "Kline stream reconnecting")
                }
            }
        }
    });

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("Ctrl+C received");
    let _ = shutdown_tx.send(true);

    // The stream task owns the only candle sender; its exit ends the core loop.
    ws_task.await.ok();
    match tokio::task::spawn_blocking(move || core.join()).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Core worker failed"),
        Ok(Err(_)) | Err(_) => tracing::error!("Core worker panicked"),
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Single consumer of closed candles: every per-symbol map is touched only here.
fn run_core(config: Config, mut candle_rx: mpsc::Receiver<Candle>) -> Result<()> {
    let rest = Arc::new(
        BinanceRestClient::new(
            &config.binance.rest_base_url,
            config.binance.request_timeout_ms,
        )
        .context("failed to build REST client")?,
    );
    let mut pipeline = Pipeline::new(&config, rest.clone(), rest.clone());
    tracing::info!(routed = ?pipeline.router().symbols(), "Core worker started");

    let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    for symbol in config.binance.subscribed_symbols() {
        match rest.klines(
            &symbol,
            &config.binance.kline_interval,
            None,
            config.pattern.candle_buffer_len + 1,
        ) {
            Ok(candles) => {
                // The newest row is the interval still in progress.
                let closed = candles.into_iter().filter(|c| c.close_time < now_ms);
                let count = pipeline.warm_up(closed);
                tracing::info!(symbol = %symbol, count, "Warmed up from historical klines");
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Warm-up fetch failed, starting cold");
            }
        }
    }

    while let Some(candle) = candle_rx.blocking_recv() {
        for event in pipeline.on_closed_candle(candle) {
            log_event(&event);
        }
    }
    let stats = pipeline.engine().stats();
    tracing::info!(
        closed = stats.closed_trades,
        win_rate = stats.win_rate_percent,
        total_pnl_usdt = stats.total_pnl_usdt,
        "Core worker stopped"
    );
    Ok(())
}

fn log_event(event: &CoreEvent) {
    match event {
        CoreEvent::PatternCompleted(pattern) => tracing::info!(
            symbol = pattern.symbol(),
            kind = pattern.kind_label(),
            shape = pattern.shape_label(),
            width_percent = pattern.width_percent(),
            "Pattern completed"
        ),
        CoreEvent::PatternAbandoned { symbol, reason } => {
            tracing::debug!(symbol = %symbol, reason = %reason, "Pattern abandoned")
        }
        CoreEvent::SignalAccepted(signal) => tracing::info!(
            symbol = %signal.symbol,
            direction = %signal.direction,
            entry = signal.entry_price,
            take_profit = signal.take_profit,
            stop_loss = signal.stop_loss,
            confirmed = signal.confirmation.overall_confirmed,
            passed = ?signal.confirmation.passed_sources(),
            reason = %signal.reason,
            "Signal accepted"
        ),
        CoreEvent::SignalRejected(rejection) => tracing::info!(
            symbol = %rejection.symbol,
            kind = rejection.pattern_kind,
            direction = ?rejection.direction,
            reason = %rejection.reason,
            "Signal rejected"
        ),
        CoreEvent::PositionOpened(pos) => tracing::info!(
            id = %pos.id,
            symbol = %pos.symbol,
            direction = %pos.direction,
            entry = pos.entry_price,
            take_profit = pos.take_profit,
            stop_loss = pos.stop_loss,
            "Position opened"
        ),
        CoreEvent::OpenRejected { signal, rejection } => tracing::warn!(
            symbol = %signal.symbol,
            direction = %signal.direction,
            reason = %rejection,
            "Position open rejected"
        ),
        CoreEvent::PositionClosed(pos) => tracing::info!(
            id = %pos.id,
            symbol = %pos.symbol,
            reason = pos.close_reason.map(|r| r.as_str()).unwrap_or("unknown"),
            exit = pos.current_price,
            pnl_percent = pos.realized_pnl_percent.unwrap_or(0.0),
            pnl_usdt = pos.realized_pnl_usdt().unwrap_or(0.0),
            "Position closed"
        ),
        CoreEvent::StatsSnapshot {
            at_ms,
            stats,
            open_positions,
        } => tracing::info!(
            at_ms,
            open_positions,
            total = stats.total_trades,
            closed = stats.closed_trades,
            wins = stats.win_trades,
            losses = stats.loss_trades,
            win_rate = stats.win_rate_percent,
            avg_pnl_percent = stats.average_pnl_percent,
            total_pnl_usdt = stats.total_pnl_usdt,
            "Stats snapshot"
        ),
    }
}
