use std::path::Path;

use swing_quant::config::{parse_interval_ms, Config, PatternMode, SizingMode};
use swing_quant::model::signal::{ConfirmationSource, SourceRole};

#[test]
fn shipped_default_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.binance.reference_symbol, "BTCUSDT");
    assert_eq!(
        config.binance.subscribed_symbols(),
        vec!["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT"]
    );
    assert_eq!(config.pattern.mode, PatternMode::Sideways);
    assert_eq!(config.sizing.mode, SizingMode::Fixed);
    assert_eq!(config.confirmation.order_flow, SourceRole::Advisory);
    assert!(config.confirmation.fail_closed_sources.is_empty());
    assert_eq!(config.binance.kline_interval_ms().unwrap(), 300_000);
}

#[test]
fn partial_toml_keeps_remaining_defaults() {
    let toml_str = r#"
[binance]
symbols = ["dogeusdt", "DOGEUSDT", " btcusdt "]
kline_interval = "15m"

[pattern]
mode = "trend"

[confirmation]
order_flow = "critical"
regime = "disabled"
fail_closed_sources = ["volume_profile"]

[sizing]
mode = "adaptive"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    config.validate().unwrap();
    assert_eq!(config.binance.subscribed_symbols(), vec!["BTCUSDT", "DOGEUSDT"]);
    assert_eq!(config.pattern.mode, PatternMode::Trend);
    assert_eq!(config.pattern.lookback, 3);
    assert_eq!(config.confirmation.role(ConfirmationSource::OrderFlow), SourceRole::Critical);
    assert_eq!(config.confirmation.role(ConfirmationSource::Regime), SourceRole::Disabled);
    assert!(config.confirmation.fails_closed(ConfirmationSource::VolumeProfile));
    assert!(!config.confirmation.fails_closed(ConfirmationSource::OrderFlow));
    assert_eq!(config.sizing.mode, SizingMode::Adaptive);
    assert!((config.sizing.min_risk_reward - 1.5).abs() < f64::EPSILON);
    assert!((config.position.taker_fee_rate - 0.0005).abs() < f64::EPSILON);
}

#[test]
fn invalid_file_is_rejected_with_context() {
    let path = std::env::temp_dir().join(format!("swing-quant-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, "[pattern]\nlookback = 0\n").unwrap();
    let err = Config::load_from(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(format!("{err:#}").contains("pattern.lookback"));

    let missing = Config::load_from(Path::new("/nonexistent/swing-quant.toml")).unwrap_err();
    assert!(format!("{missing:#}").contains("failed to read"));
}

#[test]
fn unreachable_risk_reward_is_rejected() {
    let config: Config = toml::from_str(
        r#"
[sizing]
sl_min_percent = 5.0
sl_max_percent = 5.0
tp_max_percent = 6.0
min_risk_reward = 1.5
"#,
    )
    .unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn interval_parsing() {
    assert_eq!(parse_interval_ms("1s").unwrap(), 1_000);
    assert_eq!(parse_interval_ms("4h").unwrap(), 14_400_000);
    assert_eq!(parse_interval_ms("1M").unwrap(), 2_592_000_000);
    assert!(parse_interval_ms("0m").is_err());
    assert!(parse_interval_ms("m").is_err());
    assert!(parse_interval_ms("5x").is_err());
}
