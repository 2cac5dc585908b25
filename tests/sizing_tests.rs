use swing_quant::config::{SizingConfig, SizingMode};
use swing_quant::model::signal::Direction;
use swing_quant::sizing::{adaptive_percentages, size, SizingBreakdown};

fn adaptive() -> SizingConfig {
    SizingConfig {
        mode: SizingMode::Adaptive,
        ..SizingConfig::default()
    }
}

#[test]
fn scenario_e_six_percent_channel() {
    let levels = size(&adaptive(), Direction::Long, 100.0, 6.0);
    assert!((levels.stop_loss - 98.2).abs() < 1e-9);
    assert!((levels.take_profit - 104.8).abs() < 1e-9);
    let SizingBreakdown::Adaptive { rr_adjusted, .. } = levels.breakdown else {
        panic!("expected adaptive breakdown");
    };
    assert!(!rr_adjusted);
    assert!((levels.breakdown.risk_reward() - 4.8 / 1.8).abs() < 1e-9);
    assert!(levels.breakdown.describe().contains("R:R 2.67"));
}

#[test]
fn narrow_channel_hits_floors_then_ratio() {
    // 1%: raw SL 0.3 -> 0.5, raw TP 0.8 -> 1.0, ratio 2.0 already fine.
    let b = adaptive_percentages(&adaptive(), 1.0);
    assert!((b.sl_percent() - 0.5).abs() < 1e-9);
    assert!((b.tp_percent() - 1.0).abs() < 1e-9);
    // 30%: SL capped at 5, TP capped at 15.
    let b = adaptive_percentages(&adaptive(), 30.0);
    assert!((b.sl_percent() - 5.0).abs() < 1e-9);
    assert!((b.tp_percent() - 15.0).abs() < 1e-9);
}

#[test]
fn every_width_stays_in_bounds() {
    for config in [
        adaptive(),
        SizingConfig {
            tp_fraction: 0.2,
            ..adaptive()
        },
        SizingConfig {
            sl_fraction: 0.9,
            tp_fraction: 0.5,
            min_risk_reward: 2.0,
            ..adaptive()
        },
    ] {
        for i in 0..=1000 {
            let width = i as f64 * 0.1;
            let b = adaptive_percentages(&config, width);
            assert!(b.sl_percent() >= config.sl_min_percent - 1e-12);
            assert!(b.sl_percent() <= config.sl_max_percent + 1e-12);
            assert!(b.tp_percent() >= config.tp_min_percent - 1e-12);
            assert!(b.tp_percent() <= config.tp_max_percent + 1e-12);
            assert!(b.risk_reward() >= config.min_risk_reward - 1e-9, "{}", b.describe());
        }
    }
}

#[test]
fn short_levels_sit_on_the_other_side() {
    let levels = size(&adaptive(), Direction::Short, 50.0, 6.0);
    assert!(levels.take_profit < 50.0);
    assert!(levels.stop_loss > 50.0);
    assert!((levels.take_profit - 50.0 * (1.0 - 0.048)).abs() < 1e-9);
}
