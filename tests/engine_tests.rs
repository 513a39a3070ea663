//! Integration tests for the confluence engine public API

#[cfg(test)]
mod tests {
    use confluence::config::{AppConfig, ConfluenceConfig, EngineConfig, LifecycleConfig, RiskConfig, VolumeConfig};
    use confluence::features::{self, AdaptiveThresholds, VolatilityLevel, VolumeProfile};
    use confluence::lifecycle::{FixedClock, TimedSignal};
    use confluence::risk::{PositionSizing, RiskLevels};
    use confluence::source::{CandleSource, CsvCandleSource, FallbackSource};
    use confluence::strategy::{classify, ConfluenceEngine, Side, WeightTable};
    use confluence::types::{Candle, Direction, SignalStrength, SignalType};
    use confluence::{validate_candles, CandleError};

    fn make_candle(i: usize, close: f64, volume: f64) -> Candle {
        Candle::new(
            1_700_000_000_000 + i as i64 * 900_000,
            close,
            close * 1.004,
            close * 0.996,
            close,
            volume,
        )
    }

    fn trending(n: usize, step: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| make_candle(i, 100.0 + step * i as f64, 1000.0))
            .collect()
    }

    fn choppy(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                let close = 100.0 + 3.0 * (x / 5.0).sin() + 1.5 * (x / 2.3).cos();
                make_candle(i, close, 800.0 + 200.0 * (x / 3.0).sin().abs())
            })
            .collect()
    }

    // ============================================================================
    // Engine contract
    // ============================================================================

    #[test]
    fn test_short_series_yields_no_signal() {
        let engine = ConfluenceEngine::default();
        for n in [0, 1, 20, 49] {
            assert!(engine.generate(&choppy(n), None).is_none(), "n = {n}");
        }
    }

    #[test]
    fn test_output_is_deterministic() {
        let engine = ConfluenceEngine::default();
        let candles = choppy(200);
        let snapshot = candles.clone();

        let first = serde_json::to_vec(&engine.generate(&candles, None)).unwrap();
        let second = serde_json::to_vec(&engine.generate(&candles, None)).unwrap();
        assert_eq!(first, second);
        assert_eq!(candles, snapshot);
    }

    #[test]
    fn test_conflict_in_accelerating_decline() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| make_candle(i, 200.0 - 0.02 * (i * i) as f64, 1000.0))
            .collect();
        let result = ConfluenceEngine::default().generate(&candles, None).unwrap();

        assert!(result.indicators.rsi < 30.0);
        assert!(result.has_conflict);
        let reason = result.conflict_reason.as_deref().unwrap();
        assert!(reason.contains("bearish") && reason.contains("downtrend"));
        assert!(result
            .contributions
            .iter()
            .any(|c| c.side == Side::Buy && c.points < 0.0));
    }

    #[test]
    fn test_directional_signals_respect_floor() {
        let engine = ConfluenceEngine::default();
        for candles in [choppy(200), trending(120, 0.8), trending(120, -0.8)] {
            let result = engine.generate(&candles, None).unwrap();
            assert!((0.0..=100.0).contains(&result.buy_score));
            assert!((0.0..=100.0).contains(&result.sell_score));
            match result.signal_type {
                SignalType::Hold => assert_eq!(result.strength, SignalStrength::Weak),
                _ => {
                    assert!(result.confidence >= 70.0);
                    assert_ne!(result.strength, SignalStrength::Weak);
                }
            }
            assert!(result.message.starts_with(&format!(
                "{} {}",
                result.strength, result.signal_type
            )));
        }
    }

    #[test]
    fn test_sixty_five_forty_is_hold() {
        let (signal, strength, confidence) = classify(65.0, 40.0, &ConfluenceConfig::default());
        assert_eq!(signal, SignalType::Hold);
        assert_eq!(strength, SignalStrength::Weak);
        assert_eq!(confidence, 65.0);
    }

    #[test]
    fn test_raised_floor_from_config() {
        let config = EngineConfig {
            confluence: ConfluenceConfig {
                min_confidence: 101.0,
                strong_confidence: 101.0,
                ..ConfluenceConfig::default()
            },
            ..EngineConfig::default()
        };
        let engine = ConfluenceEngine::new(config);
        for candles in [choppy(200), trending(120, 0.8)] {
            let result = engine.generate(&candles, None).unwrap();
            assert_eq!(result.signal_type, SignalType::Hold);
        }
    }

    #[test]
    fn test_analysis_risk_only_for_directional_signals() {
        let engine = ConfluenceEngine::default();
        let higher = trending(60, 2.0);
        let reference = trending(40, 0.5);
        for candles in [choppy(200), trending(120, 0.8)] {
            let analysis = engine
                .analyze(&candles, Some(higher.as_slice()), Some(reference.as_slice()))
                .unwrap();
            assert_eq!(analysis.risk.is_some(), analysis.signal.is_actionable());
            if let Some(risk) = analysis.risk {
                assert_eq!(risk.entry_price, analysis.signal.indicators.close);
            }
        }
    }

    // ============================================================================
    // Indicators and classifiers
    // ============================================================================

    #[test]
    fn test_rsi_extremes() {
        let up: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let down: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        assert_eq!(features::rsi(&up, 14), Some(100.0));
        assert_eq!(features::rsi(&down, 14), Some(0.0));
        assert_eq!(features::rsi(&up[..14], 14), None);
    }

    #[test]
    fn test_volatility_buckets() {
        let cases = [(1.0, 32.0, 68.0), (2.2, 35.0, 65.0), (3.5, 30.0, 70.0), (6.0, 25.0, 75.0)];
        for (atr_pct, oversold, overbought) in cases {
            let t = AdaptiveThresholds::from_atr_percent(Some(atr_pct));
            assert_eq!((t.oversold, t.overbought), (oversold, overbought));
        }
        assert_eq!(
            AdaptiveThresholds::from_atr_percent(None).volatility_level,
            VolatilityLevel::Normal
        );
    }

    #[test]
    fn test_volume_spike_on_max() {
        let candles: Vec<Candle> = (0..40).map(|i| make_candle(i, 100.0, 10.0 + i as f64)).collect();
        let profile = VolumeProfile::analyze(&candles, &VolumeConfig::default()).unwrap();
        assert_eq!(profile.percentile_rank, 100.0);
        assert!(profile.is_spike);
        assert!(!profile.is_dry);
    }

    // ============================================================================
    // Risk and lifecycle
    // ============================================================================

    #[test]
    fn test_risk_levels_long() {
        let levels = RiskLevels::calculate(100.0, Direction::Long, Some(2.0), &RiskConfig::default());
        assert!((levels.stop_loss - 97.0).abs() < 1e-9);
        assert!((levels.take_profit - 105.0).abs() < 1e-9);
        assert!((levels.risk_reward_ratio - 5.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_sizing_reports_both_caps() {
        let sizing = PositionSizing::calculate(10_000.0, 90.0, Some(2.0), &RiskConfig::default());
        assert!(sizing.position_pct <= 50.0);
        assert!(sizing.kelly.half_kelly_pct <= 50.0);
        assert!(sizing.kelly.half_kelly_pct > 0.0);
    }

    #[test]
    fn test_time_decay_round_trip() {
        let created = 1_700_000_000_000;
        let config = LifecycleConfig::default();

        let at_half_life =
            TimedSignal::evaluate_with(80.0, created, &FixedClock(created + 30 * 60_000), &config);
        assert!((at_half_life.current_confidence - 40.0).abs() <= 0.5);

        let expired =
            TimedSignal::evaluate_with(80.0, created, &FixedClock(created + 121 * 60_000), &config);
        assert!(expired.is_expired);
        assert_eq!(expired.current_confidence, 0.0);
    }

    // ============================================================================
    // Scoring, validation, config
    // ============================================================================

    #[test]
    fn test_weighted_rescoring_of_signal() {
        let result = ConfluenceEngine::default()
            .generate(&choppy(200), None)
            .unwrap();
        let score = WeightTable::default().score_contributions(&result.contributions);
        assert!((0.0..=100.0).contains(&score.normalized));
    }

    #[test]
    fn test_validation_rejects_malformed_series() {
        assert_eq!(validate_candles(&[]), Err(CandleError::Empty));

        let mut candles = trending(5, 1.0);
        assert!(validate_candles(&candles).is_ok());
        candles.swap(1, 2);
        assert!(matches!(
            validate_candles(&candles),
            Err(CandleError::NonAscending { index: 2, .. })
        ));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine(), EngineConfig::default());
    }

    // ============================================================================
    // Candle sources
    // ============================================================================

    #[tokio::test]
    async fn test_fallback_across_csv_directories() {
        let base = std::env::temp_dir().join(format!(
            "confluence_it_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let empty_dir = base.join("primary");
        let full_dir = base.join("secondary");
        std::fs::create_dir_all(&empty_dir).unwrap();
        std::fs::create_dir_all(&full_dir).unwrap();

        let mut body = String::from("time,open,high,low,close,volume\n");
        for c in choppy(120) {
            body.push_str(&format!(
                "{},{},{},{},{},{}\n",
                c.time, c.open, c.high, c.low, c.close, c.volume
            ));
        }
        std::fs::write(full_dir.join("SOLUSDT_15m.csv"), body).unwrap();

        let source = FallbackSource::new(vec![
            Box::new(CsvCandleSource::new(&empty_dir)),
            Box::new(CsvCandleSource::new(&full_dir)),
        ]);
        let candles = source.fetch("SOLUSDT", "15m", 100).await.unwrap().unwrap();
        assert_eq!(candles.len(), 100);
        assert!(ConfluenceEngine::default().generate(&candles, None).is_some());

        assert!(source.fetch("DOGEUSDT", "15m", 100).await.unwrap().is_none());
        std::fs::remove_dir_all(base).ok();
    }
}
