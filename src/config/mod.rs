//! Configuration management for the confluence engine
//!
//! Loads from optional YAML/TOML files + environment variables via .env.
//! Every engine section is also usable on its own through `Default`, which
//! carries the reference constants.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub confluence: ConfluenceConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
    #[serde(default)]
    pub levels: LevelsConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Everything the pure engine needs, without the runner sections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub indicators: IndicatorConfig,
    pub confluence: ConfluenceConfig,
    pub volume: VolumeConfig,
    pub levels: LevelsConfig,
    pub risk: RiskConfig,
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// RSI period
    pub rsi_period: usize,
    /// MACD fast EMA period
    pub macd_fast: usize,
    /// MACD slow EMA period
    pub macd_slow: usize,
    /// MACD signal EMA period
    pub macd_signal: usize,
    /// Minimum closes before MACD is reported
    pub macd_min_closes: usize,
    /// Bollinger Bands period
    pub bb_period: usize,
    /// Bollinger Bands standard deviation multiplier
    pub bb_std_dev: f64,
    /// ATR period
    pub atr_period: usize,
    /// ADX period
    pub adx_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 3,
            macd_slow: 10,
            macd_signal: 9,
            macd_min_closes: 26,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            adx_period: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceConfig {
    /// Minimum candles for a full confluence analysis
    pub min_candles: usize,
    /// Hard floor for BUY/SELL classification
    pub min_confidence: f64,
    /// Score at which a directional signal becomes STRONG
    pub strong_confidence: f64,
    /// Bars used for the short-term momentum reading
    pub momentum_lookback: usize,
    /// Momentum (%) beyond which the momentum rule votes
    pub momentum_threshold_pct: f64,
    /// Momentum (%) at or below which a volume spike is ambiguous
    pub flat_momentum_pct: f64,
    /// Bars used for the local high/low range position
    pub range_lookback: usize,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            min_candles: 50,
            min_confidence: 70.0,
            strong_confidence: 80.0,
            momentum_lookback: 5,
            momentum_threshold_pct: 1.2,
            flat_momentum_pct: 0.1,
            range_lookback: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Volumes ranked against the current one
    pub lookback: usize,
    /// Percentile rank at or above which volume is a spike
    pub spike_percentile: f64,
    /// Percentile rank at or below which volume is dry
    pub dry_percentile: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            lookback: 40,
            spike_percentile: 80.0,
            dry_percentile: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelsConfig {
    /// Candles scanned for swing points
    pub lookback: usize,
    /// Bars on each side a swing point must exceed
    pub swing_window: usize,
    /// Merge tolerance (%) against a zone's running average
    pub zone_tolerance_pct: f64,
    /// Distance (%) that counts as "near" a zone
    pub proximity_pct: f64,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            lookback: 100,
            swing_window: 2,
            zone_tolerance_pct: 0.5,
            proximity_pct: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Stop distance in ATRs
    pub stop_loss_atr: f64,
    /// First target in ATRs
    pub take_profit_atr: f64,
    /// Second target in ATRs
    pub take_profit2_atr: f64,
    /// Third target in ATRs
    pub take_profit3_atr: f64,
    /// ATR substitute as % of price when ATR is unavailable
    pub fallback_atr_pct: f64,
    /// Base position as % of capital before multipliers
    pub base_position_pct: f64,
    /// Position cap as % of capital
    pub max_position_pct: f64,
    /// Payoff ratio `b` for the Kelly fraction
    pub kelly_payoff: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_atr: 1.5,
            take_profit_atr: 2.5,
            take_profit2_atr: 3.75,
            take_profit3_atr: 5.0,
            fallback_atr_pct: 2.0,
            base_position_pct: 20.0,
            max_position_pct: 50.0,
            kelly_payoff: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Confidence half-life in minutes
    pub half_life_minutes: f64,
    /// Signal lifetime in minutes
    pub max_life_minutes: f64,
    /// Reference-asset bars used for correlation momentum
    pub correlation_lookback: usize,
    /// Reference momentum (%) inside which the reference is neutral
    pub correlation_neutral_pct: f64,
    /// Reference momentum (%) above which an unfavorable overlay warns
    pub correlation_warning_pct: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            half_life_minutes: 30.0,
            max_life_minutes: 120.0,
            correlation_lookback: 10,
            correlation_neutral_pct: 0.5,
            correlation_warning_pct: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Symbols evaluated per run
    pub symbols: Vec<String>,
    /// Primary candle interval
    pub interval: String,
    /// Higher timeframe interval for alignment (empty disables)
    pub higher_interval: String,
    /// Reference asset for the correlation overlay (empty disables)
    pub reference_symbol: String,
    /// Candles requested per series
    pub candle_limit: usize,
    /// Candle CSV directories, tried in order
    pub candle_dirs: Vec<String>,
    /// Directory for the signal journal
    pub journal_dir: String,
    /// Capital used for position sizing
    pub capital: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            interval: "15m".to_string(),
            higher_interval: "1h".to_string(),
            reference_symbol: "BTCUSDT".to_string(),
            candle_limit: 200,
            candle_dirs: vec!["./data/candles".to_string()],
            journal_dir: "./data".to_string(),
            capital: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human format
    pub json: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Indicator defaults
            .set_default("indicators.rsi_period", 14)?
            .set_default("indicators.macd_fast", 3)?
            .set_default("indicators.macd_slow", 10)?
            .set_default("indicators.macd_signal", 9)?
            .set_default("indicators.macd_min_closes", 26)?
            .set_default("indicators.bb_period", 20)?
            .set_default("indicators.bb_std_dev", 2.0)?
            .set_default("indicators.atr_period", 14)?
            .set_default("indicators.adx_period", 14)?
            // Confluence defaults
            .set_default("confluence.min_candles", 50)?
            .set_default("confluence.min_confidence", 70.0)?
            .set_default("confluence.strong_confidence", 80.0)?
            .set_default("confluence.momentum_lookback", 5)?
            .set_default("confluence.momentum_threshold_pct", 1.2)?
            .set_default("confluence.flat_momentum_pct", 0.1)?
            .set_default("confluence.range_lookback", 40)?
            // Volume defaults
            .set_default("volume.lookback", 40)?
            .set_default("volume.spike_percentile", 80.0)?
            .set_default("volume.dry_percentile", 20.0)?
            // Support/resistance defaults
            .set_default("levels.lookback", 100)?
            .set_default("levels.swing_window", 2)?
            .set_default("levels.zone_tolerance_pct", 0.5)?
            .set_default("levels.proximity_pct", 1.0)?
            // Risk defaults
            .set_default("risk.stop_loss_atr", 1.5)?
            .set_default("risk.take_profit_atr", 2.5)?
            .set_default("risk.take_profit2_atr", 3.75)?
            .set_default("risk.take_profit3_atr", 5.0)?
            .set_default("risk.fallback_atr_pct", 2.0)?
            .set_default("risk.base_position_pct", 20.0)?
            .set_default("risk.max_position_pct", 50.0)?
            .set_default("risk.kelly_payoff", 1.5)?
            // Lifecycle defaults
            .set_default("lifecycle.half_life_minutes", 30.0)?
            .set_default("lifecycle.max_life_minutes", 120.0)?
            .set_default("lifecycle.correlation_lookback", 10)?
            .set_default("lifecycle.correlation_neutral_pct", 0.5)?
            .set_default("lifecycle.correlation_warning_pct", 3.0)?
            // Run defaults
            .set_default("run.symbols", vec!["BTCUSDT", "ETHUSDT"])?
            .set_default("run.interval", "15m")?
            .set_default("run.higher_interval", "1h")?
            .set_default("run.reference_symbol", "BTCUSDT")?
            .set_default("run.candle_limit", 200)?
            .set_default("run.candle_dirs", vec!["./data/candles"])?
            .set_default("run.journal_dir", "./data")?
            .set_default("run.capital", 1000.0)?
            .set_default("logging.json", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (CONFLUENCE__*)
            .add_source(Environment::with_prefix("CONFLUENCE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Engine sections only
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            indicators: self.indicators.clone(),
            confluence: self.confluence.clone(),
            volume: self.volume.clone(),
            levels: self.levels.clone(),
            risk: self.risk.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }

    /// Reject values that would make the engine meaningless
    pub fn validate(&self) -> Result<()> {
        let ind = &self.indicators;
        if ind.rsi_period == 0
            || ind.macd_fast == 0
            || ind.macd_slow == 0
            || ind.macd_signal == 0
            || ind.bb_period == 0
            || ind.atr_period == 0
            || ind.adx_period == 0
        {
            bail!("indicator periods must be non-zero");
        }
        if ind.macd_fast >= ind.macd_slow {
            bail!(
                "MACD fast period ({}) must be below slow period ({})",
                ind.macd_fast,
                ind.macd_slow
            );
        }
        if self.confluence.strong_confidence < self.confluence.min_confidence {
            bail!("confluence.strong_confidence must be >= confluence.min_confidence");
        }
        if self.volume.lookback == 0 {
            bail!("volume.lookback must be non-zero");
        }
        if self.lifecycle.half_life_minutes <= 0.0 {
            bail!("lifecycle.half_life_minutes must be positive");
        }
        if self.run.symbols.is_empty() {
            bail!("run.symbols must name at least one symbol");
        }
        Ok(())
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "symbols={:?} interval={} htf={} ref={} min_conf={:.0} half_life={}m",
            self.run.symbols,
            self.run.interval,
            self.run.higher_interval,
            self.run.reference_symbol,
            self.confluence.min_confidence,
            self.lifecycle.half_life_minutes
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.confluence.min_confidence, 70.0);
        assert_eq!(config.indicators.macd_fast, 3);
        assert_eq!(config.indicators.macd_slow, 10);
    }

    #[test]
    fn test_invalid_macd_periods_rejected() {
        let mut config = AppConfig::default();
        config.indicators.macd_fast = 12;
        config.indicators.macd_slow = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_strong_below_floor_rejected() {
        let mut config = AppConfig::default();
        config.confluence.strong_confidence = 60.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_section_copy() {
        let mut config = AppConfig::default();
        config.risk.stop_loss_atr = 2.0;
        let engine = config.engine();
        assert_eq!(engine.risk.stop_loss_atr, 2.0);
        assert_eq!(engine.volume, VolumeConfig::default());
    }

    #[test]
    fn test_digest_mentions_symbols() {
        let config = AppConfig::default();
        assert!(config.digest().contains("BTCUSDT"));
    }
}
