//! Volume percentile analysis
//!
//! Ranks the current volume against its own recent history instead of a
//! fixed "x% above average" rule, so thin and deep markets read the same.

use serde::{Deserialize, Serialize};

use crate::config::VolumeConfig;
use crate::types::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeProfile {
    pub current_volume: f64,
    pub average_volume: f64,
    /// Share of the sample at or below the current volume, 0-100
    pub percentile_rank: f64,
    pub is_spike: bool,
    pub is_dry: bool,
    pub sample_size: usize,
}

impl VolumeProfile {
    /// Rank the last candle's volume over the last `lookback` candles
    /// (the current one included). `None` for an empty series.
    pub fn analyze(candles: &[Candle], config: &VolumeConfig) -> Option<Self> {
        let current = candles.last()?.volume;
        let window = &candles[candles.len().saturating_sub(config.lookback.max(1))..];

        let sample_size = window.len();
        let at_or_below = window.iter().filter(|c| c.volume <= current).count();
        let percentile_rank = at_or_below as f64 / sample_size as f64 * 100.0;
        let average_volume = window.iter().map(|c| c.volume).sum::<f64>() / sample_size as f64;

        Some(Self {
            current_volume: current,
            average_volume,
            percentile_rank,
            is_spike: percentile_rank >= config.spike_percentile,
            is_dry: percentile_rank <= config.dry_percentile,
            sample_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_volumes(volumes: &[f64]) -> Vec<Candle> {
        volumes
            .iter()
            .enumerate()
            .map(|(i, v)| Candle::new(i as i64, 100.0, 101.0, 99.0, 100.0, *v))
            .collect()
    }

    #[test]
    fn test_max_volume_is_spike() {
        let volumes: Vec<f64> = (1..=40).map(|v| v as f64).collect();
        let profile = VolumeProfile::analyze(&with_volumes(&volumes), &VolumeConfig::default())
            .unwrap();
        assert_eq!(profile.percentile_rank, 100.0);
        assert!(profile.is_spike);
        assert!(!profile.is_dry);
        assert_eq!(profile.sample_size, 40);
    }

    #[test]
    fn test_min_volume_is_dry() {
        let mut volumes: Vec<f64> = (2..=40).map(|v| v as f64).collect();
        volumes.push(1.0);
        let profile = VolumeProfile::analyze(&with_volumes(&volumes), &VolumeConfig::default())
            .unwrap();
        assert!((profile.percentile_rank - 2.5).abs() < 1e-12);
        assert!(profile.is_dry);
        assert!(!profile.is_spike);
    }

    #[test]
    fn test_only_lookback_window_counts() {
        // 60 candles: an old huge volume falls outside the 40-bar window
        let mut volumes = vec![1_000_000.0];
        volumes.extend((1..=59).map(|v| v as f64));
        let profile = VolumeProfile::analyze(&with_volumes(&volumes), &VolumeConfig::default())
            .unwrap();
        assert_eq!(profile.percentile_rank, 100.0);
    }

    #[test]
    fn test_flat_volume_ranks_full() {
        let profile = VolumeProfile::analyze(&with_volumes(&[5.0; 40]), &VolumeConfig::default())
            .unwrap();
        assert_eq!(profile.percentile_rank, 100.0);
        assert_eq!(profile.average_volume, 5.0);
    }

    #[test]
    fn test_empty_series() {
        assert!(VolumeProfile::analyze(&[], &VolumeConfig::default()).is_none());
    }
}
