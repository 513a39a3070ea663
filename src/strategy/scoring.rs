//! Weighted scoring
//!
//! Alternative aggregation over tagged contributions. The weight table is an
//! immutable value handed to the scorer, so alternate schemes can be swapped
//! in without touching any shared state. The confluence engine itself does
//! not depend on this module.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::rules::Contribution;

/// Weight applied to tags missing from the table
const UNKNOWN_WEIGHT: f64 = 1.0;
const UNKNOWN_RELIABILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorWeight {
    pub weight: f64,
    /// Historical hit rate, 0-1
    pub reliability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedEntry {
    pub tag: String,
    pub raw_score: f64,
    pub weight: f64,
    pub reliability: f64,
    pub weighted_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedScore {
    pub entries: Vec<WeightedEntry>,
    pub total_weighted: f64,
    pub total_weight: f64,
    /// min(100, (sum weighted / sum weight) * (sum weighted / 50)), at least 0
    pub normalized: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    weights: HashMap<String, IndicatorWeight>,
}

impl WeightTable {
    pub fn new(weights: HashMap<String, IndicatorWeight>) -> Self {
        Self { weights }
    }

    pub fn get(&self, tag: &str) -> IndicatorWeight {
        self.weights.get(tag).copied().unwrap_or(IndicatorWeight {
            weight: UNKNOWN_WEIGHT,
            reliability: UNKNOWN_RELIABILITY,
        })
    }

    /// New table with one tag replaced
    pub fn with(mut self, tag: &str, weight: f64, reliability: f64) -> Self {
        self.weights.insert(
            tag.to_string(),
            IndicatorWeight {
                weight,
                reliability,
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Score `(tag, raw_score)` pairs
    pub fn score<S: AsRef<str>>(&self, inputs: &[(S, f64)]) -> WeightedScore {
        let entries: Vec<WeightedEntry> = inputs
            .iter()
            .map(|(tag, raw)| {
                let w = self.get(tag.as_ref());
                WeightedEntry {
                    tag: tag.as_ref().to_string(),
                    raw_score: *raw,
                    weight: w.weight,
                    reliability: w.reliability,
                    weighted_score: raw * w.weight,
                }
            })
            .collect();

        let total_weighted: f64 = entries.iter().map(|e| e.weighted_score).sum();
        let total_weight: f64 = entries.iter().map(|e| e.weight).sum();

        let normalized = if total_weight > 0.0 {
            ((total_weighted / total_weight) * (total_weighted / 50.0)).clamp(0.0, 100.0)
        } else {
            0.0
        };

        WeightedScore {
            entries,
            total_weighted,
            total_weight,
            normalized,
        }
    }

    /// Score the positive contributions of a signal, aggregated per tag
    pub fn score_contributions(&self, contributions: &[Contribution]) -> WeightedScore {
        let mut by_tag: Vec<(String, f64)> = Vec::new();
        for c in contributions.iter().filter(|c| c.points > 0.0) {
            match by_tag.iter_mut().find(|(tag, _)| *tag == c.tag) {
                Some((_, points)) => *points += c.points,
                None => by_tag.push((c.tag.clone(), c.points)),
            }
        }
        self.score(&by_tag)
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        let table = [
            ("RSI_OVERSOLD", 1.2, 0.65),
            ("RSI_OVERBOUGHT", 1.2, 0.65),
            ("RSI_APPROACHING_OVERSOLD", 0.8, 0.55),
            ("RSI_APPROACHING_OVERBOUGHT", 0.8, 0.55),
            ("MACD_BULLISH", 1.1, 0.60),
            ("MACD_BEARISH", 1.1, 0.60),
            ("BB_LOWER_BOUNCE", 1.3, 0.68),
            ("BB_UPPER_REJECTION", 1.3, 0.68),
            ("BB_LOWER_BREAKDOWN", 0.9, 0.55),
            ("BB_UPPER_BREAKOUT", 0.9, 0.55),
            ("BB_LOWER_ZONE", 0.7, 0.55),
            ("BB_UPPER_ZONE", 0.7, 0.55),
            ("EMA_ALIGNMENT_BULLISH", 1.0, 0.62),
            ("EMA_ALIGNMENT_BEARISH", 1.0, 0.62),
            ("EMA9_CROSS_UP", 0.9, 0.58),
            ("EMA9_CROSS_DOWN", 0.9, 0.58),
            ("VOLUME_SPIKE", 1.1, 0.60),
            ("MOMENTUM_UP", 0.7, 0.52),
            ("MOMENTUM_DOWN", 0.7, 0.52),
            ("RANGE_LOW", 0.6, 0.52),
            ("RANGE_HIGH", 0.6, 0.52),
            ("TIMEFRAME_ALIGNED", 1.2, 0.66),
        ];
        Self::new(
            table
                .into_iter()
                .map(|(tag, weight, reliability)| {
                    (
                        tag.to_string(),
                        IndicatorWeight {
                            weight,
                            reliability,
                        },
                    )
                })
                .collect(),
        )
    }
}
