//! Candle sources
//!
//! The engine never fetches data itself; it is handed a ready, validated
//! series. Sources return `Ok(None)` when a series is unavailable so callers
//! can treat it as "no signal this cycle" and retry on the next one.

mod file;

pub use file::CsvCandleSource;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::types::Candle;

/// Trait for candle providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Latest `limit` candles for `symbol` on `interval`, ascending by time
    async fn fetch(&self, symbol: &str, interval: &str, limit: usize)
        -> Result<Option<Vec<Candle>>>;
}

/// Tries each source in order and returns the first non-empty series
pub struct FallbackSource {
    sources: Vec<Box<dyn CandleSource>>,
}

impl FallbackSource {
    pub fn new(sources: Vec<Box<dyn CandleSource>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl CandleSource for FallbackSource {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn fetch(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Option<Vec<Candle>>> {
        for source in &self.sources {
            match source.fetch(symbol, interval, limit).await {
                Ok(Some(candles)) if !candles.is_empty() => {
                    debug!(
                        source = source.name(),
                        symbol,
                        interval,
                        count = candles.len(),
                        "Candles fetched"
                    );
                    return Ok(Some(candles));
                }
                Ok(_) => {
                    warn!(source = source.name(), symbol, interval, "Candles unavailable");
                }
                Err(e) => {
                    warn!(source = source.name(), symbol, interval, error = %e, "Candle fetch failed");
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64, 100.0, 101.0, 99.0, 100.0, 10.0))
            .collect()
    }

    fn mock(name: &'static str, result: fn() -> Result<Option<Vec<Candle>>>) -> MockCandleSource {
        let mut source = MockCandleSource::new();
        source.expect_name().return_const(name);
        source
            .expect_fetch()
            .times(1)
            .returning(move |_, _, _| result());
        source
    }

    #[test]
    fn test_first_success_wins() {
        let primary = mock("primary", || Ok(Some(candles(3))));
        let mut secondary = MockCandleSource::new();
        secondary.expect_fetch().never();

        let fallback = FallbackSource::new(vec![Box::new(primary), Box::new(secondary)]);
        let result = tokio_test::block_on(fallback.fetch("BTCUSDT", "15m", 100)).unwrap();
        assert_eq!(result.unwrap().len(), 3);
    }

    #[test]
    fn test_falls_through_errors_and_empty() {
        let failing = mock("failing", || Err(anyhow::anyhow!("timeout")));
        let empty = mock("empty", || Ok(Some(Vec::new())));
        let working = mock("working", || Ok(Some(candles(5))));

        let fallback =
            FallbackSource::new(vec![Box::new(failing), Box::new(empty), Box::new(working)]);
        let result = tokio_test::block_on(fallback.fetch("BTCUSDT", "15m", 100)).unwrap();
        assert_eq!(result.unwrap().len(), 5);
    }

    #[test]
    fn test_all_unavailable_is_none() {
        let a = mock("a", || Ok(None));
        let b = mock("b", || Err(anyhow::anyhow!("down")));
        let fallback = FallbackSource::new(vec![Box::new(a), Box::new(b)]);
        let result = tokio_test::block_on(fallback.fetch("BTCUSDT", "15m", 100)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_fallback() {
        let fallback = FallbackSource::new(Vec::new());
        assert!(fallback.is_empty());
        let result = tokio_test::block_on(fallback.fetch("BTCUSDT", "15m", 100)).unwrap();
        assert!(result.is_none());
    }
}
