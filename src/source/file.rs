//! CSV candle files (`{dir}/{symbol}_{interval}.csv`)

use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::ReaderBuilder;
use std::path::PathBuf;

use super::CandleSource;
use crate::error::validate_candles;
use crate::types::Candle;

/// Reads `time,open,high,low,close,volume` rows exported by a collector
#[derive(Debug, Clone)]
pub struct CsvCandleSource {
    dir: PathBuf,
}

impl CsvCandleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str, interval: &str) -> PathBuf {
        self.dir.join(format!("{symbol}_{interval}.csv"))
    }
}

#[async_trait]
impl CandleSource for CsvCandleSource {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn fetch(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Option<Vec<Candle>>> {
        let path = self.path_for(symbol, interval);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(bytes.as_slice());

        let mut candles = Vec::new();
        for result in reader.deserialize() {
            let candle: Candle = result
                .with_context(|| format!("Failed to deserialize candle in {}", path.display()))?;
            candles.push(candle);
        }

        if candles.is_empty() {
            return Ok(None);
        }
        let start = candles.len().saturating_sub(limit);
        let candles = candles.split_off(start);

        validate_candles(&candles)
            .with_context(|| format!("Invalid candle series in {}", path.display()))?;

        Ok(Some(candles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "confluence_{tag}_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_rows(dir: &PathBuf, name: &str, rows: &[&str]) {
        let mut body = String::from("time,open,high,low,close,volume\n");
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_reads_last_rows() {
        let dir = temp_dir("csv_last");
        write_rows(
            &dir,
            "BTCUSDT_15m.csv",
            &[
                "1,100,101,99,100.5,10",
                "2,100.5,102,100,101,12",
                "3,101,103,100.5,102,9",
            ],
        );
        let source = CsvCandleSource::new(&dir);
        let candles = tokio_test::block_on(source.fetch("BTCUSDT", "15m", 2))
            .unwrap()
            .unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 2);
        assert_eq!(candles[1].close, 102.0);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = temp_dir("csv_missing");
        let source = CsvCandleSource::new(&dir);
        let result = tokio_test::block_on(source.fetch("ETHUSDT", "1h", 10)).unwrap();
        assert!(result.is_none());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_unordered_rows_rejected() {
        let dir = temp_dir("csv_unordered");
        write_rows(
            &dir,
            "BTCUSDT_15m.csv",
            &["2,100,101,99,100,10", "1,100,101,99,100,10"],
        );
        let source = CsvCandleSource::new(&dir);
        assert!(tokio_test::block_on(source.fetch("BTCUSDT", "15m", 10)).is_err());
        fs::remove_dir_all(dir).ok();
    }
}
