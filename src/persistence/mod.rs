//! Signal Journal
//!
//! Appends every evaluated signal to a CSV file. The summary columns make the
//! file greppable; the `payload` column carries the full JSON record so
//! downstream accuracy checks can decode it without losing any field.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::lifecycle::{Clock, TimedSignal};
use crate::risk::{PositionSizing, RiskLevels};
use crate::strategy::{MarketAnalysis, SignalResult};

const JOURNAL_FILE: &str = "signals.csv";

/// Everything produced for one symbol in one evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    pub symbol: String,
    pub interval: String,
    /// Unix ms the record was produced
    pub evaluated_at: i64,
    pub signal: SignalResult,
    #[serde(default)]
    pub adjusted_confidence: Option<f64>,
    #[serde(default)]
    pub risk: Option<RiskLevels>,
    #[serde(default)]
    pub timed: Option<TimedSignal>,
    #[serde(default)]
    pub sizing: Option<PositionSizing>,
}

impl SignalRecord {
    /// Record a fresh analysis. The clock is read once: that instant stamps
    /// the record and starts the signal's decay. Positions are sized only
    /// for BUY and SELL.
    pub fn from_analysis(
        symbol: &str,
        analysis: MarketAnalysis,
        clock: &dyn Clock,
        config: &AppConfig,
    ) -> Self {
        let timed = TimedSignal::issue(analysis.adjusted_confidence, clock, &config.lifecycle);

        let candle_age_minutes = (timed.created_at - analysis.signal.timestamp) as f64 / 60_000.0;
        if candle_age_minutes > config.lifecycle.max_life_minutes {
            warn!(
                symbol,
                candle_age_minutes,
                "Latest candle is older than the signal lifetime, data may be stale"
            );
        }

        let sizing = analysis.signal.is_actionable().then(|| {
            PositionSizing::calculate(
                config.run.capital,
                analysis.adjusted_confidence,
                analysis.signal.indicators.atr_percent,
                &config.risk,
            )
        });

        Self {
            symbol: symbol.to_string(),
            interval: config.run.interval.clone(),
            evaluated_at: timed.evaluated_at,
            adjusted_confidence: Some(analysis.adjusted_confidence),
            risk: analysis.risk,
            timed: Some(timed),
            sizing,
            signal: analysis.signal,
        }
    }
}

/// CSV row layout
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalRow {
    timestamp: i64,
    symbol: String,
    signal_type: String,
    strength: String,
    confidence: f64,
    has_conflict: bool,
    payload: String,
}

impl JournalRow {
    fn from_record(record: &SignalRecord) -> Result<Self> {
        Ok(Self {
            timestamp: record.evaluated_at,
            symbol: record.symbol.clone(),
            signal_type: record.signal.signal_type.to_string(),
            strength: record.signal.strength.to_string(),
            confidence: record.signal.confidence,
            has_conflict: record.signal.has_conflict,
            payload: serde_json::to_string(record).context("Failed to encode signal record")?,
        })
    }
}

pub struct SignalJournal {
    path: PathBuf,
    writer: Arc<AsyncRwLock<csv::Writer<std::fs::File>>>,
}

impl SignalJournal {
    /// Open (or create) the journal under `data_dir`
    pub fn new(data_dir: &str) -> Result<Self> {
        let data_dir = PathBuf::from(data_dir);
        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let path = data_dir.join(JOURNAL_FILE);
        let writer = Self::create_writer(&path)?;
        info!(path = %path.display(), "Signal journal opened");

        Ok(Self {
            path,
            writer: Arc::new(AsyncRwLock::new(writer)),
        })
    }

    fn create_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
        let file_has_data =
            path.exists() && fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context("Failed to open CSV file")?;

        let writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);

        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush
    pub async fn append(&self, record: &SignalRecord) -> Result<()> {
        let row = JournalRow::from_record(record)?;
        let mut writer = self.writer.write().await;
        writer
            .serialize(&row)
            .context("Failed to write signal record")?;
        writer.flush().context("Failed to flush signal writer")?;
        Ok(())
    }

    /// Decode every record in the journal, oldest first
    pub fn read_all(&self) -> Result<Vec<SignalRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path).context("Failed to open signal journal")?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut records = Vec::new();
        for result in reader.deserialize() {
            let row: JournalRow = result.context("Failed to deserialize journal row")?;
            let record: SignalRecord =
                serde_json::from_str(&row.payload).context("Failed to decode signal payload")?;
            records.push(record);
        }
        records.sort_by_key(|r| r.evaluated_at);
        Ok(records)
    }
}
