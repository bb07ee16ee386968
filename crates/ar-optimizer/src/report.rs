//! Session reports and their on-disk artifacts.

use ar_types::{ArError, ArResult, EvaluationResult, LatencyStatistic, StrategyTag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use crate::selector::Selection;
use crate::session::SessionId;

/// Everything one session produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    /// Cube under optimization.
    pub name: String,
    pub process: Option<String>,
    /// How latency samples were collapsed during the session.
    #[serde(default)]
    pub statistic: LatencyStatistic,
    pub results: Vec<EvaluationResult>,
    pub selection: Selection,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One flattened line of the tabular report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub id: u64,
    pub mode: String,
    pub is_selected: bool,
    /// Primary query latency under the session's statistic.
    pub query_time: f64,
    /// `query_time / baseline query_time - 1`.
    pub query_ratio: f64,
    pub median_process_time: f64,
    pub process_ratio: f64,
    pub ram: f64,
    pub ram_gib: f64,
    pub dimensions: Vec<String>,
}

impl SessionReport {
    /// The result every ratio is measured against: the first baseline
    /// evaluation, or the first result when no baseline was recorded.
    pub fn baseline(&self) -> Option<&EvaluationResult> {
        self.results
            .iter()
            .find(|r| r.strategy == StrategyTag::Baseline)
            .or_else(|| self.results.first())
    }

    pub fn selected(&self) -> Option<&EvaluationResult> {
        let id = self.selection.sequence_id()?;
        self.results.iter().find(|r| r.sequence_id == id)
    }

    pub fn rows(&self) -> ArResult<Vec<ReportRow>> {
        let Some(baseline) = self.baseline() else {
            return Ok(Vec::new());
        };
        let baseline_query = baseline.primary_latency(self.statistic)?;
        let baseline_process = self.process_median(baseline);

        let mut rows = Vec::with_capacity(self.results.len());
        for result in &self.results {
            let query_time = result.primary_latency(self.statistic)?;
            let median_process_time = self.process_median(result);
            let process_ratio = if baseline_process > 0.0 {
                median_process_time / baseline_process - 1.0
            } else {
                0.0
            };
            rows.push(ReportRow {
                id: result.sequence_id,
                mode: result.strategy.label().to_string(),
                is_selected: result.is_selected,
                query_time,
                query_ratio: query_time / baseline_query - 1.0,
                median_process_time,
                process_ratio,
                ram: result.memory_bytes,
                ram_gib: result.memory_gib(),
                dimensions: result
                    .arrangement
                    .iter()
                    .map(|d| d.as_str().to_string())
                    .collect(),
            });
        }
        Ok(rows)
    }

    /// Write one header line and one line per result, creating parent
    /// directories as needed.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> ArResult<()> {
        let path = path.as_ref();
        let rows = self.rows()?;
        ensure_parent(path)?;

        let mut writer = csv::Writer::from_path(path).map_err(|e| ArError::ReportFailed {
            message: format!("Failed to create {}: {}", path.display(), e),
        })?;

        let width = rows.iter().map(|r| r.dimensions.len()).max().unwrap_or(0);
        let mut header: Vec<String> = vec![
            "ID".to_string(),
            "Mode".to_string(),
            "Is Selected".to_string(),
            format!("{} Query Time", self.statistic.label()),
            "Query Ratio".to_string(),
            "Median Process Time".to_string(),
            "Process Ratio".to_string(),
            "RAM".to_string(),
            "RAM in GB".to_string(),
        ];
        header.extend((1..=width).map(|i| format!("Dimension{i}")));
        write_record(&mut writer, &header, path)?;

        for row in &rows {
            let mut record = vec![
                row.id.to_string(),
                row.mode.clone(),
                row.is_selected.to_string(),
                row.query_time.to_string(),
                row.query_ratio.to_string(),
                row.median_process_time.to_string(),
                row.process_ratio.to_string(),
                row.ram.to_string(),
                row.ram_gib.to_string(),
            ];
            record.extend(row.dimensions.iter().cloned());
            write_record(&mut writer, &record, path)?;
        }

        writer.flush()?;
        info!(path = %path.display(), rows = rows.len(), "wrote csv report");
        Ok(())
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> ArResult<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        info!(path = %path.display(), "wrote json report");
        Ok(())
    }

    fn process_median(&self, result: &EvaluationResult) -> f64 {
        self.process
            .as_deref()
            .and_then(|process| result.median_process_time(process))
            .unwrap_or(0.0)
    }
}

fn ensure_parent(path: &Path) -> ArResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn write_record(writer: &mut csv::Writer<File>, record: &[String], path: &Path) -> ArResult<()> {
    writer
        .write_record(record)
        .map_err(|e| ArError::ReportFailed {
            message: format!("Failed to write to {}: {}", path.display(), e),
        })
}
