//! CSV and JSON exports of pipeline results.

use hobart_optimizer::Portfolio;
use hobart_risk::RiskReport;
use hobart_scoring::RegionCandidates;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty" | "pretty-json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

fn write_csv<F>(fill: F) -> Result<String, ExportError>
where
    F: FnOnce(&mut csv::Writer<Vec<u8>>) -> Result<(), ExportError>,
{
    let mut wtr = csv::Writer::from_writer(vec![]);
    fill(&mut wtr)?;
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

fn to_json<T: Serialize + ?Sized>(value: &T, format: ExportFormat) -> Result<String, ExportError> {
    Ok(match format {
        ExportFormat::PrettyJson => serde_json::to_string_pretty(value)?,
        _ => serde_json::to_string(value)?,
    })
}

/// Row in the portfolio CSV.
#[derive(Debug, Serialize)]
struct HoldingRecord<'a> {
    ticker: &'a str,
    region: &'a str,
    weight: f64,
}

impl Exporter for Portfolio {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut output = String::new();
                output.push_str(&format!("# As of: {}\n", self.as_of));
                output.push_str(&format!("# Notes: {}\n", self.notes));

                output.push_str(&write_csv(|wtr| {
                    for w in &self.weights {
                        wtr.serialize(HoldingRecord {
                            ticker: &w.ticker,
                            region: &w.region,
                            weight: w.weight,
                        })?;
                    }
                    wtr.serialize(HoldingRecord {
                        ticker: "CASH",
                        region: "-",
                        weight: self.cash_weight,
                    })?;
                    Ok(())
                })?);
                Ok(output)
            }
            ExportFormat::Json | ExportFormat::PrettyJson => to_json(self, format),
        }
    }
}

/// Flattened risk metric for CSV export.
#[derive(Debug, Serialize)]
struct RiskRecord<'a> {
    metric: &'a str,
    ticker: &'a str,
    other: &'a str,
    value: f64,
}

impl Exporter for RiskReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => write_csv(|wtr| {
                let m = &self.metrics;
                for (ticker, value) in &m.volatility {
                    wtr.serialize(RiskRecord { metric: "volatility", ticker, other: "", value: *value })?;
                }
                for (ticker, value) in &m.max_drawdown {
                    wtr.serialize(RiskRecord { metric: "max_drawdown", ticker, other: "", value: *value })?;
                }
                for (metric, matrix) in [("covariance", &m.covariance), ("correlation", &m.correlation)] {
                    for (ticker, row) in matrix {
                        for (other, value) in row {
                            wtr.serialize(RiskRecord { metric, ticker, other, value: *value })?;
                        }
                    }
                }
                Ok(())
            }),
            ExportFormat::Json | ExportFormat::PrettyJson => to_json(self, format),
        }
    }
}

/// Row in the candidates CSV.
#[derive(Debug, Serialize)]
struct CandidateRecord<'a> {
    rank: usize,
    ticker: &'a str,
    name: &'a str,
    score_overall: f64,
    fundamental: f64,
    technical: f64,
    quality: f64,
    news: f64,
    growth: f64,
    thesis: &'a str,
}

impl Exporter for RegionCandidates {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => write_csv(|wtr| {
                for (i, c) in self.candidates.iter().enumerate() {
                    wtr.serialize(CandidateRecord {
                        rank: i + 1,
                        ticker: &c.ticker,
                        name: &c.name,
                        score_overall: c.score,
                        fundamental: c.breakdown.fundamental,
                        technical: c.breakdown.technical,
                        quality: c.breakdown.quality,
                        news: c.breakdown.news,
                        growth: c.breakdown.growth,
                        thesis: &c.thesis,
                    })?;
                }
                Ok(())
            }),
            ExportFormat::Json | ExportFormat::PrettyJson => to_json(self, format),
        }
    }
}
