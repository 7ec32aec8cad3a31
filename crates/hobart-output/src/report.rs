//! Markdown weekly report.

use hobart_data::TextGenerator;
use hobart_optimizer::Portfolio;
use hobart_scoring::RegionCandidates;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Formatting error.
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Candidates per region shown in the highlights.
pub const DEFAULT_TOP_PER_REGION: usize = 3;

/// Holdings listed in the generation prompt.
const PROMPT_HOLDINGS: usize = 30;

const SYSTEM_PROMPT: &str = "You are the chair of a portfolio committee. Write a clear, factual \
Markdown report and avoid speculation.";

/// A rendered weekly report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Markdown body
    pub markdown: String,
    /// Whether the body came from a text generator
    pub generated: bool,
}

impl Report {
    /// Write the Markdown to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &self.markdown)?;
        Ok(())
    }
}

fn percent(weight: f64) -> String {
    format!("{:.2}%", weight * 100.0)
}

/// Builder for the weekly report.
#[derive(Debug)]
pub struct ReportBuilder<'a> {
    portfolio: &'a Portfolio,
    candidates: &'a [RegionCandidates],
    top_per_region: usize,
}

impl<'a> ReportBuilder<'a> {
    /// Start a report for `portfolio`.
    pub const fn new(portfolio: &'a Portfolio) -> Self {
        Self {
            portfolio,
            candidates: &[],
            top_per_region: DEFAULT_TOP_PER_REGION,
        }
    }

    /// Set the region candidate lists to highlight.
    pub const fn candidates(mut self, candidates: &'a [RegionCandidates]) -> Self {
        self.candidates = candidates;
        self
    }

    /// Set how many candidates are listed per region.
    pub const fn top_per_region(mut self, n: usize) -> Self {
        self.top_per_region = n;
        self
    }

    /// Render the fixed template.
    pub fn render_template(&self) -> Result<String, ReportError> {
        let p = self.portfolio;
        let mut md = String::new();

        writeln!(md, "# Weekly report ({})", p.as_of)?;
        writeln!(md)?;
        writeln!(md, "## Summary")?;
        writeln!(
            md,
            "- Allocation: {} positions, {} invested, {} cash",
            p.weights.len(),
            percent(p.invested()),
            percent(p.cash_weight)
        )?;
        if !p.notes.is_empty() {
            writeln!(md, "- Method: {}", p.notes)?;
        }
        writeln!(md)?;

        writeln!(md, "## Regional highlights")?;
        for blob in self.candidates {
            writeln!(md, "### {}", blob.region)?;
            for c in blob.candidates.iter().take(self.top_per_region) {
                writeln!(md, "- {}: {} (score={:.2})", c.ticker, c.thesis, c.score)?;
            }
            writeln!(md)?;
        }

        writeln!(md, "## Final portfolio")?;
        writeln!(md, "ticker | region | weight")?;
        writeln!(md, ":--|:--:|--:")?;
        for w in &p.weights {
            writeln!(md, "{} | {} | {}", w.ticker, w.region, percent(w.weight))?;
        }
        write!(md, "Cash | - | {}", percent(p.cash_weight))?;

        Ok(md)
    }

    /// Prompt handed to a text generator.
    pub fn prompt(&self) -> Result<String, ReportError> {
        let p = self.portfolio;
        let mut prompt = String::new();

        writeln!(prompt, "Portfolio as of {}:", p.as_of)?;
        for w in p.weights.iter().take(PROMPT_HOLDINGS) {
            writeln!(prompt, "- {} ({}): {}", w.ticker, w.region, percent(w.weight))?;
        }
        writeln!(prompt, "- Cash: {}", percent(p.cash_weight))?;
        writeln!(prompt)?;
        writeln!(prompt, "Candidates:")?;
        for blob in self.candidates {
            writeln!(prompt, "[{}] top", blob.region)?;
            for c in blob.candidates.iter().take(self.top_per_region) {
                writeln!(prompt, "- {}: score={:.2}, thesis={}", c.ticker, c.score, c.thesis)?;
            }
        }
        writeln!(prompt)?;
        write!(
            prompt,
            "Write Markdown with three sections: 1. Summary 2. Regional highlights \
             3. Final portfolio (table)."
        )?;

        Ok(prompt)
    }

    /// Render the template report.
    pub fn build(&self) -> Result<Report, ReportError> {
        Ok(Report {
            markdown: self.render_template()?,
            generated: false,
        })
    }

    /// Render with `generator` when it is available, falling back to the template
    /// when it is not, when it fails or when it returns only whitespace.
    pub async fn build_with(&self, generator: &dyn TextGenerator) -> Result<Report, ReportError> {
        if !generator.is_available() {
            tracing::debug!("text generator unavailable; using report template");
            return self.build();
        }

        match generator.generate(SYSTEM_PROMPT, &self.prompt()?).await {
            Ok(text) if !text.trim().is_empty() => Ok(Report {
                markdown: text,
                generated: true,
            }),
            Ok(_) => {
                tracing::warn!("text generator returned an empty report; using template");
                self.build()
            }
            Err(e) => {
                tracing::warn!(error = %e, "report generation failed; using template");
                self.build()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hobart_optimizer::{Constraints, PortfolioWeight};
    use hobart_scoring::Candidate;

    fn portfolio() -> Portfolio {
        let mut p = Portfolio::all_cash(
            NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(),
            &Constraints::default(),
            "mean-variance (synthetic returns)",
        );
        p.weights = vec![PortfolioWeight {
            ticker: "AAPL".into(),
            region: "US".into(),
            weight: 0.07,
        }];
        p.cash_weight = 0.93;
        p
    }

    #[test]
    fn test_template_sections() {
        let mut c = Candidate::new("AAPL", "US", 0.8312);
        c.thesis = "Strong cash generation.".into();
        let blobs = vec![RegionCandidates::new("US", "2024-06-07", vec![c])];
        let p = portfolio();

        let md = ReportBuilder::new(&p).candidates(&blobs).render_template().unwrap();
        assert!(md.starts_with("# Weekly report (2024-06-07)"));
        assert!(md.contains("- Method: mean-variance (synthetic returns)"));
        assert!(md.contains("### US\n- AAPL: Strong cash generation. (score=0.83)"));
        assert!(md.contains("AAPL | US | 7.00%"));
        assert!(md.ends_with("Cash | - | 93.00%"));
    }

    #[test]
    fn test_top_per_region_limit() {
        let candidates = (0..5)
            .map(|i| Candidate::new(format!("T{i}"), "JP", 1.0 - i as f64 / 10.0))
            .collect();
        let blobs = vec![RegionCandidates::new("JP", "2024-06-07", candidates)];
        let p = portfolio();

        let md = ReportBuilder::new(&p).candidates(&blobs).top_per_region(2).render_template().unwrap();
        assert!(md.contains("- T1:"));
        assert!(!md.contains("- T2:"));
    }

    #[test]
    fn test_prompt_lists_cash() {
        let p = portfolio();
        let prompt = ReportBuilder::new(&p).prompt().unwrap();
        assert!(prompt.contains("- AAPL (US): 7.00%"));
        assert!(prompt.contains("- Cash: 93.00%"));
    }
}
