//! File exports and generated reports

use async_trait::async_trait;
use chrono::NaiveDate;
use hobart_data::{DataError, DisabledTextGenerator, TextGenerator};
use hobart_optimizer::{Constraints, Portfolio};
use hobart_output::{ExportFormat, Exporter, ReportBuilder};
use hobart_risk::RiskReport;
use ndarray::array;

#[derive(Debug)]
struct Canned(Option<&'static str>);

#[async_trait]
impl TextGenerator for Canned {
    fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, _system: &str, prompt: &str) -> hobart_data::Result<String> {
        assert!(prompt.contains("Cash"));
        self.0
            .map(str::to_string)
            .ok_or_else(|| DataError::Unavailable("offline".to_string()))
    }
}

fn portfolio() -> Portfolio {
    let constraints = Constraints::builder()
        .position_limit(0.5)
        .cash_bounds(0.0, 0.2)
        .build()
        .unwrap();
    Portfolio::from_weights(
        NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(),
        &["AAPL".to_string(), "7203.T".to_string()],
        &["US".to_string(), "JP".to_string()],
        &array![0.45, 0.4],
        &constraints,
        "mean-variance (historical returns)",
    )
}

#[test]
fn test_exports_land_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let p = portfolio();

    let json_path = dir.path().join("out/portfolio_20240607.json");
    p.export_to_file(&json_path, ExportFormat::PrettyJson).unwrap();
    let back: Portfolio = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(back, p);
    assert!((back.invested() + back.cash_weight - 1.0).abs() < 1e-6);

    let csv_path = dir.path().join("portfolio.csv");
    p.export_to_file(&csv_path, ExportFormat::Csv).unwrap();
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert!(csv.contains("CASH,-,0.15"));

    let risk_path = dir.path().join("risk.json");
    RiskReport::default().export_to_file(&risk_path, ExportFormat::Json).unwrap();
    assert_eq!(std::fs::read_to_string(&risk_path).unwrap(), r#"{"metrics":{}}"#);
}

#[tokio::test]
async fn test_generated_report_preferred() {
    let p = portfolio();
    let report = ReportBuilder::new(&p)
        .build_with(&Canned(Some("# Generated")))
        .await
        .unwrap();
    assert!(report.generated);
    assert_eq!(report.markdown, "# Generated");
}

#[tokio::test]
async fn test_template_when_generator_unusable() {
    let p = portfolio();

    for generator in [Canned(Some("   \n")), Canned(None)] {
        let report = ReportBuilder::new(&p).build_with(&generator).await.unwrap();
        assert!(!report.generated);
        assert!(report.markdown.starts_with("# Weekly report (2024-06-07)"));
    }

    let report = ReportBuilder::new(&p).build_with(&DisabledTextGenerator).await.unwrap();
    assert!(!report.generated);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports/report_20240607.md");
    report.write_to(&path).unwrap();
    assert!(std::fs::read_to_string(&path).unwrap().contains("Cash | - | 15.00%"));
}
