use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{ReconError, Result};
use crate::models::ReconciliationResult;
use crate::source::ResultSink;

const HEADER: [&str; 7] = ["kind", "property_id", "party", "text", "status", "amount", "date"];

/// 导出对账结果到 CSV 文件 (每条债务/税费/调整一行, 末尾附合计)
pub fn export_to_csv(
    result: &ReconciliationResult,
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use csv::Writer;
    use std::fs::File;

    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);
    writer.write_record(HEADER)?;

    for d in &result.debt {
        writer.write_record(&[
            "debt".to_string(),
            d.property_id.clone(),
            d.owner_id.clone().unwrap_or_default(),
            format!("{} {}", d.source_system, d.description).trim().to_string(),
            format!("{:?}", d.status),
            d.amount.to_string(),
            d.case_reference_date.to_string(),
        ])?;
    }
    for t in &result.tax {
        writer.write_record(&[
            "tax".to_string(),
            t.property_id.clone(),
            String::new(),
            t.category.clone(),
            String::new(),
            t.amount.to_string(),
            t.assessment_year.map(|y| y.to_string()).unwrap_or_default(),
        ])?;
    }
    for a in &result.adjustments {
        writer.write_record(&[
            "adjustment".to_string(),
            a.property_id.clone(),
            a.document_id.clone(),
            a.tax_year.map(|y| y.to_string()).unwrap_or_default(),
            String::new(),
            a.amount.to_string(),
            a.adjustment_date.to_string(),
        ])?;
    }
    writer.write_record(&[
        "sum".to_string(),
        String::new(),
        String::new(),
        "debt".to_string(),
        String::new(),
        result.debt_total.to_string(),
        String::new(),
    ])?;
    writer.write_record(&[
        "sum".to_string(),
        String::new(),
        String::new(),
        "tax".to_string(),
        String::new(),
        result.tax_total.to_string(),
        String::new(),
    ])?;

    writer.flush()?;
    Ok(())
}

/// 以 CSV 附件形式发布结果
pub struct CsvExportSink {
    dir: PathBuf,
}

impl CsvExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, result: &ReconciliationResult) -> PathBuf {
        let safe: String = result
            .request
            .correlation_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.csv", safe))
    }
}

#[async_trait]
impl ResultSink for CsvExportSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn publish(&self, result: &ReconciliationResult) -> Result<()> {
        let path = self.path_for(result);
        export_to_csv(result, &path).map_err(|e| ReconError::Publish(format!("{}: {}", path.display(), e)))?;
        tracing::info!("[{}] 结果已导出: {}", result.request.correlation_id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DebtItem, DebtStatus, Request};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn writes_one_row_per_line_plus_sums() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvExportSink::new(dir.path());

        let mut result = ReconciliationResult::new(Request::new(
            "Hovedgaden 10, 8000 Aarhus C",
            ["Anna Jensen"],
            "mail/42",
        ));
        result.debt.push(DebtItem {
            source_system: "structura".into(),
            property_id: "P1".into(),
            owner_id: Some("O1".into()),
            description: "Indefrossen grundskyld".into(),
            amount: BigDecimal::from(500),
            case_reference_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            status: DebtStatus::Frozen,
            status_date: None,
        });
        result.debt_total = BigDecimal::from(500);

        sink.publish(&result).await.unwrap();

        let path = sink.path_for(&result);
        assert!(path.ends_with("mail_42.csv"));
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("debt,P1,O1,structura Indefrossen grundskyld,Frozen,500,"));
        assert!(lines[2].starts_with("sum,,,debt,,500,"));
    }

    #[tokio::test]
    async fn missing_directory_is_a_publish_error() {
        let sink = CsvExportSink::new("/nonexistent/recon/export");
        let result = ReconciliationResult::new(Request::new("x", Vec::<String>::new(), "c1"));
        let err = sink.publish(&result).await.unwrap_err();
        assert!(matches!(err, ReconError::Publish(_)));
        assert!(!err.is_transport());
    }
}
