use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{AdjustmentReport, TaxAdjustment};
use crate::source::ArchiveLookup;

/// 档案库 (税费变更报告)
pub struct PgArchive {
    pool: PgPool,
}

impl PgArchive {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 报告是否已入库 (按报告日期 + 年度)
    pub async fn is_report_stored(&self, report_date: NaiveDate, tax_year: Option<i32>) -> Result<bool> {
        let cnt = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT count(*)
            FROM t_recon_adjustment_report
            WHERE freportdate = $1
              AND ftaxyear IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(report_date)
        .bind(tax_year)
        .fetch_one(&self.pool)
        .await?;
        Ok(cnt > 0)
    }

    /// 写入一份报告及其物业清单
    ///
    /// 与已入库报告冲突 (同一 documentId, 或同一报告日期 + 年度) 时不写入, 返回 false。
    /// 冲突判断与写入在同一事务内, 并发入库同一报告只有一个成功。
    pub async fn add_report(&self, report: &AdjustmentReport) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let report_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO t_recon_adjustment_report (fdocumentid, freportdate, ftaxyear)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING fid
            "#,
        )
        .bind(&report.document_id)
        .bind(report.report_date)
        .bind(report.tax_year)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(report_id) = report_id else {
            tx.rollback().await?;
            tracing::info!(
                "报告已存在, 跳过: {} - {} - {:?}",
                report.document_id,
                report.report_date,
                report.tax_year
            );
            return Ok(false);
        };

        // 每1000条分块
        for chunk in report.lines.chunks(1000) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO t_recon_adjustment_property (freportid, fpropertyid, famount) ",
            );
            query_builder.push_values(chunk, |mut b, line| {
                b.push_bind(report_id)
                    .push_bind(&line.property_id)
                    .push_bind(line.amount.clone());
            });
            query_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        tracing::info!(
            "报告已入库: {} - {} - {:?} - {} 个物业",
            report.document_id,
            report.report_date,
            report.tax_year,
            report.lines.len()
        );
        Ok(true)
    }
}

#[async_trait]
impl ArchiveLookup for PgArchive {
    async fn find_adjustments(&self, property_id: &str) -> Result<Vec<TaxAdjustment>> {
        let rows = sqlx::query_as::<_, TaxAdjustment>(
            r#"
            SELECT p.fpropertyid as property_id,
                   r.fdocumentid as document_id,
                   r.freportdate as adjustment_date,
                   p.famount as amount,
                   r.ftaxyear as tax_year
            FROM t_recon_adjustment_property p
            INNER JOIN t_recon_adjustment_report r ON r.fid = p.freportid
            WHERE p.fpropertyid = $1
            ORDER BY r.freportdate, r.fdocumentid
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
