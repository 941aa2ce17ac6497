use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{CaseRef, RequestMetadata};
use crate::source::CaseSystem;

/// 案件登记 (GEO 案件)
pub struct PgCaseSystem {
    pool: PgPool,
}

impl PgCaseSystem {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CaseSystem for PgCaseSystem {
    async fn find_existing_cases(&self, property_id: &str, cycle_marker: &str) -> Result<Vec<CaseRef>> {
        let cases = sqlx::query_as::<_, CaseRef>(
            r#"
            SELECT fcaseid as case_id,
                   fpropertyid as property_id,
                   fcreatedate as created_date
            FROM t_recon_case
            WHERE fpropertyid = $1
              AND fcyclemarker = $2
            ORDER BY fcreatedate ASC, fcaseid ASC
            "#,
        )
        .bind(property_id)
        .bind(cycle_marker)
        .fetch_all(&self.pool)
        .await?;
        Ok(cases)
    }

    async fn create_case(&self, property_id: &str, metadata: &RequestMetadata) -> Result<CaseRef> {
        let case = sqlx::query_as::<_, CaseRef>(
            r#"
            INSERT INTO t_recon_case (fcaseid, fpropertyid, fcyclemarker, ftitle, fcorrelationid, fcreatedate)
            VALUES (
                'GEO-' || to_char(now(), 'YYYY') || '-' || lpad(nextval('t_recon_case_seq')::text, 6, '0'),
                $1, $2, $3, $4, now()
            )
            RETURNING fcaseid as case_id,
                      fpropertyid as property_id,
                      fcreatedate as created_date
            "#,
        )
        .bind(property_id)
        .bind(&metadata.cycle_marker)
        .bind(&metadata.title)
        .bind(&metadata.correlation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(case)
    }
}
