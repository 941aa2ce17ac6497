use sqlx::PgPool;

/// 建表语句 (不存在时创建)
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS t_recon_adjustment_report (
        fid BIGSERIAL PRIMARY KEY,
        fdocumentid VARCHAR(64) NOT NULL UNIQUE,
        freportdate DATE NOT NULL,
        ftaxyear INT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS t_recon_adjustment_property (
        freportid BIGINT NOT NULL REFERENCES t_recon_adjustment_report (fid),
        fpropertyid VARCHAR(32) NOT NULL,
        famount NUMERIC(14, 2) NOT NULL DEFAULT 0
    )
    "#,
    // 同一报告日期 + 年度只允许一份报告 (年度缺失按 0 计)
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS uk_recon_adjustment_report_period
        ON t_recon_adjustment_report (freportdate, COALESCE(ftaxyear, 0))
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_recon_adjustment_property
        ON t_recon_adjustment_property (fpropertyid)
    "#,
    r#"CREATE SEQUENCE IF NOT EXISTS t_recon_case_seq"#,
    r#"
    CREATE TABLE IF NOT EXISTS t_recon_case (
        fcaseid VARCHAR(32) PRIMARY KEY,
        fpropertyid VARCHAR(32) NOT NULL,
        fcyclemarker VARCHAR(128) NOT NULL,
        ftitle VARCHAR(512) NOT NULL,
        fcorrelationid VARCHAR(128) NOT NULL,
        fcreatedate TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_recon_case_property_cycle
        ON t_recon_case (fpropertyid, fcyclemarker)
    "#,
];

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("数据库表结构已就绪");
    Ok(())
}
