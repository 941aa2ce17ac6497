use axum::{routing::{get, post}, Router};
use property_tax_recon::db::{ensure_schema, CsvExportSink, PgArchive, PgCaseSystem};
use property_tax_recon::service::PipelineSettings;
use property_tax_recon::source::RegistrySnapshot;
use property_tax_recon::{api, create_pool, AppConfig, ReconciliationPipeline};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env()?;
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池 (档案库 + 案件登记)
    let pool = create_pool(&config.database).await?;
    ensure_schema(&pool).await?;
    info!("Database pool created");

    // 登记系统快照
    let registry = match &config.registry.snapshot_path {
        Some(path) => {
            let snapshot = RegistrySnapshot::load(path)?;
            info!(
                "Registry snapshot loaded: {} properties, {} owners, {} debt rows, {} tax rows",
                snapshot.properties.len(),
                snapshot.owners.len(),
                snapshot.debt.len(),
                snapshot.tax.len()
            );
            snapshot
        }
        None => {
            warn!("No registry snapshot configured, every address will resolve to nothing");
            RegistrySnapshot::default()
        }
    };

    let archive = Arc::new(PgArchive::new(pool.clone()));
    let cases = Arc::new(PgCaseSystem::new(pool));

    let mut pipeline = ReconciliationPipeline::new(
        Arc::new(registry),
        archive.clone(),
        cases,
        PipelineSettings::from_config(&config),
    );
    if let Some(dir) = &config.export.dir {
        info!("CSV export enabled: {}", dir.display());
        pipeline = pipeline.with_sink(Arc::new(CsvExportSink::new(dir.clone())));
    }
    let pipeline = Arc::new(pipeline);

    // 构建路由
    let reconcile_routes = Router::new()
        .route("/api/reconcile", post(api::reconcile))
        .route("/api/reconcile/batch", post(api::reconcile_batch))
        .with_state(pipeline);

    let archive_routes = Router::new()
        .route("/api/archive/reports", post(api::ingest_report))
        .with_state(archive);

    let app = Router::new()
        .route("/health", get(api::health_check))
        .merge(reconcile_routes)
        .merge(archive_routes)
        .layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/reconcile        - single request");
    info!("  POST /api/reconcile/batch  - many requests");
    info!("  POST /api/archive/reports  - store a tax adjustment report");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
