use crate::db::PgArchive;
use crate::error::{ReconError, Result};
use crate::models::{AdjustmentReport, ReconciliationResult, Request};
use crate::service::ReconciliationPipeline;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 请求体: 多个查询请求
#[derive(Debug, Deserialize)]
pub struct BatchReconcileRequest {
    pub requests: Vec<Request>,
}

/// 单个请求响应体
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub message: String,
    pub result: Option<ReconciliationResult>,
}

/// 批量响应中的单项
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub correlation_id: String,
    pub result: Option<ReconciliationResult>,
    pub error: Option<String>,
}

/// 批量响应体
#[derive(Debug, Serialize)]
pub struct BatchReconcileResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<BatchItem>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 单个请求对账
pub async fn reconcile(
    State(pipeline): State<Arc<ReconciliationPipeline>>,
    Json(req): Json<Request>,
) -> Response {
    match pipeline.reconcile(req).await {
        Ok(result) => {
            let response = ReconcileResponse {
                success: true,
                message: format!(
                    "Reconciled {} properties with {} warnings",
                    result.matched_properties.len(),
                    result.warnings.len()
                ),
                result: Some(result),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let status = error_status(&e);
            let response = ReconcileResponse {
                success: false,
                message: format!("Error: {}", e),
                result: None,
            };
            (status, Json(response)).into_response()
        }
    }
}

/// 批量对账, 单个请求失败不影响其他请求
pub async fn reconcile_batch(
    State(pipeline): State<Arc<ReconciliationPipeline>>,
    Json(req): Json<BatchReconcileRequest>,
) -> Response {
    let ids: Vec<String> = req.requests.iter().map(|r| r.correlation_id.clone()).collect();
    let outcomes = pipeline.reconcile_batch(req.requests).await;

    let results: Vec<BatchItem> = ids
        .into_iter()
        .zip(outcomes)
        .map(|(correlation_id, outcome)| match outcome {
            Ok(result) => BatchItem {
                correlation_id,
                result: Some(result),
                error: None,
            },
            Err(e) => BatchItem {
                correlation_id,
                result: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let response = BatchReconcileResponse {
        success: failed == 0,
        message: format!(
            "Reconciled {} requests, {} failed",
            results.len() - failed,
            failed
        ),
        results,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// 档案入库响应体
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub stored: bool,
    pub message: String,
}

/// 税费变更报告入库, 同一报告日期 + 年度只入一次
pub async fn ingest_report(
    State(archive): State<Arc<PgArchive>>,
    Json(report): Json<AdjustmentReport>,
) -> Response {
    match store_report(&archive, &report).await {
        Ok(stored) => {
            let message = if stored {
                format!("Stored report {} with {} properties", report.document_id, report.lines.len())
            } else {
                tracing::info!("报告已存在, 跳过: {} {:?}", report.report_date, report.tax_year);
                format!("Report for {} already stored", report.report_date)
            };
            let response = IngestResponse {
                success: true,
                stored,
                message,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!("报告入库失败 {}: {}", report.document_id, e);
            let response = IngestResponse {
                success: false,
                stored: false,
                message: format!("Error: {}", e),
            };
            (error_status(&e), Json(response)).into_response()
        }
    }
}

/// 先快速检查, 最终以事务内的冲突判断为准
async fn store_report(archive: &PgArchive, report: &AdjustmentReport) -> Result<bool> {
    if archive.is_report_stored(report.report_date, report.tax_year).await? {
        return Ok(false);
    }
    archive.add_report(report).await
}

/// 外部系统不可用 -> 503, 由外层重试; 其他错误 -> 500
fn error_status(e: &ReconError) -> StatusCode {
    if e.is_transport() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
