//! HTTP 入口
//!
//! - `POST /process`：校验参数，确认原始输出表存在后在后台启动一次运行，立即返回 202
//! - `GET /`：状态文本
//! - `GET /healthz`：存活探针
//!
//! 请求体按 JSON 解析，不要求 `Content-Type`。校验或准备失败时返回 500 `{ok:false,error}`，
//! 此时不会启动任何后台任务。

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::{AppError, RequestError};
use crate::infrastructure::Warehouse;
use crate::models::DateWindow;
use crate::orchestrator::{BatchOrchestrator, BatchRequest};

const STATUS_TEXT: &str = "Call insight extraction service - Ready";

/// `maxWorkers` 上限
pub const MAX_WORKERS_LIMIT: usize = 1000;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BatchOrchestrator>,
    pub warehouse: Arc<dyn Warehouse>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/process", post(process))
        .with_state(state)
}

/// `POST /process` 请求体
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default = "default_trace_id")]
    pub trace_id: String,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

fn default_trace_id() -> String {
    "unknown".to_string()
}

fn default_max_records() -> usize {
    100
}

fn default_chunk_size() -> usize {
    50
}

fn default_max_workers() -> usize {
    30
}

impl ProcessRequest {
    /// 校验并转换为编排参数
    pub fn into_batch_request(self) -> Result<BatchRequest, RequestError> {
        for (field, value) in [
            ("maxRecords", self.max_records),
            ("chunkSize", self.chunk_size),
            ("maxWorkers", self.max_workers),
        ] {
            if value == 0 {
                return Err(RequestError::InvalidField {
                    field: field.to_string(),
                    reason: "必须大于 0".to_string(),
                });
            }
        }

        if self.max_workers > MAX_WORKERS_LIMIT {
            return Err(RequestError::InvalidField {
                field: "maxWorkers".to_string(),
                reason: format!("不能超过 {MAX_WORKERS_LIMIT}"),
            });
        }

        let start = parse_date("startDate", self.start_date.as_deref())?;
        let end = parse_date("endDate", self.end_date.as_deref())?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(RequestError::InvertedWindow {
                    start: s.to_string(),
                    end: e.to_string(),
                });
            }
        }

        Ok(BatchRequest {
            trace_id: self.trace_id,
            max_records: self.max_records,
            chunk_size: self.chunk_size,
            max_workers: self.max_workers,
            window: DateWindow::new(start, end),
        })
    }
}

/// 空字符串等同于未提供
fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, RequestError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| RequestError::InvalidDate {
                field: field.to_string(),
                value: v.to_string(),
            }),
    }
}

/// 入口层错误，统一映射为 500
pub struct ApiError(AppError);

impl<E: Into<AppError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("❌ /process 请求失败: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

async fn index() -> &'static str {
    STATUS_TEXT
}

async fn healthz() -> &'static str {
    "ok"
}

async fn process(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let payload: ProcessRequest = serde_json::from_slice(&body)
        .map_err(|e| RequestError::MalformedBody(e.to_string()))?;
    let request = payload.into_batch_request()?;
    let (start_date, end_date) = request.window.describe();

    info!(
        trace_id = %request.trace_id,
        "📥 收到批量请求 | 目标条数: {} | 分块大小: {} | 并发数: {} | 日期范围: {} ~ {}",
        request.max_records,
        request.chunk_size,
        request.max_workers,
        start_date,
        end_date
    );

    state.warehouse.ensure_schema().await?;

    let body = json!({
        "ok": true,
        "status": "started",
        "trace_id": request.trace_id,
        "max_records": request.max_records,
        "start_date": start_date,
        "end_date": end_date,
        "message": "Processing started in background",
    });

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let trace_id = request.trace_id.clone();
        match orchestrator.run(request).await {
            Ok(summary) => info!(trace_id = %trace_id, "✅ 后台处理完成: {:?}", summary),
            Err(e) => error!(trace_id = %trace_id, "❌ 后台处理失败: {}", e),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}
