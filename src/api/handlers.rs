use crate::api::AppState;
use crate::error::{Notice, PipelineError};
use crate::models::{ConfidenceLevel, PaymentHistoryEntry, ReceiptImage, Resident};
use crate::service::months::{current_month_label, month_options};
use crate::service::{SaveOutcome, SessionEdit, SessionView};
use axum::{
    body::Bytes,
    extract::{Json, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 查询参数: 是否强制刷新住户目录
#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ResidentsResponse {
    pub success: bool,
    pub message: String,
    pub residents: Vec<Resident>,
}

#[derive(Debug, Serialize)]
pub struct MonthsResponse {
    pub success: bool,
    pub message: String,
    pub current: String,
    pub months: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    pub session: SessionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
    pub payment: SaveOutcome,
}

#[derive(Debug, Serialize)]
pub struct PaymentsResponse {
    pub success: bool,
    pub message: String,
    pub payments: Vec<PaymentHistoryEntry>,
}

fn session_response(message: impl Into<String>, session: SessionView) -> Json<SessionResponse> {
    Json(SessionResponse {
        success: true,
        message: message.into(),
        session,
        notice: None,
    })
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 住户目录 (`?refresh=true` 重新加载)
pub async fn list_residents(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<ResidentsResponse>, PipelineError> {
    let directory = state.pipeline.directory();
    if query.refresh {
        directory.refresh().await?;
    }
    let residents = directory.list().await;
    Ok(Json(ResidentsResponse {
        success: true,
        message: format!("{} residents", residents.len()),
        residents,
    }))
}

/// 最近 12 个月的账单月份
pub async fn list_months() -> Json<MonthsResponse> {
    let months = month_options(Local::now().date_naive());
    Json(MonthsResponse {
        success: true,
        message: format!("{} months", months.len()),
        current: current_month_label(),
        months,
    })
}

pub async fn create_session(State(state): State<AppState>) -> Response {
    let session = state.pipeline.create_session();
    (StatusCode::CREATED, session_response("Session created", session)).into_response()
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, PipelineError> {
    let session = state.pipeline.session(id)?;
    let message = session.status.clone();
    Ok(session_response(message, session))
}

pub async fn discard_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, PipelineError> {
    state.pipeline.discard_session(id)?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Session discarded".to_string(),
    }))
}

/// 上传回执图片 (原始请求体，类型取自 Content-Type)
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionResponse>, PipelineError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let session = state
        .pipeline
        .upload_image(id, ReceiptImage::new(body.to_vec(), content_type))?;
    Ok(session_response("Image uploaded", session))
}

/// 预处理 + OCR + 字段提取 + 住户匹配
pub async fn extract_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, PipelineError> {
    let session = state.pipeline.extract(id).await?;

    let notice = match session.confidence_level {
        Some(ConfidenceLevel::Low) => Some(Notice::warning(
            "Low confidence",
            ConfidenceLevel::Low.advice(),
        )),
        Some(level) => Some(Notice::info("Text extracted", level.advice())),
        None => None,
    };
    let message = match &session.suggestion {
        Some(m) => format!("Receipt processed, matched {}", m.display_name),
        None => "Receipt processed, please select a resident".to_string(),
    };

    Ok(Json(SessionResponse {
        success: true,
        message,
        session,
        notice,
    }))
}

/// 操作员修改
pub async fn edit_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(edit): Json<SessionEdit>,
) -> Result<Json<SessionResponse>, PipelineError> {
    let session = state.pipeline.edit(id, edit).await?;
    Ok(session_response("Session updated", session))
}

/// 保存付款
pub async fn save_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SaveResponse>, PipelineError> {
    let payment = state.pipeline.save(id).await?;
    Ok(Json(SaveResponse {
        success: true,
        message: "Payment saved successfully!".to_string(),
        payment,
    }))
}

/// 付款历史
pub async fn list_payments(
    State(state): State<AppState>,
) -> Result<Json<PaymentsResponse>, PipelineError> {
    let payments = state.store.list_payment_history().await?;
    Ok(Json(PaymentsResponse {
        success: true,
        message: format!("{} payments", payments.len()),
        payments,
    }))
}

/// 付款历史 CSV
pub async fn export_payments_csv(State(state): State<AppState>) -> Result<Response, PipelineError> {
    let csv = state.store.history_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"payments.csv\""),
        ],
        csv,
    )
        .into_response())
}
