pub mod handlers;

pub use handlers::*;

use crate::db::PaymentStore;
use crate::service::ReceiptPipeline;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReceiptPipeline>,
    pub store: Arc<dyn PaymentStore>,
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    // 上传上限之外留 1MB 余量，超限由流水线给出明确提示
    let image_limit = state.pipeline.max_upload_bytes() + 1024 * 1024;

    let session_routes = Router::new()
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/:id",
            get(get_session).delete(discard_session).patch(edit_session),
        )
        .route(
            "/api/sessions/:id/image",
            put(upload_image).layer(DefaultBodyLimit::max(image_limit)),
        )
        .route("/api/sessions/:id/extract", post(extract_session))
        .route("/api/sessions/:id/save", post(save_session));

    let reference_routes = Router::new()
        .route("/api/residents", get(list_residents))
        .route("/api/months", get(list_months))
        .route("/api/payments", get(list_payments))
        .route("/api/payments/export.csv", get(export_payments_csv));

    Router::new()
        .route("/health", get(health_check))
        .merge(session_routes)
        .merge(reference_routes)
        .layer(ServiceBuilder::new())
        .with_state(state)
}
