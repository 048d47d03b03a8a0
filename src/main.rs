use society_receipts::{
    api::{self, AppState},
    create_pool,
    service::{HttpContentStore, HttpNotifier, TesseractRecognizer},
    AppConfig, PaymentRecorder, PaymentStore, PgStore, ReceiptPipeline, ResidentDirectory,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式，RUST_LOG 可覆盖
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("society_receipts=info")),
        )
        .init();

    // 加载配置
    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;
    info!("Database pool created");
    let store: Arc<dyn PaymentStore> = Arc::new(PgStore::new(pool));

    // 外部服务
    let http = reqwest::Client::new();
    let content_store = Arc::new(HttpContentStore::new(http.clone(), config.storage.clone()));
    let notifier = Arc::new(HttpNotifier::new(http, config.notification.clone()));
    let recognizer = Arc::new(TesseractRecognizer::new(config.ocr.language.clone()));
    if cfg!(feature = "ocr") {
        info!("OCR language: {}", recognizer.language());
    } else {
        warn!("Built without the `ocr` feature, text extraction is disabled");
    }

    // 住户目录只在启动时加载一次
    let directory = Arc::new(ResidentDirectory::new(store.clone()));
    if let Err(e) = directory.refresh().await {
        warn!("Could not load residents at startup: {}", e);
    }

    let recorder = PaymentRecorder::new(
        store.clone(),
        content_store,
        notifier,
        config.notification.enabled,
    );
    let pipeline = Arc::new(ReceiptPipeline::new(&config, recognizer, directory, recorder));

    let app = api::router(AppState { pipeline, store });

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  PUT  /api/sessions/:id/image    - upload receipt");
    info!("  POST /api/sessions/:id/extract  - OCR + field extraction");
    info!("  POST /api/sessions/:id/save     - record payment");
    info!("  GET  /api/payments/export.csv   - payment history");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
