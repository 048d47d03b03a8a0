pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use config::AppConfig;
pub use db::{create_pool, PaymentStore, PgStore};
pub use error::{Notice, PipelineError};
pub use service::{PaymentRecorder, ReceiptPipeline, ResidentDirectory};
