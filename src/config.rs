use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub notification: NotificationConfig,
    pub ocr: OcrConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 回执图片的对象存储
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub base_url: String,
    pub api_key: String,
    pub bucket: String,
}

/// 付款通知函数
#[derive(Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub base_url: String,
    pub api_key: String,
    pub function: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    pub language: String,
    /// 低于该值提示操作员仔细复核
    pub low_confidence_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub max_upload_bytes: usize,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

// 日志里不打印密钥
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("base_url", &self.base_url)
            .field("function", &self.function)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/society".to_string(),
                max_connections: 20,
            },
            storage: StorageConfig {
                base_url: "http://localhost:54321".to_string(),
                api_key: String::new(),
                bucket: "paymentreceipts".to_string(),
            },
            notification: NotificationConfig {
                base_url: "http://localhost:54321".to_string(),
                api_key: String::new(),
                function: "payment-receipt-notification".to_string(),
                enabled: true,
            },
            ocr: OcrConfig {
                language: "eng".to_string(),
                low_confidence_threshold: 80.0,
            },
            pipeline: PipelineConfig {
                max_upload_bytes: 5 * 1024 * 1024,
                max_dimension: 1200,
                jpeg_quality: 70,
            },
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 < receipts.toml < RECEIPTS__* 环境变量 < DATABASE_URL
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::try_from(&AppConfig::default())?;

        let mut builder = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("receipts").required(false))
            .add_source(
                Environment::with_prefix("RECEIPTS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }

        builder.build()?.try_deserialize()
    }

    /// 从环境变量加载配置，失败时退回默认值
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Invalid configuration ({}), using defaults", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_receipt_limits() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.max_upload_bytes, 5_242_880);
        assert_eq!(config.pipeline.max_dimension, 1200);
        assert_eq!(config.pipeline.jpeg_quality, 70);
        assert_eq!(config.ocr.low_confidence_threshold, 80.0);
        assert_eq!(config.storage.bucket, "paymentreceipts");
    }

    #[test]
    fn debug_output_hides_api_keys() {
        let mut config = AppConfig::default();
        config.storage.api_key = "secret-key".into();
        config.notification.api_key = "secret-key".into();
        assert!(!format!("{:?}", config).contains("secret-key"));
    }
}
