use crate::config::StorageConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("upload rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// 回执图片的内容存储
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    fn public_url(&self, path: &str) -> String;
}

/// 对象存储 REST 接口 (storage/v1)
pub struct HttpContentStore {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpContentStore {
    pub fn new(client: reqwest::Client, config: StorageConfig) -> Self {
        Self { client, config }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

/// 上传失败的状态码和响应体归类
///
/// 存储服务对缺失的 bucket 有时返回 404，有时返回 400 加 "Bucket not found"。
pub fn upload_failure(bucket: &str, status: StatusCode, message: String) -> StorageError {
    if status == StatusCode::NOT_FOUND || message.contains("Bucket not found") {
        return StorageError::BucketNotFound(bucket.to_string());
    }
    StorageError::Rejected { status, message }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base(), self.config.bucket, path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("apikey", &self.config.api_key)
            .header("content-type", content_type)
            .header("cache-control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let message = resp.text().await.unwrap_or_default();
        Err(upload_failure(&self.config.bucket, status, message))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base(), self.config.bucket, path)
    }
}
