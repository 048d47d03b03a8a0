use crate::config::NotificationConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// 付款通知函数的请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    pub payment_id: Uuid,
    pub resident_name: String,
    pub resident_unit: String,
    pub amount: f64,
    pub date: String,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReceipt {
    pub success: bool,
    #[serde(default)]
    pub notification_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification function returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("notification request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn notify(&self, notification: &PaymentNotification) -> Result<NotificationReceipt, NotifyError>;
}

/// 调用远端通知函数 (functions/v1/<name>)
pub struct HttpNotifier {
    client: reqwest::Client,
    config: NotificationConfig,
}

impl HttpNotifier {
    pub fn new(client: reqwest::Client, config: NotificationConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl PaymentNotifier for HttpNotifier {
    async fn notify(&self, notification: &PaymentNotification) -> Result<NotificationReceipt, NotifyError> {
        let url = format!(
            "{}/functions/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.function
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(notification)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json::<NotificationReceipt>().await?)
    }
}
