use crate::db::PaymentStore;
use crate::error::{Notice, PipelineError};
use crate::models::{
    ExtractedCandidate, NewBillingPeriod, NewPayment, ReceiptImage, Resident, PAYMENT_MODE_UPI,
    STATUS_PAID,
};
use crate::service::extractor::parse_amount;
use crate::service::notifier::{PaymentNotification, PaymentNotifier};
use crate::service::storage::{ContentStore, StorageError};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{Local, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 一次保存所需的全部输入 (已经过操作员复核)
pub struct SaveRequest<'a> {
    pub resident: &'a Resident,
    pub month_year: &'a str,
    pub candidate: &'a ExtractedCandidate,
    /// 原图 (未压缩)，上传失败不影响保存
    pub image: Option<&'a ReceiptImage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub payment_id: Uuid,
    pub billing_period_id: Uuid,
    pub screenshot_url: Option<String>,
    /// 非阻塞的警告 (图片上传、通知)
    pub notices: Vec<Notice>,
}

/// 保存进度回调: (百分比, 状态文字)
pub type SaveProgress<'a> = &'a (dyn Fn(u8, &str) + Send + Sync);

/// 付款记录服务
pub struct PaymentRecorder {
    store: Arc<dyn PaymentStore>,
    content_store: Arc<dyn ContentStore>,
    notifier: Arc<dyn PaymentNotifier>,
    notifications_enabled: bool,
}

impl PaymentRecorder {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        content_store: Arc<dyn ContentStore>,
        notifier: Arc<dyn PaymentNotifier>,
        notifications_enabled: bool,
    ) -> Self {
        Self {
            store,
            content_store,
            notifier,
            notifications_enabled,
        }
    }

    /// 保存一笔付款
    ///
    /// 流程:
    /// 1. 校验金额和月份 (任何写入之前)
    /// 2. 上传回执原图，失败只记警告
    /// 3. 查找或新建账单周期并标记为已付
    /// 4. 插入付款记录
    /// 5. 触发通知，失败只记警告
    ///
    /// 第 3、4 步失败时整体中止，已完成的写入不回滚。
    pub async fn record(
        &self,
        request: SaveRequest<'_>,
        progress: SaveProgress<'_>,
    ) -> Result<SaveOutcome, PipelineError> {
        let SaveRequest {
            resident,
            month_year,
            candidate,
            image,
        } = request;

        if month_year.trim().is_empty() {
            return Err(PipelineError::MissingInformation("month"));
        }
        let amount = parse_amount(&candidate.amount)
            .ok_or_else(|| PipelineError::InvalidAmount(candidate.amount.clone()))?;

        info!(
            "Recording payment of {} for {} ({})",
            amount, resident.display_name, month_year
        );
        let mut notices = Vec::new();

        let screenshot_url = match image {
            Some(image) => {
                progress(20, "Uploading image...");
                self.upload_receipt(resident.id, image, &mut notices).await
            }
            None => None,
        };

        progress(50, "Processing payment details...");
        let billing_period_id = ensure_billing_period(self.store.as_ref(), resident.id, month_year, &amount)
            .await
            .map_err(|e| {
                error!("Billing period update failed for {}: {}", resident.id, e);
                PipelineError::Database(e)
            })?;

        progress(70, "Saving payment information...");
        let paid_on = Utc::now();
        let new_payment = NewPayment {
            maintenance_bill_id: billing_period_id,
            paid_amount: amount.clone(),
            paid_on,
            payment_mode: PAYMENT_MODE_UPI.to_string(),
            transaction_id: candidate.transaction_reference(),
            payment_screenshot: screenshot_url.clone(),
        };
        let payment_id = self.store.insert_payment(&new_payment).await.map_err(|e| {
            error!("Payment insert failed for billing period {}: {}", billing_period_id, e);
            PipelineError::Database(e)
        })?;
        info!("Payment {} recorded against billing period {}", payment_id, billing_period_id);

        if self.notifications_enabled {
            let notification = PaymentNotification {
                payment_id,
                resident_name: resident.name.clone(),
                resident_unit: resident.unit.clone(),
                amount: amount.to_f64().unwrap_or_default(),
                date: paid_on.format("%Y-%m-%d").to_string(),
                payment_method: PAYMENT_MODE_UPI.to_string(),
                whatsapp_number: resident.phone.clone().filter(|p| !p.trim().is_empty()),
            };
            if let Some(notice) = self.send_notification(&notification).await {
                notices.push(notice);
            }
        }

        progress(100, "Payment saved successfully!");
        Ok(SaveOutcome {
            payment_id,
            billing_period_id,
            screenshot_url,
            notices,
        })
    }

    async fn upload_receipt(
        &self,
        resident_id: Uuid,
        image: &ReceiptImage,
        notices: &mut Vec<Notice>,
    ) -> Option<String> {
        let path = receipt_path(resident_id, Utc::now().timestamp_millis(), image.extension());
        match self
            .content_store
            .upload(&path, &image.bytes, &image.content_type)
            .await
        {
            Ok(()) => {
                let url = self.content_store.public_url(&path);
                info!("Receipt image stored at {}", url);
                Some(url)
            }
            Err(StorageError::BucketNotFound(bucket)) => {
                warn!("Receipt bucket {} does not exist, saving without image", bucket);
                notices.push(Notice::warning(
                    "Storage Not Configured",
                    "The storage bucket for receipts has not been set up. Payment will be saved without the image.",
                ));
                None
            }
            Err(e) => {
                warn!("Receipt upload failed, saving without image: {}", e);
                notices.push(Notice::warning(
                    "Upload Warning",
                    "Could not upload receipt image. Payment will be saved without the image.",
                ));
                None
            }
        }
    }

    async fn send_notification(&self, notification: &PaymentNotification) -> Option<Notice> {
        let failed = || {
            Notice::warning(
                "Confirmation failed",
                "Payment was saved but the confirmation message could not be sent.",
            )
        };
        match self.notifier.notify(notification).await {
            Ok(receipt) if receipt.success => {
                info!("Payment confirmation sent for {}", notification.payment_id);
                None
            }
            Ok(receipt) => {
                warn!(
                    "Payment confirmation rejected for {}: {}",
                    notification.payment_id,
                    receipt.error.as_deref().unwrap_or("unknown error")
                );
                Some(failed())
            }
            Err(e) => {
                warn!("Payment confirmation failed for {}: {}", notification.payment_id, e);
                Some(failed())
            }
        }
    }
}

/// payments/payment_<resident>_<毫秒时间戳>.<ext>
pub fn receipt_path(resident_id: Uuid, timestamp_ms: i64, extension: &str) -> String {
    format!("payments/payment_{}_{}.{}", resident_id, timestamp_ms, extension)
}

/// 查找 (住户, 月份) 的账单周期: 已存在则标记已付，否则按实付金额新建
///
/// 重复调用不会产生第二条记录。
pub async fn ensure_billing_period(
    store: &dyn PaymentStore,
    resident_id: Uuid,
    month_year: &str,
    amount: &BigDecimal,
) -> Result<Uuid, sqlx::Error> {
    match store.find_billing_period(resident_id, month_year).await? {
        Some(existing) => {
            store.mark_billing_period_paid(existing.id).await?;
            info!("Billing period {} ({}) marked as paid", existing.id, month_year);
            Ok(existing.id)
        }
        None => {
            let id = store
                .create_billing_period(&NewBillingPeriod {
                    resident_id,
                    month_year: month_year.to_string(),
                    amount_due: amount.clone(),
                    due_date: Local::now().date_naive(),
                    status: STATUS_PAID.to_string(),
                })
                .await?;
            info!("Billing period {} created for {}", id, month_year);
            Ok(id)
        }
    }
}
