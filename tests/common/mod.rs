#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Local;
use image::{ImageFormat, Rgb, RgbImage};
use society_receipts::config::AppConfig;
use society_receipts::db::PaymentStore;
use society_receipts::error::PipelineError;
use society_receipts::models::{
    BillingPeriod, NewBillingPeriod, NewPayment, Payment, PaymentHistoryEntry, ReceiptImage,
    Recognition, Resident,
};
use society_receipts::service::{
    ContentStore, NotificationReceipt, NotifyError, PaymentNotification, PaymentNotifier,
    PaymentRecorder, ReceiptPipeline, ResidentDirectory, StorageError, TextRecognizer,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

pub const SCENARIO_A: &str = "Paid ₹3,700 to WHITEFIELD WELFARE ASSOCIATION UPI transaction ID T25050205362948966034486 2 May 2025";

pub fn john() -> Resident {
    Resident::new(
        Uuid::new_v4(),
        "John Doe",
        Some("john@example.com".into()),
        Some("9876543210".into()),
        Some("A-101".into()),
    )
}

pub fn jane() -> Resident {
    Resident::new(
        Uuid::new_v4(),
        "Jane Smith",
        Some("jane.smith@example.com".into()),
        Some("9123456780".into()),
        Some("B-202".into()),
    )
}

/// 小尺寸 PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("encode png");
    out
}

pub fn receipt_png() -> ReceiptImage {
    ReceiptImage::new(png_bytes(40, 80), "image/png")
}

#[derive(Default)]
pub struct StoreState {
    pub residents: Vec<Resident>,
    pub billing_periods: Vec<BillingPeriod>,
    pub payments: Vec<Payment>,
    /// 写操作次数 (更新、新建、插入)
    pub writes: usize,
    pub fail_insert: bool,
    pub fail_find: bool,
}

/// 内存版存储
#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn with_residents(residents: Vec<Resident>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().residents = residents;
        store
    }

    pub fn billing_periods(&self) -> Vec<BillingPeriod> {
        self.state.lock().unwrap().billing_periods.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.state.lock().unwrap().payments.clone()
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn list_residents(&self) -> Result<Vec<Resident>, sqlx::Error> {
        Ok(self.state.lock().unwrap().residents.clone())
    }

    async fn find_billing_period(
        &self,
        resident_id: Uuid,
        month_year: &str,
    ) -> Result<Option<BillingPeriod>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        if state.fail_find {
            return Err(sqlx::Error::Protocol("lookup failed".into()));
        }
        Ok(state
            .billing_periods
            .iter()
            .find(|b| b.resident_id == resident_id && b.month_year == month_year)
            .cloned())
    }

    async fn mark_billing_period_paid(&self, id: Uuid) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        match state.billing_periods.iter_mut().find(|b| b.id == id) {
            Some(period) => {
                period.status = "Paid".to_string();
                Ok(())
            }
            None => Err(sqlx::Error::RowNotFound),
        }
    }

    async fn create_billing_period(&self, new: &NewBillingPeriod) -> Result<Uuid, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        let id = Uuid::new_v4();
        state.billing_periods.push(BillingPeriod {
            id,
            resident_id: new.resident_id,
            month_year: new.month_year.clone(),
            amount_due: new.amount_due.clone(),
            due_date: new.due_date,
            status: new.status.clone(),
        });
        Ok(id)
    }

    async fn insert_payment(&self, new: &NewPayment) -> Result<Uuid, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_insert {
            return Err(sqlx::Error::Protocol("insert rejected".into()));
        }
        state.writes += 1;
        let id = Uuid::new_v4();
        state.payments.push(Payment {
            id,
            maintenance_bill_id: new.maintenance_bill_id,
            paid_amount: new.paid_amount.clone(),
            paid_on: new.paid_on,
            payment_mode: new.payment_mode.clone(),
            transaction_id: Some(new.transaction_id.clone()),
            payment_screenshot: new.payment_screenshot.clone(),
        });
        Ok(id)
    }

    async fn list_payment_history(&self) -> Result<Vec<PaymentHistoryEntry>, sqlx::Error> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<PaymentHistoryEntry> = state
            .payments
            .iter()
            .map(|p| {
                let period = state
                    .billing_periods
                    .iter()
                    .find(|b| b.id == p.maintenance_bill_id);
                let resident = period.and_then(|b| state.residents.iter().find(|r| r.id == b.resident_id));
                let (block, flat_number) = match resident.and_then(|r| r.unit.split_once('-')) {
                    Some((block, flat)) => (Some(block.to_string()), Some(flat.to_string())),
                    None => (None, None),
                };
                PaymentHistoryEntry {
                    id: p.id,
                    paid_amount: p.paid_amount.clone(),
                    paid_on: p.paid_on,
                    payment_mode: p.payment_mode.clone(),
                    transaction_id: p.transaction_id.clone(),
                    payment_screenshot: p.payment_screenshot.clone(),
                    month_year: period.map(|b| b.month_year.clone()),
                    resident_name: resident.map(|r| r.name.clone()),
                    block,
                    flat_number,
                }
            })
            .collect();
        entries.sort_by(|a, b| b.paid_on.cmp(&a.paid_on));
        Ok(entries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Accept,
    /// 先让出调度再接受，模拟慢速网络
    Slow,
    BucketMissing,
    Reject,
}

/// 内存版对象存储
pub struct MemoryContentStore {
    pub mode: UploadMode,
    pub uploads: Mutex<Vec<(String, usize, String)>>,
}

impl MemoryContentStore {
    pub fn new(mode: UploadMode) -> Self {
        Self {
            mode,
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        match self.mode {
            UploadMode::Accept | UploadMode::Slow => {
                if self.mode == UploadMode::Slow {
                    tokio::task::yield_now().await;
                }
                self.uploads
                    .lock()
                    .unwrap()
                    .push((path.to_string(), bytes.len(), content_type.to_string()));
                Ok(())
            }
            UploadMode::BucketMissing => Err(StorageError::BucketNotFound("paymentreceipts".into())),
            UploadMode::Reject => Err(StorageError::Rejected {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                message: "storage offline".into(),
            }),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://storage.test/public/paymentreceipts/{}", path)
    }
}

/// 记录收到的通知
pub struct RecordingNotifier {
    pub succeed: bool,
    pub sent: Mutex<Vec<PaymentNotification>>,
}

impl RecordingNotifier {
    pub fn new(succeed: bool) -> Self {
        Self {
            succeed,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<PaymentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentNotifier for RecordingNotifier {
    async fn notify(&self, notification: &PaymentNotification) -> Result<NotificationReceipt, NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.succeed {
            Ok(NotificationReceipt {
                success: true,
                notification_id: Some("n-1".into()),
                error: None,
            })
        } else {
            Err(NotifyError::Rejected {
                status: 500,
                message: "whatsapp gateway down".into(),
            })
        }
    }
}

/// 固定输出的识别器，可选地等待放行
pub struct ScriptedRecognizer {
    pub text: String,
    pub confidence: f32,
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedRecognizer {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            gate: None,
        }
    }

    pub fn gated(text: &str, confidence: f32, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(text, confidence)
        }
    }
}

#[async_trait]
impl TextRecognizer for ScriptedRecognizer {
    async fn recognize(&self, _image: &ReceiptImage) -> Result<Recognition, PipelineError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(Recognition {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

/// 一次测试用到的全部部件
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub content_store: Arc<MemoryContentStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub pipeline: Arc<ReceiptPipeline>,
}

pub struct HarnessBuilder {
    residents: Vec<Resident>,
    recognizer: Arc<dyn TextRecognizer>,
    upload_mode: UploadMode,
    notify_succeeds: bool,
    notifications_enabled: bool,
}

impl HarnessBuilder {
    pub fn new(residents: Vec<Resident>) -> Self {
        Self {
            residents,
            recognizer: Arc::new(ScriptedRecognizer::new(SCENARIO_A, 91.0)),
            upload_mode: UploadMode::Accept,
            notify_succeeds: true,
            notifications_enabled: true,
        }
    }

    pub fn recognizer(mut self, recognizer: impl TextRecognizer + 'static) -> Self {
        self.recognizer = Arc::new(recognizer);
        self
    }

    pub fn upload_mode(mut self, mode: UploadMode) -> Self {
        self.upload_mode = mode;
        self
    }

    pub fn notify_succeeds(mut self, succeed: bool) -> Self {
        self.notify_succeeds = succeed;
        self
    }

    pub fn notifications_enabled(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    pub async fn build(self) -> Harness {
        let store = Arc::new(MemoryStore::with_residents(self.residents));
        let content_store = Arc::new(MemoryContentStore::new(self.upload_mode));
        let notifier = Arc::new(RecordingNotifier::new(self.notify_succeeds));

        let directory = Arc::new(ResidentDirectory::new(store.clone()));
        directory.refresh().await.expect("load residents");

        let recorder = PaymentRecorder::new(
            store.clone(),
            content_store.clone(),
            notifier.clone(),
            self.notifications_enabled,
        );
        let pipeline = Arc::new(ReceiptPipeline::new(
            &AppConfig::default(),
            self.recognizer,
            directory,
            recorder,
        ));

        Harness {
            store,
            content_store,
            notifier,
            pipeline,
        }
    }
}

pub fn now_month_label() -> String {
    Local::now().format("%B %Y").to_string()
}
