use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const PAYMENT_MODE_UPI: &str = "UPI";

/// 付款记录 (payments)，本流程只插入不修改
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub maintenance_bill_id: Uuid,
    pub paid_amount: BigDecimal,
    pub paid_on: DateTime<Utc>,
    pub payment_mode: String,
    pub transaction_id: Option<String>,
    pub payment_screenshot: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub maintenance_bill_id: Uuid,
    pub paid_amount: BigDecimal,
    pub paid_on: DateTime<Utc>,
    pub payment_mode: String,
    pub transaction_id: String,
    /// 仅在图片上传成功时有值
    pub payment_screenshot: Option<String>,
}

/// 付款历史 (付款 + 账单月份 + 住户)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentHistoryEntry {
    pub id: Uuid,
    pub paid_amount: BigDecimal,
    pub paid_on: DateTime<Utc>,
    pub payment_mode: String,
    pub transaction_id: Option<String>,
    pub payment_screenshot: Option<String>,
    pub month_year: Option<String>,
    pub resident_name: Option<String>,
    pub block: Option<String>,
    pub flat_number: Option<String>,
}

impl PaymentHistoryEntry {
    pub fn unit(&self) -> String {
        match (&self.block, &self.flat_number) {
            (Some(block), Some(flat)) => format!("{}-{}", block, flat),
            _ => String::new(),
        }
    }
}
