use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const STATUS_PAID: &str = "Paid";

/// 账单周期表 (maintenance_bills)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub month_year: String,     // "May 2025"
    pub amount_due: BigDecimal,
    pub due_date: NaiveDate,
    pub status: String,
}

/// 新建账单周期
#[derive(Debug, Clone)]
pub struct NewBillingPeriod {
    pub resident_id: Uuid,
    pub month_year: String,
    pub amount_due: BigDecimal,
    pub due_date: NaiveDate,
    pub status: String,
}
