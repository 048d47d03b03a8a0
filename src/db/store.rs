use crate::db::queries;
use crate::models::{BillingPeriod, NewBillingPeriod, NewPayment, PaymentHistoryEntry, Resident};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// 付款流程使用的关系存储接口
///
/// 找不到账单周期是正常结果 (`Ok(None)`)，不是错误。
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn list_residents(&self) -> Result<Vec<Resident>, sqlx::Error>;

    async fn find_billing_period(
        &self,
        resident_id: Uuid,
        month_year: &str,
    ) -> Result<Option<BillingPeriod>, sqlx::Error>;

    async fn mark_billing_period_paid(&self, id: Uuid) -> Result<(), sqlx::Error>;

    async fn create_billing_period(&self, new: &NewBillingPeriod) -> Result<Uuid, sqlx::Error>;

    async fn insert_payment(&self, new: &NewPayment) -> Result<Uuid, sqlx::Error>;

    async fn list_payment_history(&self) -> Result<Vec<PaymentHistoryEntry>, sqlx::Error>;

    /// 付款历史 CSV
    async fn history_csv(&self) -> Result<Vec<u8>, sqlx::Error> {
        let entries = self.list_payment_history().await?;
        let mut out = Vec::new();
        queries::export_to_csv(&entries, &mut out)?;
        Ok(out)
    }
}

/// Postgres 实现
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn list_residents(&self) -> Result<Vec<Resident>, sqlx::Error> {
        queries::list_residents(&self.pool).await
    }

    async fn find_billing_period(
        &self,
        resident_id: Uuid,
        month_year: &str,
    ) -> Result<Option<BillingPeriod>, sqlx::Error> {
        queries::find_billing_period(&self.pool, resident_id, month_year).await
    }

    async fn mark_billing_period_paid(&self, id: Uuid) -> Result<(), sqlx::Error> {
        queries::mark_billing_period_paid(&self.pool, id).await
    }

    async fn create_billing_period(&self, new: &NewBillingPeriod) -> Result<Uuid, sqlx::Error> {
        queries::create_billing_period(&self.pool, new).await
    }

    async fn insert_payment(&self, new: &NewPayment) -> Result<Uuid, sqlx::Error> {
        queries::insert_payment(&self.pool, new).await
    }

    async fn list_payment_history(&self) -> Result<Vec<PaymentHistoryEntry>, sqlx::Error> {
        queries::list_payment_history(&self.pool).await
    }

    async fn history_csv(&self) -> Result<Vec<u8>, sqlx::Error> {
        let mut out = Vec::new();
        let rows = queries::stream_history_csv(&self.pool, &mut out).await?;
        tracing::info!("Exported {} payment(s) to CSV", rows);
        Ok(out)
    }
}
