use crate::models::{
    BillingPeriod, NewBillingPeriod, NewPayment, PaymentHistoryEntry, Resident, ResidentRow,
    STATUS_PAID,
};
use futures::TryStreamExt;
use sqlx::PgPool;
use std::io::Write;
use uuid::Uuid;

/// 查询全部住户 (含公寓楼栋/房号)
pub async fn list_residents(pool: &PgPool) -> Result<Vec<Resident>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ResidentRow>(
        r#"
        SELECT r.id, r.name, r.email, r.phone,
               a.block, a.flat_number
        FROM residents r
        LEFT JOIN apartments a ON a.id = r.apartment_id
        ORDER BY r.name
        "#
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Resident::from).collect())
}

/// 按 (住户, 月份) 查询账单周期，不存在返回 None
pub async fn find_billing_period(
    pool: &PgPool,
    resident_id: Uuid,
    month_year: &str,
) -> Result<Option<BillingPeriod>, sqlx::Error> {
    sqlx::query_as::<_, BillingPeriod>(
        r#"
        SELECT id, resident_id, month_year, amount_due, due_date, status
        FROM maintenance_bills
        WHERE resident_id = $1
          AND month_year = $2
        ORDER BY generated_at
        LIMIT 1
        "#
    )
    .bind(resident_id)
    .bind(month_year)
    .fetch_optional(pool)
    .await
}

/// 将账单周期标记为已付
pub async fn mark_billing_period_paid(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE maintenance_bills
        SET status = $2
        WHERE id = $1
        "#
    )
    .bind(id)
    .bind(STATUS_PAID)
    .execute(pool)
    .await?;

    tracing::debug!("Billing period {} marked paid, {} row(s)", id, result.rows_affected());
    Ok(())
}

/// 新建账单周期，返回 id
pub async fn create_billing_period(
    pool: &PgPool,
    new: &NewBillingPeriod,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO maintenance_bills (resident_id, month_year, amount_due, due_date, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#
    )
    .bind(new.resident_id)
    .bind(&new.month_year)
    .bind(&new.amount_due)
    .bind(new.due_date)
    .bind(&new.status)
    .fetch_one(pool)
    .await
}

/// 插入付款记录，返回 id
pub async fn insert_payment(pool: &PgPool, new: &NewPayment) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO payments (
            maintenance_bill_id, paid_amount, paid_on,
            payment_mode, transaction_id, payment_screenshot
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#
    )
    .bind(new.maintenance_bill_id)
    .bind(&new.paid_amount)
    .bind(new.paid_on)
    .bind(&new.payment_mode)
    .bind(&new.transaction_id)
    .bind(&new.payment_screenshot)
    .fetch_one(pool)
    .await
}

const PAYMENT_HISTORY_SQL: &str = r#"
    SELECT p.id, p.paid_amount, p.paid_on, p.payment_mode,
           p.transaction_id, p.payment_screenshot,
           mb.month_year,
           r.name AS resident_name,
           a.block, a.flat_number
    FROM payments p
    LEFT JOIN maintenance_bills mb ON mb.id = p.maintenance_bill_id
    LEFT JOIN residents r ON r.id = mb.resident_id
    LEFT JOIN apartments a ON a.id = r.apartment_id
    ORDER BY p.paid_on DESC
"#;

/// 付款历史 (按付款时间降序)
pub async fn list_payment_history(pool: &PgPool) -> Result<Vec<PaymentHistoryEntry>, sqlx::Error> {
    sqlx::query_as::<_, PaymentHistoryEntry>(PAYMENT_HISTORY_SQL)
        .fetch_all(pool)
        .await
}

/// 逐行读取付款历史并写出 CSV，返回行数
pub async fn stream_history_csv<W: Write>(pool: &PgPool, output: W) -> Result<usize, sqlx::Error> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(HISTORY_CSV_HEADER).map_err(csv_error)?;

    let mut rows = sqlx::query_as::<_, PaymentHistoryEntry>(PAYMENT_HISTORY_SQL).fetch(pool);
    let mut count = 0;
    while let Some(entry) = rows.try_next().await? {
        writer.write_record(history_csv_record(&entry)).map_err(csv_error)?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

const HISTORY_CSV_HEADER: [&str; 9] = [
    "payment_id",
    "paid_on",
    "paid_amount",
    "payment_mode",
    "transaction_id",
    "payment_screenshot",
    "month_year",
    "resident",
    "unit",
];

fn history_csv_record(entry: &PaymentHistoryEntry) -> [String; 9] {
    [
        entry.id.to_string(),
        entry.paid_on.to_rfc3339(),
        entry.paid_amount.to_string(),
        entry.payment_mode.clone(),
        entry.transaction_id.clone().unwrap_or_default(),
        entry.payment_screenshot.clone().unwrap_or_default(),
        entry.month_year.clone().unwrap_or_default(),
        entry.resident_name.clone().unwrap_or_default(),
        entry.unit(),
    ]
}

/// 导出已加载的付款历史到 CSV
pub fn export_to_csv<W: Write>(
    entries: &[PaymentHistoryEntry],
    output: W,
) -> Result<(), sqlx::Error> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(HISTORY_CSV_HEADER).map_err(csv_error)?;

    for entry in entries {
        writer.write_record(history_csv_record(entry)).map_err(csv_error)?;
    }

    writer.flush()?;
    Ok(())
}

fn csv_error(e: csv::Error) -> sqlx::Error {
    sqlx::Error::Io(e.into())
}
