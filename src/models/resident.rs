use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const NO_UNIT: &str = "No Unit Assigned";

/// 住户表 LEFT JOIN 公寓表的原始行
#[derive(Debug, Clone, FromRow)]
pub struct ResidentRow {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub block: Option<String>,
    pub flat_number: Option<String>,
}

/// 住户 (只读参考数据)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// "<block>-<flat_number>"
    pub unit: String,
    pub display_name: String,
}

impl Resident {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        email: Option<String>,
        phone: Option<String>,
        unit: Option<String>,
    ) -> Self {
        let name = name.into();
        let display_name = match &unit {
            Some(u) => format!("{} ({})", name, u),
            None => format!("{} (No Unit)", name),
        };
        Self {
            id,
            name,
            email,
            phone,
            unit: unit.unwrap_or_else(|| NO_UNIT.to_string()),
            display_name,
        }
    }
}

impl From<ResidentRow> for Resident {
    fn from(row: ResidentRow) -> Self {
        let unit = match (row.block, row.flat_number) {
            (Some(block), Some(flat)) => Some(format!("{}-{}", block, flat)),
            _ => None,
        };
        Resident::new(row.id, row.name, row.email, row.phone, unit)
    }
}
