use crate::db::PaymentStore;
use crate::models::{ExtractedCandidate, Resident};
use crate::service::matcher::{best_match, ResidentMatch};
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// 住户目录缓存
///
/// 启动时加载一次，之后只在显式刷新时重新读取。保持查询顺序，
/// 匹配得分相同时按此顺序取第一个。
pub struct ResidentDirectory {
    store: Arc<dyn PaymentStore>,
    residents: RwLock<IndexMap<Uuid, Resident>>,
}

impl ResidentDirectory {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self {
            store,
            residents: RwLock::new(IndexMap::new()),
        }
    }

    /// 从数据库重新加载，返回住户数
    pub async fn refresh(&self) -> Result<usize, sqlx::Error> {
        let list = self.store.list_residents().await?;
        let map: IndexMap<Uuid, Resident> = list.into_iter().map(|r| (r.id, r)).collect();
        let count = map.len();
        *self.residents.write().await = map;
        info!("Resident directory loaded: {} residents", count);
        Ok(count)
    }

    pub async fn get(&self, id: Uuid) -> Option<Resident> {
        self.residents.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<Resident> {
        self.residents.read().await.values().cloned().collect()
    }

    /// 在缓存的住户中找最佳匹配
    pub async fn best_match(&self, candidate: &ExtractedCandidate) -> Option<ResidentMatch> {
        let residents = self.residents.read().await;
        best_match(residents.par_values(), candidate)
    }
}
