use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use super::{StoreError, TriggerStore};
use crate::models::{GachaConfig, ItemEntry};

#[derive(Default)]
struct MemoryState {
    configs: Vec<GachaConfig>,
    items: Vec<ItemEntry>,
    next_id: i32,
}

/// 进程内 store，占用语义与 [`super::DbTriggerStore`] 一致
///
/// 全部状态放在一个异步互斥锁后面，占用是一次检查并设置，并发占用会串行执行
#[derive(Default)]
pub struct MemoryTriggerStore {
    state: Mutex<MemoryState>,
}

impl MemoryTriggerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以新 id 保存 `config` 并返回保存后的副本
    pub async fn insert_config(&self, mut config: GachaConfig) -> GachaConfig {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        config.id = state.next_id;
        state.configs.push(config.clone());
        config
    }

    /// 把 `item` 追加到所属扭蛋奖品表末尾
    pub async fn push_item(&self, mut item: ItemEntry) -> ItemEntry {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        item.id = state.next_id;
        state.items.push(item.clone());
        item
    }

    pub async fn config(&self, gacha_id: i32) -> Option<GachaConfig> {
        let state = self.state.lock().await;
        state.configs.iter().find(|c| c.id == gacha_id).cloned()
    }
}

#[async_trait]
impl TriggerStore for MemoryTriggerStore {
    async fn list_configs_for_scope(
        &self,
        guild_id: &str,
        channel_id: Option<&str>,
    ) -> Result<Vec<GachaConfig>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .configs
            .iter()
            .filter(|c| c.scope.guild_id == guild_id)
            .filter(|c| match c.scope.channel_id.as_deref() {
                None => true,
                Some(own) => channel_id == Some(own),
            })
            .cloned()
            .collect())
    }

    async fn list_items(
        &self,
        guild_id: &str,
        gacha_name: &str,
    ) -> Result<Vec<ItemEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|i| i.guild_id == guild_id && i.gacha_name == gacha_name)
            .cloned()
            .collect())
    }

    async fn claim_cooldown(
        &self,
        gacha_id: i32,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(config) = state.configs.iter_mut().find(|c| c.id == gacha_id) else {
            return Ok(false);
        };

        let elapsed = match config.last_used_at {
            None => true,
            Some(last) => last <= now - window,
        };
        if elapsed {
            config.last_used_at = Some(now);
        }
        Ok(elapsed)
    }
}
