//! 引擎使用的 Trigger Store 接口
//!
//! 引擎不会写入配置或奖品，唯一的写操作是 [`TriggerStore::claim_cooldown`]，
//! 对每个扭蛋必须是原子的

pub mod db;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::{GachaConfig, ItemEntry};

pub use db::DbTriggerStore;
pub use memory::MemoryTriggerStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

#[async_trait]
pub trait TriggerStore: Send + Sync {
    /// `guild_id` 下服务器级或限定在 `channel_id` 的配置
    async fn list_configs_for_scope(
        &self,
        guild_id: &str,
        channel_id: Option<&str>,
    ) -> Result<Vec<GachaConfig>, StoreError>;

    /// 按插入顺序返回一个扭蛋的奖品表
    async fn list_items(&self, guild_id: &str, gacha_name: &str)
    -> Result<Vec<ItemEntry>, StoreError>;

    /// 距上次占用已过 `window`（或从未抽取过）时设置 `last_used_at = now`，
    /// 返回本次调用是否占用成功
    async fn claim_cooldown(
        &self,
        gacha_id: i32,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool, StoreError>;
}
