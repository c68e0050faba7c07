use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 扭蛋触发配置
/// - channel_id：NULL 表示服务器内所有频道生效
/// - trigger_phrase：创建时默认等于 name
/// - role_id：设置后仅持有该身份组的成员可以抽取
/// - last_used_ms：上次成功抽取的 unix 毫秒（冷却占用）
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "gachas")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub guild_id: String,
    pub channel_id: Option<String>,
    pub name: String,
    pub trigger_phrase: String,
    pub role_id: Option<String>,
    pub retention_days: Option<i32>,
    pub last_used_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
