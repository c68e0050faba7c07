use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{gacha_entity, gacha_item_entity};

/// 触发配置的生效范围，或聊天事件发生的位置
///
/// 对配置而言 `channel_id: None` 表示服务器内所有频道；
/// 对事件而言表示消息不是来自服务器频道
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Scope {
    pub guild_id: String,
    pub channel_id: Option<String>,
}

impl Scope {
    pub fn guild(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: None,
        }
    }

    pub fn channel(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: Some(channel_id.into()),
        }
    }

    /// 范围为 `self` 的配置是否对发生在 `event` 的事件生效
    pub fn covers(&self, event: &Scope) -> bool {
        if self.guild_id != event.guild_id {
            return false;
        }
        match &self.channel_id {
            None => true,
            Some(channel) => event.channel_id.as_deref() == Some(channel.as_str()),
        }
    }
}

/// 引擎侧看到的扭蛋触发配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GachaConfig {
    pub id: i32,
    pub scope: Scope,
    pub name: String,
    pub trigger_phrase: String,
    pub restricted_role_id: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    /// 建议的自动过期天数，由引擎之外负责执行
    pub retention_days: Option<i32>,
}

impl GachaConfig {
    pub fn is_channel_scoped(&self) -> bool {
        self.scope.channel_id.is_some()
    }

    /// 与触发词或名称做区分大小写的完全匹配
    pub fn responds_to(&self, text: &str) -> bool {
        text == self.trigger_phrase || text == self.name
    }

    pub fn permits(&self, author_roles: &[String]) -> bool {
        match &self.restricted_role_id {
            None => true,
            Some(role) => author_roles.iter().any(|r| r == role),
        }
    }
}

impl From<gacha_entity::Model> for GachaConfig {
    fn from(m: gacha_entity::Model) -> Self {
        GachaConfig {
            id: m.id,
            scope: Scope {
                guild_id: m.guild_id,
                channel_id: m.channel_id,
            },
            name: m.name,
            trigger_phrase: m.trigger_phrase,
            restricted_role_id: m.role_id,
            last_used_at: m.last_used_ms.and_then(millis_to_datetime),
            retention_days: m.retention_days,
        }
    }
}

/// 奖品表中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemEntry {
    pub id: i32,
    pub guild_id: String,
    pub gacha_name: String,
    pub item_name: String,
    /// 自由文本标签，不影响权重
    pub rarity: String,
    /// 相对权重，抽取时按表内总和归一化
    pub weight: f64,
}

impl From<gacha_item_entity::Model> for ItemEntry {
    fn from(m: gacha_item_entity::Model) -> Self {
        ItemEntry {
            id: m.id,
            guild_id: m.guild_id,
            gacha_name: m.gacha_name,
            item_name: m.item_name,
            rarity: m.rarity,
            weight: m.weight,
        }
    }
}

/// 去掉平台细节后的聊天消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub scope: Scope,
    pub text: String,
    pub author: String,
    pub author_roles: Vec<String>,
}

/// 单个事件的最终处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DrawOutcome {
    NoMatch,
    CooldownClosed { gacha: GachaConfig },
    Drawn { gacha: GachaConfig, item: ItemEntry },
    EmptyTable { gacha: GachaConfig },
}

impl DrawOutcome {
    pub fn reason(&self) -> &'static str {
        match self {
            DrawOutcome::NoMatch => "no_match",
            DrawOutcome::CooldownClosed { .. } => "cooldown_closed",
            DrawOutcome::Drawn { .. } => "drawn",
            DrawOutcome::EmptyTable { .. } => "empty_table",
        }
    }

    pub fn gacha(&self) -> Option<&GachaConfig> {
        match self {
            DrawOutcome::NoMatch => None,
            DrawOutcome::CooldownClosed { gacha }
            | DrawOutcome::Drawn { gacha, .. }
            | DrawOutcome::EmptyTable { gacha } => Some(gacha),
        }
    }

    pub fn item(&self) -> Option<&ItemEntry> {
        match self {
            DrawOutcome::Drawn { item, .. } => Some(item),
            _ => None,
        }
    }
}

pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
