use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{gacha_entity, gacha_item_entity};
use crate::error::{AppError, AppResult};
use crate::models::millis_to_datetime;

pub const MAX_LABEL_LEN: usize = 100;
pub const MAX_ID_LEN: usize = 64;
pub const MAX_WEIGHT: f64 = 1e12;

fn validate_label(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{field} must not be empty")));
    }
    if value.trim() != value {
        return Err(AppError::ValidationError(format!(
            "{field} must not start or end with whitespace"
        )));
    }
    if value.chars().count() > MAX_LABEL_LEN {
        return Err(AppError::ValidationError(format!(
            "{field} must be at most {MAX_LABEL_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_id(field: &str, value: &str) -> AppResult<()> {
    if value.is_empty() || value.len() > MAX_ID_LEN || value.chars().any(char::is_whitespace) {
        return Err(AppError::ValidationError(format!("{field} is not a valid id")));
    }
    Ok(())
}

fn validate_weight(weight: f64) -> AppResult<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(AppError::ValidationError(
            "weight must be a finite, non-negative number".into(),
        ));
    }
    if weight > MAX_WEIGHT {
        return Err(AppError::ValidationError(format!(
            "weight must be at most {MAX_WEIGHT:e}"
        )));
    }
    Ok(())
}

fn validate_rarity(rarity: &str) -> AppResult<()> {
    if rarity.chars().count() > MAX_LABEL_LEN {
        return Err(AppError::ValidationError(format!(
            "rarity must be at most {MAX_LABEL_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_retention(days: i32) -> AppResult<()> {
    if days < 1 {
        return Err(AppError::ValidationError(
            "retention_days must be at least 1".into(),
        ));
    }
    Ok(())
}

/// 创建扭蛋，`trigger_phrase` 默认等于 `name`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateGacha {
    pub name: String,
    #[serde(default)]
    pub trigger_phrase: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub retention_days: Option<i32>,
}

impl CreateGacha {
    pub fn validate(&self) -> AppResult<()> {
        validate_label("name", &self.name)?;
        if let Some(phrase) = &self.trigger_phrase {
            validate_label("trigger_phrase", phrase)?;
        }
        if let Some(channel) = &self.channel_id {
            validate_id("channel_id", channel)?;
        }
        if let Some(role) = &self.role_id {
            validate_id("role_id", role)?;
        }
        if let Some(days) = self.retention_days {
            validate_retention(days)?;
        }
        Ok(())
    }

    pub fn effective_trigger(&self) -> &str {
        self.trigger_phrase.as_deref().unwrap_or(&self.name)
    }
}

/// 部分更新名为 `name` 的扭蛋；未提供的字段保持不变，`clear_*` 用于清空可选字段
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EditGacha {
    pub name: String,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub trigger_phrase: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub retention_days: Option<i32>,
    #[serde(default)]
    pub clear_channel: bool,
    #[serde(default)]
    pub clear_role: bool,
    #[serde(default)]
    pub clear_retention: bool,
}

impl EditGacha {
    pub fn validate(&self) -> AppResult<()> {
        validate_label("name", &self.name)?;
        if let Some(new_name) = &self.new_name {
            validate_label("new_name", new_name)?;
        }
        if let Some(phrase) = &self.trigger_phrase {
            validate_label("trigger_phrase", phrase)?;
        }
        if let Some(channel) = &self.channel_id {
            validate_id("channel_id", channel)?;
        }
        if let Some(role) = &self.role_id {
            validate_id("role_id", role)?;
        }
        if let Some(days) = self.retention_days {
            validate_retention(days)?;
        }
        if self.clear_channel && self.channel_id.is_some() {
            return Err(AppError::ValidationError(
                "channel_id and clear_channel are mutually exclusive".into(),
            ));
        }
        if self.clear_role && self.role_id.is_some() {
            return Err(AppError::ValidationError(
                "role_id and clear_role are mutually exclusive".into(),
            ));
        }
        if self.clear_retention && self.retention_days.is_some() {
            return Err(AppError::ValidationError(
                "retention_days and clear_retention are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteGacha {
    pub name: String,
}

/// 扭蛋配置变更，按 `action` 区分
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GachaCommand {
    Create(CreateGacha),
    Edit(EditGacha),
    Delete(DeleteGacha),
}

impl GachaCommand {
    pub fn validate(&self) -> AppResult<()> {
        match self {
            GachaCommand::Create(c) => c.validate(),
            GachaCommand::Edit(e) => e.validate(),
            GachaCommand::Delete(d) => validate_label("name", &d.name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateItem {
    pub item_name: String,
    #[serde(default)]
    pub rarity: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EditItem {
    pub item_name: String,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteItem {
    pub item_name: String,
}

/// 奖品变更，按 `action` 区分
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ItemCommand {
    Create(CreateItem),
    Edit(EditItem),
    Delete(DeleteItem),
}

impl ItemCommand {
    pub fn validate(&self) -> AppResult<()> {
        match self {
            ItemCommand::Create(c) => {
                validate_label("item_name", &c.item_name)?;
                validate_rarity(&c.rarity)?;
                validate_weight(c.weight)
            }
            ItemCommand::Edit(e) => {
                validate_label("item_name", &e.item_name)?;
                if let Some(new_name) = &e.new_name {
                    validate_label("new_name", new_name)?;
                }
                if let Some(rarity) = &e.rarity {
                    validate_rarity(rarity)?;
                }
                if let Some(weight) = e.weight {
                    validate_weight(weight)?;
                }
                Ok(())
            }
            ItemCommand::Delete(d) => validate_label("item_name", &d.item_name),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GachaResponse {
    pub id: i32,
    pub guild_id: String,
    pub channel_id: Option<String>,
    pub name: String,
    pub trigger_phrase: String,
    pub role_id: Option<String>,
    pub retention_days: Option<i32>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<gacha_entity::Model> for GachaResponse {
    fn from(m: gacha_entity::Model) -> Self {
        GachaResponse {
            id: m.id,
            guild_id: m.guild_id,
            channel_id: m.channel_id,
            name: m.name,
            trigger_phrase: m.trigger_phrase,
            role_id: m.role_id,
            retention_days: m.retention_days,
            last_used_at: m.last_used_ms.and_then(millis_to_datetime),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemResponse {
    pub id: i32,
    pub item_name: String,
    pub rarity: String,
    pub weight: f64,
    /// weight / 表内总和，总和不为正时为 0
    pub share: f64,
}

impl ItemResponse {
    pub fn new(m: gacha_item_entity::Model, share: f64) -> Self {
        ItemResponse {
            id: m.id,
            item_name: m.item_name,
            rarity: m.rarity,
            weight: m.weight,
            share,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GachaDetailResponse {
    pub gacha: GachaResponse,
    pub items: Vec<ItemResponse>,
    pub total_weight: f64,
}

/// 导入导出记录中的配置部分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GachaRecord {
    pub name: String,
    #[serde(default)]
    pub trigger_phrase: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub retention_days: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemRecord {
    pub item_name: String,
    #[serde(default)]
    pub rarity: String,
    pub weight: f64,
}

/// `{config, items[]}`，导入导出的基本单位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GachaExport {
    pub config: GachaRecord,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

impl GachaExport {
    pub fn validate(&self) -> AppResult<()> {
        CreateGacha::from(self.config.clone()).validate()?;
        let mut seen = std::collections::HashSet::new();
        for item in &self.items {
            validate_label("item_name", &item.item_name)?;
            validate_rarity(&item.rarity)?;
            validate_weight(item.weight)?;
            if !seen.insert(item.item_name.as_str()) {
                return Err(AppError::ValidationError(format!(
                    "duplicate item '{}' in gacha '{}'",
                    item.item_name, self.config.name
                )));
            }
        }
        Ok(())
    }
}

impl From<GachaRecord> for CreateGacha {
    fn from(r: GachaRecord) -> Self {
        CreateGacha {
            name: r.name,
            trigger_phrase: r.trigger_phrase,
            channel_id: r.channel_id,
            role_id: r.role_id,
            retention_days: r.retention_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportSummary {
    pub gachas: usize,
    pub items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gacha_command_is_tagged() {
        let cmd: GachaCommand = serde_json::from_value(json!({
            "action": "create",
            "name": "daily",
            "channel_id": "123"
        }))
        .unwrap();
        match cmd {
            GachaCommand::Create(c) => {
                assert_eq!(c.effective_trigger(), "daily");
                assert_eq!(c.channel_id.as_deref(), Some("123"));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cmd: GachaCommand =
            serde_json::from_value(json!({ "action": "delete", "name": "daily" })).unwrap();
        assert!(matches!(cmd, GachaCommand::Delete(_)));

        assert!(serde_json::from_value::<GachaCommand>(json!({ "action": "explode" })).is_err());
    }

    #[test]
    fn test_create_validation() {
        let mut c = CreateGacha {
            name: "daily".into(),
            trigger_phrase: None,
            channel_id: None,
            role_id: None,
            retention_days: None,
        };
        assert!(c.validate().is_ok());

        c.name = "  ".into();
        assert!(c.validate().is_err());

        c.name = "x".repeat(MAX_LABEL_LEN + 1);
        assert!(c.validate().is_err());

        c.name = "daily".into();
        c.retention_days = Some(0);
        assert!(c.validate().is_err());

        c.retention_days = None;
        c.channel_id = Some("12 34".into());
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_edit_clear_conflicts() {
        let edit: GachaCommand = serde_json::from_value(json!({
            "action": "edit",
            "name": "daily",
            "channel_id": "1",
            "clear_channel": true
        }))
        .unwrap();
        assert!(matches!(edit.validate(), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_item_weight_validation() {
        let bad = ItemCommand::Create(CreateItem {
            item_name: "Common".into(),
            rarity: "N".into(),
            weight: -1.0,
        });
        assert!(bad.validate().is_err());

        let zero = ItemCommand::Create(CreateItem {
            item_name: "Nothing".into(),
            rarity: String::new(),
            weight: 0.0,
        });
        assert!(zero.validate().is_ok());

        let edit = ItemCommand::Edit(EditItem {
            item_name: "Common".into(),
            new_name: None,
            rarity: None,
            weight: Some(f64::INFINITY),
        });
        assert!(edit.validate().is_err());
    }

    #[test]
    fn test_weight_upper_bound() {
        let huge = ItemCommand::Create(CreateItem {
            item_name: "Overflow".into(),
            rarity: String::new(),
            weight: 1e308,
        });
        assert!(matches!(huge.validate(), Err(AppError::ValidationError(_))));

        let at_limit = ItemCommand::Create(CreateItem {
            item_name: "Limit".into(),
            rarity: String::new(),
            weight: MAX_WEIGHT,
        });
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_export_rejects_duplicate_items() {
        let record = GachaExport {
            config: GachaRecord {
                name: "daily".into(),
                trigger_phrase: None,
                channel_id: None,
                role_id: None,
                retention_days: None,
            },
            items: vec![
                ItemRecord {
                    item_name: "Common".into(),
                    rarity: String::new(),
                    weight: 1.0,
                },
                ItemRecord {
                    item_name: "Common".into(),
                    rarity: String::new(),
                    weight: 2.0,
                },
            ],
        };
        assert!(record.validate().is_err());
    }
}
