use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::collections::HashSet;

use crate::engine::draw::shares;
use crate::entities::{gacha_entity as gachas, gacha_item_entity as items};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateGacha, CreateItem, DeleteGacha, DeleteItem, EditGacha, EditItem, GachaCommand,
    GachaDetailResponse, GachaExport, GachaRecord, GachaResponse, ImportSummary, ItemCommand,
    ItemEntry, ItemRecord, ItemResponse, validate_id,
};

/// 扭蛋配置与奖品表的管理服务
///
/// 命令在查询前完成校验；涉及多行的变更（改名、删除、导入）在同一事务中执行
#[derive(Clone)]
pub struct GachaService {
    pool: DatabaseConnection,
}

impl GachaService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn list_gachas(&self, guild_id: &str) -> AppResult<Vec<GachaResponse>> {
        validate_id("guild_id", guild_id)?;
        let list = gachas::Entity::find()
            .filter(gachas::Column::GuildId.eq(guild_id))
            .order_by_asc(gachas::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    pub async fn get_gacha(&self, guild_id: &str, name: &str) -> AppResult<GachaDetailResponse> {
        validate_id("guild_id", guild_id)?;
        let gacha = find_gacha(&self.pool, guild_id, name)
            .await?
            .ok_or_else(|| gacha_not_found(name))?;
        let rows = item_table(&self.pool, guild_id, name).await?;
        let (items, total_weight) = describe_items(rows);
        Ok(GachaDetailResponse {
            gacha: gacha.into(),
            items,
            total_weight,
        })
    }

    /// 执行一条扭蛋命令，返回变更后的配置，删除时返回 `None`
    pub async fn apply_gacha(
        &self,
        guild_id: &str,
        command: GachaCommand,
    ) -> AppResult<Option<GachaResponse>> {
        validate_id("guild_id", guild_id)?;
        command.validate()?;

        match command {
            GachaCommand::Create(create) => {
                let model = insert_gacha(&self.pool, guild_id, &create).await?;
                log::info!("Created gacha '{}' in guild {guild_id}", model.name);
                Ok(Some(model.into()))
            }
            GachaCommand::Edit(edit) => self.edit_gacha(guild_id, edit).await.map(Some),
            GachaCommand::Delete(delete) => {
                self.delete_gacha(guild_id, delete).await?;
                Ok(None)
            }
        }
    }

    async fn edit_gacha(&self, guild_id: &str, edit: EditGacha) -> AppResult<GachaResponse> {
        let txn = self.pool.begin().await?;

        let model = find_gacha(&txn, guild_id, &edit.name)
            .await?
            .ok_or_else(|| gacha_not_found(&edit.name))?;
        let old_name = model.name.clone();
        let mut am = model.into_active_model();

        if let Some(new_name) = &edit.new_name
            && *new_name != old_name
        {
            if find_gacha(&txn, guild_id, new_name).await?.is_some() {
                return Err(gacha_conflict(new_name));
            }
            am.name = Set(new_name.clone());
            // 奖品按名称跟随扭蛋改名
            items::Entity::update_many()
                .col_expr(items::Column::GachaName, Expr::value(new_name.clone()))
                .filter(items::Column::GuildId.eq(guild_id))
                .filter(items::Column::GachaName.eq(old_name.as_str()))
                .exec(&txn)
                .await?;
        }
        if let Some(phrase) = &edit.trigger_phrase {
            am.trigger_phrase = Set(phrase.clone());
        }
        if edit.clear_channel {
            am.channel_id = Set(None);
        } else if let Some(channel) = &edit.channel_id {
            am.channel_id = Set(Some(channel.clone()));
        }
        if edit.clear_role {
            am.role_id = Set(None);
        } else if let Some(role) = &edit.role_id {
            am.role_id = Set(Some(role.clone()));
        }
        if edit.clear_retention {
            am.retention_days = Set(None);
        } else if let Some(days) = edit.retention_days {
            am.retention_days = Set(Some(days));
        }
        am.updated_at = Set(Utc::now());

        let updated = am.update(&txn).await.map_err(|e| {
            unique_conflict(e, || gacha_conflict(edit.new_name.as_deref().unwrap_or(&old_name)))
        })?;
        txn.commit().await?;

        log::info!("Edited gacha '{old_name}' in guild {guild_id}");
        Ok(updated.into())
    }

    async fn delete_gacha(&self, guild_id: &str, delete: DeleteGacha) -> AppResult<()> {
        let txn = self.pool.begin().await?;

        let removed = gachas::Entity::delete_many()
            .filter(gachas::Column::GuildId.eq(guild_id))
            .filter(gachas::Column::Name.eq(delete.name.as_str()))
            .exec(&txn)
            .await?;
        if removed.rows_affected == 0 {
            return Err(gacha_not_found(&delete.name));
        }
        items::Entity::delete_many()
            .filter(items::Column::GuildId.eq(guild_id))
            .filter(items::Column::GachaName.eq(delete.name.as_str()))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        log::info!("Deleted gacha '{}' in guild {guild_id}", delete.name);
        Ok(())
    }

    /// 对 `gacha_name` 的奖品表执行一条命令，返回变更后的行（含抽中概率），
    /// 删除时返回 `None`
    pub async fn apply_item(
        &self,
        guild_id: &str,
        gacha_name: &str,
        command: ItemCommand,
    ) -> AppResult<Option<ItemResponse>> {
        validate_id("guild_id", guild_id)?;
        command.validate()?;

        if find_gacha(&self.pool, guild_id, gacha_name).await?.is_none() {
            return Err(gacha_not_found(gacha_name));
        }

        let touched_id = match command {
            ItemCommand::Create(create) => self.create_item(guild_id, gacha_name, create).await?,
            ItemCommand::Edit(edit) => self.edit_item(guild_id, gacha_name, edit).await?,
            ItemCommand::Delete(delete) => {
                self.delete_item(guild_id, gacha_name, delete).await?;
                return Ok(None);
            }
        };

        let rows = item_table(&self.pool, guild_id, gacha_name).await?;
        let (described, _) = describe_items(rows);
        Ok(described.into_iter().find(|item| item.id == touched_id))
    }

    async fn create_item(
        &self,
        guild_id: &str,
        gacha_name: &str,
        create: CreateItem,
    ) -> AppResult<i32> {
        if find_item(&self.pool, guild_id, gacha_name, &create.item_name)
            .await?
            .is_some()
        {
            return Err(item_conflict(&create.item_name, gacha_name));
        }
        let position = next_position(&self.pool, guild_id, gacha_name).await?;
        let model = insert_item(
            &self.pool,
            guild_id,
            gacha_name,
            &ItemRecord {
                item_name: create.item_name,
                rarity: create.rarity,
                weight: create.weight,
            },
            position,
        )
        .await?;
        Ok(model.id)
    }

    async fn edit_item(&self, guild_id: &str, gacha_name: &str, edit: EditItem) -> AppResult<i32> {
        let model = find_item(&self.pool, guild_id, gacha_name, &edit.item_name)
            .await?
            .ok_or_else(|| item_not_found(&edit.item_name, gacha_name))?;
        let id = model.id;
        let mut am = model.into_active_model();

        if let Some(new_name) = &edit.new_name
            && *new_name != edit.item_name
        {
            if find_item(&self.pool, guild_id, gacha_name, new_name)
                .await?
                .is_some()
            {
                return Err(item_conflict(new_name, gacha_name));
            }
            am.item_name = Set(new_name.clone());
        }
        if let Some(rarity) = &edit.rarity {
            am.rarity = Set(rarity.clone());
        }
        if let Some(weight) = edit.weight {
            am.weight = Set(weight);
        }
        am.updated_at = Set(Utc::now());
        am.update(&self.pool).await.map_err(|e| {
            unique_conflict(e, || {
                item_conflict(edit.new_name.as_deref().unwrap_or(&edit.item_name), gacha_name)
            })
        })?;
        Ok(id)
    }

    async fn delete_item(
        &self,
        guild_id: &str,
        gacha_name: &str,
        delete: DeleteItem,
    ) -> AppResult<()> {
        let removed = items::Entity::delete_many()
            .filter(items::Column::GuildId.eq(guild_id))
            .filter(items::Column::GachaName.eq(gacha_name))
            .filter(items::Column::ItemName.eq(delete.item_name.as_str()))
            .exec(&self.pool)
            .await?;
        if removed.rows_affected == 0 {
            return Err(item_not_found(&delete.item_name, gacha_name));
        }
        Ok(())
    }

    /// 按创建顺序导出服务器内所有扭蛋及其奖品表
    pub async fn export(&self, guild_id: &str) -> AppResult<Vec<GachaExport>> {
        validate_id("guild_id", guild_id)?;
        let list = gachas::Entity::find()
            .filter(gachas::Column::GuildId.eq(guild_id))
            .order_by_asc(gachas::Column::Id)
            .all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(list.len());
        for gacha in list {
            let rows = item_table(&self.pool, guild_id, &gacha.name).await?;
            records.push(GachaExport {
                items: rows
                    .into_iter()
                    .map(|m| ItemRecord {
                        item_name: m.item_name,
                        rarity: m.rarity,
                        weight: m.weight,
                    })
                    .collect(),
                config: GachaRecord {
                    name: gacha.name,
                    trigger_phrase: Some(gacha.trigger_phrase),
                    channel_id: gacha.channel_id,
                    role_id: gacha.role_id,
                    retention_days: gacha.retention_days,
                },
            });
        }
        Ok(records)
    }

    /// 在同一事务中创建所有记录，任一记录无效或重名则整体放弃
    pub async fn import(
        &self,
        guild_id: &str,
        records: Vec<GachaExport>,
    ) -> AppResult<ImportSummary> {
        validate_id("guild_id", guild_id)?;
        let mut names = HashSet::new();
        for record in &records {
            record.validate()?;
            if !names.insert(record.config.name.as_str()) {
                return Err(AppError::ValidationError(format!(
                    "gacha '{}' appears more than once in the import",
                    record.config.name
                )));
            }
        }

        let txn = self.pool.begin().await?;
        let mut summary = ImportSummary { gachas: 0, items: 0 };
        for record in records {
            let create = CreateGacha::from(record.config);
            let gacha = insert_gacha(&txn, guild_id, &create).await?;
            for (position, item) in record.items.iter().enumerate() {
                insert_item(&txn, guild_id, &gacha.name, item, position as i32).await?;
                summary.items += 1;
            }
            summary.gachas += 1;
        }
        txn.commit().await?;

        log::info!(
            "Imported {} gachas ({} items) into guild {guild_id}",
            summary.gachas,
            summary.items
        );
        Ok(summary)
    }
}

// -----------------------------
// 辅助函数
// -----------------------------

fn gacha_not_found(name: &str) -> AppError {
    AppError::NotFound(format!("gacha '{name}' does not exist"))
}

fn gacha_conflict(name: &str) -> AppError {
    AppError::Conflict(format!("gacha '{name}' already exists"))
}

fn item_not_found(item: &str, gacha: &str) -> AppError {
    AppError::NotFound(format!("item '{item}' does not exist in gacha '{gacha}'"))
}

fn item_conflict(item: &str, gacha: &str) -> AppError {
    AppError::Conflict(format!("item '{item}' already exists in gacha '{gacha}'"))
}

/// 并发写入时唯一索引兜底：唯一约束冲突映射为 Conflict
fn unique_conflict(err: DbErr, conflict: impl FnOnce() -> AppError) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => conflict(),
        _ => AppError::DatabaseError(err),
    }
}

async fn find_gacha<C: ConnectionTrait>(
    conn: &C,
    guild_id: &str,
    name: &str,
) -> Result<Option<gachas::Model>, DbErr> {
    gachas::Entity::find()
        .filter(gachas::Column::GuildId.eq(guild_id))
        .filter(gachas::Column::Name.eq(name))
        .one(conn)
        .await
}

async fn find_item<C: ConnectionTrait>(
    conn: &C,
    guild_id: &str,
    gacha_name: &str,
    item_name: &str,
) -> Result<Option<items::Model>, DbErr> {
    items::Entity::find()
        .filter(items::Column::GuildId.eq(guild_id))
        .filter(items::Column::GachaName.eq(gacha_name))
        .filter(items::Column::ItemName.eq(item_name))
        .one(conn)
        .await
}

async fn item_table<C: ConnectionTrait>(
    conn: &C,
    guild_id: &str,
    gacha_name: &str,
) -> Result<Vec<items::Model>, DbErr> {
    items::Entity::find()
        .filter(items::Column::GuildId.eq(guild_id))
        .filter(items::Column::GachaName.eq(gacha_name))
        .order_by_asc(items::Column::Position)
        .order_by_asc(items::Column::Id)
        .all(conn)
        .await
}

async fn next_position<C: ConnectionTrait>(
    conn: &C,
    guild_id: &str,
    gacha_name: &str,
) -> Result<i32, DbErr> {
    let last = items::Entity::find()
        .filter(items::Column::GuildId.eq(guild_id))
        .filter(items::Column::GachaName.eq(gacha_name))
        .order_by_desc(items::Column::Position)
        .one(conn)
        .await?;
    Ok(last.map(|m| m.position + 1).unwrap_or(0))
}

async fn insert_gacha<C: ConnectionTrait>(
    conn: &C,
    guild_id: &str,
    create: &CreateGacha,
) -> AppResult<gachas::Model> {
    if find_gacha(conn, guild_id, &create.name).await?.is_some() {
        return Err(gacha_conflict(&create.name));
    }
    let now = Utc::now();
    let model = gachas::ActiveModel {
        guild_id: Set(guild_id.to_string()),
        channel_id: Set(create.channel_id.clone()),
        name: Set(create.name.clone()),
        trigger_phrase: Set(create.effective_trigger().to_string()),
        role_id: Set(create.role_id.clone()),
        retention_days: Set(create.retention_days),
        last_used_ms: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(|e| unique_conflict(e, || gacha_conflict(&create.name)))?;
    Ok(model)
}

async fn insert_item<C: ConnectionTrait>(
    conn: &C,
    guild_id: &str,
    gacha_name: &str,
    item: &ItemRecord,
    position: i32,
) -> AppResult<items::Model> {
    let now = Utc::now();
    items::ActiveModel {
        guild_id: Set(guild_id.to_string()),
        gacha_name: Set(gacha_name.to_string()),
        item_name: Set(item.item_name.clone()),
        rarity: Set(item.rarity.clone()),
        weight: Set(item.weight),
        position: Set(position),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(|e| unique_conflict(e, || item_conflict(&item.item_name, gacha_name)))
}

fn describe_items(rows: Vec<items::Model>) -> (Vec<ItemResponse>, f64) {
    let entries: Vec<ItemEntry> = rows.iter().cloned().map(Into::into).collect();
    let total = crate::engine::draw::total_weight(&entries);
    let described = rows
        .into_iter()
        .zip(shares(&entries))
        .map(|(m, share)| ItemResponse::new(m, share))
        .collect();
    (described, total)
}
