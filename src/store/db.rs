use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use super::{StoreError, TriggerStore};
use crate::entities::{gacha_entity as gachas, gacha_item_entity as items};
use crate::models::{GachaConfig, ItemEntry};

/// 基于 sea-orm 的 store，读写 `gachas` / `gacha_items` 表
#[derive(Clone)]
pub struct DbTriggerStore {
    pool: DatabaseConnection,
}

impl DbTriggerStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TriggerStore for DbTriggerStore {
    async fn list_configs_for_scope(
        &self,
        guild_id: &str,
        channel_id: Option<&str>,
    ) -> Result<Vec<GachaConfig>, StoreError> {
        let mut scope = Condition::any().add(gachas::Column::ChannelId.is_null());
        if let Some(channel_id) = channel_id {
            scope = scope.add(gachas::Column::ChannelId.eq(channel_id));
        }

        let rows = gachas::Entity::find()
            .filter(gachas::Column::GuildId.eq(guild_id))
            .filter(scope)
            .order_by_asc(gachas::Column::Id)
            .all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_items(
        &self,
        guild_id: &str,
        gacha_name: &str,
    ) -> Result<Vec<ItemEntry>, StoreError> {
        let rows = items::Entity::find()
            .filter(items::Column::GuildId.eq(guild_id))
            .filter(items::Column::GachaName.eq(gacha_name))
            .order_by_asc(items::Column::Position)
            .order_by_asc(items::Column::Id)
            .all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// 单条条件更新：
    /// `UPDATE gachas SET last_used_ms = now WHERE id = ? AND (last_used_ms IS NULL OR last_used_ms <= now - window)`
    async fn claim_cooldown(
        &self,
        gacha_id: i32,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool, StoreError> {
        let now_ms = now.timestamp_millis();
        let threshold = now_ms - window.num_milliseconds();

        let result = gachas::Entity::update_many()
            .col_expr(gachas::Column::LastUsedMs, Expr::value(now_ms))
            .filter(gachas::Column::Id.eq(gacha_id))
            .filter(
                Condition::any()
                    .add(gachas::Column::LastUsedMs.is_null())
                    .add(gachas::Column::LastUsedMs.lte(threshold)),
            )
            .exec(&self.pool)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::connect_test_db;
    use chrono::TimeZone;
    use sea_orm::{ActiveModelTrait, Set};

    async fn insert_gacha(
        db: &DatabaseConnection,
        guild: &str,
        channel: Option<&str>,
        name: &str,
    ) -> gachas::Model {
        let now = Utc::now();
        gachas::ActiveModel {
            guild_id: Set(guild.to_string()),
            channel_id: Set(channel.map(str::to_string)),
            name: Set(name.to_string()),
            trigger_phrase: Set(name.to_string()),
            role_id: Set(None),
            retention_days: Set(None),
            last_used_ms: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn insert_item(
        db: &DatabaseConnection,
        guild: &str,
        gacha: &str,
        name: &str,
        weight: f64,
        position: i32,
    ) {
        let now = Utc::now();
        items::ActiveModel {
            guild_id: Set(guild.to_string()),
            gacha_name: Set(gacha.to_string()),
            item_name: Set(name.to_string()),
            rarity: Set(String::new()),
            weight: Set(weight),
            position: Set(position),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_list_configs_for_scope_filters_channel() {
        let db = connect_test_db().await;
        insert_gacha(&db, "g1", None, "wide").await;
        insert_gacha(&db, "g1", Some("c1"), "here").await;
        insert_gacha(&db, "g1", Some("c2"), "there").await;
        insert_gacha(&db, "g2", None, "elsewhere").await;
        let store = DbTriggerStore::new(db);

        let names: Vec<String> = store
            .list_configs_for_scope("g1", Some("c1"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["wide", "here"]);

        let guild_only = store.list_configs_for_scope("g1", None).await.unwrap();
        assert_eq!(guild_only.len(), 1);
        assert_eq!(guild_only[0].name, "wide");
    }

    #[tokio::test]
    async fn test_list_items_keeps_position_order() {
        let db = connect_test_db().await;
        insert_gacha(&db, "g1", None, "daily").await;
        insert_item(&db, "g1", "daily", "Rare", 20.0, 1).await;
        insert_item(&db, "g1", "daily", "Common", 80.0, 0).await;
        insert_item(&db, "g1", "other", "Stray", 1.0, 0).await;
        let store = DbTriggerStore::new(db);

        let items = store.list_items("g1", "daily").await.unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.item_name.as_str()).collect();
        assert_eq!(names, vec!["Common", "Rare"]);
        assert_eq!(items[0].weight, 80.0);
    }

    #[tokio::test]
    async fn test_claim_cooldown_respects_window() {
        let db = connect_test_db().await;
        let gacha = insert_gacha(&db, "g1", None, "daily").await;
        let store = DbTriggerStore::new(db);
        let window = Duration::seconds(30);
        let t0 = Utc.with_ymd_and_hms(2025, 10, 16, 12, 0, 0).unwrap();

        assert!(store.claim_cooldown(gacha.id, t0, window).await.unwrap());
        assert!(!store
            .claim_cooldown(gacha.id, t0 + Duration::seconds(29), window)
            .await
            .unwrap());
        assert!(store
            .claim_cooldown(gacha.id, t0 + Duration::seconds(30), window)
            .await
            .unwrap());

        let configs = store.list_configs_for_scope("g1", None).await.unwrap();
        assert_eq!(configs[0].last_used_at, Some(t0 + Duration::seconds(30)));
    }

    #[tokio::test]
    async fn test_concurrent_claims_yield_one_winner() {
        let db = connect_test_db().await;
        let gacha = insert_gacha(&db, "g1", None, "daily").await;
        let store = DbTriggerStore::new(db);
        let now = Utc::now();
        let window = Duration::seconds(30);

        let (a, b) = tokio::join!(
            store.claim_cooldown(gacha.id, now, window),
            store.claim_cooldown(gacha.id, now, window)
        );
        let wins = [a.unwrap(), b.unwrap()].iter().filter(|w| **w).count();
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_claim_unknown_gacha_fails() {
        let db = connect_test_db().await;
        let store = DbTriggerStore::new(db);
        assert!(!store
            .claim_cooldown(42, Utc::now(), Duration::seconds(30))
            .await
            .unwrap());
    }
}
