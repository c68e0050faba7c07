use sea_orm_migration::prelude::*;

/// 扭蛋配置表（每个服务器内一个触发词一行）
#[derive(DeriveIden)]
enum Gachas {
    Table,
    Id,
    GuildId,
    ChannelId,
    Name,
    TriggerPhrase,
    RoleId,
    RetentionDays,
    LastUsedMs,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// - channel_id 为 NULL：在服务器所有频道生效
/// - last_used_ms：上次成功抽取的 unix 毫秒，冷却条件更新时按整数比较
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Gachas::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Gachas::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Gachas::GuildId).string_len(64).not_null())
                    .col(ColumnDef::new(Gachas::ChannelId).string_len(64).null())
                    .col(ColumnDef::new(Gachas::Name).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Gachas::TriggerPhrase)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Gachas::RoleId).string_len(64).null())
                    .col(ColumnDef::new(Gachas::RetentionDays).integer().null())
                    .col(ColumnDef::new(Gachas::LastUsedMs).big_integer().null())
                    .col(
                        ColumnDef::new(Gachas::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Gachas::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // (guild_id, name) 唯一
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_gachas_guild_name_unique")
                    .table(Gachas::Table)
                    .col(Gachas::GuildId)
                    .col(Gachas::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Gachas::Table).if_exists().to_owned())
            .await
    }
}
