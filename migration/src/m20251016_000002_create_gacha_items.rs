use sea_orm_migration::prelude::*;

/// 奖品表，按 (guild_id, gacha_name) 归属
#[derive(DeriveIden)]
enum GachaItems {
    Table,
    Id,
    GuildId,
    GachaName,
    ItemName,
    Rarity,
    Weight,
    Position,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// weight 为相对权重，抽取时按表内总和归一化
/// position 记录插入顺序，即抽取顺序
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GachaItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GachaItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GachaItems::GuildId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GachaItems::GachaName)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GachaItems::ItemName)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GachaItems::Rarity)
                            .string_len(100)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(GachaItems::Weight).double().not_null())
                    .col(
                        ColumnDef::new(GachaItems::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GachaItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(GachaItems::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_gacha_items_item_unique")
                    .table(GachaItems::Table)
                    .col(GachaItems::GuildId)
                    .col(GachaItems::GachaName)
                    .col(GachaItems::ItemName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GachaItems::Table).if_exists().to_owned())
            .await
    }
}
