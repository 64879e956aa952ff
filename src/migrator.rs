use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_materials_table::Migration),
            Box::new(m20240601_000002_create_activity_materials_table::Migration),
            Box::new(m20240601_000003_create_expenses_table::Migration),
            Box::new(m20240601_000004_create_stock_movements_table::Migration),
        ]
    }
}

// Quantity and money columns share the precision of entities::MAX_STORED_QUANTITY.
const QUANTITY_PRECISION: u32 = 16;
const QUANTITY_SCALE: u32 = 4;

mod m20240601_000001_create_materials_table {
    use super::{QUANTITY_PRECISION, QUANTITY_SCALE};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_materials_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Materials::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Materials::Name).string().not_null())
                        .col(
                            ColumnDef::new(Materials::ConsumptionType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::ContentMeasureCategory)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Materials::BaseUnit).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Materials::Quantity)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::PricePerPackage)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::ContentPerPackage)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Materials::TotalUsesPerUnit)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Materials::CurrentUses)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_materials_name")
                        .table(Materials::Table)
                        .col(Materials::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum Materials {
        Table,
        Id,
        Name,
        ConsumptionType,
        ContentMeasureCategory,
        BaseUnit,
        Quantity,
        PricePerPackage,
        ContentPerPackage,
        TotalUsesPerUnit,
        CurrentUses,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_activity_materials_table {
    use super::m20240601_000001_create_materials_table::Materials;
    use super::{QUANTITY_PRECISION, QUANTITY_SCALE};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_activity_materials_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ActivityMaterials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ActivityMaterials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ActivityMaterials::ActivityId).uuid().not_null())
                        .col(ColumnDef::new(ActivityMaterials::MaterialId).uuid().not_null())
                        .col(ColumnDef::new(ActivityMaterials::LotId).uuid().null())
                        .col(
                            ColumnDef::new(ActivityMaterials::QuantityDisplay)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ActivityMaterials::UnitOfMeasure)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ActivityMaterials::QuantityBase)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ActivityMaterials::Cost)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ActivityMaterials::ReconciledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ActivityMaterials::ReturnedGoodBase)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ActivityMaterials::ReturnedDamagedBase)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ActivityMaterials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ActivityMaterials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_activity_materials_material_id")
                                .from(ActivityMaterials::Table, ActivityMaterials::MaterialId)
                                .to(Materials::Table, Materials::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_activity_materials_activity_material")
                        .table(ActivityMaterials::Table)
                        .col(ActivityMaterials::ActivityId)
                        .col(ActivityMaterials::MaterialId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_activity_materials_material_id")
                        .table(ActivityMaterials::Table)
                        .col(ActivityMaterials::MaterialId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ActivityMaterials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ActivityMaterials {
        Table,
        Id,
        ActivityId,
        MaterialId,
        LotId,
        QuantityDisplay,
        UnitOfMeasure,
        QuantityBase,
        Cost,
        ReconciledAt,
        ReturnedGoodBase,
        ReturnedDamagedBase,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_expenses_table {
    use super::{QUANTITY_PRECISION, QUANTITY_SCALE};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_expenses_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Expenses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Expenses::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Expenses::Direction).string_len(16).not_null())
                        .col(ColumnDef::new(Expenses::Category).string_len(32).not_null())
                        .col(ColumnDef::new(Expenses::ActivityId).uuid().null())
                        .col(ColumnDef::new(Expenses::LotId).uuid().null())
                        .col(ColumnDef::new(Expenses::MaterialId).uuid().null())
                        .col(
                            ColumnDef::new(Expenses::Amount)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Expenses::Quantity)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Expenses::Unit).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Expenses::UnitPrice)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Expenses::Description).string().not_null())
                        .col(
                            ColumnDef::new(Expenses::Date)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Expenses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_expenses_activity_id")
                        .table(Expenses::Table)
                        .col(Expenses::ActivityId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_expenses_lot_id")
                        .table(Expenses::Table)
                        .col(Expenses::LotId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Expenses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Expenses {
        Table,
        Id,
        Direction,
        Category,
        ActivityId,
        LotId,
        MaterialId,
        Amount,
        Quantity,
        Unit,
        UnitPrice,
        Description,
        Date,
        CreatedAt,
    }
}

mod m20240601_000004_create_stock_movements_table {
    use super::m20240601_000001_create_materials_table::Materials;
    use super::{QUANTITY_PRECISION, QUANTITY_SCALE};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::MaterialId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::MovementType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::Amount)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Reason).string().not_null())
                        .col(ColumnDef::new(StockMovements::ReferenceId).uuid().null())
                        .col(ColumnDef::new(StockMovements::ReferenceType).string().null())
                        .col(ColumnDef::new(StockMovements::ActorId).uuid().null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_material_id")
                                .from(StockMovements::Table, StockMovements::MaterialId)
                                .to(Materials::Table, Materials::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_material_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::MaterialId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockMovements {
        Table,
        Id,
        MaterialId,
        MovementType,
        Amount,
        Reason,
        ReferenceId,
        ReferenceType,
        ActorId,
        CreatedAt,
    }
}
