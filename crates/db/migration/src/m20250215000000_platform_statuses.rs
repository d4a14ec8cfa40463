use sea_orm_migration::{prelude::*, sea_orm::DatabaseBackend};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(EventPlatformStatuses::Table)
                    .col(pk_id_col(manager, EventPlatformStatuses::Id))
                    .col(uuid_col(EventPlatformStatuses::Uuid))
                    .col(fk_id_col(manager, EventPlatformStatuses::EventId))
                    .col(
                        ColumnDef::new(EventPlatformStatuses::VersionNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventPlatformStatuses::Platform)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventPlatformStatuses::JiraLink).string())
                    .col(
                        ColumnDef::new(EventPlatformStatuses::ImplementationStatus)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("draft")),
                    )
                    .col(
                        ColumnDef::new(EventPlatformStatuses::ValidationStatus)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("pending")),
                    )
                    .col(timestamp_col(EventPlatformStatuses::CreatedAt))
                    .col(timestamp_col(EventPlatformStatuses::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_platform_statuses_event_id")
                            .from(EventPlatformStatuses::Table, EventPlatformStatuses::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_platform_statuses_uuid")
                    .table(EventPlatformStatuses::Table)
                    .col(EventPlatformStatuses::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_platform_statuses_event_version_platform")
                    .table(EventPlatformStatuses::Table)
                    .col(EventPlatformStatuses::EventId)
                    .col(EventPlatformStatuses::VersionNumber)
                    .col(EventPlatformStatuses::Platform)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(StatusHistory::Table)
                    .col(pk_id_col(manager, StatusHistory::Id))
                    .col(uuid_col(StatusHistory::Uuid))
                    .col(fk_id_col(manager, StatusHistory::EventPlatformStatusId))
                    .col(
                        ColumnDef::new(StatusHistory::StatusType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StatusHistory::OldStatus).string_len(32))
                    .col(
                        ColumnDef::new(StatusHistory::NewStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StatusHistory::ChangedByUserId).uuid())
                    .col(ColumnDef::new(StatusHistory::Comment).text())
                    .col(ColumnDef::new(StatusHistory::JiraLink).string())
                    .col(timestamp_col(StatusHistory::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_history_event_platform_status_id")
                            .from(StatusHistory::Table, StatusHistory::EventPlatformStatusId)
                            .to(EventPlatformStatuses::Table, EventPlatformStatuses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_status_history_uuid")
                    .table(StatusHistory::Table)
                    .col(StatusHistory::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_status_history_event_platform_status_id")
                    .table(StatusHistory::Table)
                    .col(StatusHistory::EventPlatformStatusId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StatusHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventPlatformStatuses::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Events {
    Table,
    Id,
}

#[derive(Iden)]
enum EventPlatformStatuses {
    Table,
    Id,
    Uuid,
    EventId,
    VersionNumber,
    Platform,
    JiraLink,
    ImplementationStatus,
    ValidationStatus,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum StatusHistory {
    Table,
    Id,
    Uuid,
    EventPlatformStatusId,
    StatusType,
    OldStatus,
    NewStatus,
    ChangedByUserId,
    Comment,
    JiraLink,
    CreatedAt,
}
