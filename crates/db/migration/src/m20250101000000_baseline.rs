use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Categories::Table)
                    .col(pk_id_col(manager, Categories::Id))
                    .col(uuid_col(Categories::Uuid))
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::Description).text())
                    .col(timestamp_col(Categories::CreatedAt))
                    .col(timestamp_col(Categories::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_categories_uuid")
                    .table(Categories::Table)
                    .col(Categories::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_categories_name")
                    .table(Categories::Table)
                    .col(Categories::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Events::Table)
                    .col(pk_id_col(manager, Events::Id))
                    .col(uuid_col(Events::Uuid))
                    .col(fk_id_col(manager, Events::CategoryId))
                    .col(ColumnDef::new(Events::Block).string())
                    .col(ColumnDef::new(Events::Action).string().not_null())
                    .col(
                        ColumnDef::new(Events::ActionDescription)
                            .text()
                            .not_null()
                            .default(Expr::val("")),
                    )
                    .col(ColumnDef::new(Events::Name).string())
                    .col(ColumnDef::new(Events::ValueDescription).text())
                    .col(uuid_nullable_col(Events::OwnerId))
                    .col(uuid_nullable_col(Events::AuthorId))
                    .col(ColumnDef::new(Events::Platforms).json().not_null())
                    .col(ColumnDef::new(Events::Properties).json().not_null())
                    .col(ColumnDef::new(Events::Notes).text())
                    .col(
                        ColumnDef::new(Events::CurrentVersion)
                            .integer()
                            .not_null()
                            .default(Expr::val(1)),
                    )
                    .col(timestamp_col(Events::CreatedAt))
                    .col(timestamp_col(Events::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_events_category_id")
                            .from(Events::Table, Events::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_uuid")
                    .table(Events::Table)
                    .col(Events::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_category_id")
                    .table(Events::Table)
                    .col(Events::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(EventVersions::Table)
                    .col(pk_id_col(manager, EventVersions::Id))
                    .col(uuid_col(EventVersions::Uuid))
                    .col(fk_id_col(manager, EventVersions::EventId))
                    .col(ColumnDef::new(EventVersions::Version).integer().not_null())
                    .col(fk_id_col(manager, EventVersions::CategoryId))
                    .col(ColumnDef::new(EventVersions::Block).string())
                    .col(ColumnDef::new(EventVersions::Action).string().not_null())
                    .col(
                        ColumnDef::new(EventVersions::ActionDescription)
                            .text()
                            .not_null()
                            .default(Expr::val("")),
                    )
                    .col(ColumnDef::new(EventVersions::Name).string())
                    .col(ColumnDef::new(EventVersions::ValueDescription).text())
                    .col(uuid_nullable_col(EventVersions::OwnerId))
                    .col(ColumnDef::new(EventVersions::Platforms).json().not_null())
                    .col(ColumnDef::new(EventVersions::Properties).json().not_null())
                    .col(ColumnDef::new(EventVersions::Notes).text())
                    .col(
                        ColumnDef::new(EventVersions::ChangeDescription)
                            .text()
                            .not_null(),
                    )
                    .col(uuid_nullable_col(EventVersions::AuthorId))
                    .col(timestamp_col(EventVersions::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_versions_event_id")
                            .from(EventVersions::Table, EventVersions::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_versions_category_id")
                            .from(EventVersions::Table, EventVersions::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_versions_uuid")
                    .table(EventVersions::Table)
                    .col(EventVersions::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_versions_event_version")
                    .table(EventVersions::Table)
                    .col(EventVersions::EventId)
                    .col(EventVersions::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Comments::Table)
                    .col(pk_id_col(manager, Comments::Id))
                    .col(uuid_col(Comments::Uuid))
                    .col(fk_id_col(manager, Comments::EventId))
                    .col(ColumnDef::new(Comments::Content).text().not_null())
                    .col(ColumnDef::new(Comments::Author).string().not_null())
                    .col(timestamp_col(Comments::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_event_id")
                            .from(Comments::Table, Comments::EventId)
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
                    .name("idx_comments_uuid")
                    .table(Comments::Table)
                    .col(Comments::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_comments_event_id")
                    .table(Comments::Table)
                    .col(Comments::EventId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventVersions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
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

fn uuid_nullable_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Uuid,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Events {
    Table,
    Id,
    Uuid,
    CategoryId,
    Block,
    Action,
    ActionDescription,
    Name,
    ValueDescription,
    OwnerId,
    AuthorId,
    Platforms,
    Properties,
    Notes,
    CurrentVersion,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum EventVersions {
    Table,
    Id,
    Uuid,
    EventId,
    Version,
    CategoryId,
    Block,
    Action,
    ActionDescription,
    Name,
    ValueDescription,
    OwnerId,
    Platforms,
    Properties,
    Notes,
    ChangeDescription,
    AuthorId,
    CreatedAt,
}

#[derive(Iden)]
enum Comments {
    Table,
    Id,
    Uuid,
    EventId,
    Content,
    Author,
    CreatedAt,
}
