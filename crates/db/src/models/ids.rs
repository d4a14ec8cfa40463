use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::{category, comment, event, event_platform_status};

pub async fn category_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    category::Entity::find()
        .select_only()
        .column(category::Column::Id)
        .filter(category::Column::Uuid.eq(uuid))
        .into_tuple()
        .one(db)
        .await
}

pub async fn event_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    event::Entity::find()
        .select_only()
        .column(event::Column::Id)
        .filter(event::Column::Uuid.eq(uuid))
        .into_tuple()
        .one(db)
        .await
}

pub async fn platform_status_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    event_platform_status::Entity::find()
        .select_only()
        .column(event_platform_status::Column::Id)
        .filter(event_platform_status::Column::Uuid.eq(uuid))
        .into_tuple()
        .one(db)
        .await
}

pub async fn platform_status_uuid_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<Uuid>, DbErr> {
    event_platform_status::Entity::find()
        .select_only()
        .column(event_platform_status::Column::Uuid)
        .filter(event_platform_status::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn comment_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    comment::Entity::find()
        .select_only()
        .column(comment::Column::Id)
        .filter(comment::Column::Uuid.eq(uuid))
        .into_tuple()
        .one(db)
        .await
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use crate::models::category::Category;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn uuid_resolution_finds_rows_and_misses_unknown_ids() {
        let db = setup_db().await;

        let category = Category::get_or_create(&db, "Auth").await.unwrap();
        let row_id = category_id_by_uuid(&db, category.id)
            .await
            .unwrap()
            .expect("category row id");
        assert!(row_id > 0);
        assert_eq!(
            category_id_by_uuid(&db, Uuid::new_v4()).await.unwrap(),
            None
        );

        assert_eq!(event_id_by_uuid(&db, Uuid::new_v4()).await.unwrap(), None);
        assert_eq!(
            platform_status_id_by_uuid(&db, Uuid::new_v4()).await.unwrap(),
            None
        );
    }
}
