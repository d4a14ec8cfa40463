use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    category::{self, CategoryRef},
    event::EventFields,
    from_json, ids, to_json,
};
use crate::{
    entities::event_version,
    types::{Platform, PropertySpec},
};

pub const INITIAL_CHANGE_DESCRIPTION: &str = "initial version";

/// Immutable snapshot of an event at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct EventVersion {
    pub id: Uuid,
    pub event_id: Uuid,
    pub version: i32,
    pub category_id: Uuid,
    pub category: String,
    pub block: Option<String>,
    pub action: String,
    pub action_description: String,
    pub name: Option<String>,
    pub value_description: Option<String>,
    pub owner_id: Option<Uuid>,
    pub platforms: Vec<Platform>,
    pub properties: Vec<PropertySpec>,
    pub notes: Option<String>,
    pub change_description: String,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EventVersion {
    fn from_parts(
        model: event_version::Model,
        event_id: Uuid,
        category: CategoryRef,
    ) -> Result<Self, DbErr> {
        Ok(Self {
            id: model.uuid,
            event_id,
            version: model.version,
            category_id: category.uuid,
            category: category.name,
            block: model.block,
            action: model.action,
            action_description: model.action_description,
            name: model.name,
            value_description: model.value_description,
            owner_id: model.owner_id,
            platforms: from_json(model.platforms)?,
            properties: from_json(model.properties)?,
            notes: model.notes,
            change_description: model.change_description,
            author_id: model.author_id,
            created_at: model.created_at,
        })
    }

    async fn event_row_id<C: ConnectionTrait>(db: &C, event_id: Uuid) -> Result<i64, DbErr> {
        ids::event_id_by_uuid(db, event_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Event not found".to_string()))
    }

    /// All snapshots of an event, newest first. Empty for unknown events.
    pub async fn find_by_event<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(row_id) = ids::event_id_by_uuid(db, event_id).await? else {
            return Ok(Vec::new());
        };
        let categories = category::category_refs(db).await?;

        let records = event_version::Entity::find()
            .filter(event_version::Column::EventId.eq(row_id))
            .order_by_desc(event_version::Column::Version)
            .all(db)
            .await?;

        records
            .into_iter()
            .map(|model| {
                let category = categories
                    .get(&model.category_id)
                    .cloned()
                    .ok_or(DbErr::RecordNotFound("Category not found".to_string()))?;
                Self::from_parts(model, event_id, category)
            })
            .collect()
    }

    pub async fn find<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        version: i32,
    ) -> Result<Option<Self>, DbErr> {
        let Some(row_id) = ids::event_id_by_uuid(db, event_id).await? else {
            return Ok(None);
        };
        let Some(model) = event_version::Entity::find()
            .filter(event_version::Column::EventId.eq(row_id))
            .filter(event_version::Column::Version.eq(version))
            .one(db)
            .await?
        else {
            return Ok(None);
        };
        let category = category::category_ref(db, model.category_id).await?;
        Ok(Some(Self::from_parts(model, event_id, category)?))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        version: i32,
        category_id: Uuid,
        fields: &EventFields,
        change_description: &str,
        author_id: Option<Uuid>,
    ) -> Result<Self, DbErr> {
        let event_row_id = Self::event_row_id(db, event_id).await?;
        let category_row_id = ids::category_id_by_uuid(db, category_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Category not found".to_string()))?;

        let active = event_version::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            event_id: Set(event_row_id),
            version: Set(version),
            category_id: Set(category_row_id),
            block: Set(fields.block.clone()),
            action: Set(fields.action.clone()),
            action_description: Set(fields.action_description.clone()),
            name: Set(fields.name.clone()),
            value_description: Set(fields.value_description.clone()),
            owner_id: Set(fields.owner_id),
            platforms: Set(to_json(&fields.platforms)?),
            properties: Set(to_json(&fields.properties)?),
            notes: Set(fields.notes.clone()),
            change_description: Set(change_description.to_string()),
            author_id: Set(author_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        let category = category::category_ref(db, model.category_id).await?;
        Self::from_parts(model, event_id, category)
    }

    /// Rewrites the non-versioned fields of an existing snapshot.
    pub async fn update_non_versioned<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        version: i32,
        fields: &EventFields,
    ) -> Result<Self, DbErr> {
        let event_row_id = Self::event_row_id(db, event_id).await?;
        let record = event_version::Entity::find()
            .filter(event_version::Column::EventId.eq(event_row_id))
            .filter(event_version::Column::Version.eq(version))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Event version not found".to_string()))?;

        let mut active: event_version::ActiveModel = record.into();
        active.block = Set(fields.block.clone());
        active.action_description = Set(fields.action_description.clone());
        active.owner_id = Set(fields.owner_id);
        active.platforms = Set(to_json(&fields.platforms)?);
        active.notes = Set(fields.notes.clone());
        let model = active.update(db).await?;

        let category = category::category_ref(db, model.category_id).await?;
        Self::from_parts(model, event_id, category)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::{category::Category, event::Event};

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn fields(action: &str) -> EventFields {
        EventFields {
            block: Some("onboarding".to_string()),
            action: action.to_string(),
            action_description: String::new(),
            name: None,
            value_description: None,
            owner_id: None,
            platforms: vec![Platform::Web],
            properties: Vec::new(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn versions_are_listed_newest_first() {
        let db = setup_db().await;
        let category = Category::get_or_create(&db, "Auth").await.unwrap();
        let event = Event::create(&db, category.id, &fields("signup"), None)
            .await
            .unwrap();

        EventVersion::create(
            &db,
            event.id,
            1,
            category.id,
            &fields("signup"),
            INITIAL_CHANGE_DESCRIPTION,
            None,
        )
        .await
        .unwrap();
        EventVersion::create(
            &db,
            event.id,
            2,
            category.id,
            &fields("signup_v2"),
            "rename",
            None,
        )
        .await
        .unwrap();

        let versions = EventVersion::find_by_event(&db, event.id).await.unwrap();
        let numbers: Vec<i32> = versions.iter().map(|version| version.version).collect();
        assert_eq!(numbers, vec![2, 1]);
        assert_eq!(versions[1].change_description, "initial version");
    }

    #[tokio::test]
    async fn duplicate_version_number_is_rejected() {
        let db = setup_db().await;
        let category = Category::get_or_create(&db, "Auth").await.unwrap();
        let event = Event::create(&db, category.id, &fields("signup"), None)
            .await
            .unwrap();

        EventVersion::create(&db, event.id, 1, category.id, &fields("signup"), "a", None)
            .await
            .unwrap();
        let duplicate =
            EventVersion::create(&db, event.id, 1, category.id, &fields("signup"), "b", None)
                .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn update_non_versioned_keeps_identity_fields() {
        let db = setup_db().await;
        let category = Category::get_or_create(&db, "Auth").await.unwrap();
        let event = Event::create(&db, category.id, &fields("signup"), None)
            .await
            .unwrap();
        EventVersion::create(&db, event.id, 1, category.id, &fields("signup"), "a", None)
            .await
            .unwrap();

        let owner = Uuid::new_v4();
        let mut proposed = fields("something_else");
        proposed.owner_id = Some(owner);
        proposed.block = None;

        let snapshot = EventVersion::update_non_versioned(&db, event.id, 1, &proposed)
            .await
            .unwrap();
        assert_eq!(snapshot.owner_id, Some(owner));
        assert_eq!(snapshot.block, None);
        assert_eq!(snapshot.action, "signup");
        assert!(EventVersion::find(&db, event.id, 2).await.unwrap().is_none());
    }
}
