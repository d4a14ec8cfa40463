use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    category::{self, CategoryRef},
    event_version::EventVersion,
    from_json, ids,
    platform_status::PlatformStatus,
    status_history::StatusHistoryEntry,
    to_json,
};
use crate::{
    entities::{comment, event, event_platform_status, event_version},
    types::{ImplementationStatus, Platform, PropertySpec},
};

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Event not found")]
    NotFound,
    #[error("Event was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict { expected: i32, actual: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Event {
    pub id: Uuid,
    pub category_id: Uuid,
    pub category: String,
    pub block: Option<String>,
    pub action: String,
    pub action_description: String,
    pub name: Option<String>,
    pub value_description: Option<String>,
    pub owner_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    pub platforms: Vec<Platform>,
    pub properties: Vec<PropertySpec>,
    pub notes: Option<String>,
    pub current_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Every editable event field except the category, after defaults and trimming.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFields {
    pub block: Option<String>,
    pub action: String,
    pub action_description: String,
    pub name: Option<String>,
    pub value_description: Option<String>,
    pub owner_id: Option<Uuid>,
    pub platforms: Vec<Platform>,
    pub properties: Vec<PropertySpec>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateEvent {
    pub category: String,
    pub block: Option<String>,
    pub action: String,
    #[serde(default)]
    pub action_description: String,
    pub name: Option<String>,
    pub value_description: Option<String>,
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
    pub notes: Option<String>,
}

/// Partial update. Absent fields keep their value; an empty string clears an optional text
/// field and an explicit `null` clears the owner.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateEvent {
    pub category: Option<String>,
    pub block: Option<String>,
    pub action: Option<String>,
    pub action_description: Option<String>,
    pub name: Option<String>,
    pub value_description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[ts(optional = nullable)]
    pub owner_id: Option<Option<Uuid>>,
    pub platforms: Option<Vec<Platform>>,
    pub properties: Option<Vec<PropertySpec>>,
    pub notes: Option<String>,
    pub change_description: Option<String>,
    pub expected_version: Option<i32>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct EventFilter {
    pub category_id: Option<Uuid>,
    pub platform: Option<Platform>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct EventDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub event: Event,
    pub versions: Vec<EventVersion>,
    pub statuses: Vec<PlatformStatus>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct MonitoredEvent {
    pub id: Uuid,
    pub category: String,
    pub action: String,
    pub name: Option<String>,
    pub platforms: Vec<Platform>,
    pub current_version: i32,
}

/// Rows removed by a cascading event delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedEventData {
    pub history: u64,
    pub statuses: u64,
    pub versions: u64,
    pub comments: u64,
}

impl Event {
    fn from_parts(model: event::Model, category: CategoryRef) -> Result<Self, DbErr> {
        Ok(Self {
            id: model.uuid,
            category_id: category.uuid,
            category: category.name,
            block: model.block,
            action: model.action,
            action_description: model.action_description,
            name: model.name,
            value_description: model.value_description,
            owner_id: model.owner_id,
            author_id: model.author_id,
            platforms: from_json(model.platforms)?,
            properties: from_json(model.properties)?,
            notes: model.notes,
            current_version: model.current_version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    async fn from_model<C: ConnectionTrait>(db: &C, model: event::Model) -> Result<Self, DbErr> {
        let category = category::category_ref(db, model.category_id).await?;
        Self::from_parts(model, category)
    }

    async fn find_model<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<event::Model>, DbErr> {
        event::Entity::find()
            .filter(event::Column::Uuid.eq(id))
            .one(db)
            .await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        match Self::find_model(db, id).await? {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Events ordered by category name, then action.
    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        filter: &EventFilter,
    ) -> Result<Vec<Self>, DbErr> {
        let categories = category::category_refs(db).await?;

        let mut query = event::Entity::find();
        if let Some(category_id) = filter.category_id {
            let Some(row_id) = ids::category_id_by_uuid(db, category_id).await? else {
                return Ok(Vec::new());
            };
            query = query.filter(event::Column::CategoryId.eq(row_id));
        }

        let mut events = Vec::new();
        for model in query.all(db).await? {
            let category = categories
                .get(&model.category_id)
                .cloned()
                .ok_or(DbErr::RecordNotFound("Category not found".to_string()))?;
            let event = Self::from_parts(model, category)?;
            if filter
                .platform
                .is_some_and(|platform| !event.platforms.contains(&platform))
            {
                continue;
            }
            events.push(event);
        }
        events.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.action.cmp(&b.action))
        });
        Ok(events)
    }

    /// Events whose current version still has at least one platform that is not archived.
    /// Only those platforms are reported.
    pub async fn find_for_monitoring<C: ConnectionTrait>(
        db: &C,
    ) -> Result<Vec<MonitoredEvent>, DbErr> {
        let events = Self::find_all(db, &EventFilter::default()).await?;
        let active: Vec<(i64, i32, Platform)> = event_platform_status::Entity::find()
            .select_only()
            .column(event_platform_status::Column::EventId)
            .column(event_platform_status::Column::VersionNumber)
            .column(event_platform_status::Column::Platform)
            .filter(
                event_platform_status::Column::ImplementationStatus
                    .ne(ImplementationStatus::Archived),
            )
            .into_tuple()
            .all(db)
            .await?;

        let mut active_by_event: HashMap<(i64, i32), Vec<Platform>> = HashMap::new();
        for (event_id, version, platform) in active {
            active_by_event
                .entry((event_id, version))
                .or_default()
                .push(platform);
        }

        let row_ids: HashMap<Uuid, i64> = event::Entity::find()
            .select_only()
            .column(event::Column::Uuid)
            .column(event::Column::Id)
            .into_tuple::<(Uuid, i64)>()
            .all(db)
            .await?
            .into_iter()
            .collect();

        let mut monitored = Vec::new();
        for event in events {
            let Some(row_id) = row_ids.get(&event.id) else {
                continue;
            };
            let Some(platforms) = active_by_event.get_mut(&(*row_id, event.current_version))
            else {
                continue;
            };
            platforms.sort();
            monitored.push(MonitoredEvent {
                id: event.id,
                category: event.category,
                action: event.action,
                name: event.name,
                platforms: platforms.clone(),
                current_version: event.current_version,
            });
        }
        Ok(monitored)
    }

    /// Inserts the event row at version 1. The snapshot and statuses are written by the caller
    /// in the same transaction.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        category_id: Uuid,
        fields: &EventFields,
        author_id: Option<Uuid>,
    ) -> Result<Self, EventError> {
        let category_row_id = ids::category_id_by_uuid(db, category_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Category not found".to_string()))?;

        let now = Utc::now();
        let active = event::ActiveModel {
            id: NotSet,
            uuid: Set(Uuid::new_v4()),
            category_id: Set(category_row_id),
            block: Set(fields.block.clone()),
            action: Set(fields.action.clone()),
            action_description: Set(fields.action_description.clone()),
            name: Set(fields.name.clone()),
            value_description: Set(fields.value_description.clone()),
            owner_id: Set(fields.owner_id),
            author_id: Set(author_id),
            platforms: Set(to_json(&fields.platforms)?),
            properties: Set(to_json(&fields.properties)?),
            notes: Set(fields.notes.clone()),
            current_version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    /// Rewrites every field and bumps `current_version` to `expected_version + 1`, provided
    /// nobody else moved the event past `expected_version` first.
    pub async fn advance_version<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        expected_version: i32,
        category_id: Uuid,
        fields: &EventFields,
    ) -> Result<Self, EventError> {
        let category_row_id = ids::category_id_by_uuid(db, category_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Category not found".to_string()))?;

        let changes = event::ActiveModel {
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
            current_version: Set(expected_version + 1),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        Self::guarded_update(db, id, expected_version, changes).await
    }

    /// Writes only the non-versioned fields, keeping `current_version` as is.
    pub async fn update_in_place<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        expected_version: i32,
        fields: &EventFields,
    ) -> Result<Self, EventError> {
        let changes = event::ActiveModel {
            block: Set(fields.block.clone()),
            action_description: Set(fields.action_description.clone()),
            owner_id: Set(fields.owner_id),
            platforms: Set(to_json(&fields.platforms)?),
            notes: Set(fields.notes.clone()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        Self::guarded_update(db, id, expected_version, changes).await
    }

    async fn guarded_update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        expected_version: i32,
        changes: event::ActiveModel,
    ) -> Result<Self, EventError> {
        let result = event::Entity::update_many()
            .set(changes)
            .filter(event::Column::Uuid.eq(id))
            .filter(event::Column::CurrentVersion.eq(expected_version))
            .exec(db)
            .await?;

        let model = Self::find_model(db, id).await?.ok_or(EventError::NotFound)?;
        if result.rows_affected == 0 {
            return Err(EventError::VersionConflict {
                expected: expected_version,
                actual: model.current_version,
            });
        }
        Ok(Self::from_model(db, model).await?)
    }

    /// Removes the event and everything hanging off it: status history, platform statuses,
    /// version snapshots, comments, then the event row.
    pub async fn delete_with_related_data<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<DeletedEventData, EventError> {
        let row_id = ids::event_id_by_uuid(db, id)
            .await?
            .ok_or(EventError::NotFound)?;

        let status_ids: Vec<i64> = event_platform_status::Entity::find()
            .select_only()
            .column(event_platform_status::Column::Id)
            .filter(event_platform_status::Column::EventId.eq(row_id))
            .into_tuple()
            .all(db)
            .await?;

        let history = StatusHistoryEntry::delete_for_statuses(db, &status_ids).await?;
        let statuses = event_platform_status::Entity::delete_many()
            .filter(event_platform_status::Column::EventId.eq(row_id))
            .exec(db)
            .await?
            .rows_affected;
        let versions = event_version::Entity::delete_many()
            .filter(event_version::Column::EventId.eq(row_id))
            .exec(db)
            .await?
            .rows_affected;
        let comments = comment::Entity::delete_many()
            .filter(comment::Column::EventId.eq(row_id))
            .exec(db)
            .await?
            .rows_affected;
        event::Entity::delete_by_id(row_id).exec(db).await?;

        Ok(DeletedEventData {
            history,
            statuses,
            versions,
            comments,
        })
    }
}

/// Distinct platforms in `platforms` that are missing from `existing`.
pub fn added_platforms(existing: &[Platform], platforms: &[Platform]) -> Vec<Platform> {
    let existing: HashSet<&Platform> = existing.iter().collect();
    let mut added = Vec::new();
    for platform in platforms {
        if !existing.contains(platform) && !added.contains(platform) {
            added.push(*platform);
        }
    }
    added
}
