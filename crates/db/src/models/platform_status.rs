use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    event_version::EventVersion,
    ids,
    status_history::{HistoryNote, StatusHistoryEntry},
};
use crate::{
    entities::event_platform_status,
    types::{ImplementationStatus, Platform, StatusType, ValidationStatus},
};

#[derive(Debug, Error)]
pub enum PlatformStatusError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Event not found")]
    EventNotFound,
    #[error("Event version {0} not found")]
    VersionNotFound(i32),
    #[error("No {platform} status for version {version}")]
    NotFound { platform: Platform, version: i32 },
    #[error("A {platform} status already exists for version {version}")]
    AlreadyExists { platform: Platform, version: i32 },
    #[error("Platform {platform} is not listed on version {version}")]
    PlatformNotListed { platform: Platform, version: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct PlatformStatus {
    pub id: Uuid,
    pub event_id: Uuid,
    pub version_number: i32,
    pub platform: Platform,
    pub jira_link: Option<String>,
    pub implementation_status: ImplementationStatus,
    pub validation_status: ValidationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct StatusUpdate {
    pub implementation_status: Option<ImplementationStatus>,
    pub validation_status: Option<ValidationStatus>,
    /// An empty string clears the link.
    pub jira_link: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SetPlatformStatus {
    #[serde(flatten)]
    #[ts(flatten)]
    pub update: StatusUpdate,
    /// Defaults to the event's current version.
    pub version_number: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreatePlatformStatus {
    pub platform: Platform,
    pub version_number: Option<i32>,
    pub implementation_status: Option<ImplementationStatus>,
    pub validation_status: Option<ValidationStatus>,
    pub jira_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct StatusChange {
    pub status: PlatformStatus,
    /// History rows written by this change, empty when nothing differed.
    pub history: Vec<StatusHistoryEntry>,
}

fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl PlatformStatus {
    fn from_model(model: event_platform_status::Model, event_id: Uuid) -> Self {
        Self {
            id: model.uuid,
            event_id,
            version_number: model.version_number,
            platform: model.platform,
            jira_link: model.jira_link,
            implementation_status: model.implementation_status,
            validation_status: model.validation_status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    async fn event_row_id<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
    ) -> Result<i64, PlatformStatusError> {
        ids::event_id_by_uuid(db, event_id)
            .await?
            .ok_or(PlatformStatusError::EventNotFound)
    }

    async fn find_model<C: ConnectionTrait>(
        db: &C,
        event_row_id: i64,
        platform: Platform,
        version: i32,
    ) -> Result<Option<event_platform_status::Model>, DbErr> {
        event_platform_status::Entity::find()
            .filter(event_platform_status::Column::EventId.eq(event_row_id))
            .filter(event_platform_status::Column::VersionNumber.eq(version))
            .filter(event_platform_status::Column::Platform.eq(platform))
            .one(db)
            .await
    }

    pub async fn find<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        platform: Platform,
        version: i32,
    ) -> Result<Option<Self>, DbErr> {
        let Some(event_row_id) = ids::event_id_by_uuid(db, event_id).await? else {
            return Ok(None);
        };
        Ok(Self::find_model(db, event_row_id, platform, version)
            .await?
            .map(|model| Self::from_model(model, event_id)))
    }

    /// Statuses of one version, ordered by platform.
    pub async fn find_for_version<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        version: i32,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(event_row_id) = ids::event_id_by_uuid(db, event_id).await? else {
            return Ok(Vec::new());
        };
        let mut statuses: Vec<Self> = event_platform_status::Entity::find()
            .filter(event_platform_status::Column::EventId.eq(event_row_id))
            .filter(event_platform_status::Column::VersionNumber.eq(version))
            .all(db)
            .await?
            .into_iter()
            .map(|model| Self::from_model(model, event_id))
            .collect();
        statuses.sort_by_key(|status| status.platform);
        Ok(statuses)
    }

    /// Inserts a `draft`/`pending` row per platform without writing history.
    pub async fn create_defaults<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        version: i32,
        platforms: &[Platform],
    ) -> Result<Vec<Self>, PlatformStatusError> {
        let event_row_id = Self::event_row_id(db, event_id).await?;
        let now = Utc::now();

        let mut created = Vec::with_capacity(platforms.len());
        for platform in platforms {
            let active = event_platform_status::ActiveModel {
                uuid: Set(Uuid::new_v4()),
                event_id: Set(event_row_id),
                version_number: Set(version),
                platform: Set(*platform),
                jira_link: Set(None),
                implementation_status: Set(ImplementationStatus::default()),
                validation_status: Set(ValidationStatus::default()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            let model = active.insert(db).await?;
            created.push(Self::from_model(model, event_id));
        }
        Ok(created)
    }

    /// Creates a single status on an existing version. Fields given a non-default initial
    /// value get a history row with no old status.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        version: i32,
        data: &CreatePlatformStatus,
        changed_by_user_id: Option<Uuid>,
    ) -> Result<StatusChange, PlatformStatusError> {
        let event_row_id = Self::event_row_id(db, event_id).await?;
        let snapshot = EventVersion::find(db, event_id, version)
            .await?
            .ok_or(PlatformStatusError::VersionNotFound(version))?;
        if !snapshot.platforms.contains(&data.platform) {
            return Err(PlatformStatusError::PlatformNotListed {
                platform: data.platform,
                version,
            });
        }
        if Self::find_model(db, event_row_id, data.platform, version)
            .await?
            .is_some()
        {
            return Err(PlatformStatusError::AlreadyExists {
                platform: data.platform,
                version,
            });
        }

        let implementation_status = data.implementation_status.unwrap_or_default();
        let validation_status = data.validation_status.unwrap_or_default();
        let jira_link = normalize_text(data.jira_link.as_deref());
        let now = Utc::now();
        let active = event_platform_status::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            event_id: Set(event_row_id),
            version_number: Set(version),
            platform: Set(data.platform),
            jira_link: Set(jira_link.clone()),
            implementation_status: Set(implementation_status),
            validation_status: Set(validation_status),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active.insert(db).await?;

        let note = HistoryNote {
            changed_by_user_id,
            comment: None,
            jira_link,
        };
        let mut history = Vec::new();
        if implementation_status != ImplementationStatus::default() {
            history.push(
                StatusHistoryEntry::append(
                    db,
                    model.id,
                    StatusType::Implementation,
                    None,
                    implementation_status.to_string(),
                    &note,
                )
                .await?,
            );
        }
        if validation_status != ValidationStatus::default() {
            history.push(
                StatusHistoryEntry::append(
                    db,
                    model.id,
                    StatusType::Validation,
                    None,
                    validation_status.to_string(),
                    &note,
                )
                .await?,
            );
        }

        Ok(StatusChange {
            status: Self::from_model(model, event_id),
            history,
        })
    }

    /// Applies the supplied fields. Each status field whose value actually changes gets one
    /// history row, written before the status row itself is updated.
    pub async fn apply_update<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        platform: Platform,
        version: i32,
        update: &StatusUpdate,
        changed_by_user_id: Option<Uuid>,
    ) -> Result<StatusChange, PlatformStatusError> {
        let event_row_id = Self::event_row_id(db, event_id).await?;
        let record = Self::find_model(db, event_row_id, platform, version)
            .await?
            .ok_or(PlatformStatusError::NotFound { platform, version })?;

        let jira_link = match update.jira_link.as_deref() {
            Some(link) => normalize_text(Some(link)),
            None => record.jira_link.clone(),
        };
        let note = HistoryNote {
            changed_by_user_id,
            comment: normalize_text(update.comment.as_deref()),
            jira_link: normalize_text(update.jira_link.as_deref()),
        };

        let mut history = Vec::new();
        let implementation_changed = update
            .implementation_status
            .filter(|status| *status != record.implementation_status);
        if let Some(new_status) = implementation_changed {
            history.push(
                StatusHistoryEntry::append(
                    db,
                    record.id,
                    StatusType::Implementation,
                    Some(record.implementation_status.to_string()),
                    new_status.to_string(),
                    &note,
                )
                .await?,
            );
        }
        let validation_changed = update
            .validation_status
            .filter(|status| *status != record.validation_status);
        if let Some(new_status) = validation_changed {
            history.push(
                StatusHistoryEntry::append(
                    db,
                    record.id,
                    StatusType::Validation,
                    Some(record.validation_status.to_string()),
                    new_status.to_string(),
                    &note,
                )
                .await?,
            );
        }

        let link_changed = jira_link != record.jira_link;
        if history.is_empty() && !link_changed {
            return Ok(StatusChange {
                status: Self::from_model(record, event_id),
                history,
            });
        }

        let mut active: event_platform_status::ActiveModel = record.into();
        if let Some(status) = implementation_changed {
            active.implementation_status = Set(status);
        }
        if let Some(status) = validation_changed {
            active.validation_status = Set(status);
        }
        if link_changed {
            active.jira_link = Set(jira_link);
        }
        active.updated_at = Set(Utc::now());
        let model = active.update(db).await?;

        tracing::debug!(
            event_id = %event_id,
            platform = %platform,
            version,
            transitions = history.len(),
            "Platform status updated"
        );
        Ok(StatusChange {
            status: Self::from_model(model, event_id),
            history,
        })
    }

    /// Deletes one status row after its history.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        platform: Platform,
        version: i32,
    ) -> Result<u64, PlatformStatusError> {
        let event_row_id = Self::event_row_id(db, event_id).await?;
        let Some(record) = Self::find_model(db, event_row_id, platform, version).await? else {
            return Ok(0);
        };

        StatusHistoryEntry::delete_for_statuses(db, &[record.id]).await?;
        let result = event_platform_status::Entity::delete_by_id(record.id)
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
