use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::ids;
use crate::{entities::status_history, types::StatusType};

/// One recorded transition of a platform status. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub platform_status_id: Uuid,
    pub status_type: StatusType,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_by_user_id: Option<Uuid>,
    pub comment: Option<String>,
    pub jira_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Annotation attached to every history row written by one status change.
#[derive(Debug, Clone, Default)]
pub struct HistoryNote {
    pub changed_by_user_id: Option<Uuid>,
    pub comment: Option<String>,
    pub jira_link: Option<String>,
}

impl StatusHistoryEntry {
    fn from_model(model: status_history::Model, platform_status_id: Uuid) -> Self {
        Self {
            id: model.uuid,
            platform_status_id,
            status_type: model.status_type,
            old_status: model.old_status,
            new_status: model.new_status,
            changed_by_user_id: model.changed_by_user_id,
            comment: model.comment,
            jira_link: model.jira_link,
            created_at: model.created_at,
        }
    }

    pub(crate) async fn append<C: ConnectionTrait>(
        db: &C,
        platform_status_row_id: i64,
        status_type: StatusType,
        old_status: Option<String>,
        new_status: String,
        note: &HistoryNote,
    ) -> Result<Self, DbErr> {
        let platform_status_id = ids::platform_status_uuid_by_id(db, platform_status_row_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Platform status not found".to_string()))?;

        let active = status_history::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            event_platform_status_id: Set(platform_status_row_id),
            status_type: Set(status_type),
            old_status: Set(old_status),
            new_status: Set(new_status),
            changed_by_user_id: Set(note.changed_by_user_id),
            comment: Set(note.comment.clone()),
            jira_link: Set(note.jira_link.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model, platform_status_id))
    }

    /// History of one platform status, newest first.
    pub async fn find_by_platform_status<C: ConnectionTrait>(
        db: &C,
        platform_status_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(row_id) = ids::platform_status_id_by_uuid(db, platform_status_id).await? else {
            return Ok(Vec::new());
        };
        let records = status_history::Entity::find()
            .filter(status_history::Column::EventPlatformStatusId.eq(row_id))
            .order_by_desc(status_history::Column::CreatedAt)
            .order_by_desc(status_history::Column::Id)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| Self::from_model(model, platform_status_id))
            .collect())
    }

    pub(crate) async fn delete_for_statuses<C: ConnectionTrait>(
        db: &C,
        platform_status_row_ids: &[i64],
    ) -> Result<u64, DbErr> {
        if platform_status_row_ids.is_empty() {
            return Ok(0);
        }
        let result = status_history::Entity::delete_many()
            .filter(
                status_history::Column::EventPlatformStatusId
                    .is_in(platform_status_row_ids.iter().copied()),
            )
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
