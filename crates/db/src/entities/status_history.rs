use sea_orm::entity::prelude::*;

use crate::types::StatusType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "status_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub event_platform_status_id: i64,
    pub status_type: StatusType,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_by_user_id: Option<Uuid>,
    pub comment: Option<String>,
    pub jira_link: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
