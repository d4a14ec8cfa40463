use sea_orm::entity::prelude::*;

use crate::types::{ImplementationStatus, Platform, ValidationStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "event_platform_statuses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub event_id: i64,
    pub version_number: i32,
    pub platform: Platform,
    pub jira_link: Option<String>,
    pub implementation_status: ImplementationStatus,
    pub validation_status: ValidationStatus,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
