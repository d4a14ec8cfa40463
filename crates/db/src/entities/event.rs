use sea_orm::entity::prelude::*;
use sea_orm::JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub category_id: i64,
    pub block: Option<String>,
    pub action: String,
    pub action_description: String,
    pub name: Option<String>,
    pub value_description: Option<String>,
    pub owner_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    pub platforms: JsonValue,
    pub properties: JsonValue,
    pub notes: Option<String>,
    pub current_version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
