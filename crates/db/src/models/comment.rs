use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::ids;
use crate::entities::comment;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Comment content must not be empty")]
    EmptyContent,
    #[error("Event not found")]
    EventNotFound,
    #[error("Comment not found")]
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Comment {
    pub id: Uuid,
    pub event_id: Uuid,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateComment {
    pub content: String,
}

impl Comment {
    fn from_model(model: comment::Model, event_id: Uuid) -> Self {
        Self {
            id: model.uuid,
            event_id,
            content: model.content,
            author: model.author,
            created_at: model.created_at,
        }
    }

    /// Comments on an event, oldest first.
    pub async fn find_by_event<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(event_row_id) = ids::event_id_by_uuid(db, event_id).await? else {
            return Ok(Vec::new());
        };
        let records = comment::Entity::find()
            .filter(comment::Column::EventId.eq(event_row_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| Self::from_model(model, event_id))
            .collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        event_id: Uuid,
        content: &str,
        author: &str,
    ) -> Result<Self, CommentError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CommentError::EmptyContent);
        }
        let event_row_id = ids::event_id_by_uuid(db, event_id)
            .await?
            .ok_or(CommentError::EventNotFound)?;

        let active = comment::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            event_id: Set(event_row_id),
            content: Set(content.to_string()),
            author: Set(author.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model, event_id))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<(), CommentError> {
        let row_id = ids::comment_id_by_uuid(db, id)
            .await?
            .ok_or(CommentError::NotFound)?;
        comment::Entity::delete_by_id(row_id).exec(db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::{
        models::{
            category::Category,
            event::{Event, EventFields},
        },
        types::Platform,
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_event(db: &sea_orm::DatabaseConnection) -> Uuid {
        let category = Category::get_or_create(db, "Auth").await.unwrap();
        let fields = EventFields {
            block: None,
            action: "signup".to_string(),
            action_description: String::new(),
            name: None,
            value_description: None,
            owner_id: None,
            platforms: vec![Platform::Web],
            properties: Vec::new(),
            notes: None,
        };
        Event::create(db, category.id, &fields, None).await.unwrap().id
    }

    #[tokio::test]
    async fn comments_are_trimmed_and_listed_oldest_first() {
        let db = setup_db().await;
        let event_id = seed_event(&db).await;

        Comment::create(&db, event_id, "  first  ", "ana").await.unwrap();
        Comment::create(&db, event_id, "second", "li").await.unwrap();

        let comments = Comment::find_by_event(&db, event_id).await.unwrap();
        let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn empty_comment_is_rejected() {
        let db = setup_db().await;
        let event_id = seed_event(&db).await;

        let err = Comment::create(&db, event_id, "   ", "ana").await.unwrap_err();
        assert!(matches!(err, CommentError::EmptyContent));

        let err = Comment::create(&db, Uuid::new_v4(), "hello", "ana")
            .await
            .unwrap_err();
        assert!(matches!(err, CommentError::EventNotFound));
    }

    #[tokio::test]
    async fn delete_missing_comment_is_not_found() {
        let db = setup_db().await;
        let event_id = seed_event(&db).await;
        let comment = Comment::create(&db, event_id, "hello", "ana").await.unwrap();

        Comment::delete(&db, comment.id).await.unwrap();
        let err = Comment::delete(&db, comment.id).await.unwrap_err();
        assert!(matches!(err, CommentError::NotFound));
    }
}
