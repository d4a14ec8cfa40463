use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionSession, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{category, event, event_version},
    models::ids,
};

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Category name must not be empty")]
    EmptyName,
    #[error("Category not found")]
    NotFound,
    #[error("Category '{0}' already exists")]
    AlreadyExists(String),
    #[error("Category is still referenced by {count} event(s)")]
    InUse { count: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CategoryWithEventCount {
    #[serde(flatten)]
    #[ts(flatten)]
    pub category: Category,
    pub event_count: u64,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn normalize_name(name: &str) -> Result<&str, CategoryError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CategoryError::EmptyName);
    }
    Ok(trimmed)
}

/// Public id and name of a category, looked up by row id.
#[derive(Debug, Clone)]
pub(crate) struct CategoryRef {
    pub uuid: Uuid,
    pub name: String,
}

pub(crate) async fn category_ref<C: ConnectionTrait>(
    db: &C,
    row_id: i64,
) -> Result<CategoryRef, DbErr> {
    let record = category::Entity::find_by_id(row_id)
        .one(db)
        .await?
        .ok_or(DbErr::RecordNotFound("Category not found".to_string()))?;
    Ok(CategoryRef {
        uuid: record.uuid,
        name: record.name,
    })
}

pub(crate) async fn category_refs<C: ConnectionTrait>(
    db: &C,
) -> Result<HashMap<i64, CategoryRef>, DbErr> {
    let records = category::Entity::find().all(db).await?;
    Ok(records
        .into_iter()
        .map(|record| {
            (
                record.id,
                CategoryRef {
                    uuid: record.uuid,
                    name: record.name,
                },
            )
        })
        .collect())
}

impl Category {
    pub(crate) fn from_model(model: category::Model) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    async fn find_model_by_name<C: ConnectionTrait>(
        db: &C,
        name: &str,
    ) -> Result<Option<category::Model>, DbErr> {
        category::Entity::find()
            .filter(category::Column::Name.eq(name))
            .one(db)
            .await
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_all_with_event_counts<C: ConnectionTrait>(
        db: &C,
    ) -> Result<Vec<CategoryWithEventCount>, DbErr> {
        let records = category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(db)
            .await?;

        let mut categories = Vec::with_capacity(records.len());
        for record in records {
            let event_count = event::Entity::find()
                .filter(event::Column::CategoryId.eq(record.id))
                .count(db)
                .await?;
            categories.push(CategoryWithEventCount {
                category: Self::from_model(record),
                event_count,
            });
        }
        Ok(categories)
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = category::Entity::find()
            .filter(category::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_name<C: ConnectionTrait>(
        db: &C,
        name: &str,
    ) -> Result<Option<Self>, DbErr> {
        Ok(Self::find_model_by_name(db, name.trim())
            .await?
            .map(Self::from_model))
    }

    /// Resolves a free-text category name, inserting it on first use.
    ///
    /// The insert runs inside a savepoint so that losing a race against a concurrent
    /// insert of the same name leaves the caller's transaction usable; the winner's
    /// row is then returned.
    pub async fn get_or_create<C>(db: &C, name: &str) -> Result<Self, CategoryError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let name = normalize_name(name)?;
        if let Some(existing) = Self::find_model_by_name(db, name).await? {
            return Ok(Self::from_model(existing));
        }

        let now = Utc::now();
        let active = category::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let savepoint = db.begin().await?;
        match active.insert(&savepoint).await {
            Ok(model) => {
                savepoint.commit().await?;
                tracing::debug!(category = name, "Created category");
                Ok(Self::from_model(model))
            }
            Err(err) => {
                savepoint.rollback().await?;
                if let Some(existing) = Self::find_model_by_name(db, name).await? {
                    tracing::debug!(category = name, "Category created concurrently; reusing");
                    return Ok(Self::from_model(existing));
                }
                Err(err.into())
            }
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateCategory,
    ) -> Result<Self, CategoryError> {
        let name = normalize_name(&data.name)?;
        if Self::find_model_by_name(db, name).await?.is_some() {
            return Err(CategoryError::AlreadyExists(name.to_string()));
        }

        let now = Utc::now();
        let active = category::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(data
                .description
                .clone()
                .filter(|description| !description.trim().is_empty())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateCategory,
    ) -> Result<Self, CategoryError> {
        let record = category::Entity::find()
            .filter(category::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(CategoryError::NotFound)?;

        let mut active: category::ActiveModel = record.clone().into();
        if let Some(name) = data.name.as_deref() {
            let name = normalize_name(name)?;
            if name != record.name {
                if Self::find_model_by_name(db, name).await?.is_some() {
                    return Err(CategoryError::AlreadyExists(name.to_string()));
                }
                active.name = Set(name.to_string());
            }
        }
        if let Some(description) = data.description.as_deref() {
            let description = description.trim();
            active.description = Set((!description.is_empty()).then(|| description.to_string()));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Number of distinct events whose live row or any version snapshot points at the
    /// category.
    pub async fn referencing_event_count<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<u64, CategoryError> {
        let row_id = ids::category_id_by_uuid(db, id)
            .await?
            .ok_or(CategoryError::NotFound)?;

        let live: Vec<i64> = event::Entity::find()
            .select_only()
            .column(event::Column::Id)
            .filter(event::Column::CategoryId.eq(row_id))
            .into_tuple()
            .all(db)
            .await?;
        let snapshots: Vec<i64> = event_version::Entity::find()
            .select_only()
            .column(event_version::Column::EventId)
            .filter(event_version::Column::CategoryId.eq(row_id))
            .into_tuple()
            .all(db)
            .await?;

        let referencing: HashSet<i64> = live.into_iter().chain(snapshots).collect();
        Ok(referencing.len() as u64)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, CategoryError> {
        let count = Self::referencing_event_count(db, id).await?;
        if count > 0 {
            return Err(CategoryError::InUse { count });
        }

        let result = category::Entity::delete_many()
            .filter(category::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_and_trims() {
        let db = setup_db().await;

        let first = Category::get_or_create(&db, "Auth").await.unwrap();
        let second = Category::get_or_create(&db, "  Auth ").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Auth");
        assert_eq!(Category::find_all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_or_create_rejects_blank_names() {
        let db = setup_db().await;
        let err = Category::get_or_create(&db, "   ").await.unwrap_err();
        assert!(matches!(err, CategoryError::EmptyName));
    }

    #[tokio::test]
    async fn concurrent_get_or_create_yields_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("categories.sqlite").display()
        );
        let db = crate::DBService::connect(&url).await.unwrap().pool;

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { Category::get_or_create(&db, "Checkout").await })
            })
            .collect();
        let mut category_ids = std::collections::HashSet::new();
        for handle in handles {
            category_ids.insert(handle.await.unwrap().unwrap().id);
        }
        assert_eq!(category_ids.len(), 1);
        assert_eq!(Category::find_all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_or_create_inside_transaction_keeps_transaction_usable() {
        let db = setup_db().await;

        let txn = db.begin().await.unwrap();
        let created = Category::get_or_create(&txn, "Search").await.unwrap();
        let again = Category::get_or_create(&txn, "Search").await.unwrap();
        assert_eq!(created.id, again.id);
        txn.commit().await.unwrap();

        assert!(Category::find_by_name(&db, "Search").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_and_update_reject_duplicate_names() {
        let db = setup_db().await;

        let auth = Category::create(
            &db,
            &CreateCategory {
                name: "Auth".to_string(),
                description: Some("Sign-in flows".to_string()),
            },
        )
        .await
        .unwrap();
        let billing = Category::get_or_create(&db, "Billing").await.unwrap();

        let err = Category::create(
            &db,
            &CreateCategory {
                name: "Auth".to_string(),
                description: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CategoryError::AlreadyExists(_)));

        let err = Category::update(
            &db,
            billing.id,
            &UpdateCategory {
                name: Some("Auth".to_string()),
                description: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CategoryError::AlreadyExists(_)));

        let renamed = Category::update(
            &db,
            auth.id,
            &UpdateCategory {
                name: Some("Authentication".to_string()),
                description: Some(String::new()),
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "Authentication");
        assert_eq!(renamed.description, None);
    }

    #[tokio::test]
    async fn delete_unreferenced_category() {
        let db = setup_db().await;
        let category = Category::get_or_create(&db, "Unused").await.unwrap();

        assert_eq!(Category::delete(&db, category.id).await.unwrap(), 1);
        assert!(Category::find_by_id(&db, category.id).await.unwrap().is_none());
    }
}
