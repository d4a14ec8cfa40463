use std::collections::HashSet;

use db::{
    BusyError, DatabaseConnection, DbErr, TransactionTrait,
    models::{
        category::{
            Category, CategoryError, CategoryWithEventCount, CreateCategory, UpdateCategory,
        },
        comment::{Comment, CommentError},
        event::{
            CreateEvent, Event, EventDetail, EventError, EventFields, EventFilter, MonitoredEvent,
            UpdateEvent, added_platforms,
        },
        event_version::{EventVersion, INITIAL_CHANGE_DESCRIPTION},
        platform_status::{
            CreatePlatformStatus, PlatformStatus, PlatformStatusError, SetPlatformStatus,
            StatusChange,
        },
        status_history::StatusHistoryEntry,
    },
    retry_on_sqlite_busy,
    types::{Platform, PropertySpec, normalize_platforms},
};
use thiserror::Error;
use uuid::Uuid;

use super::versioning::{self, VersionedFields};

#[derive(Debug, Error)]
pub enum TrackingPlanError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("Category is still used by {count} event(s)")]
    CategoryInUse { count: u64 },
    #[error("Event was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict { expected: i32, actual: i32 },
}

pub type Result<T> = std::result::Result<T, TrackingPlanError>;

impl TrackingPlanError {
    fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl BusyError for TrackingPlanError {
    fn is_sqlite_busy(&self) -> bool {
        matches!(self, Self::Database(err) if err.is_sqlite_busy())
    }
}

impl From<CategoryError> for TrackingPlanError {
    fn from(err: CategoryError) -> Self {
        match err {
            CategoryError::Database(err) => Self::Database(err),
            CategoryError::EmptyName => Self::validation("category", "must not be empty"),
            CategoryError::NotFound => Self::NotFound("Category"),
            CategoryError::AlreadyExists(name) => {
                Self::Conflict(format!("Category '{name}' already exists"))
            }
            CategoryError::InUse { count } => Self::CategoryInUse { count },
        }
    }
}

impl From<EventError> for TrackingPlanError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::Database(err) => Self::Database(err),
            EventError::NotFound => Self::NotFound("Event"),
            EventError::VersionConflict { expected, actual } => {
                Self::VersionConflict { expected, actual }
            }
        }
    }
}

impl From<PlatformStatusError> for TrackingPlanError {
    fn from(err: PlatformStatusError) -> Self {
        match err {
            PlatformStatusError::Database(err) => Self::Database(err),
            PlatformStatusError::EventNotFound => Self::NotFound("Event"),
            PlatformStatusError::VersionNotFound(_) => Self::NotFound("Event version"),
            PlatformStatusError::NotFound { .. } => Self::NotFound("Platform status"),
            err @ PlatformStatusError::AlreadyExists { .. } => Self::Conflict(err.to_string()),
            err @ PlatformStatusError::PlatformNotListed { .. } => {
                Self::validation("platform", err.to_string())
            }
        }
    }
}

impl From<CommentError> for TrackingPlanError {
    fn from(err: CommentError) -> Self {
        match err {
            CommentError::Database(err) => Self::Database(err),
            CommentError::EmptyContent => Self::validation("content", "must not be empty"),
            CommentError::EventNotFound => Self::NotFound("Event"),
            CommentError::NotFound => Self::NotFound("Comment"),
        }
    }
}

/// A fully resolved event state: what the event would look like after the edit.
#[derive(Debug, Clone)]
struct ProposedEvent {
    category: String,
    fields: EventFields,
}

fn trimmed_or_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn required_text(field: &'static str, value: &str) -> Result<String> {
    trimmed_or_none(value).ok_or_else(|| TrackingPlanError::validation(field, "must not be empty"))
}

fn validate_properties(properties: &[PropertySpec]) -> Result<Vec<PropertySpec>> {
    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(properties.len());
    for property in properties {
        let name = property.name.trim();
        if name.is_empty() {
            return Err(TrackingPlanError::validation(
                "properties",
                "property names must not be empty",
            ));
        }
        if !seen.insert(name.to_string()) {
            return Err(TrackingPlanError::validation(
                "properties",
                format!("duplicate property '{name}'"),
            ));
        }
        let property_type = property.property_type.trim();
        if property_type.is_empty() {
            return Err(TrackingPlanError::validation(
                "properties",
                format!("property '{name}' has no type"),
            ));
        }
        validated.push(PropertySpec {
            name: name.to_string(),
            property_type: property_type.to_string(),
            required: property.required,
            description: property.description.trim().to_string(),
        });
    }
    Ok(validated)
}

impl ProposedEvent {
    fn from_create(data: &CreateEvent) -> Result<Self> {
        Ok(Self {
            category: required_text("category", &data.category)?,
            fields: EventFields {
                block: data.block.as_deref().and_then(trimmed_or_none),
                action: required_text("action", &data.action)?,
                action_description: data.action_description.trim().to_string(),
                name: data.name.as_deref().and_then(trimmed_or_none),
                value_description: data.value_description.as_deref().and_then(trimmed_or_none),
                owner_id: data.owner_id,
                platforms: normalize_platforms(&data.platforms),
                properties: validate_properties(&data.properties)?,
                notes: data.notes.as_deref().and_then(trimmed_or_none),
            },
        })
    }

    fn from_update(current: &Event, data: &UpdateEvent) -> Result<Self> {
        let optional = |update: &Option<String>, current: &Option<String>| match update {
            Some(value) => trimmed_or_none(value),
            None => current.clone(),
        };

        Ok(Self {
            category: match data.category.as_deref() {
                Some(category) => required_text("category", category)?,
                None => current.category.clone(),
            },
            fields: EventFields {
                block: optional(&data.block, &current.block),
                action: match data.action.as_deref() {
                    Some(action) => required_text("action", action)?,
                    None => current.action.clone(),
                },
                action_description: data
                    .action_description
                    .as_deref()
                    .map(|value| value.trim().to_string())
                    .unwrap_or_else(|| current.action_description.clone()),
                name: optional(&data.name, &current.name),
                value_description: optional(&data.value_description, &current.value_description),
                owner_id: data.owner_id.unwrap_or(current.owner_id),
                platforms: data
                    .platforms
                    .as_deref()
                    .map(normalize_platforms)
                    .unwrap_or_else(|| current.platforms.clone()),
                properties: match data.properties.as_deref() {
                    Some(properties) => validate_properties(properties)?,
                    None => current.properties.clone(),
                },
                notes: optional(&data.notes, &current.notes),
            },
        })
    }

    fn versioned(&self) -> VersionedFields<'_> {
        VersionedFields {
            category: &self.category,
            action: &self.fields.action,
            name: self.fields.name.as_deref(),
            value_description: self.fields.value_description.as_deref(),
            properties: &self.fields.properties,
        }
    }
}

fn change_description(requested: Option<&str>, version: i32) -> String {
    requested
        .and_then(trimmed_or_none)
        .unwrap_or_else(|| format!("update to version {version}"))
}

/// Event versioning and per-platform status engine. Every write runs in one transaction and
/// is retried as a whole while SQLite reports the database as busy.
#[derive(Clone, Default)]
pub struct TrackingPlanService;

impl TrackingPlanService {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_categories(
        &self,
        db: &DatabaseConnection,
    ) -> Result<Vec<CategoryWithEventCount>> {
        Ok(Category::find_all_with_event_counts(db).await?)
    }

    pub async fn get_category(&self, db: &DatabaseConnection, id: Uuid) -> Result<Category> {
        Category::find_by_id(db, id)
            .await?
            .ok_or(TrackingPlanError::NotFound("Category"))
    }

    pub async fn get_or_create_category(
        &self,
        db: &DatabaseConnection,
        name: &str,
    ) -> Result<Category> {
        retry_on_sqlite_busy(|| async {
            Ok::<_, TrackingPlanError>(Category::get_or_create(db, name).await?)
        })
        .await
    }

    pub async fn create_category(
        &self,
        db: &DatabaseConnection,
        data: &CreateCategory,
    ) -> Result<Category> {
        let category = retry_on_sqlite_busy(|| async {
            Ok::<_, TrackingPlanError>(Category::create(db, data).await?)
        })
        .await?;
        tracing::info!(category_id = %category.id, name = %category.name, "Created category");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        db: &DatabaseConnection,
        id: Uuid,
        data: &UpdateCategory,
    ) -> Result<Category> {
        retry_on_sqlite_busy(|| async {
            Ok::<_, TrackingPlanError>(Category::update(db, id, data).await?)
        })
        .await
    }

    pub async fn delete_category(&self, db: &DatabaseConnection, id: Uuid) -> Result<()> {
        retry_on_sqlite_busy(|| async {
            let tx = db.begin().await?;
            Category::delete(&tx, id).await?;
            tx.commit().await?;
            Ok::<_, TrackingPlanError>(())
        })
        .await?;
        tracing::info!(category_id = %id, "Deleted category");
        Ok(())
    }

    pub async fn list_events(
        &self,
        db: &DatabaseConnection,
        filter: &EventFilter,
    ) -> Result<Vec<Event>> {
        Ok(Event::find_all(db, filter).await?)
    }

    pub async fn get_event(&self, db: &DatabaseConnection, id: Uuid) -> Result<Event> {
        Event::find_by_id(db, id)
            .await?
            .ok_or(TrackingPlanError::NotFound("Event"))
    }

    pub async fn get_event_detail(&self, db: &DatabaseConnection, id: Uuid) -> Result<EventDetail> {
        let event = self.get_event(db, id).await?;
        let versions = EventVersion::find_by_event(db, id).await?;
        let statuses = PlatformStatus::find_for_version(db, id, event.current_version).await?;
        Ok(EventDetail {
            event,
            versions,
            statuses,
        })
    }

    pub async fn list_versions(
        &self,
        db: &DatabaseConnection,
        id: Uuid,
    ) -> Result<Vec<EventVersion>> {
        self.get_event(db, id).await?;
        Ok(EventVersion::find_by_event(db, id).await?)
    }

    pub async fn get_version(
        &self,
        db: &DatabaseConnection,
        id: Uuid,
        version: i32,
    ) -> Result<EventVersion> {
        self.get_event(db, id).await?;
        EventVersion::find(db, id, version)
            .await?
            .ok_or(TrackingPlanError::NotFound("Event version"))
    }

    pub async fn events_for_monitoring(
        &self,
        db: &DatabaseConnection,
    ) -> Result<Vec<MonitoredEvent>> {
        Ok(Event::find_for_monitoring(db).await?)
    }

    /// Creates the event at version 1 with its snapshot and one `draft`/`pending` status per
    /// platform.
    pub async fn create_event(
        &self,
        db: &DatabaseConnection,
        data: &CreateEvent,
        actor: Option<Uuid>,
    ) -> Result<Event> {
        let proposal = ProposedEvent::from_create(data)?;
        let event = retry_on_sqlite_busy(|| Self::create_event_once(db, &proposal, actor)).await?;
        tracing::info!(
            event_id = %event.id,
            category = %event.category,
            action = %event.action,
            platforms = event.platforms.len(),
            "Created event"
        );
        Ok(event)
    }

    async fn create_event_once(
        db: &DatabaseConnection,
        proposal: &ProposedEvent,
        actor: Option<Uuid>,
    ) -> Result<Event> {
        let tx = db.begin().await?;
        let category = Category::get_or_create(&tx, &proposal.category).await?;
        let event = Event::create(&tx, category.id, &proposal.fields, actor).await?;
        EventVersion::create(
            &tx,
            event.id,
            event.current_version,
            category.id,
            &proposal.fields,
            INITIAL_CHANGE_DESCRIPTION,
            actor,
        )
        .await?;
        PlatformStatus::create_defaults(
            &tx,
            event.id,
            event.current_version,
            &proposal.fields.platforms,
        )
        .await?;
        tx.commit().await?;
        Ok(event)
    }

    /// Applies a partial update. Edits touching category, action, name, value description
    /// or properties cut a new version with fresh statuses; anything else is written in place
    /// on the current version.
    pub async fn update_event(
        &self,
        db: &DatabaseConnection,
        id: Uuid,
        data: &UpdateEvent,
        actor: Option<Uuid>,
    ) -> Result<Event> {
        retry_on_sqlite_busy(|| Self::update_event_once(db, id, data, actor)).await
    }

    async fn update_event_once(
        db: &DatabaseConnection,
        id: Uuid,
        data: &UpdateEvent,
        actor: Option<Uuid>,
    ) -> Result<Event> {
        let tx = db.begin().await?;
        let event = Event::find_by_id(&tx, id)
            .await?
            .ok_or(TrackingPlanError::NotFound("Event"))?;
        if let Some(expected) = data.expected_version
            && expected != event.current_version
        {
            return Err(TrackingPlanError::VersionConflict {
                expected,
                actual: event.current_version,
            });
        }

        let proposal = ProposedEvent::from_update(&event, data)?;
        let snapshot = EventVersion::find(&tx, id, event.current_version)
            .await?
            .ok_or(DbErr::RecordNotFound(format!(
                "Snapshot for version {} of event {id} is missing",
                event.current_version
            )))?;
        let change = versioning::diff(&VersionedFields::from(&snapshot), &proposal.versioned());

        let updated = if change.requires_new_version() {
            let next_version = event.current_version + 1;
            let category = Category::get_or_create(&tx, &proposal.category).await?;
            let updated = Event::advance_version(
                &tx,
                id,
                event.current_version,
                category.id,
                &proposal.fields,
            )
            .await?;
            EventVersion::create(
                &tx,
                id,
                next_version,
                category.id,
                &proposal.fields,
                &change_description(data.change_description.as_deref(), next_version),
                actor,
            )
            .await?;
            PlatformStatus::create_defaults(&tx, id, next_version, &proposal.fields.platforms)
                .await?;
            tracing::info!(
                event_id = %id,
                version = next_version,
                changed = ?change.changed_fields(),
                "Cut new event version"
            );
            updated
        } else {
            let version = event.current_version;
            let updated = Event::update_in_place(&tx, id, version, &proposal.fields).await?;
            EventVersion::update_non_versioned(&tx, id, version, &proposal.fields).await?;

            let existing = PlatformStatus::find_for_version(&tx, id, version).await?;
            let existing_platforms: Vec<Platform> =
                existing.iter().map(|status| status.platform).collect();
            let added = added_platforms(&existing_platforms, &proposal.fields.platforms);
            PlatformStatus::create_defaults(&tx, id, version, &added).await?;
            let mut removed = 0;
            for status in existing
                .iter()
                .filter(|status| !proposal.fields.platforms.contains(&status.platform))
            {
                removed += PlatformStatus::delete(&tx, id, status.platform, version).await?;
            }
            tracing::debug!(
                event_id = %id,
                version,
                added_platforms = added.len(),
                removed_platforms = removed,
                "Updated event in place"
            );
            updated
        };

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete_event(&self, db: &DatabaseConnection, id: Uuid) -> Result<()> {
        let deleted = retry_on_sqlite_busy(|| async {
            let tx = db.begin().await?;
            let deleted = Event::delete_with_related_data(&tx, id).await?;
            tx.commit().await?;
            Ok::<_, TrackingPlanError>(deleted)
        })
        .await?;
        tracing::info!(
            event_id = %id,
            versions = deleted.versions,
            statuses = deleted.statuses,
            history = deleted.history,
            comments = deleted.comments,
            "Deleted event"
        );
        Ok(())
    }

    async fn resolve_version(
        db: &impl db::ConnectionTrait,
        event_id: Uuid,
        version: Option<i32>,
    ) -> Result<i32> {
        let event = Event::find_by_id(db, event_id)
            .await?
            .ok_or(TrackingPlanError::NotFound("Event"))?;
        Ok(version.unwrap_or(event.current_version))
    }

    pub async fn get_platform_status(
        &self,
        db: &DatabaseConnection,
        event_id: Uuid,
        platform: Platform,
        version: i32,
    ) -> Result<PlatformStatus> {
        PlatformStatus::find(db, event_id, platform, version)
            .await?
            .ok_or(TrackingPlanError::NotFound("Platform status"))
    }

    /// Statuses of `version`, or of the current version when absent.
    pub async fn list_platform_statuses(
        &self,
        db: &DatabaseConnection,
        event_id: Uuid,
        version: Option<i32>,
    ) -> Result<Vec<PlatformStatus>> {
        let version = Self::resolve_version(db, event_id, version).await?;
        Ok(PlatformStatus::find_for_version(db, event_id, version).await?)
    }

    pub async fn set_platform_status(
        &self,
        db: &DatabaseConnection,
        event_id: Uuid,
        platform: Platform,
        data: &SetPlatformStatus,
        actor: Option<Uuid>,
    ) -> Result<StatusChange> {
        let change = retry_on_sqlite_busy(|| async {
            let tx = db.begin().await?;
            let version = Self::resolve_version(&tx, event_id, data.version_number).await?;
            let change =
                PlatformStatus::apply_update(&tx, event_id, platform, version, &data.update, actor)
                    .await?;
            tx.commit().await?;
            Ok::<_, TrackingPlanError>(change)
        })
        .await?;

        for entry in &change.history {
            tracing::info!(
                event_id = %event_id,
                platform = %platform,
                version = change.status.version_number,
                status_type = %entry.status_type,
                old = entry.old_status.as_deref().unwrap_or("-"),
                new = %entry.new_status,
                "Platform status transition"
            );
        }
        Ok(change)
    }

    pub async fn create_platform_status(
        &self,
        db: &DatabaseConnection,
        event_id: Uuid,
        data: &CreatePlatformStatus,
        actor: Option<Uuid>,
    ) -> Result<StatusChange> {
        retry_on_sqlite_busy(|| async {
            let tx = db.begin().await?;
            let version = Self::resolve_version(&tx, event_id, data.version_number).await?;
            let change = PlatformStatus::create(&tx, event_id, version, data, actor).await?;
            tx.commit().await?;
            Ok::<_, TrackingPlanError>(change)
        })
        .await
    }

    /// History of one platform status, newest first.
    pub async fn status_history(
        &self,
        db: &DatabaseConnection,
        event_id: Uuid,
        platform: Platform,
        version: Option<i32>,
    ) -> Result<Vec<StatusHistoryEntry>> {
        let version = Self::resolve_version(db, event_id, version).await?;
        let status = self
            .get_platform_status(db, event_id, platform, version)
            .await?;
        Ok(StatusHistoryEntry::find_by_platform_status(db, status.id).await?)
    }

    pub async fn list_comments(
        &self,
        db: &DatabaseConnection,
        event_id: Uuid,
    ) -> Result<Vec<Comment>> {
        self.get_event(db, event_id).await?;
        Ok(Comment::find_by_event(db, event_id).await?)
    }

    pub async fn create_comment(
        &self,
        db: &DatabaseConnection,
        event_id: Uuid,
        content: &str,
        author: &str,
    ) -> Result<Comment> {
        retry_on_sqlite_busy(|| async {
            Ok::<_, TrackingPlanError>(Comment::create(db, event_id, content, author).await?)
        })
        .await
    }

    pub async fn delete_comment(&self, db: &DatabaseConnection, id: Uuid) -> Result<()> {
        retry_on_sqlite_busy(|| async {
            Ok::<_, TrackingPlanError>(Comment::delete(db, id).await?)
        })
        .await
    }
}
