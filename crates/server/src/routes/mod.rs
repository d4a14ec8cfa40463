pub mod categories;
pub mod comments;
pub mod events;
pub mod health;
pub mod monitoring;
pub mod platform_statuses;
