pub mod category;
pub mod comment;
pub mod event;
pub mod event_platform_status;
pub mod event_version;
pub mod status_history;
