pub mod access;
pub mod alerts;
pub mod analytics_cache;
pub mod config;
pub mod matomo;
pub mod outbound_limiter;
pub mod tracking_plan;
pub mod versioning;
