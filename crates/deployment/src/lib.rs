use std::sync::Arc;

use async_trait::async_trait;
use db::{DBService, DbErr};
use services::services::{
    alerts::AlertService,
    analytics_cache::AnalyticsCache,
    config::{Config, ConfigError},
    matomo::AnalyticsError,
    outbound_limiter::OutboundLimiter,
    tracking_plan::TrackingPlanService,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn db(&self) -> &DBService;

    fn tracking_plan(&self) -> &TrackingPlanService;

    fn analytics_cache(&self) -> &AnalyticsCache;

    fn outbound_limiter(&self) -> &OutboundLimiter;

    /// Present only when analytics is enabled and a Matomo client could be built.
    fn alerts(&self) -> Option<&AlertService>;

    /// Releases in-process state before the process exits.
    async fn shutdown(&self) {
        self.analytics_cache().invalidate_all();
        tracing::info!("Cleared analytics cache");
    }
}
