use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    alerts::{AlertService, AlertSettings},
    analytics_cache::AnalyticsCache,
    config::{AnalyticsConfig, Config, load_config_from_file, save_config_to_file},
    matomo::MatomoClient,
    outbound_limiter::OutboundLimiter,
    tracking_plan::TrackingPlanService,
};
use tokio::sync::RwLock;
use utils_core::assets::{config_path, ensure_asset_dir};

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    tracking_plan: TrackingPlanService,
    analytics_cache: AnalyticsCache,
    outbound_limiter: OutboundLimiter,
    alerts: Option<AlertService>,
}

struct AnalyticsServices {
    cache: AnalyticsCache,
    limiter: OutboundLimiter,
    alerts: Option<AlertService>,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let raw_config = Self::load_runtime_config().await?;
        let AnalyticsServices {
            cache,
            limiter,
            alerts,
        } = Self::build_analytics_services(&raw_config.analytics);
        let db = DBService::new().await?;

        Ok(Self {
            config: Arc::new(RwLock::new(raw_config)),
            db,
            tracking_plan: TrackingPlanService::new(),
            analytics_cache: cache,
            outbound_limiter: limiter,
            alerts,
        })
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn tracking_plan(&self) -> &TrackingPlanService {
        &self.tracking_plan
    }

    fn analytics_cache(&self) -> &AnalyticsCache {
        &self.analytics_cache
    }

    fn outbound_limiter(&self) -> &OutboundLimiter {
        &self.outbound_limiter
    }

    fn alerts(&self) -> Option<&AlertService> {
        self.alerts.as_ref()
    }
}

impl LocalDeployment {
    async fn load_runtime_config() -> Result<Config, DeploymentError> {
        ensure_asset_dir()?;
        let path = config_path();
        let config = load_config_from_file(&path).await;
        save_config_to_file(&config, &path).await?;
        Ok(config)
    }

    fn build_analytics_services(analytics: &AnalyticsConfig) -> AnalyticsServices {
        let cache = AnalyticsCache::new(Duration::from_secs(analytics.cache_ttl_secs.max(1)));
        let limiter = OutboundLimiter::new(
            analytics.max_concurrency,
            Duration::from_millis(analytics.request_spacing_ms),
        );

        let alerts = if analytics.enabled {
            match MatomoClient::new(analytics, cache.clone(), limiter.clone()) {
                Ok(client) => Some(AlertService::new(
                    Arc::new(client),
                    AlertSettings::from(analytics),
                )),
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to build Matomo client, drop alerts disabled");
                    None
                }
            }
        } else {
            None
        };

        tracing::info!(
            analytics_enabled = alerts.is_some(),
            cache_ttl_secs = cache.ttl().as_secs(),
            max_concurrency = limiter.max_concurrency(),
            "Analytics services ready"
        );

        AnalyticsServices {
            cache,
            limiter,
            alerts,
        }
    }
}
