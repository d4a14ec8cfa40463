use std::sync::Arc;

use db::{DatabaseConnection, models::event::MonitoredEvent};
use futures::{StreamExt, stream};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    config::AnalyticsConfig,
    matomo::AnalyticsSource,
    tracking_plan::{TrackingPlanError, TrackingPlanService},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropMeasurement {
    pub baseline: f64,
    pub latest: u64,
    pub drop_percent: f64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct DropAlert {
    pub event_id: Uuid,
    pub category: String,
    pub action: String,
    pub baseline: f64,
    pub latest: u64,
    pub drop_percent: f64,
}

/// Compares the last day against the mean of the days before it. Reports a drop when that
/// mean is positive and the last day falls below `baseline * (1 - threshold / 100)`.
pub fn detect_drop(counts: &[u64], threshold_percent: f64) -> Option<DropMeasurement> {
    let (latest, history) = counts.split_last()?;
    if history.is_empty() {
        return None;
    }
    let baseline = history.iter().sum::<u64>() as f64 / history.len() as f64;
    if baseline <= 0.0 {
        return None;
    }

    let latest_value = *latest as f64;
    if latest_value < baseline * (1.0 - threshold_percent / 100.0) {
        Some(DropMeasurement {
            baseline,
            latest: *latest,
            drop_percent: (baseline - latest_value) / baseline * 100.0,
        })
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlertSettings {
    pub lookback_days: u32,
    pub threshold_percent: f64,
    pub concurrency: usize,
}

impl From<&AnalyticsConfig> for AlertSettings {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            lookback_days: config.lookback_days,
            threshold_percent: config.drop_threshold_percent,
            concurrency: config.max_concurrency,
        }
    }
}

/// Scans monitored events for sudden drops in tracked volume.
#[derive(Clone)]
pub struct AlertService {
    source: Arc<dyn AnalyticsSource>,
    settings: AlertSettings,
}

impl AlertService {
    pub fn new(source: Arc<dyn AnalyticsSource>, settings: AlertSettings) -> Self {
        Self { source, settings }
    }

    async fn check_event(&self, event: MonitoredEvent) -> Option<DropAlert> {
        let counts = match self
            .source
            .daily_event_counts(&event.category, &event.action, self.settings.lookback_days)
            .await
        {
            Ok(counts) => counts,
            Err(err) => {
                tracing::warn!(
                    event_id = %event.id,
                    error = %err,
                    "Failed to load analytics counts, skipping event"
                );
                return None;
            }
        };

        let measurement = detect_drop(&counts, self.settings.threshold_percent)?;
        tracing::warn!(
            event_id = %event.id,
            category = %event.category,
            action = %event.action,
            baseline = measurement.baseline,
            latest = measurement.latest,
            drop_percent = measurement.drop_percent,
            "Tracked event volume dropped"
        );
        Some(DropAlert {
            event_id: event.id,
            category: event.category,
            action: event.action,
            baseline: measurement.baseline,
            latest: measurement.latest,
            drop_percent: measurement.drop_percent,
        })
    }

    pub async fn run_once(
        &self,
        db: &DatabaseConnection,
        tracking: &TrackingPlanService,
    ) -> Result<Vec<DropAlert>, TrackingPlanError> {
        let events = tracking.events_for_monitoring(db).await?;
        let checked = events.len();

        let mut alerts: Vec<DropAlert> = stream::iter(events)
            .map(|event| self.check_event(event))
            .buffer_unordered(self.settings.concurrency.max(1))
            .filter_map(|alert| async move { alert })
            .collect()
            .await;
        alerts.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.action.cmp(&b.action))
        });

        tracing::info!(checked, alerts = alerts.len(), "Drop detection finished");
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use db::{models::event::CreateEvent, types::Platform};
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::services::matomo::{AnalyticsError, event_label};

    #[test]
    fn drop_below_threshold_is_reported() {
        let measurement = detect_drop(&[100, 100, 100, 40], 50.0).unwrap();
        assert_eq!(measurement.baseline, 100.0);
        assert_eq!(measurement.latest, 40);
        assert!((measurement.drop_percent - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn small_dips_and_empty_baselines_are_ignored() {
        assert!(detect_drop(&[100, 100, 100, 60], 50.0).is_none());
        assert!(detect_drop(&[0, 0, 0, 0], 50.0).is_none());
        assert!(detect_drop(&[7], 50.0).is_none());
        assert!(detect_drop(&[], 50.0).is_none());
    }

    struct FixedSource {
        counts: HashMap<String, Vec<u64>>,
    }

    #[async_trait]
    impl AnalyticsSource for FixedSource {
        async fn daily_event_counts(
            &self,
            category: &str,
            action: &str,
            _days: u32,
        ) -> Result<Vec<u64>, AnalyticsError> {
            self.counts
                .get(&event_label(category, action))
                .cloned()
                .ok_or_else(|| AnalyticsError::Api("unknown label".to_string()))
        }
    }

    fn event(action: &str) -> CreateEvent {
        CreateEvent {
            category: "Checkout".to_string(),
            block: None,
            action: action.to_string(),
            action_description: String::new(),
            name: None,
            value_description: None,
            owner_id: None,
            platforms: vec![Platform::Web],
            properties: Vec::new(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn run_once_reports_only_dropping_events() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        let tracking = TrackingPlanService::new();
        for action in ["pay", "add_to_cart", "apply_coupon"] {
            tracking.create_event(&db, &event(action), None).await.unwrap();
        }

        let source = FixedSource {
            counts: HashMap::from([
                ("Checkout - pay".to_string(), vec![50, 50, 50, 5]),
                ("Checkout - add_to_cart".to_string(), vec![80, 90, 85, 88]),
            ]),
        };
        let service = AlertService::new(
            Arc::new(source),
            AlertSettings {
                lookback_days: 4,
                threshold_percent: 50.0,
                concurrency: 2,
            },
        );

        let alerts = service.run_once(&db, &tracking).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].action, "pay");
        assert_eq!(alerts[0].latest, 5);
    }
}
