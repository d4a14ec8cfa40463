use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::AcquireError;
use url::Url;

use super::{
    analytics_cache::AnalyticsCache, config::AnalyticsConfig, outbound_limiter::OutboundLimiter,
};

const EVENTS_METHOD: &str = "Events.getCategory";

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Analytics is not configured")]
    NotConfigured,
    #[error("Invalid Matomo URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Matomo request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Matomo returned an error: {0}")]
    Api(String),
    #[error("Unexpected Matomo response: {0}")]
    UnexpectedResponse(String),
    #[error("Outbound limiter closed")]
    LimiterClosed(#[from] AcquireError),
}

/// Source of per-day event counts, oldest day first.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn daily_event_counts(
        &self,
        category: &str,
        action: &str,
        days: u32,
    ) -> Result<Vec<u64>, AnalyticsError>;
}

/// Label Matomo gives a flattened category/action row.
pub fn event_label(category: &str, action: &str) -> String {
    format!("{} - {}", category.trim(), action.trim())
}

fn nb_events(row: &Value) -> u64 {
    match row.get("nb_events") {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().map(|value| value.max(0.0) as u64))
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn check_api_error(response: &Value) -> Result<(), AnalyticsError> {
    if response.get("result").and_then(Value::as_str) == Some("error") {
        let message = response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(AnalyticsError::Api(message.to_string()));
    }
    Ok(())
}

/// Sums `nb_events` for rows labelled `label` in a multi-day `Events.getCategory` response,
/// returning one count per day ordered by date.
pub fn parse_daily_counts(response: &Value, label: &str) -> Result<Vec<u64>, AnalyticsError> {
    check_api_error(response)?;

    let days = response.as_object().ok_or_else(|| {
        AnalyticsError::UnexpectedResponse("expected an object keyed by date".to_string())
    })?;

    let mut dated: Vec<(&String, u64)> = Vec::with_capacity(days.len());
    for (date, rows) in days {
        let total = match rows {
            Value::Array(rows) => rows
                .iter()
                .filter(|row| row.get("label").and_then(Value::as_str) == Some(label))
                .map(nb_events)
                .sum(),
            // Days without data come back as empty objects.
            Value::Object(map) if map.is_empty() => 0,
            other => {
                return Err(AnalyticsError::UnexpectedResponse(format!(
                    "rows for {date} are not a list: {other}"
                )));
            }
        };
        dated.push((date, total));
    }
    dated.sort_by(|a, b| a.0.cmp(b.0));
    Ok(dated.into_iter().map(|(_, total)| total).collect())
}

#[derive(Clone)]
pub struct MatomoClient {
    http: reqwest::Client,
    endpoint: Url,
    site_id: u32,
    auth_token: Option<String>,
    timeout: Duration,
    cache: AnalyticsCache,
    limiter: OutboundLimiter,
}

impl MatomoClient {
    pub fn new(
        config: &AnalyticsConfig,
        cache: AnalyticsCache,
        limiter: OutboundLimiter,
    ) -> Result<Self, AnalyticsError> {
        let base = config
            .matomo_url
            .as_deref()
            .ok_or(AnalyticsError::NotConfigured)?;
        let mut base = Url::parse(base.trim())?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));

        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: base.join("index.php")?,
            site_id: config.site_id,
            auth_token: config.auth_token.clone(),
            timeout,
            cache,
            limiter,
        })
    }

    async fn events_by_category(&self, days: u32) -> Result<Arc<Value>, AnalyticsError> {
        let cache_key = format!("{EVENTS_METHOD}:{}:last{days}", self.site_id);
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(cached);
        }

        let site_id = self.site_id.to_string();
        let date = format!("last{days}");
        let mut form = vec![
            ("module", "API"),
            ("method", EVENTS_METHOD),
            ("idSite", site_id.as_str()),
            ("period", "day"),
            ("date", date.as_str()),
            ("flat", "1"),
            ("format", "JSON"),
        ];
        if let Some(token) = self.auth_token.as_deref() {
            form.push(("token_auth", token));
        }

        let _permit = self.limiter.acquire().await?;
        let request = async {
            self.http
                .post(self.endpoint.clone())
                .form(&form)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        };
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| AnalyticsError::Timeout(self.timeout))??;

        check_api_error(&response)?;
        tracing::debug!(days, site_id = self.site_id, "Fetched Matomo event categories");
        Ok(self.cache.insert(cache_key, response).await)
    }
}

#[async_trait]
impl AnalyticsSource for MatomoClient {
    async fn daily_event_counts(
        &self,
        category: &str,
        action: &str,
        days: u32,
    ) -> Result<Vec<u64>, AnalyticsError> {
        let response = self.events_by_category(days).await?;
        parse_daily_counts(&response, &event_label(category, action))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Json, Router, extract::State, routing::post};
    use serde_json::json;

    use super::*;

    #[test]
    fn counts_are_summed_per_day_in_date_order() {
        let response = json!({
            "2025-03-02": [
                { "label": "Auth - signup", "nb_events": 4 },
                { "label": "Auth - login", "nb_events": 9 }
            ],
            "2025-03-01": [
                { "label": "Auth - signup", "nb_events": 3 },
                { "label": "Auth - signup", "nb_events": "2" }
            ],
            "2025-03-03": []
        });

        let counts = parse_daily_counts(&response, "Auth - signup").unwrap();
        assert_eq!(counts, vec![5, 4, 0]);
    }

    #[test]
    fn api_errors_are_surfaced() {
        let response = json!({ "result": "error", "message": "token_auth is invalid" });
        let err = parse_daily_counts(&response, "Auth - signup").unwrap_err();
        assert!(matches!(err, AnalyticsError::Api(message) if message.contains("token_auth")));
    }

    #[test]
    fn label_joins_category_and_action() {
        assert_eq!(event_label(" Auth ", "signup"), "Auth - signup");
    }

    #[tokio::test]
    async fn client_fetches_once_and_serves_from_cache() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/matomo/index.php",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "2025-03-01": [{ "label": "Auth - signup", "nb_events": 10 }],
                        "2025-03-02": [{ "label": "Auth - signup", "nb_events": 2 }],
                    }))
                }),
            )
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = AnalyticsConfig {
            enabled: true,
            matomo_url: Some(format!("http://{addr}/matomo")),
            ..Default::default()
        };
        let client = MatomoClient::new(
            &config,
            AnalyticsCache::new(Duration::from_secs(60)),
            OutboundLimiter::new(2, Duration::ZERO),
        )
        .unwrap();

        let first = client.daily_event_counts("Auth", "signup", 2).await.unwrap();
        let second = client.daily_event_counts("Auth", "signup", 2).await.unwrap();
        assert_eq!(first, vec![10, 2]);
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let other = client.daily_event_counts("Auth", "login", 2).await.unwrap();
        assert_eq!(other, vec![0, 0]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_url_is_not_configured() {
        let result = MatomoClient::new(
            &AnalyticsConfig::default(),
            AnalyticsCache::new(Duration::from_secs(1)),
            OutboundLimiter::new(1, Duration::ZERO),
        );
        assert!(matches!(result, Err(AnalyticsError::NotConfigured)));
    }
}
