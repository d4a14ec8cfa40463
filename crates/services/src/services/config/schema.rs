use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use ts_rs::TS;
use uuid::Uuid;

use crate::services::access::Role;

pub const CURRENT_CONFIG_VERSION: &str = "v1";

const DEFAULT_CACHE_TTL_SECS: u64 = 12 * 60 * 60;
const DEFAULT_MAX_CONCURRENCY: usize = 5;
const DEFAULT_REQUEST_SPACING_MS: u64 = 200;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOOKBACK_DAYS: u32 = 7;
const DEFAULT_DROP_THRESHOLD_PERCENT: f64 = 50.0;
const DEFAULT_ALERT_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MIN_LOOKBACK_DAYS: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, TS, EnumString, Default)]
#[ts(use_ts_enum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessControlMode {
    #[default]
    Disabled,
    Token,
}

/// A caller allowed to use the API when access control is on.
#[derive(Clone, Debug, Serialize, Deserialize, TS)]
pub struct ApiUser {
    pub token: String,
    #[serde(default, alias = "userId")]
    pub user_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct AccessControlConfig {
    pub mode: AccessControlMode,
    #[serde(alias = "apiUsers")]
    pub api_users: Vec<ApiUser>,
}

impl AccessControlConfig {
    pub fn find_user(&self, token: &str) -> Option<&ApiUser> {
        self.api_users.iter().find(|user| user.token == token)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    #[serde(alias = "matomoUrl")]
    pub matomo_url: Option<String>,
    #[serde(alias = "siteId")]
    pub site_id: u32,
    #[serde(alias = "authToken")]
    pub auth_token: Option<String>,
    #[serde(alias = "cacheTtlSecs")]
    pub cache_ttl_secs: u64,
    #[serde(alias = "maxConcurrency")]
    pub max_concurrency: usize,
    #[serde(alias = "requestSpacingMs")]
    pub request_spacing_ms: u64,
    #[serde(alias = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,
    #[serde(alias = "lookbackDays")]
    pub lookback_days: u32,
    #[serde(alias = "dropThresholdPercent")]
    pub drop_threshold_percent: f64,
    #[serde(alias = "alertIntervalSecs")]
    pub alert_interval_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            matomo_url: None,
            site_id: 1,
            auth_token: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_spacing_ms: DEFAULT_REQUEST_SPACING_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            drop_threshold_percent: DEFAULT_DROP_THRESHOLD_PERCENT,
            alert_interval_secs: DEFAULT_ALERT_INTERVAL_SECS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "configVersion")]
    pub config_version: String,
    #[serde(alias = "accessControl")]
    pub access_control: AccessControlConfig,
    pub analytics: AnalyticsConfig,
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.config_version = CURRENT_CONFIG_VERSION.to_string();

        let before = self.access_control.api_users.len();
        self.access_control.api_users.retain_mut(|user| {
            user.token = user.token.trim().to_string();
            !user.token.is_empty()
        });
        if self.access_control.api_users.len() != before {
            tracing::warn!(
                dropped = before - self.access_control.api_users.len(),
                "Ignoring API users without a token"
            );
        }

        let analytics = &mut self.analytics;
        if matches!(analytics.matomo_url.as_deref(), Some(url) if url.trim().is_empty()) {
            analytics.matomo_url = None;
        }
        if matches!(analytics.auth_token.as_deref(), Some(token) if token.trim().is_empty()) {
            analytics.auth_token = None;
        }
        if analytics.enabled && analytics.matomo_url.is_none() {
            tracing::warn!("Analytics enabled without a Matomo URL, disabling");
            analytics.enabled = false;
        }
        analytics.max_concurrency = analytics.max_concurrency.max(1);
        analytics.lookback_days = analytics.lookback_days.max(MIN_LOOKBACK_DAYS);
        if !(analytics.drop_threshold_percent > 0.0 && analytics.drop_threshold_percent <= 100.0)
        {
            tracing::warn!(
                "Invalid drop threshold {}%, resetting to default",
                analytics.drop_threshold_percent
            );
            analytics.drop_threshold_percent = DEFAULT_DROP_THRESHOLD_PERCENT;
        }
        if analytics.alert_interval_secs == 0 {
            analytics.alert_interval_secs = DEFAULT_ALERT_INTERVAL_SECS;
        }

        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            access_control: AccessControlConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_empty_config() {
        let config = Config::from_raw("{}");

        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert!(matches!(
            config.access_control.mode,
            AccessControlMode::Disabled
        ));
        assert_eq!(config.analytics.cache_ttl_secs, 43_200);
        assert_eq!(config.analytics.max_concurrency, 5);
    }

    #[test]
    fn invalid_json_falls_back_to_default() {
        let config = Config::from_raw("{invalid json");
        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert!(config.access_control.api_users.is_empty());
    }

    #[test]
    fn aliases_and_normalization_are_applied() {
        let raw = r#"{
            "configVersion": "v0",
            "accessControl": {
                "mode": "TOKEN",
                "apiUsers": [
                    { "token": " abc ", "name": "ana", "role": "editor" },
                    { "token": "  ", "name": "ghost" }
                ]
            },
            "analytics": { "enabled": true, "maxConcurrency": 0, "dropThresholdPercent": 250 }
        }"#;

        let config = Config::from_raw(raw);

        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.access_control.api_users.len(), 1);
        let user = config.access_control.find_user("abc").unwrap();
        assert_eq!(user.role, Role::Editor);
        assert!(!config.analytics.enabled);
        assert_eq!(config.analytics.max_concurrency, 1);
        assert_eq!(config.analytics.drop_threshold_percent, 50.0);
    }

    #[test]
    fn api_user_role_defaults_to_viewer() {
        let raw = r#"{ "access_control": { "api_users": [ { "token": "t", "name": "bot" } ] } }"#;
        let config = Config::from_raw(raw);
        assert_eq!(config.access_control.api_users[0].role, Role::Viewer);
    }
}
