use std::path::Path;

use thiserror::Error;

mod schema;

pub use schema::{
    AccessControlConfig, AccessControlMode, AnalyticsConfig, ApiUser, CURRENT_CONFIG_VERSION,
    Config,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub async fn load_config_from_file(config_path: &Path) -> Config {
    match tokio::fs::read_to_string(config_path).await {
        Ok(raw_config) => Config::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::info!(path = %config_path.display(), "No config file found, using defaults");
            } else {
                tracing::warn!("Failed to read config file: {}", err);
            }
            Config::default()
        }
    }
}

/// Saves the config to the given path
pub async fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    let normalized = config.clone().normalized();
    let raw_config = serde_json::to_string_pretty(&normalized)?;
    tokio::fs::write(config_path, raw_config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_keeps_api_users() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.access_control.mode = AccessControlMode::Token;
        config.access_control.api_users.push(ApiUser {
            token: "secret".to_string(),
            user_id: None,
            name: "ci".to_string(),
            role: crate::services::access::Role::Editor,
        });
        save_config_to_file(&config, &path).await.unwrap();

        let loaded = load_config_from_file(&path).await;
        assert!(matches!(loaded.access_control.mode, AccessControlMode::Token));
        assert_eq!(loaded.access_control.api_users.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_from_file(&dir.path().join("absent.json")).await;
        assert_eq!(loaded.config_version, CURRENT_CONFIG_VERSION);
        assert!(!loaded.analytics.enabled);
    }
}
