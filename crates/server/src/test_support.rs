use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, OnceLock},
};

use services::services::config::Config;
use tempfile::TempDir;
use utils_core::assets::ASSET_DIR_ENV;

const DATABASE_URL_ENV: &str = "DATABASE_URL";

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Gives one test its own asset directory and SQLite file, so a deployment built while the
/// guard lives reads `config.json` and the database from a scratch location.
pub struct TestEnvGuard {
    root: TempDir,
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl TestEnvGuard {
    pub fn new() -> Self {
        let lock = env_lock().lock().unwrap_or_else(|err| err.into_inner());
        let root = tempfile::Builder::new()
            .prefix("tracking-plan-test-")
            .tempdir()
            .unwrap();
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            root.path().join("db.sqlite").display()
        );

        let saved = [ASSET_DIR_ENV, DATABASE_URL_ENV]
            .into_iter()
            .map(|key| (key, std::env::var(key).ok()))
            .collect();

        // SAFETY: env mutation is serialized by env_lock.
        unsafe {
            std::env::set_var(ASSET_DIR_ENV, root.path());
            std::env::set_var(DATABASE_URL_ENV, db_url);
        }

        Self {
            root,
            saved,
            _lock: lock,
        }
    }

    /// Same as [`TestEnvGuard::new`], with `config` written where the deployment loads it.
    pub fn with_config(config: &Config) -> Self {
        let guard = Self::new();
        let raw = serde_json::to_string_pretty(config).unwrap();
        std::fs::write(guard.config_path(), raw).unwrap();
        guard
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("config.json")
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // SAFETY: env mutation is serialized by env_lock.
        unsafe {
            for (key, previous) in &self.saved {
                match previous {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
