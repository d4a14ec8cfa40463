use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
pub const ASSET_DIR_ENV: &str = "TRACKING_PLAN_ASSET_DIR";

/// Directory holding `config.json` and the default SQLite database. Not created here; see
/// [`ensure_asset_dir`].
pub fn asset_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var(ASSET_DIR_ENV) {
        let override_dir = override_dir.trim();
        if !override_dir.is_empty() {
            return PathBuf::from(override_dir);
        }
    }

    if cfg!(debug_assertions) {
        return PathBuf::from(PROJECT_ROOT).join("../../dev_assets");
    }

    match ProjectDirs::from("io", "tracking-plan", "tracking-plan") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => PathBuf::from(".tracking-plan"),
    }
}

pub fn ensure_asset_dir() -> std::io::Result<PathBuf> {
    let path = asset_dir();
    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }
    Ok(path)
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}
