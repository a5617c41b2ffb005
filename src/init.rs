use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::config::Config;

/// Create the directories the CLI writes into.
pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    let dirs = [cfg.settings_cache_path.parent()];
    for dir in dirs.into_iter().flatten() {
        if dir.as_os_str().is_empty() {
            continue;
        }
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir).await?;
            crate::logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

/// Whether anything answers at the backend base URL. Any HTTP status counts
/// as reachable; only connection failures do not.
pub async fn check_backend(client: &reqwest::Client, base_url: &str) -> bool {
    client
        .get(base_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .is_ok()
}
