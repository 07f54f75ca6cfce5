use std::path::PathBuf;
use std::time::Duration;

/// Retry policy for acquiring the per-file write lock.
#[derive(Clone, Debug)]
pub struct LockRetryPolicy {
    pub attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            min_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        }
    }
}

/// Process configuration, resolved once at startup from `NIGHTSWARM_*`
/// environment variables with conventional defaults.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub characters_base_path: PathBuf,
    pub characters_custom_path: PathBuf,
    pub items_base_path: PathBuf,
    pub items_custom_path: PathBuf,
    pub game_config_base_path: PathBuf,
    pub game_config_custom_path: PathBuf,
    pub backup_dir: PathBuf,
    pub max_backups: usize,
    pub lock_retry: LockRetryPolicy,
    pub upload_dir: PathBuf,
    pub bind_addr: String,
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

impl AppConfig {
    pub fn from_env() -> Self {
        let max_backups = std::env::var("NIGHTSWARM_MAX_BACKUPS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10);
        let bind_addr = std::env::var("NIGHTSWARM_BIND_ADDR")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "127.0.0.1:3000".to_string());

        Self {
            characters_base_path: env_path("NIGHTSWARM_CHAR_BASE", "config/base/enemies.json"),
            characters_custom_path: env_path(
                "NIGHTSWARM_CHAR_CUSTOM",
                "config/custom/enemies.json",
            ),
            items_base_path: env_path("NIGHTSWARM_ITEMS_BASE", "config/base/items.json"),
            items_custom_path: env_path("NIGHTSWARM_ITEMS_CUSTOM", "config/custom/items.json"),
            game_config_base_path: env_path(
                "NIGHTSWARM_GAME_CONFIG_BASE",
                "config/game.config.json",
            ),
            game_config_custom_path: env_path(
                "NIGHTSWARM_GAME_CONFIG_CUSTOM",
                "config/custom/game.config.json",
            ),
            backup_dir: env_path("NIGHTSWARM_BACKUP_DIR", "config/backups"),
            max_backups,
            lock_retry: LockRetryPolicy::default(),
            upload_dir: env_path("NIGHTSWARM_UPLOAD_DIR", "assets/custom/characters"),
            bind_addr,
        }
    }
}
