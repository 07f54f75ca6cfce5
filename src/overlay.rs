use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::backup::BackupManager;
use crate::config::LockRetryPolicy;
use crate::errors::ApiError;
use crate::lockfile::FileLock;

/// Where a merged entry came from.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Base,
    Custom,
    Override,
}

/// Provenance report for a single entry, as served by the `/source`
/// endpoints.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub source: Provenance,
    pub is_base: bool,
    pub is_custom: bool,
    pub is_override: bool,
}

impl SourceInfo {
    pub fn from_flags(in_base: bool, in_custom: bool) -> Self {
        let source = match (in_base, in_custom) {
            (true, true) => Provenance::Override,
            (false, true) => Provenance::Custom,
            _ => Provenance::Base,
        };
        Self {
            source,
            is_base: in_base,
            is_custom: in_custom,
            is_override: in_base && in_custom,
        }
    }
}

/// Entry counts across the base and custom layers.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayStats {
    pub base: usize,
    pub custom: usize,
    pub overrides: usize,
    pub total: usize,
}

impl OverlayStats {
    pub fn new(base: usize, custom: usize, overrides: usize) -> Self {
        Self {
            base,
            custom,
            overrides,
            total: base + custom - overrides,
        }
    }
}

/// Read and parse a JSON file. A missing optional file is `Ok(None)`; a
/// missing required file or unparseable content is a read error.
pub fn read_json_document(path: &Path, required: bool) -> Result<Option<Value>, ApiError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if required {
                return Err(ApiError::read(format!(
                    "Required config file not found: {}",
                    path.display()
                )));
            }
            return Ok(None);
        }
        Err(err) => {
            return Err(ApiError::read(format!(
                "Failed to read {}: {err}",
                path.display()
            )))
        }
    };
    let value = serde_json::from_str(&raw).map_err(|err| {
        ApiError::read(format!("Invalid JSON in {}: {err}", path.display()))
    })?;
    Ok(Some(value))
}

/// Shallow merge of the game tuning config: for each top-level key in
/// `custom`, if both sides hold objects the custom keys are merged in
/// per-key, otherwise the custom value replaces the base one wholesale.
pub fn merge_game_config(base: &Value, custom: &Value) -> Value {
    let mut merged = base.clone();
    let (Some(merged_map), Some(custom_map)) = (merged.as_object_mut(), custom.as_object())
    else {
        return if custom.is_null() { merged } else { custom.clone() };
    };
    for (key, custom_value) in custom_map {
        match (merged_map.get_mut(key), custom_value.as_object()) {
            (Some(Value::Object(base_obj)), Some(custom_obj)) => {
                for (k, v) in custom_obj {
                    base_obj.insert(k.clone(), v.clone());
                }
            }
            _ => {
                merged_map.insert(key.clone(), custom_value.clone());
            }
        }
    }
    merged
}

/// Write `document` to `target` under the full safety protocol:
///
/// 1. ensure the parent directory exists, seeding `skeleton` if the target
///    is absent so concurrent readers never see a missing file
/// 2. take the exclusive file lock, held until this function returns
/// 3. best-effort backup of the current contents
/// 4. write to a process-unique temp sibling, re-read and parse it, and
///    abort before touching the live file if verification fails
/// 5. copy the temp file over the target (copy, not rename, so the write
///    lands even when the target is a bind mount) and remove the temp
///
/// Backup and temp-cleanup failures are logged and swallowed; lock and
/// verification failures abort the write with the target unchanged.
pub fn write_document(
    target: &Path,
    skeleton: &str,
    document: &str,
    backups: &BackupManager,
    lock_retry: &LockRetryPolicy,
) -> Result<(), ApiError> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            ApiError::write(format!(
                "Failed to create directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    if !target.exists() {
        std::fs::write(target, skeleton).map_err(|err| {
            ApiError::write(format!("Failed to seed {}: {err}", target.display()))
        })?;
    }

    // Held through the copy; dropping at the end of scope releases it even
    // on the error paths below.
    let _lock = FileLock::acquire(target, lock_retry)?;

    backups.create_backup(target);

    let temp_path = {
        let mut name = target.as_os_str().to_os_string();
        name.push(format!(".tmp.{}.{}", unix_millis_now(), std::process::id()));
        std::path::PathBuf::from(name)
    };
    std::fs::write(&temp_path, document).map_err(|err| {
        ApiError::write(format!("Failed to write {}: {err}", temp_path.display()))
    })?;

    if let Err(message) = verify_temp(&temp_path, document) {
        if let Err(err) = std::fs::remove_file(&temp_path) {
            log::error!("failed to remove temp file {}: {err}", temp_path.display());
        }
        return Err(ApiError::WriteVerification {
            path: target.display().to_string(),
            message,
        });
    }

    std::fs::copy(&temp_path, target).map_err(|err| {
        ApiError::write(format!("Failed to update {}: {err}", target.display()))
    })?;

    if let Err(err) = std::fs::remove_file(&temp_path) {
        log::error!("failed to remove temp file {}: {err}", temp_path.display());
    }
    Ok(())
}

fn verify_temp(temp_path: &Path, expected: &str) -> Result<(), String> {
    let written = std::fs::read_to_string(temp_path)
        .map_err(|err| format!("re-read failed: {err}"))?;
    if written != expected {
        return Err("written bytes do not match the intended document".to_string());
    }
    serde_json::from_str::<Value>(&written)
        .map(|_| ())
        .map_err(|err| format!("written document is not valid JSON: {err}"))
}

fn unix_millis_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "nightswarm_overlay_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fast_policy() -> LockRetryPolicy {
        LockRetryPolicy {
            attempts: 2,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn source_info_classifies_all_layers() {
        let base = SourceInfo::from_flags(true, false);
        assert_eq!(base.source, Provenance::Base);
        assert!(!base.is_override);

        let custom = SourceInfo::from_flags(false, true);
        assert_eq!(custom.source, Provenance::Custom);

        let over = SourceInfo::from_flags(true, true);
        assert_eq!(over.source, Provenance::Override);
        assert!(over.is_base && over.is_custom && over.is_override);
    }

    #[test]
    fn stats_total_counts_overrides_once() {
        let stats = OverlayStats::new(10, 4, 3);
        assert_eq!(stats.total, 11);
    }

    #[test]
    fn merge_combines_object_values_per_key() {
        let base = json!({
            "debug": {"showHitboxes": false, "logWaves": false},
            "difficulty": "normal"
        });
        let custom = json!({
            "debug": {"showHitboxes": true},
            "difficulty": "hard",
            "extras": {"screenShake": true}
        });
        let merged = merge_game_config(&base, &custom);
        assert_eq!(merged["debug"]["showHitboxes"], json!(true));
        assert_eq!(merged["debug"]["logWaves"], json!(false));
        assert_eq!(merged["difficulty"], json!("hard"));
        assert_eq!(merged["extras"]["screenShake"], json!(true));
    }

    #[test]
    fn merge_replaces_when_types_differ() {
        let base = json!({"waves": {"interval": 5000}});
        let custom = json!({"waves": false});
        assert_eq!(merge_game_config(&base, &custom)["waves"], json!(false));
    }

    #[test]
    fn missing_optional_document_reads_as_none() {
        let dir = test_dir("optional");
        assert!(read_json_document(&dir.join("absent.json"), false)
            .unwrap()
            .is_none());
        let err = read_json_document(&dir.join("absent.json"), true).unwrap_err();
        assert_eq!(err.code(), "FILE_READ_ERROR");
    }

    #[test]
    fn malformed_document_is_a_read_error_even_when_optional() {
        let dir = test_dir("malformed");
        let path = dir.join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_json_document(&path, false).unwrap_err();
        assert_eq!(err.code(), "FILE_READ_ERROR");
    }

    #[test]
    fn write_seeds_skeleton_then_lands_document() {
        let dir = test_dir("write");
        let target = dir.join("custom").join("items.json");
        let backups = BackupManager::new(dir.join("backups"), 5);

        let document = serde_json::to_string_pretty(&json!({"weapons": {"mic": {}}})).unwrap();
        write_document(
            &target,
            r#"{"weapons":{},"projectiles":{},"collectibles":{}}"#,
            &document,
            &backups,
            &fast_policy(),
        )
        .unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), document);
        // Lock was released and no temp debris remains.
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(leftovers, vec!["items.json".to_string()]);
    }

    #[test]
    fn write_takes_a_backup_of_prior_contents() {
        let dir = test_dir("backup");
        let target = dir.join("enemies.json");
        std::fs::write(&target, r#"{"enemies":{"old":true}}"#).unwrap();
        let backups = BackupManager::new(dir.join("backups"), 5);

        write_document(
            &target,
            r#"{"enemies":{}}"#,
            r#"{"enemies":{"new":true}}"#,
            &backups,
            &fast_policy(),
        )
        .unwrap();

        let snapshots = backups.list_backups("enemies.json");
        assert_eq!(snapshots.len(), 1);
        let snapshot = std::fs::read_to_string(dir.join("backups").join(&snapshots[0])).unwrap();
        assert!(snapshot.contains("old"));
    }

    #[test]
    fn held_lock_aborts_write_and_leaves_target_untouched() {
        let dir = test_dir("locked");
        let target = dir.join("enemies.json");
        std::fs::write(&target, r#"{"enemies":{"keep":true}}"#).unwrap();
        std::fs::write(crate::lockfile::lock_path_for(&target), "held").unwrap();
        let backups = BackupManager::new(dir.join("backups"), 5);

        let err = write_document(
            &target,
            r#"{"enemies":{}}"#,
            r#"{"enemies":{"clobber":true}}"#,
            &backups,
            &fast_policy(),
        )
        .unwrap_err();

        assert_eq!(err.code(), "LOCK_ACQUISITION_ERROR");
        assert!(std::fs::read_to_string(&target).unwrap().contains("keep"));
    }
}
