use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{json, Value};

use crate::backup::BackupManager;
use crate::config::{AppConfig, LockRetryPolicy};
use crate::errors::ApiError;
use crate::overlay::{self, OverlayStats, SourceInfo};
use crate::records::{validate_character, validate_character_id, CharacterRecord};

const SKELETON: &str = "{\n  \"enemies\": {}\n}\n";
const RESOURCE: &str = "Character";

/// Enemy archetypes merged from the read-only base file and the mutable
/// custom overlay. All mutations land in the custom file only; a custom
/// entry sharing an ID with a base entry overrides it wholesale.
///
/// The in-memory triple is rebuilt from disk on every read, so edits made
/// by other processes sharing the config directory are always visible.
#[derive(Debug)]
pub struct CharacterStore {
    base_path: PathBuf,
    custom_path: PathBuf,
    backups: BackupManager,
    lock_retry: LockRetryPolicy,
    base: BTreeMap<String, CharacterRecord>,
    custom: BTreeMap<String, CharacterRecord>,
    merged: BTreeMap<String, CharacterRecord>,
}

impl CharacterStore {
    pub fn open(config: &AppConfig) -> Result<Self, ApiError> {
        let mut store = Self {
            base_path: config.characters_base_path.clone(),
            custom_path: config.characters_custom_path.clone(),
            backups: BackupManager::new(&config.backup_dir, config.max_backups),
            lock_retry: config.lock_retry.clone(),
            base: BTreeMap::new(),
            custom: BTreeMap::new(),
            merged: BTreeMap::new(),
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-read both layers from disk and rebuild the merged view. The base
    /// file is required; a missing custom file means no overlay yet.
    pub fn reload(&mut self) -> Result<(), ApiError> {
        let base_doc = overlay::read_json_document(&self.base_path, true)?
            .unwrap_or(Value::Null);
        self.base = parse_enemies(&base_doc, &self.base_path, true)?;

        self.custom = match overlay::read_json_document(&self.custom_path, false)? {
            Some(doc) => parse_enemies(&doc, &self.custom_path, false)?,
            None => BTreeMap::new(),
        };

        self.merged = self.base.clone();
        for (id, record) in &self.custom {
            self.merged.insert(id.clone(), record.clone());
        }
        Ok(())
    }

    pub fn all(&mut self) -> Result<&BTreeMap<String, CharacterRecord>, ApiError> {
        self.reload()?;
        Ok(&self.merged)
    }

    pub fn get(&mut self, id: &str) -> Result<&CharacterRecord, ApiError> {
        self.reload()?;
        self.merged.get(id).ok_or_else(|| ApiError::NotFound {
            resource: RESOURCE,
            id: id.to_string(),
        })
    }

    pub fn source(&mut self, id: &str) -> Result<SourceInfo, ApiError> {
        self.reload()?;
        if !self.merged.contains_key(id) {
            return Err(ApiError::NotFound {
                resource: RESOURCE,
                id: id.to_string(),
            });
        }
        Ok(SourceInfo::from_flags(
            self.base.contains_key(id),
            self.custom.contains_key(id),
        ))
    }

    pub fn stats(&mut self) -> Result<OverlayStats, ApiError> {
        self.reload()?;
        let overrides = self
            .custom
            .keys()
            .filter(|id| self.base.contains_key(*id))
            .count();
        Ok(OverlayStats::new(
            self.base.len(),
            self.custom.len(),
            overrides,
        ))
    }

    /// Create a new archetype. Refused when the ID is already visible in
    /// the merged view, whichever layer it lives in.
    pub fn create(&mut self, id: &str, data: &Value) -> Result<CharacterRecord, ApiError> {
        validate_character_id(id)?;
        let record = validate_character(data)?;
        self.reload()?;
        if self.merged.contains_key(id) {
            return Err(ApiError::Conflict {
                resource: RESOURCE,
                id: id.to_string(),
            });
        }
        self.custom.insert(id.to_string(), record.clone());
        self.write_custom()?;
        log::info!("character created: {id}");
        Ok(record)
    }

    /// Update an existing archetype. The write always lands in the custom
    /// layer; updating a base entry creates an override. Returns the
    /// record plus whether it now overrides a base entry.
    pub fn update(&mut self, id: &str, data: &Value) -> Result<(CharacterRecord, bool), ApiError> {
        validate_character_id(id)?;
        let record = validate_character(data)?;
        self.reload()?;
        if !self.merged.contains_key(id) {
            return Err(ApiError::NotFound {
                resource: RESOURCE,
                id: id.to_string(),
            });
        }
        let is_override = self.base.contains_key(id);
        self.custom.insert(id.to_string(), record.clone());
        self.write_custom()?;
        log::info!("character updated: {id} (override: {is_override})");
        Ok((record, is_override))
    }

    /// Delete a custom entry or override. Removing an override reverts the
    /// ID to its base definition; base-only entries are immutable.
    pub fn delete(&mut self, id: &str) -> Result<(), ApiError> {
        self.reload()?;
        if !self.merged.contains_key(id) {
            return Err(ApiError::NotFound {
                resource: RESOURCE,
                id: id.to_string(),
            });
        }
        if !self.custom.contains_key(id) {
            return Err(ApiError::ImmutableEntry {
                resource: RESOURCE,
                id: id.to_string(),
            });
        }
        self.custom.remove(id);
        self.write_custom()?;
        log::info!("character deleted: {id}");
        Ok(())
    }

    fn write_custom(&mut self) -> Result<(), ApiError> {
        let document = json!({ "enemies": self.custom });
        let serialized = serde_json::to_string_pretty(&document)
            .map_err(|err| ApiError::write(format!("Failed to serialize characters: {err}")))?;
        let result = overlay::write_document(
            &self.custom_path,
            SKELETON,
            &serialized,
            &self.backups,
            &self.lock_retry,
        );
        // Disk is the source of truth; rebuild the caches from it whether
        // or not the write landed.
        let reload = self.reload();
        result?;
        reload
    }
}

fn parse_enemies(
    doc: &Value,
    path: &std::path::Path,
    required: bool,
) -> Result<BTreeMap<String, CharacterRecord>, ApiError> {
    let Some(section) = doc.get("enemies") else {
        if required {
            return Err(ApiError::read(format!(
                "Missing 'enemies' key in {}",
                path.display()
            )));
        }
        return Ok(BTreeMap::new());
    };
    serde_json::from_value(section.clone()).map_err(|err| {
        ApiError::read(format!("Invalid character data in {}: {err}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn test_config(tag: &str) -> AppConfig {
        let dir = std::env::temp_dir().join(format!(
            "nightswarm_chars_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(dir.join("base")).unwrap();
        let mut config = AppConfig::from_env();
        config.characters_base_path = dir.join("base/enemies.json");
        config.characters_custom_path = dir.join("custom/enemies.json");
        config.backup_dir = dir.join("backups");
        config.lock_retry = LockRetryPolicy {
            attempts: 2,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        config
    }

    fn seed_base(config: &AppConfig, ids: &[&str]) {
        let mut enemies = serde_json::Map::new();
        for id in ids {
            enemies.insert((*id).to_string(), character(id));
        }
        std::fs::write(
            &config.characters_base_path,
            serde_json::to_string_pretty(&json!({ "enemies": enemies })).unwrap(),
        )
        .unwrap();
    }

    fn character(name: &str) -> Value {
        json!({
            "name": name,
            "sprites": [format!("{name}.png")],
            "animation": {"frameTime": 10},
            "stats": {"health": 20, "speed": 1.5, "attackStrength": 5,
                      "attackSpeed": 1000, "attackRange": 40},
            "size": {"width": 64, "height": 64},
            "xpValue": 3
        })
    }

    #[test]
    fn missing_base_file_fails_open() {
        let config = test_config("missing_base");
        let err = CharacterStore::open(&config).unwrap_err();
        assert_eq!(err.code(), "FILE_READ_ERROR");
    }

    #[test]
    fn override_lifecycle_reverts_to_base_on_delete() {
        let config = test_config("lifecycle");
        seed_base(&config, &["skeleton"]);
        let mut store = CharacterStore::open(&config).unwrap();
        assert_eq!(store.get("skeleton").unwrap().stats.health, 20);

        let mut edited = character("skeleton");
        edited["stats"]["health"] = json!(99);
        let (_, is_override) = store.update("skeleton", &edited).unwrap();
        assert!(is_override);
        assert_eq!(store.get("skeleton").unwrap().stats.health, 99);
        assert_eq!(store.source("skeleton").unwrap().source, crate::overlay::Provenance::Override);

        store.delete("skeleton").unwrap();
        assert_eq!(store.get("skeleton").unwrap().stats.health, 20);
        assert_eq!(store.source("skeleton").unwrap().source, crate::overlay::Provenance::Base);
    }

    #[test]
    fn create_conflicts_with_base_ids() {
        let config = test_config("conflict");
        seed_base(&config, &["skeleton"]);
        let mut store = CharacterStore::open(&config).unwrap();
        let err = store.create("skeleton", &character("skeleton")).unwrap_err();
        assert_eq!(err.code(), "CHARACTER_EXISTS");
    }

    #[test]
    fn base_only_entries_cannot_be_deleted() {
        let config = test_config("immutable");
        seed_base(&config, &["skeleton"]);
        let mut store = CharacterStore::open(&config).unwrap();
        let err = store.delete("skeleton").unwrap_err();
        assert_eq!(err.code(), "IMMUTABLE_ENTRY");
        let err = store.delete("ghost").unwrap_err();
        assert_eq!(err.code(), "CHARACTER_NOT_FOUND");
    }

    #[test]
    fn stats_count_each_override_once() {
        let config = test_config("stats");
        seed_base(&config, &["skeleton", "zombie"]);
        let mut store = CharacterStore::open(&config).unwrap();
        store.create("bat", &character("bat")).unwrap();
        store.update("zombie", &character("zombie")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.base, 2);
        assert_eq!(stats.custom, 2);
        assert_eq!(stats.overrides, 1);
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn custom_file_is_seeded_on_first_create() {
        let config = test_config("seed");
        seed_base(&config, &[]);
        let mut store = CharacterStore::open(&config).unwrap();
        assert!(!config.characters_custom_path.exists());
        store.create("bat", &character("bat")).unwrap();
        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(&config.characters_custom_path).unwrap(),
        )
        .unwrap();
        assert!(written["enemies"]["bat"].is_object());
    }

    #[test]
    fn reads_pick_up_external_edits_to_the_custom_file() {
        let config = test_config("external");
        seed_base(&config, &["skeleton"]);
        let mut store = CharacterStore::open(&config).unwrap();
        assert_eq!(store.get("skeleton").unwrap().stats.health, 20);

        // Another process lands an override behind this store's back.
        let mut edited = character("skeleton");
        edited["stats"]["health"] = json!(99);
        std::fs::create_dir_all(config.characters_custom_path.parent().unwrap()).unwrap();
        std::fs::write(
            &config.characters_custom_path,
            serde_json::to_string_pretty(&json!({"enemies": {"skeleton": edited}})).unwrap(),
        )
        .unwrap();

        assert_eq!(store.get("skeleton").unwrap().stats.health, 99);
        assert_eq!(
            store.source("skeleton").unwrap().source,
            crate::overlay::Provenance::Override
        );
        assert_eq!(store.stats().unwrap().overrides, 1);
    }

    #[test]
    fn reserved_and_malformed_ids_are_rejected() {
        let config = test_config("ids");
        seed_base(&config, &[]);
        let mut store = CharacterStore::open(&config).unwrap();
        assert_eq!(
            store.create("api", &character("api")).unwrap_err().code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            store.create("Bad-ID", &character("x")).unwrap_err().code(),
            "VALIDATION_ERROR"
        );
    }
}
