use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{json, Value};

use crate::backup::BackupManager;
use crate::config::{AppConfig, LockRetryPolicy};
use crate::errors::ApiError;
use crate::overlay::{self, OverlayStats, SourceInfo};
use crate::records::{
    validate_item, validate_item_id, CollectibleRecord, ItemCategory, ProjectileRecord,
    WeaponRecord,
};

const SKELETON: &str =
    "{\n  \"weapons\": {},\n  \"projectiles\": {},\n  \"collectibles\": {}\n}\n";

type Section = BTreeMap<String, Value>;

#[derive(Default, Clone, Debug)]
struct ItemLayer {
    weapons: Section,
    projectiles: Section,
    collectibles: Section,
}

impl ItemLayer {
    fn from_document(doc: &Value, path: &std::path::Path) -> Result<Self, ApiError> {
        let mut layer = ItemLayer::default();
        for category in ItemCategory::ALL {
            let Some(section) = doc.get(category.key()) else {
                continue;
            };
            let parsed: Section = serde_json::from_value(section.clone()).map_err(|err| {
                ApiError::read(format!(
                    "Invalid '{}' section in {}: {err}",
                    category.key(),
                    path.display()
                ))
            })?;
            *layer.section_mut(category) = parsed;
        }
        Ok(layer)
    }

    fn section(&self, category: ItemCategory) -> &Section {
        match category {
            ItemCategory::Weapons => &self.weapons,
            ItemCategory::Projectiles => &self.projectiles,
            ItemCategory::Collectibles => &self.collectibles,
        }
    }

    fn section_mut(&mut self, category: ItemCategory) -> &mut Section {
        match category {
            ItemCategory::Weapons => &mut self.weapons,
            ItemCategory::Projectiles => &mut self.projectiles,
            ItemCategory::Collectibles => &mut self.collectibles,
        }
    }
}

/// Weapons, projectiles and collectibles, merged from the base item
/// document and its custom overlay. Follows the same whole-record override
/// rules as the character store, including the reload-per-read policy.
#[derive(Debug)]
pub struct ItemStore {
    base_path: PathBuf,
    custom_path: PathBuf,
    backups: BackupManager,
    lock_retry: LockRetryPolicy,
    base: ItemLayer,
    custom: ItemLayer,
    merged: ItemLayer,
}

impl ItemStore {
    pub fn open(config: &AppConfig) -> Result<Self, ApiError> {
        let mut store = Self {
            base_path: config.items_base_path.clone(),
            custom_path: config.items_custom_path.clone(),
            backups: BackupManager::new(&config.backup_dir, config.max_backups),
            lock_retry: config.lock_retry.clone(),
            base: ItemLayer::default(),
            custom: ItemLayer::default(),
            merged: ItemLayer::default(),
        };
        store.reload()?;
        Ok(store)
    }

    pub fn reload(&mut self) -> Result<(), ApiError> {
        let base_doc =
            overlay::read_json_document(&self.base_path, true)?.unwrap_or(Value::Null);
        self.base = ItemLayer::from_document(&base_doc, &self.base_path)?;

        self.custom = match overlay::read_json_document(&self.custom_path, false)? {
            Some(doc) => ItemLayer::from_document(&doc, &self.custom_path)?,
            None => ItemLayer::default(),
        };

        self.merged = self.base.clone();
        for category in ItemCategory::ALL {
            let custom = self.custom.section(category).clone();
            self.merged.section_mut(category).extend(custom);
        }
        Ok(())
    }

    pub fn all(&mut self, category: ItemCategory) -> Result<&Section, ApiError> {
        self.reload()?;
        Ok(self.merged.section(category))
    }

    /// Full merged document across all three categories, one disk read.
    pub fn document(&mut self) -> Result<Value, ApiError> {
        self.reload()?;
        Ok(json!({
            "weapons": self.merged.weapons,
            "projectiles": self.merged.projectiles,
            "collectibles": self.merged.collectibles,
        }))
    }

    pub fn get(&mut self, category: ItemCategory, id: &str) -> Result<&Value, ApiError> {
        self.reload()?;
        self.merged
            .section(category)
            .get(id)
            .ok_or_else(|| ApiError::NotFound {
                resource: category.resource(),
                id: id.to_string(),
            })
    }

    pub fn source(&mut self, category: ItemCategory, id: &str) -> Result<SourceInfo, ApiError> {
        self.reload()?;
        if !self.merged.section(category).contains_key(id) {
            return Err(ApiError::NotFound {
                resource: category.resource(),
                id: id.to_string(),
            });
        }
        Ok(SourceInfo::from_flags(
            self.base.section(category).contains_key(id),
            self.custom.section(category).contains_key(id),
        ))
    }

    pub fn stats(&mut self, category: ItemCategory) -> Result<OverlayStats, ApiError> {
        self.reload()?;
        Ok(self.stats_for(category))
    }

    /// Per-category stats for the whole document, one disk read.
    pub fn all_stats(&mut self) -> Result<Value, ApiError> {
        self.reload()?;
        Ok(json!({
            "weapons": self.stats_for(ItemCategory::Weapons),
            "projectiles": self.stats_for(ItemCategory::Projectiles),
            "collectibles": self.stats_for(ItemCategory::Collectibles),
        }))
    }

    fn stats_for(&self, category: ItemCategory) -> OverlayStats {
        let base = self.base.section(category);
        let custom = self.custom.section(category);
        let overrides = custom.keys().filter(|id| base.contains_key(*id)).count();
        OverlayStats::new(base.len(), custom.len(), overrides)
    }

    pub fn create(
        &mut self,
        category: ItemCategory,
        id: &str,
        data: &Value,
    ) -> Result<Value, ApiError> {
        validate_item_id(id)?;
        let record = validate_item(category, data)?;
        self.reload()?;
        if self.merged.section(category).contains_key(id) {
            return Err(ApiError::Conflict {
                resource: category.resource(),
                id: id.to_string(),
            });
        }
        self.custom
            .section_mut(category)
            .insert(id.to_string(), record.clone());
        self.write_custom()?;
        log::info!("{} created: {id}", category.key());
        Ok(record)
    }

    pub fn update(
        &mut self,
        category: ItemCategory,
        id: &str,
        data: &Value,
    ) -> Result<(Value, bool), ApiError> {
        validate_item_id(id)?;
        let record = validate_item(category, data)?;
        self.reload()?;
        if !self.merged.section(category).contains_key(id) {
            return Err(ApiError::NotFound {
                resource: category.resource(),
                id: id.to_string(),
            });
        }
        let is_override = self.base.section(category).contains_key(id);
        self.custom
            .section_mut(category)
            .insert(id.to_string(), record.clone());
        self.write_custom()?;
        log::info!("{} updated: {id} (override: {is_override})", category.key());
        Ok((record, is_override))
    }

    pub fn delete(&mut self, category: ItemCategory, id: &str) -> Result<(), ApiError> {
        self.reload()?;
        if !self.merged.section(category).contains_key(id) {
            return Err(ApiError::NotFound {
                resource: category.resource(),
                id: id.to_string(),
            });
        }
        if !self.custom.section(category).contains_key(id) {
            return Err(ApiError::ImmutableEntry {
                resource: category.resource(),
                id: id.to_string(),
            });
        }
        self.custom.section_mut(category).remove(id);
        self.write_custom()?;
        log::info!("{} deleted: {id}", category.key());
        Ok(())
    }

    /// Typed merged views for the simulation.
    pub fn weapons(&self) -> Result<BTreeMap<String, WeaponRecord>, ApiError> {
        typed_section(self.merged.section(ItemCategory::Weapons), "weapons")
    }

    pub fn projectiles(&self) -> Result<BTreeMap<String, ProjectileRecord>, ApiError> {
        typed_section(self.merged.section(ItemCategory::Projectiles), "projectiles")
    }

    pub fn collectibles(&self) -> Result<BTreeMap<String, CollectibleRecord>, ApiError> {
        typed_section(self.merged.section(ItemCategory::Collectibles), "collectibles")
    }

    fn write_custom(&mut self) -> Result<(), ApiError> {
        let document = json!({
            "weapons": self.custom.weapons,
            "projectiles": self.custom.projectiles,
            "collectibles": self.custom.collectibles,
        });
        let serialized = serde_json::to_string_pretty(&document)
            .map_err(|err| ApiError::write(format!("Failed to serialize items: {err}")))?;
        let result = overlay::write_document(
            &self.custom_path,
            SKELETON,
            &serialized,
            &self.backups,
            &self.lock_retry,
        );
        let reload = self.reload();
        result?;
        reload
    }
}

fn typed_section<T: for<'de> serde::Deserialize<'de>>(
    section: &Section,
    name: &str,
) -> Result<BTreeMap<String, T>, ApiError> {
    section
        .iter()
        .map(|(id, value)| {
            serde_json::from_value(value.clone())
                .map(|record| (id.clone(), record))
                .map_err(|err| ApiError::read(format!("Invalid {name} record '{id}': {err}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn test_config(tag: &str) -> AppConfig {
        let dir = std::env::temp_dir().join(format!(
            "nightswarm_items_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(dir.join("base")).unwrap();
        let mut config = AppConfig::from_env();
        config.items_base_path = dir.join("base/items.json");
        config.items_custom_path = dir.join("custom/items.json");
        config.backup_dir = dir.join("backups");
        config.lock_retry = LockRetryPolicy {
            attempts: 2,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        config
    }

    fn seed_base(config: &AppConfig, doc: Value) {
        std::fs::write(
            &config.items_base_path,
            serde_json::to_string_pretty(&doc).unwrap(),
        )
        .unwrap();
    }

    fn weapon(name: &str) -> Value {
        json!({"name": name, "attackSpeed": 1600, "radius": 240})
    }

    #[test]
    fn create_lands_in_custom_with_defaults_applied() {
        let config = test_config("create");
        seed_base(&config, json!({"weapons": {}, "projectiles": {}, "collectibles": {}}));
        let mut store = ItemStore::open(&config).unwrap();

        let record = store
            .create(ItemCategory::Weapons, "electrifiedSword", &weapon("Electrified Sword"))
            .unwrap();
        assert_eq!(record["level"], json!(1));
        assert_eq!(record["enabled"], json!(true));

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(&config.items_custom_path).unwrap(),
        )
        .unwrap();
        assert!(written["weapons"]["electrifiedSword"].is_object());
        assert!(written["projectiles"].as_object().unwrap().is_empty());
    }

    #[test]
    fn categories_are_isolated() {
        let config = test_config("isolated");
        seed_base(
            &config,
            json!({"weapons": {"mic": weapon("Mic")}, "projectiles": {}, "collectibles": {}}),
        );
        let mut store = ItemStore::open(&config).unwrap();
        assert!(store.get(ItemCategory::Weapons, "mic").is_ok());
        let err = store.get(ItemCategory::Projectiles, "mic").unwrap_err();
        assert_eq!(err.code(), "PROJECTILE_NOT_FOUND");
    }

    #[test]
    fn per_category_stats_and_source() {
        let config = test_config("stats");
        seed_base(
            &config,
            json!({"weapons": {"mic": weapon("Mic")}, "projectiles": {}, "collectibles": {}}),
        );
        let mut store = ItemStore::open(&config).unwrap();
        store
            .update(ItemCategory::Weapons, "mic", &weapon("Loud Mic"))
            .unwrap();
        store
            .create(ItemCategory::Weapons, "sword", &weapon("Sword"))
            .unwrap();

        let stats = store.stats(ItemCategory::Weapons).unwrap();
        assert_eq!((stats.base, stats.custom, stats.overrides, stats.total), (1, 2, 1, 2));
        assert!(store.source(ItemCategory::Weapons, "mic").unwrap().is_override);
        assert_eq!(store.stats(ItemCategory::Collectibles).unwrap().total, 0);

        let aggregate = store.all_stats().unwrap();
        assert_eq!(aggregate["weapons"]["total"], json!(2));
        assert_eq!(aggregate["collectibles"]["total"], json!(0));
    }

    #[test]
    fn delete_override_reverts_then_base_is_immutable() {
        let config = test_config("delete");
        seed_base(
            &config,
            json!({"weapons": {"mic": weapon("Mic")}, "projectiles": {}, "collectibles": {}}),
        );
        let mut store = ItemStore::open(&config).unwrap();
        store
            .update(ItemCategory::Weapons, "mic", &weapon("Loud Mic"))
            .unwrap();
        store.delete(ItemCategory::Weapons, "mic").unwrap();
        assert_eq!(
            store.get(ItemCategory::Weapons, "mic").unwrap()["name"],
            json!("Mic")
        );
        let err = store.delete(ItemCategory::Weapons, "mic").unwrap_err();
        assert_eq!(err.code(), "IMMUTABLE_ENTRY");
    }

    #[test]
    fn reads_pick_up_external_edits_to_the_custom_file() {
        let config = test_config("external");
        seed_base(
            &config,
            json!({"weapons": {"mic": weapon("Mic")}, "projectiles": {}, "collectibles": {}}),
        );
        let mut store = ItemStore::open(&config).unwrap();
        assert_eq!(store.get(ItemCategory::Weapons, "mic").unwrap()["name"], json!("Mic"));

        std::fs::create_dir_all(config.items_custom_path.parent().unwrap()).unwrap();
        std::fs::write(
            &config.items_custom_path,
            serde_json::to_string_pretty(&json!({
                "weapons": {"mic": weapon("Loud Mic")},
                "projectiles": {},
                "collectibles": {}
            }))
            .unwrap(),
        )
        .unwrap();

        assert_eq!(
            store.get(ItemCategory::Weapons, "mic").unwrap()["name"],
            json!("Loud Mic")
        );
        assert!(store.source(ItemCategory::Weapons, "mic").unwrap().is_override);
    }

    #[test]
    fn typed_views_deserialize_merged_records() {
        let config = test_config("typed");
        seed_base(
            &config,
            json!({
                "weapons": {"mic": {"name": "Mic", "attackSpeed": 1000}},
                "projectiles": {},
                "collectibles": {"candy": {"name": "Candy", "sprite": "candy.png", "dropWeight": 80}}
            }),
        );
        let store = ItemStore::open(&config).unwrap();
        let weapons = store.weapons().unwrap();
        assert_eq!(weapons["mic"].attack_speed, 1000);
        let collectibles = store.collectibles().unwrap();
        assert_eq!(collectibles["candy"].drop_weight, 80.0);
        assert_eq!(collectibles["candy"].attract_radius, 200.0);
    }
}
