use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ApiError, FieldError};

pub const SPRITE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".gif"];

const CHARACTER_RESERVED_IDS: [&str; 8] = [
    "health", "status", "api", "v1", "characters", "new", "edit", "delete",
];
const ITEM_RESERVED_IDS: [&str; 12] = [
    "health",
    "status",
    "api",
    "v1",
    "characters",
    "new",
    "edit",
    "delete",
    "items",
    "weapons",
    "projectiles",
    "collectibles",
];

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    pub frame_time: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CharacterStats {
    pub health: u32,
    pub speed: f64,
    pub attack_strength: u32,
    pub attack_speed: u32,
    pub attack_range: u32,
}

/// An enemy archetype: how it looks, moves, fights and what it is worth.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRecord {
    pub name: String,
    pub sprites: Vec<String>,
    pub animation: Animation,
    pub stats: CharacterStats,
    pub size: Size,
    pub xp_value: u32,
    #[serde(default = "default_spawn_weight")]
    pub spawn_weight: f64,
}

fn default_spawn_weight() -> f64 {
    1.0
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeaponRecord {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_weapon_type", rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite: Option<String>,
    pub attack_speed: u32,
    #[serde(default = "default_attack_animation_frames")]
    pub attack_animation_frames: u32,
    #[serde(default = "default_attack_strength")]
    pub attack_strength: f64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projectile: Option<String>,
    #[serde(default = "default_projectile_speed")]
    pub projectile_speed: f64,
    #[serde(default = "default_directions")]
    pub directions: u32,
}

fn default_true() -> bool {
    true
}
fn default_weapon_type() -> String {
    "weapon".to_string()
}
fn default_attack_animation_frames() -> u32 {
    5
}
fn default_attack_strength() -> f64 {
    1.0
}
fn default_level() -> u32 {
    1
}
fn default_projectile_speed() -> f64 {
    2.0
}
fn default_directions() -> u32 {
    8
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileRecord {
    pub name: String,
    pub sprites: Vec<String>,
    pub animation: Animation,
    pub speed: f64,
    pub attack_strength: f64,
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    pub size: Size,
}

fn default_max_distance() -> f64 {
    800.0
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CollectibleEffect {
    SpeedBoost,
    Heal,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprites: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropped_sprite: Option<String>,
    #[serde(default = "default_attract_radius")]
    pub attract_radius: f64,
    #[serde(default = "default_pickup_radius")]
    pub pickup_radius: f64,
    #[serde(default = "default_collectible_xp")]
    pub xp_value: u32,
    #[serde(default)]
    pub drop_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<CollectibleEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heal_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grants_weapon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
}

fn default_attract_radius() -> f64 {
    200.0
}
fn default_pickup_radius() -> f64 {
    50.0
}
fn default_collectible_xp() -> u32 {
    1
}

/// Item document sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemCategory {
    Weapons,
    Projectiles,
    Collectibles,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 3] = [
        ItemCategory::Weapons,
        ItemCategory::Projectiles,
        ItemCategory::Collectibles,
    ];

    /// Top-level key in the items document.
    pub fn key(self) -> &'static str {
        match self {
            ItemCategory::Weapons => "weapons",
            ItemCategory::Projectiles => "projectiles",
            ItemCategory::Collectibles => "collectibles",
        }
    }

    /// Resource name used in error codes and messages.
    pub fn resource(self) -> &'static str {
        match self {
            ItemCategory::Weapons => "Weapon",
            ItemCategory::Projectiles => "Projectile",
            ItemCategory::Collectibles => "Collectible",
        }
    }
}

impl FromStr for ItemCategory {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weapons" => Ok(ItemCategory::Weapons),
            "projectiles" => Ok(ItemCategory::Projectiles),
            "collectibles" => Ok(ItemCategory::Collectibles),
            other => Err(ApiError::ValidationMessage(format!(
                "Unknown item category '{other}'. Expected weapons, projectiles or collectibles."
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Identifier validation
// ---------------------------------------------------------------------------

pub fn validate_character_id(id: &str) -> Result<(), ApiError> {
    validate_id(
        id,
        |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_',
        "lowercase letters, digits and underscores",
        &CHARACTER_RESERVED_IDS,
    )
}

pub fn validate_item_id(id: &str) -> Result<(), ApiError> {
    validate_id(
        id,
        |c: char| c.is_ascii_alphanumeric() || c == '_',
        "letters, digits and underscores",
        &ITEM_RESERVED_IDS,
    )
}

fn validate_id(
    id: &str,
    allowed: impl Fn(char) -> bool,
    description: &str,
    reserved: &[&str],
) -> Result<(), ApiError> {
    if id.is_empty() || id.len() > 50 {
        return Err(ApiError::ValidationMessage(format!(
            "ID '{id}' must be between 1 and 50 characters"
        )));
    }
    if !id.chars().all(allowed) {
        return Err(ApiError::ValidationMessage(format!(
            "ID '{id}' may only contain {description}"
        )));
    }
    if reserved.contains(&id.to_ascii_lowercase().as_str()) {
        return Err(ApiError::ValidationMessage(format!(
            "ID '{id}' is reserved and cannot be used"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Record validation
// ---------------------------------------------------------------------------

/// Collects every field-level problem in a candidate record before any is
/// reported, so the client sees the full list at once.
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn new() -> Self {
        Self { errors: Vec::new() }
    }

    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }

    fn string(&mut self, value: &Value, field: &str, min: usize, max: usize, required: bool) {
        match lookup(value, field) {
            Some(Value::String(s)) => {
                if s.len() < min || s.len() > max {
                    self.fail(field, format!("must be between {min} and {max} characters"));
                }
            }
            Some(_) => self.fail(field, "must be a string"),
            None if required => self.fail(field, "is required"),
            None => {}
        }
    }

    fn number(&mut self, value: &Value, field: &str, min: f64, max: f64, required: bool) {
        match lookup(value, field) {
            Some(v) => match v.as_f64() {
                Some(n) if n >= min && n <= max => {}
                Some(_) => self.fail(field, format!("must be between {min} and {max}")),
                None => self.fail(field, "must be a number"),
            },
            None if required => self.fail(field, "is required"),
            None => {}
        }
    }

    fn integer(&mut self, value: &Value, field: &str, min: i64, max: i64, required: bool) {
        match lookup(value, field) {
            Some(v) => match v.as_i64() {
                Some(n) if n >= min && n <= max => {}
                Some(_) => self.fail(field, format!("must be an integer between {min} and {max}")),
                None => self.fail(field, format!("must be an integer between {min} and {max}")),
            },
            None if required => self.fail(field, "is required"),
            None => {}
        }
    }

    fn boolean(&mut self, value: &Value, field: &str) {
        if let Some(v) = lookup(value, field) {
            if !v.is_boolean() {
                self.fail(field, "must be a boolean");
            }
        }
    }

    fn sprite(&mut self, value: &Value, field: &str, required: bool) {
        match lookup(value, field) {
            Some(Value::String(s)) => {
                if !has_sprite_extension(s) {
                    self.fail(field, "must end in .png, .jpg, .jpeg or .gif");
                }
            }
            Some(_) => self.fail(field, "must be a string"),
            None if required => self.fail(field, "is required"),
            None => {}
        }
    }

    fn sprite_list(&mut self, value: &Value, field: &str, required: bool) {
        match lookup(value, field) {
            Some(Value::Array(items)) => {
                if items.is_empty() || items.len() > 20 {
                    self.fail(field, "must contain between 1 and 20 sprites");
                    return;
                }
                for (i, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(s) if has_sprite_extension(s) => {}
                        _ => self.fail(
                            &format!("{field}[{i}]"),
                            "must be a sprite path ending in .png, .jpg, .jpeg or .gif",
                        ),
                    }
                }
            }
            Some(_) => self.fail(field, "must be an array of sprite paths"),
            None if required => self.fail(field, "is required"),
            None => {}
        }
    }

    fn id_reference(&mut self, value: &Value, field: &str) {
        if let Some(v) = lookup(value, field) {
            match v.as_str() {
                Some(s) if validate_item_id(s).is_ok() => {}
                _ => self.fail(field, "must be a valid item ID"),
            }
        }
    }
}

fn lookup<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in field.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

pub fn has_sprite_extension(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    SPRITE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn require_object(value: &Value) -> Result<(), ApiError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ApiError::Validation(vec![FieldError::new(
            "data",
            "must be an object",
        )]))
    }
}

fn finalize<T: for<'de> Deserialize<'de>>(value: &Value) -> Result<T, ApiError> {
    serde_json::from_value(value.clone()).map_err(|err| {
        ApiError::Validation(vec![FieldError::new("data", err.to_string())])
    })
}

pub fn validate_character(value: &Value) -> Result<CharacterRecord, ApiError> {
    require_object(value)?;
    let mut check = Checker::new();
    check.string(value, "name", 1, 100, true);
    check.sprite_list(value, "sprites", true);
    check.integer(value, "animation.frameTime", 1, 60, true);
    check.integer(value, "stats.health", 1, 1_000, true);
    check.number(value, "stats.speed", 0.0, 10.0, true);
    check.integer(value, "stats.attackStrength", 0, 1_000, true);
    check.integer(value, "stats.attackSpeed", 1, 10_000, true);
    check.integer(value, "stats.attackRange", 1, 1_000, true);
    check.integer(value, "size.width", 1, 500, true);
    check.integer(value, "size.height", 1, 500, true);
    check.integer(value, "xpValue", 0, 10_000, true);
    check.number(value, "spawnWeight", 0.0, 100.0, false);
    check.finish()?;
    finalize(value)
}

pub fn validate_weapon(value: &Value) -> Result<WeaponRecord, ApiError> {
    require_object(value)?;
    let mut check = Checker::new();
    check.string(value, "name", 1, 100, true);
    check.boolean(value, "enabled");
    check.sprite(value, "sprite", false);
    check.integer(value, "attackSpeed", 100, 60_000, true);
    check.integer(value, "attackAnimationFrames", 1, 60, false);
    check.number(value, "attackStrength", 0.0, 1_000.0, false);
    check.integer(value, "level", 1, 100, false);
    check.number(value, "radius", 1.0, 1_000.0, false);
    check.id_reference(value, "projectile");
    check.number(value, "projectileSpeed", 0.1, 50.0, false);
    check.integer(value, "directions", 1, 36, false);
    check.finish()?;
    finalize(value)
}

pub fn validate_projectile(value: &Value) -> Result<ProjectileRecord, ApiError> {
    require_object(value)?;
    let mut check = Checker::new();
    check.string(value, "name", 1, 100, true);
    check.sprite_list(value, "sprites", true);
    check.integer(value, "animation.frameTime", 1, 60, true);
    check.number(value, "speed", 0.1, 50.0, true);
    check.number(value, "attackStrength", 0.0, 1_000.0, true);
    check.number(value, "maxDistance", 100.0, 5_000.0, false);
    check.integer(value, "size.width", 1, 500, true);
    check.integer(value, "size.height", 1, 500, true);
    check.finish()?;
    finalize(value)
}

pub fn validate_collectible(value: &Value) -> Result<CollectibleRecord, ApiError> {
    require_object(value)?;
    let mut check = Checker::new();
    check.string(value, "name", 1, 100, true);
    check.sprite(value, "sprite", false);
    if lookup(value, "sprites").is_some() {
        check.sprite_list(value, "sprites", false);
    }
    if lookup(value, "sprite").is_none() && lookup(value, "sprites").is_none() {
        check.fail("sprite", "either sprite or sprites is required");
    }
    check.sprite(value, "droppedSprite", false);
    check.number(value, "attractRadius", 0.0, 1_000.0, false);
    check.number(value, "pickupRadius", 1.0, 500.0, false);
    check.integer(value, "xpValue", 0, 10_000, false);
    check.number(value, "dropWeight", 0.0, 100.0, false);
    if let Some(effect) = lookup(value, "effect") {
        match effect.as_str() {
            Some("speedBoost") | Some("heal") => {}
            _ => check.fail("effect", "must be one of speedBoost, heal"),
        }
        if effect.as_str() == Some("heal") {
            match lookup(value, "healAmount").and_then(Value::as_f64) {
                Some(n) if n > 0.0 => {}
                _ => check.fail("healAmount", "must be a positive number when effect is heal"),
            }
        }
    }
    check.id_reference(value, "grantsWeapon");
    if lookup(value, "size").is_some() {
        check.integer(value, "size.width", 1, 500, false);
        check.integer(value, "size.height", 1, 500, false);
    }
    check.finish()?;
    finalize(value)
}

/// Validate a record for `category`, returning it re-serialized with
/// unknown fields stripped and defaults applied.
pub fn validate_item(category: ItemCategory, value: &Value) -> Result<Value, ApiError> {
    let normalized = match category {
        ItemCategory::Weapons => serde_json::to_value(validate_weapon(value)?),
        ItemCategory::Projectiles => serde_json::to_value(validate_projectile(value)?),
        ItemCategory::Collectibles => serde_json::to_value(validate_collectible(value)?),
    };
    normalized.map_err(|err| ApiError::write(format!("Failed to serialize record: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn character_payload() -> Value {
        json!({
            "name": "Skeleton",
            "sprites": ["skeleton_0.png", "skeleton_1.png"],
            "animation": {"frameTime": 10},
            "stats": {
                "health": 20,
                "speed": 1.5,
                "attackStrength": 5,
                "attackSpeed": 1000,
                "attackRange": 40
            },
            "size": {"width": 64, "height": 64},
            "xpValue": 3
        })
    }

    #[test]
    fn character_defaults_spawn_weight_to_one() {
        let record = validate_character(&character_payload()).unwrap();
        assert_eq!(record.spawn_weight, 1.0);
        assert_eq!(record.stats.attack_range, 40);
    }

    #[test]
    fn character_validation_collects_every_failure() {
        let payload = json!({
            "name": "",
            "sprites": [],
            "animation": {"frameTime": 0},
            "stats": {"health": 5000, "speed": 1.0, "attackStrength": 1,
                      "attackSpeed": 500, "attackRange": 40},
            "size": {"width": 64, "height": 64}
        });
        let err = validate_character(&payload).unwrap_err();
        let details = err.details().unwrap();
        let fields: Vec<_> = details.iter().map(|d| d.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"sprites"));
        assert!(fields.contains(&"animation.frameTime"));
        assert!(fields.contains(&"stats.health"));
        assert!(fields.contains(&"xpValue"));
    }

    #[test]
    fn character_rejects_non_sprite_paths() {
        let mut payload = character_payload();
        payload["sprites"] = json!(["skeleton.bmp"]);
        let err = validate_character(&payload).unwrap_err();
        assert_eq!(err.details().unwrap()[0].field, "sprites[0]");
    }

    #[test]
    fn unknown_fields_are_stripped_on_normalization() {
        let mut payload = character_payload();
        payload["hacked"] = json!(true);
        let record = validate_character(&payload).unwrap();
        let normalized = serde_json::to_value(&record).unwrap();
        assert!(normalized.get("hacked").is_none());
    }

    #[test]
    fn weapon_defaults_apply() {
        let record = validate_weapon(&json!({
            "name": "Electrified Sword",
            "attackSpeed": 1600
        }))
        .unwrap();
        assert!(record.enabled);
        assert_eq!(record.kind, "weapon");
        assert_eq!(record.attack_animation_frames, 5);
        assert_eq!(record.level, 1);
        assert_eq!(record.directions, 8);
        assert_eq!(record.projectile_speed, 2.0);
    }

    #[test]
    fn weapon_rejects_out_of_range_attack_speed() {
        let err = validate_weapon(&json!({"name": "Mic", "attackSpeed": 50})).unwrap_err();
        assert_eq!(err.details().unwrap()[0].field, "attackSpeed");
    }

    #[test]
    fn projectile_requires_core_fields() {
        let err = validate_projectile(&json!({"name": "Note"})).unwrap_err();
        let fields: Vec<_> = err
            .details()
            .unwrap()
            .iter()
            .map(|d| d.field.as_str())
            .collect();
        assert!(fields.contains(&"sprites"));
        assert!(fields.contains(&"speed"));
        assert!(fields.contains(&"attackStrength"));
        assert!(fields.contains(&"size.width"));
    }

    #[test]
    fn collectible_requires_some_sprite() {
        let err = validate_collectible(&json!({"name": "Candy"})).unwrap_err();
        assert!(err
            .details()
            .unwrap()
            .iter()
            .any(|d| d.message.contains("either sprite or sprites")));

        assert!(validate_collectible(&json!({
            "name": "Candy",
            "sprite": "candy.png"
        }))
        .is_ok());
    }

    #[test]
    fn heal_collectible_requires_positive_heal_amount() {
        let err = validate_collectible(&json!({
            "name": "Flower",
            "sprite": "flower.png",
            "effect": "heal"
        }))
        .unwrap_err();
        assert!(err
            .details()
            .unwrap()
            .iter()
            .any(|d| d.field == "healAmount"));

        assert!(validate_collectible(&json!({
            "name": "Flower",
            "sprite": "flower.png",
            "effect": "heal",
            "healAmount": 10
        }))
        .is_ok());
    }

    #[test]
    fn character_ids_are_lowercase_only() {
        assert!(validate_character_id("skeleton_2").is_ok());
        assert!(validate_character_id("Skeleton").is_err());
        assert!(validate_character_id("").is_err());
        assert!(validate_character_id("api").is_err());
        assert!(validate_character_id(&"x".repeat(51)).is_err());
    }

    #[test]
    fn item_ids_allow_mixed_case_but_not_reserved_words() {
        assert!(validate_item_id("electrifiedSword").is_ok());
        assert!(validate_item_id("weapons").is_err());
        assert!(validate_item_id("bad-id").is_err());
    }

    #[test]
    fn category_parses_from_path_segment() {
        assert_eq!("weapons".parse::<ItemCategory>().unwrap(), ItemCategory::Weapons);
        assert!("swords".parse::<ItemCategory>().is_err());
    }
}
