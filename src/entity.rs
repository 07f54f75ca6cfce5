use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::records::{
    CharacterRecord, CollectibleEffect, CollectibleRecord, ProjectileRecord, WeaponRecord,
};
use crate::tuning::GameTuning;

pub const TICK_RATE: f64 = 60.0;
pub const TICK_MS: f64 = 1000.0 / TICK_RATE;

pub const POOL_RADIUS: f64 = 80.0;
pub const POOL_LIFE_TICKS: u64 = 600;
pub const POOL_REHIT_MS: f64 = 1_000.0;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub x: f64,
    pub y: f64,
    pub health: f64,
    pub max_health: f64,
    pub base_speed: f64,
    #[serde(skip)]
    pub speed_multiplier: f64,
    #[serde(skip)]
    pub speed_boost_until_ms: f64,
    pub xp: f64,
    pub level: u32,
    pub next_level_xp: f64,
    #[serde(skip)]
    pub weapons: Vec<Weapon>,
}

impl PlayerState {
    pub fn new(tuning: &GameTuning) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            health: tuning.player_max_health,
            max_health: tuning.player_max_health,
            base_speed: tuning.player_speed,
            speed_multiplier: 1.0,
            speed_boost_until_ms: 0.0,
            xp: 0.0,
            level: 1,
            next_level_xp: tuning.starting_next_level_xp,
            weapons: Vec::new(),
        }
    }

    pub fn effective_speed(&self, now_ms: f64) -> f64 {
        if now_ms < self.speed_boost_until_ms {
            self.base_speed * self.speed_multiplier
        } else {
            self.base_speed
        }
    }

    pub fn apply_speed_boost(&mut self, now_ms: f64, multiplier: f64, duration_ms: f64) {
        self.speed_multiplier = multiplier;
        self.speed_boost_until_ms = now_ms + duration_ms;
    }

    /// Never drops below zero; the world treats zero as game over.
    pub fn apply_damage(&mut self, amount: f64) {
        self.health = (self.health - amount).max(0.0);
    }

    pub fn heal(&mut self, amount: f64) {
        self.health = (self.health + amount).min(self.max_health);
    }

    /// Add xp and resolve any level-ups, each raising the threshold on the
    /// same curve. Returns how many levels were gained.
    pub fn gain_xp(&mut self, amount: f64, curve_multiplier: f64) -> u32 {
        self.xp += amount;
        let mut gained = 0;
        while self.xp >= self.next_level_xp {
            self.xp -= self.next_level_xp;
            self.next_level_xp *= curve_multiplier;
            self.level += 1;
            gained += 1;
        }
        gained
    }
}

// ---------------------------------------------------------------------------
// Enemies
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Enemy {
    pub id: u64,
    pub archetype: String,
    pub x: f64,
    pub y: f64,
    pub health: f64,
    pub speed: f64,
    pub attack_strength: f64,
    pub attack_speed_ms: f64,
    pub attack_range: f64,
    pub xp_value: f64,
    pub last_attack_ms: f64,
    pub cycle: AttackCycle,
    pub destroyed: bool,
}

impl Enemy {
    pub fn from_record(id: u64, archetype: &str, record: &CharacterRecord, x: f64, y: f64) -> Self {
        Self {
            id,
            archetype: archetype.to_string(),
            x,
            y,
            health: record.stats.health as f64,
            speed: record.stats.speed,
            attack_strength: record.stats.attack_strength as f64,
            attack_speed_ms: record.stats.attack_speed as f64,
            attack_range: record.stats.attack_range as f64,
            xp_value: record.xp_value as f64,
            // Backdated so a fresh enemy can attack as soon as it reaches
            // the player.
            last_attack_ms: -(record.stats.attack_speed as f64),
            cycle: AttackCycle::new(record.animation.frame_time),
            destroyed: false,
        }
    }

    /// Returns true when this hit killed the enemy. Destroyed enemies stay
    /// in the list until the end-of-tick sweep.
    pub fn apply_damage(&mut self, amount: f64) -> bool {
        if self.destroyed {
            return false;
        }
        self.health -= amount;
        if self.health <= 0.0 {
            self.destroyed = true;
            return true;
        }
        false
    }

    pub fn can_attack(&self, now_ms: f64) -> bool {
        now_ms - self.last_attack_ms >= self.attack_speed_ms
    }
}

// ---------------------------------------------------------------------------
// Pickups
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Pickup {
    pub collectible: String,
    pub x: f64,
    pub y: f64,
    pub attract_radius: f64,
    pub pickup_radius: f64,
    pub xp_value: f64,
    pub effect: Option<CollectibleEffect>,
    pub heal_amount: f64,
    pub grants_weapon: Option<String>,
    pub destroyed: bool,
}

impl Pickup {
    pub fn from_record(id: &str, record: &CollectibleRecord, x: f64, y: f64) -> Self {
        Self {
            collectible: id.to_string(),
            x,
            y,
            attract_radius: record.attract_radius,
            pickup_radius: record.pickup_radius,
            xp_value: record.xp_value as f64,
            effect: record.effect,
            heal_amount: record.heal_amount.unwrap_or(0.0),
            grants_weapon: record.grants_weapon.clone(),
            destroyed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Projectiles and area pools
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Projectile {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub attack_strength: f64,
    pub traveled: f64,
    pub max_distance: f64,
    pub destroyed: bool,
}

impl Projectile {
    /// Advance one tick. Destroyed once it exceeds its range.
    pub fn advance(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
        self.traveled += (self.dx * self.dx + self.dy * self.dy).sqrt();
        if self.traveled >= self.max_distance {
            self.destroyed = true;
        }
    }
}

/// Damaging zone left on the ground; re-hits each enemy on a cooldown.
#[derive(Clone, Debug)]
pub struct AreaPool {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub attack_strength: f64,
    pub expires_at_tick: u64,
    pub hit_log: HashMap<u64, f64>,
}

impl AreaPool {
    pub fn try_hit(&mut self, enemy_id: u64, now_ms: f64) -> bool {
        match self.hit_log.get(&enemy_id) {
            Some(&last) if now_ms - last < POOL_REHIT_MS => false,
            _ => {
                self.hit_log.insert(enemy_id, now_ms);
                true
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Damage floaters
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatingText {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub age: u32,
    pub scale: f64,
    pub opacity: f64,
}

impl FloatingText {
    pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            age: 0,
            scale: 1.0,
            opacity: 1.0,
        }
    }

    /// Rise, grow for the first stretch, fade out over the full lifetime.
    /// Returns false once fully faded.
    pub fn advance(&mut self, tuning: &GameTuning) -> bool {
        self.age += 1;
        self.y -= tuning.floater_rise_per_tick;
        if self.age <= tuning.floater_grow_frames {
            self.scale = 1.0 + self.age as f64 / tuning.floater_grow_frames as f64;
        }
        self.opacity = 1.0 - self.age as f64 / tuning.floater_fade_frames as f64;
        self.age < tuning.floater_fade_frames
    }
}

// ---------------------------------------------------------------------------
// Weapons
// ---------------------------------------------------------------------------

/// Melee swing state shared by enemies and attack animations: an attack
/// raises the flag for a fixed number of frames and damage lands on the
/// first one.
#[derive(Clone, Debug)]
pub struct AttackCycle {
    pub attacking: bool,
    pub frame: u32,
    pub animation_frames: u32,
}

impl AttackCycle {
    pub fn new(animation_frames: u32) -> Self {
        Self {
            attacking: false,
            frame: 0,
            animation_frames: animation_frames.max(1),
        }
    }

    pub fn begin(&mut self) {
        self.attacking = true;
        self.frame = 0;
    }

    pub fn first_attack_frame(&self) -> bool {
        self.attacking && self.frame == 0
    }

    pub fn advance(&mut self) {
        if self.attacking {
            self.frame += 1;
            if self.frame >= self.animation_frames {
                self.attacking = false;
                self.frame = 0;
            }
        }
    }
}

/// Weapon circling the player; damages each enemy at most once per
/// cooldown window while the tip overlaps it.
#[derive(Clone, Debug)]
pub struct OrbitWeapon {
    pub id: String,
    pub angle: f64,
    pub angle_step: f64,
    pub radius: f64,
    pub level: u32,
    pub attack_strength: f64,
    pub rehit_ms: f64,
    pub hit_log: HashMap<u64, f64>,
}

impl OrbitWeapon {
    pub fn from_record(id: &str, record: &WeaponRecord) -> Self {
        Self {
            id: id.to_string(),
            angle: 0.0,
            angle_step: orbit_step_for(id) * record.level as f64,
            radius: record.radius.unwrap_or(100.0),
            level: record.level,
            attack_strength: record.attack_strength,
            rehit_ms: record.attack_speed as f64,
            hit_log: HashMap::new(),
        }
    }

    pub fn advance(&mut self) {
        self.angle = (self.angle + self.angle_step) % std::f64::consts::TAU;
    }

    pub fn tip(&self, player_x: f64, player_y: f64) -> (f64, f64) {
        (
            player_x + self.angle.cos() * self.radius,
            player_y + self.angle.sin() * self.radius,
        )
    }

    /// True when the enemy may be damaged this tick; records the hit time.
    pub fn try_hit(&mut self, enemy_id: u64, now_ms: f64) -> bool {
        match self.hit_log.get(&enemy_id) {
            Some(&last) if now_ms - last < self.rehit_ms => false,
            _ => {
                self.hit_log.insert(enemy_id, now_ms);
                true
            }
        }
    }
}

fn orbit_step_for(id: &str) -> f64 {
    // The sword sweeps slower than the default orbit rate.
    if id == "electrifiedSword" {
        0.04
    } else {
        0.05
    }
}

/// Fires a ring of evenly spaced projectiles on an interval.
#[derive(Clone, Debug)]
pub struct RadialBurstWeapon {
    pub id: String,
    pub directions: u32,
    pub interval_ms: f64,
    pub projectile_speed: f64,
    pub attack_strength: f64,
    pub max_distance: f64,
    pub last_fired_ms: f64,
}

impl RadialBurstWeapon {
    pub fn from_record(
        id: &str,
        record: &WeaponRecord,
        projectiles: &BTreeMap<String, ProjectileRecord>,
    ) -> Self {
        let resolved = record
            .projectile
            .as_deref()
            .and_then(|pid| projectiles.get(pid));
        Self {
            id: id.to_string(),
            directions: record.directions.max(1),
            interval_ms: record.attack_speed as f64,
            projectile_speed: resolved.map_or(record.projectile_speed, |p| p.speed),
            attack_strength: resolved.map_or(record.attack_strength, |p| p.attack_strength),
            max_distance: resolved.map_or(800.0, |p| p.max_distance),
            // Backdated so the first burst fires immediately.
            last_fired_ms: -(record.attack_speed as f64),
        }
    }

    pub fn ready(&self, now_ms: f64) -> bool {
        now_ms - self.last_fired_ms >= self.interval_ms
    }

    pub fn fire(&mut self, now_ms: f64, x: f64, y: f64) -> Vec<Projectile> {
        self.last_fired_ms = now_ms;
        let step = std::f64::consts::TAU / self.directions as f64;
        (0..self.directions)
            .map(|i| {
                let angle = step * i as f64;
                Projectile {
                    x,
                    y,
                    dx: angle.cos() * self.projectile_speed,
                    dy: angle.sin() * self.projectile_speed,
                    attack_strength: self.attack_strength,
                    traveled: 0.0,
                    max_distance: self.max_distance,
                    destroyed: false,
                }
            })
            .collect()
    }
}

/// Drops damaging pools near the player on an interval; the world staggers
/// the spawns within a cycle.
#[derive(Clone, Debug)]
pub struct PoolWeapon {
    pub id: String,
    pub interval_ms: f64,
    pub attack_strength: f64,
    pub pools_per_cycle: u32,
    pub last_cycle_ms: f64,
}

impl PoolWeapon {
    pub fn from_record(id: &str, record: &WeaponRecord) -> Self {
        Self {
            id: id.to_string(),
            interval_ms: record.attack_speed as f64,
            attack_strength: record.attack_strength,
            pools_per_cycle: record.level.min(8),
            last_cycle_ms: -(record.attack_speed as f64),
        }
    }

    pub fn ready(&self, now_ms: f64) -> bool {
        now_ms - self.last_cycle_ms >= self.interval_ms
    }
}

#[derive(Clone, Debug)]
pub enum Weapon {
    Orbit(OrbitWeapon),
    RadialBurst(RadialBurstWeapon),
    Pool(PoolWeapon),
}

impl Weapon {
    /// Classify by shape of the record: a projectile reference makes a
    /// radial burst, a radius makes an orbit, neither makes a pool weapon.
    pub fn from_record(
        id: &str,
        record: &WeaponRecord,
        projectiles: &BTreeMap<String, ProjectileRecord>,
    ) -> Self {
        if record.projectile.is_some() {
            Weapon::RadialBurst(RadialBurstWeapon::from_record(id, record, projectiles))
        } else if record.radius.is_some() {
            Weapon::Orbit(OrbitWeapon::from_record(id, record))
        } else {
            Weapon::Pool(PoolWeapon::from_record(id, record))
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Weapon::Orbit(w) => &w.id,
            Weapon::RadialBurst(w) => &w.id,
            Weapon::Pool(w) => &w.id,
        }
    }
}
