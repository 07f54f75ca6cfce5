/// Fixed simulation rates and gameplay constants. Values that designers
/// tune per-item live in the item records; these are the engine-level
/// numbers the records hang off.
#[derive(Clone, Debug)]
pub struct GameTuning {
    // Wave spawning
    pub wave_interval_ms: f64,
    pub wave_batch_size: usize,
    pub enemy_cap: usize,
    pub spawn_ring_min: f64,
    pub spawn_ring_max: f64,

    // Enemy behavior
    pub proximity_radius: f64,

    // Pickups
    pub attraction_lerp: f64,

    // Weapons
    pub orbit_hit_half_extent: f64,
    pub projectile_hit_radius: f64,

    // Player
    pub player_max_health: f64,
    pub player_speed: f64,
    pub speed_boost_multiplier: f64,
    pub speed_boost_duration_ms: f64,

    // Progression
    pub starting_next_level_xp: f64,
    pub xp_curve_multiplier: f64,

    // Damage floaters
    pub floater_rise_per_tick: f64,
    pub floater_grow_frames: u32,
    pub floater_fade_frames: u32,
}

impl Default for GameTuning {
    fn default() -> Self {
        Self {
            wave_interval_ms: 5_000.0,
            wave_batch_size: 50,
            enemy_cap: 25_000,
            spawn_ring_min: 900.0,
            spawn_ring_max: 1_200.0,
            proximity_radius: 150.0,
            attraction_lerp: 0.1,
            orbit_hit_half_extent: 50.0,
            projectile_hit_radius: 40.0,
            player_max_health: 50.0,
            player_speed: 3.0,
            speed_boost_multiplier: 4.0,
            speed_boost_duration_ms: 10_000.0,
            starting_next_level_xp: 10.0,
            xp_curve_multiplier: 2.5,
            floater_rise_per_tick: 0.5,
            floater_grow_frames: 40,
            floater_fade_frames: 60,
        }
    }
}

impl GameTuning {
    /// Overlay toggle-style overrides from the merged game config document.
    /// Unknown keys are ignored; only numbers the engine understands apply.
    pub fn apply_overrides(&mut self, config: &serde_json::Value) {
        let read = |key: &str| config.get(key).and_then(serde_json::Value::as_f64);
        if let Some(v) = read("waveIntervalMs") {
            self.wave_interval_ms = v;
        }
        if let Some(v) = read("enemyCap") {
            self.enemy_cap = v as usize;
        }
        if let Some(v) = read("playerMaxHealth") {
            self.player_max_health = v;
        }
        if let Some(v) = read("playerSpeed") {
            self.player_speed = v;
        }
    }
}
