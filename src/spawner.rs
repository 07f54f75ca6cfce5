use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};

use crate::entity::Enemy;
use crate::records::{CharacterRecord, CollectibleRecord};
use crate::tuning::GameTuning;

/// Seedable RNG so simulation runs can be replayed deterministically.
pub struct Rng(SmallRng);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self(SmallRng::from_entropy())
    }

    /// Uniform in [0, 1).
    pub fn float(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    /// Uniform in [min, max).
    pub fn range(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.0.gen_range(min..max)
    }
}

/// Decides when waves spawn, which archetypes appear and what dead enemies
/// drop. Owns the RNG so all randomness flows through one seedable stream.
pub struct SpawnDirector {
    rng: Rng,
    last_wave_ms: f64,
    next_enemy_id: u64,
}

impl SpawnDirector {
    pub fn new(rng: Rng) -> Self {
        Self {
            rng,
            last_wave_ms: 0.0,
            next_enemy_id: 1,
        }
    }

    pub fn rng(&mut self) -> &mut Rng {
        &mut self.rng
    }

    /// Spawn a wave if the interval has elapsed and the population cap
    /// allows it. At most one wave per call; the batch never pushes the
    /// population past the cap.
    pub fn maybe_spawn_wave(
        &mut self,
        now_ms: f64,
        player_x: f64,
        player_y: f64,
        current_population: usize,
        archetypes: &BTreeMap<String, CharacterRecord>,
        tuning: &GameTuning,
    ) -> Vec<Enemy> {
        if now_ms - self.last_wave_ms < tuning.wave_interval_ms {
            return Vec::new();
        }
        if archetypes.is_empty() || current_population >= tuning.enemy_cap {
            return Vec::new();
        }
        self.last_wave_ms = now_ms;

        let room = tuning.enemy_cap - current_population;
        let batch = tuning.wave_batch_size.min(room);
        let mut wave = Vec::with_capacity(batch);
        for _ in 0..batch {
            let (id, record) = self.pick_archetype(archetypes);
            let angle = self.rng.range(0.0, std::f64::consts::TAU);
            let radius = self.rng.range(tuning.spawn_ring_min, tuning.spawn_ring_max);
            let x = player_x + angle.sin() * radius;
            let y = player_y + angle.cos() * radius;
            let enemy = Enemy::from_record(self.next_enemy_id, &id, record, x, y);
            self.next_enemy_id += 1;
            wave.push(enemy);
        }
        log::debug!("wave spawned: {} enemies at {now_ms}ms", wave.len());
        wave
    }

    /// Weighted walk over spawn weights: subtract each weight from a roll
    /// in [0, total) and take the archetype that drives it below zero. The
    /// last entry absorbs any floating point remainder.
    fn pick_archetype<'a>(
        &mut self,
        archetypes: &'a BTreeMap<String, CharacterRecord>,
    ) -> (String, &'a CharacterRecord) {
        let total: f64 = archetypes.values().map(|r| r.spawn_weight).sum();
        if total <= 0.0 {
            let (id, record) = archetypes.iter().next_back().unwrap();
            return (id.clone(), record);
        }
        let mut roll = self.rng.range(0.0, total);
        for (id, record) in archetypes {
            roll -= record.spawn_weight;
            if roll < 0.0 {
                return (id.clone(), record);
            }
        }
        let (id, record) = archetypes.iter().next_back().unwrap();
        (id.clone(), record)
    }

    /// Pick a drop from the collectible table by drop weight. A zero total
    /// falls back to the first entry; an empty table drops nothing.
    pub fn roll_drop<'a>(
        &mut self,
        collectibles: &'a BTreeMap<String, CollectibleRecord>,
    ) -> Option<(String, &'a CollectibleRecord)> {
        if collectibles.is_empty() {
            return None;
        }
        let total: f64 = collectibles.values().map(|r| r.drop_weight).sum();
        if total <= 0.0 {
            let (id, record) = collectibles.iter().next()?;
            return Some((id.clone(), record));
        }
        let mut roll = self.rng.range(0.0, total);
        for (id, record) in collectibles {
            roll -= record.drop_weight;
            if roll < 0.0 {
                return Some((id.clone(), record));
            }
        }
        let (id, record) = collectibles.iter().next()?;
        Some((id.clone(), record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn archetype(weight: f64) -> CharacterRecord {
        serde_json::from_value(json!({
            "name": "Enemy",
            "sprites": ["enemy.png"],
            "animation": {"frameTime": 10},
            "stats": {"health": 10, "speed": 1.0, "attackStrength": 1,
                      "attackSpeed": 1000, "attackRange": 40},
            "size": {"width": 32, "height": 32},
            "xpValue": 1,
            "spawnWeight": weight
        }))
        .unwrap()
    }

    fn collectible(weight: f64) -> CollectibleRecord {
        serde_json::from_value(json!({
            "name": "Drop",
            "sprite": "drop.png",
            "dropWeight": weight
        }))
        .unwrap()
    }

    #[test]
    fn waves_respect_interval_batch_and_cap() {
        let tuning = GameTuning::default();
        let mut director = SpawnDirector::new(Rng::new(7));
        let archetypes: BTreeMap<_, _> = [("bat".to_string(), archetype(1.0))].into();

        // First call at t=wave interval spawns a full batch.
        let wave = director.maybe_spawn_wave(5_000.0, 0.0, 0.0, 0, &archetypes, &tuning);
        assert_eq!(wave.len(), tuning.wave_batch_size);
        // Too soon for another.
        assert!(director
            .maybe_spawn_wave(7_000.0, 0.0, 0.0, 50, &archetypes, &tuning)
            .is_empty());
        // Near the cap the batch is clamped.
        let wave = director.maybe_spawn_wave(
            12_000.0,
            0.0,
            0.0,
            tuning.enemy_cap - 10,
            &archetypes,
            &tuning,
        );
        assert_eq!(wave.len(), 10);
        // At the cap nothing spawns.
        assert!(director
            .maybe_spawn_wave(20_000.0, 0.0, 0.0, tuning.enemy_cap, &archetypes, &tuning)
            .is_empty());
    }

    #[test]
    fn spawn_positions_stay_on_the_ring() {
        let tuning = GameTuning::default();
        let mut director = SpawnDirector::new(Rng::new(11));
        let archetypes: BTreeMap<_, _> = [("bat".to_string(), archetype(1.0))].into();
        let wave = director.maybe_spawn_wave(5_000.0, 100.0, -50.0, 0, &archetypes, &tuning);
        for enemy in &wave {
            let dist = ((enemy.x - 100.0).powi(2) + (enemy.y + 50.0).powi(2)).sqrt();
            assert!(dist >= tuning.spawn_ring_min - 1e-6);
            assert!(dist < tuning.spawn_ring_max + 1e-6);
        }
        // Unique ids across the wave.
        let mut ids: Vec<_> = wave.iter().map(|e| e.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), wave.len());
    }

    #[test]
    fn zero_weight_archetypes_never_spawn() {
        let tuning = GameTuning::default();
        let mut director = SpawnDirector::new(Rng::new(3));
        let archetypes: BTreeMap<_, _> = [
            ("bat".to_string(), archetype(1.0)),
            ("ghost".to_string(), archetype(0.0)),
        ]
        .into();
        for i in 0..20 {
            let wave = director.maybe_spawn_wave(
                5_000.0 * (i + 1) as f64,
                0.0,
                0.0,
                0,
                &archetypes,
                &tuning,
            );
            assert!(wave.iter().all(|e| e.archetype == "bat"));
        }
    }

    #[test]
    fn spawn_frequency_tracks_weights() {
        let tuning = GameTuning::default();
        let mut director = SpawnDirector::new(Rng::new(42));
        let archetypes: BTreeMap<_, _> = [
            ("common".to_string(), archetype(3.0)),
            ("rare".to_string(), archetype(1.0)),
        ]
        .into();
        let mut common = 0usize;
        let mut rare = 0usize;
        for i in 0..40 {
            for enemy in director.maybe_spawn_wave(
                5_000.0 * (i + 1) as f64,
                0.0,
                0.0,
                0,
                &archetypes,
                &tuning,
            ) {
                if enemy.archetype == "common" {
                    common += 1;
                } else {
                    rare += 1;
                }
            }
        }
        let ratio = common as f64 / rare.max(1) as f64;
        assert!(ratio > 2.0 && ratio < 4.5, "ratio was {ratio}");
    }

    #[test]
    fn drop_table_falls_back_when_all_weights_are_zero() {
        let mut director = SpawnDirector::new(Rng::new(1));
        let table: BTreeMap<_, _> = [
            ("candy".to_string(), collectible(0.0)),
            ("flower".to_string(), collectible(0.0)),
        ]
        .into();
        let (id, _) = director.roll_drop(&table).unwrap();
        assert_eq!(id, "candy");
        assert!(director.roll_drop(&BTreeMap::new()).is_none());
    }

    #[test]
    fn heavy_drops_dominate_the_table() {
        let mut director = SpawnDirector::new(Rng::new(9));
        let table: BTreeMap<_, _> = [
            ("candy".to_string(), collectible(80.0)),
            ("electrifiedSword".to_string(), collectible(5.0)),
        ]
        .into();
        let candy = (0..200)
            .filter(|_| director.roll_drop(&table).unwrap().0 == "candy")
            .count();
        assert!(candy > 150, "candy dropped {candy}/200 times");
    }
}
