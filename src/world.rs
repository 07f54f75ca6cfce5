use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use serde::Serialize;
use serde_json::Value;

use crate::entity::{
    AreaPool, Enemy, FloatingText, Pickup, PlayerState, Projectile, Weapon, POOL_LIFE_TICKS,
    POOL_RADIUS, TICK_MS,
};
use crate::records::{
    CharacterRecord, CollectibleEffect, CollectibleRecord, ProjectileRecord, WeaponRecord,
};
use crate::spawner::{Rng, SpawnDirector};
use crate::tuning::GameTuning;

/// Everything the world needs from the content stores, already merged.
#[derive(Clone, Default)]
pub struct WorldContent {
    pub archetypes: BTreeMap<String, CharacterRecord>,
    pub weapons: BTreeMap<String, WeaponRecord>,
    pub projectiles: BTreeMap<String, ProjectileRecord>,
    pub collectibles: BTreeMap<String, CollectibleRecord>,
    pub game_config: Value,
}

/// A deferred world mutation, run when the clock reaches `at_ms`. Replaces
/// ad-hoc timers so pending work is visible, deterministic and clearable
/// on game over.
#[derive(Clone, Debug)]
struct ScheduledEvent {
    at_ms: u64,
    seq: u64,
    kind: EventKind,
}

#[derive(Clone, Debug)]
enum EventKind {
    SpawnPool { x: f64, y: f64, strength: f64 },
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at_ms == other.at_ms && self.seq == other.seq
    }
}
impl Eq for ScheduledEvent {}
impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.at_ms, self.seq).cmp(&(other.at_ms, other.seq))
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WorldSummary {
    pub ticks: u64,
    pub elapsed_ms: f64,
    pub player: PlayerState,
    pub enemies_alive: usize,
    pub enemies_destroyed: u64,
    pub pickups_active: usize,
    pub pickups_collected: u64,
    pub game_over: bool,
}

/// The headless game world: a fixed-rate tick loop over the player,
/// enemies, weapons, projectiles, pools and pickups. Time is derived from
/// the tick counter, so a run is fully determined by content and seed.
pub struct GameWorld {
    tuning: GameTuning,
    content: WorldContent,
    tick: u64,
    pub player: PlayerState,
    pub enemies: Vec<Enemy>,
    pub pickups: Vec<Pickup>,
    pub projectiles: Vec<Projectile>,
    pub pools: Vec<AreaPool>,
    pub effects: Vec<FloatingText>,
    spawner: SpawnDirector,
    scheduled: BinaryHeap<Reverse<ScheduledEvent>>,
    next_event_seq: u64,
    pub enemies_destroyed: u64,
    pub pickups_collected: u64,
    pub game_over: bool,
}

impl GameWorld {
    pub fn new(content: WorldContent, seed: Option<u64>) -> Self {
        let mut tuning = GameTuning::default();
        tuning.apply_overrides(&content.game_config);

        let mut player = PlayerState::new(&tuning);
        player.weapons = starting_loadout(&content);

        let rng = match seed {
            Some(seed) => Rng::new(seed),
            None => Rng::from_entropy(),
        };

        Self {
            tuning,
            content,
            tick: 0,
            player,
            enemies: Vec::new(),
            pickups: Vec::new(),
            projectiles: Vec::new(),
            pools: Vec::new(),
            effects: Vec::new(),
            spawner: SpawnDirector::new(rng),
            scheduled: BinaryHeap::new(),
            next_event_seq: 0,
            enemies_destroyed: 0,
            pickups_collected: 0,
            game_over: false,
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.tick as f64 * TICK_MS
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            if self.game_over {
                break;
            }
            self.step();
        }
    }

    /// Advance the world one tick. A finished game is terminal: nothing
    /// moves, spawns or fires.
    pub fn step(&mut self) {
        if self.game_over {
            return;
        }
        let now = self.now_ms();

        self.run_due_events(now);
        self.update_weapons(now);
        self.update_enemies(now);
        self.update_projectiles(now);
        self.update_pools(now);
        self.update_pickups(now);

        self.effects.retain_mut(|f| f.advance(&self.tuning));
        self.sweep_destroyed();

        if self.player.health <= 0.0 {
            self.finish();
            return;
        }

        let wave = self.spawner.maybe_spawn_wave(
            now,
            self.player.x,
            self.player.y,
            self.enemies.len(),
            &self.content.archetypes,
            &self.tuning,
        );
        self.enemies.extend(wave);

        self.tick += 1;
    }

    fn finish(&mut self) {
        self.game_over = true;
        self.scheduled.clear();
        log::info!(
            "game over at tick {} ({} enemies destroyed)",
            self.tick,
            self.enemies_destroyed
        );
    }

    fn schedule(&mut self, at_ms: f64, kind: EventKind) {
        let event = ScheduledEvent {
            at_ms: at_ms.max(0.0) as u64,
            seq: self.next_event_seq,
            kind,
        };
        self.next_event_seq += 1;
        self.scheduled.push(Reverse(event));
    }

    fn run_due_events(&mut self, now: f64) {
        while let Some(Reverse(event)) = self.scheduled.peek() {
            if event.at_ms as f64 > now {
                break;
            }
            let Reverse(event) = self.scheduled.pop().unwrap();
            match event.kind {
                EventKind::SpawnPool { x, y, strength } => {
                    self.pools.push(AreaPool {
                        x,
                        y,
                        radius: POOL_RADIUS,
                        attack_strength: strength,
                        expires_at_tick: self.tick + POOL_LIFE_TICKS,
                        hit_log: Default::default(),
                    });
                }
            }
        }
    }

    fn update_weapons(&mut self, now: f64) {
        let (px, py) = (self.player.x, self.player.y);
        let mut weapons = std::mem::take(&mut self.player.weapons);
        let mut pool_spawns = Vec::new();

        for weapon in &mut weapons {
            match weapon {
                Weapon::Orbit(orbit) => {
                    orbit.advance();
                    let (tx, ty) = orbit.tip(px, py);
                    let half = self.tuning.orbit_hit_half_extent;
                    for enemy in &mut self.enemies {
                        if enemy.destroyed {
                            continue;
                        }
                        if (enemy.x - tx).abs() < half
                            && (enemy.y - ty).abs() < half
                            && orbit.try_hit(enemy.id, now)
                        {
                            let damage = orbit.attack_strength;
                            enemy.apply_damage(damage);
                            self.effects
                                .push(FloatingText::new(format!("{damage:.0}"), enemy.x, enemy.y));
                        }
                    }
                }
                Weapon::RadialBurst(burst) => {
                    if burst.ready(now) {
                        self.projectiles.extend(burst.fire(now, px, py));
                    }
                }
                Weapon::Pool(pool) => {
                    if pool.ready(now) {
                        pool.last_cycle_ms = now;
                        for i in 0..pool.pools_per_cycle {
                            let delay =
                                (i + 1) as f64 * (700.0 + self.spawner.rng().range(0.0, 100.0));
                            let x = px + self.spawner.rng().range(-100.0, 100.0);
                            let y = py + self.spawner.rng().range(-100.0, 100.0);
                            pool_spawns.push((now + delay, x, y, pool.attack_strength));
                        }
                    }
                }
            }
        }

        self.player.weapons = weapons;
        for (at, x, y, strength) in pool_spawns {
            self.schedule(at, EventKind::SpawnPool { x, y, strength });
        }
    }

    /// Enemies seek the player while outside the proximity radius. Inside
    /// it they attack when the player also falls inside the square of side
    /// 2x attack range, so reach differs along the diagonal.
    fn update_enemies(&mut self, now: f64) {
        let (px, py) = (self.player.x, self.player.y);
        let mut damage_taken = Vec::new();

        for enemy in &mut self.enemies {
            if enemy.destroyed {
                continue;
            }
            enemy.cycle.advance();

            let dx = px - enemy.x;
            let dy = py - enemy.y;
            let dist = (dx * dx + dy * dy).sqrt();

            if dist > self.tuning.proximity_radius {
                let angle = dy.atan2(dx);
                enemy.x += angle.cos() * enemy.speed;
                enemy.y += angle.sin() * enemy.speed;
            } else if dx.abs() < enemy.attack_range
                && dy.abs() < enemy.attack_range
                && enemy.can_attack(now)
            {
                enemy.cycle.begin();
                enemy.last_attack_ms = now;
            }

            if enemy.cycle.first_attack_frame() {
                damage_taken.push(enemy.attack_strength);
            }
        }

        for strength in damage_taken {
            self.player.apply_damage(strength);
            self.effects.push(FloatingText::new(
                format!("-{strength:.0}"),
                self.player.x,
                self.player.y,
            ));
        }
    }

    /// Projectiles damage at most one enemy, then vanish.
    fn update_projectiles(&mut self, _now: f64) {
        let radius = self.tuning.projectile_hit_radius;
        for projectile in &mut self.projectiles {
            if projectile.destroyed {
                continue;
            }
            projectile.advance();
            if projectile.destroyed {
                continue;
            }
            for enemy in &mut self.enemies {
                if enemy.destroyed {
                    continue;
                }
                let dx = enemy.x - projectile.x;
                let dy = enemy.y - projectile.y;
                if (dx * dx + dy * dy).sqrt() < radius {
                    let damage = projectile.attack_strength;
                    enemy.apply_damage(damage);
                    self.effects
                        .push(FloatingText::new(format!("{damage:.0}"), enemy.x, enemy.y));
                    projectile.destroyed = true;
                    break;
                }
            }
        }
    }

    fn update_pools(&mut self, now: f64) {
        let tick = self.tick;
        self.pools.retain(|pool| pool.expires_at_tick > tick);
        for pool in &mut self.pools {
            for enemy in &mut self.enemies {
                if enemy.destroyed {
                    continue;
                }
                let dx = enemy.x - pool.x;
                let dy = enemy.y - pool.y;
                if (dx * dx + dy * dy).sqrt() < pool.radius && pool.try_hit(enemy.id, now) {
                    let damage = pool.attack_strength;
                    enemy.apply_damage(damage);
                    self.effects
                        .push(FloatingText::new(format!("{damage:.0}"), enemy.x, enemy.y));
                }
            }
        }
    }

    /// Pickups inside the attract radius drift toward the player, then
    /// apply on contact.
    fn update_pickups(&mut self, now: f64) {
        let (px, py) = (self.player.x, self.player.y);
        let lerp = self.tuning.attraction_lerp;
        let mut collected = Vec::new();

        for pickup in &mut self.pickups {
            if pickup.destroyed {
                continue;
            }
            let dx = px - pickup.x;
            let dy = py - pickup.y;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist <= pickup.pickup_radius {
                pickup.destroyed = true;
                collected.push(pickup.clone());
            } else if dist <= pickup.attract_radius {
                pickup.x += dx * lerp;
                pickup.y += dy * lerp;
            }
        }

        for pickup in collected {
            self.collect(pickup, now);
        }
    }

    fn collect(&mut self, pickup: Pickup, now: f64) {
        self.pickups_collected += 1;
        let levels = self
            .player
            .gain_xp(pickup.xp_value, self.tuning.xp_curve_multiplier);
        if levels > 0 {
            log::debug!("level up to {}", self.player.level);
        }
        match pickup.effect {
            Some(CollectibleEffect::SpeedBoost) => self.player.apply_speed_boost(
                now,
                self.tuning.speed_boost_multiplier,
                self.tuning.speed_boost_duration_ms,
            ),
            Some(CollectibleEffect::Heal) => self.player.heal(pickup.heal_amount),
            None => {}
        }
        if let Some(weapon_id) = pickup.grants_weapon {
            self.grant_weapon(&weapon_id);
        }
    }

    fn grant_weapon(&mut self, weapon_id: &str) {
        if self.player.weapons.iter().any(|w| w.id() == weapon_id) {
            return;
        }
        let Some(record) = self.content.weapons.get(weapon_id) else {
            log::warn!("pickup grants unknown weapon '{weapon_id}'");
            return;
        };
        if !record.enabled {
            return;
        }
        self.player
            .weapons
            .push(Weapon::from_record(weapon_id, record, &self.content.projectiles));
        log::info!("weapon granted: {weapon_id}");
    }

    /// End-of-tick sweep: destroyed enemies award xp and roll a drop, then
    /// every destroyed entity is compacted out.
    fn sweep_destroyed(&mut self) {
        let mut drops = Vec::new();
        for enemy in &self.enemies {
            if enemy.destroyed {
                self.enemies_destroyed += 1;
                self.player
                    .gain_xp(enemy.xp_value, self.tuning.xp_curve_multiplier);
                if let Some((id, record)) = self.spawner.roll_drop(&self.content.collectibles) {
                    drops.push(Pickup::from_record(&id, record, enemy.x, enemy.y));
                }
            }
        }
        self.pickups.extend(drops);

        self.enemies.retain(|e| !e.destroyed);
        self.projectiles.retain(|p| !p.destroyed);
        self.pickups.retain(|p| !p.destroyed);
    }

    pub fn summary(&self) -> WorldSummary {
        WorldSummary {
            ticks: self.tick,
            elapsed_ms: self.now_ms(),
            player: self.player.clone(),
            enemies_alive: self.enemies.len(),
            enemies_destroyed: self.enemies_destroyed,
            pickups_active: self.pickups.len(),
            pickups_collected: self.pickups_collected,
            game_over: self.game_over,
        }
    }
}

/// The player starts with every enabled weapon that no collectible hands
/// out later.
fn starting_loadout(content: &WorldContent) -> Vec<Weapon> {
    let granted: Vec<&str> = content
        .collectibles
        .values()
        .filter_map(|c| c.grants_weapon.as_deref())
        .collect();
    content
        .weapons
        .iter()
        .filter(|(id, record)| record.enabled && !granted.contains(&id.as_str()))
        .map(|(id, record)| Weapon::from_record(id, record, &content.projectiles))
        .collect()
}
