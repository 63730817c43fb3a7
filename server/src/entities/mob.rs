//! Mob state: hate list, spawn origin and attack cooldown.

use std::time::Duration;

use realm_shared::Orientation;

use super::character::Character;
use super::EntityId;
use crate::world::area::AreaRef;
use crate::world::properties::MobProperties;

/// Accumulated aggression of one player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HateEntry {
    pub player: EntityId,
    pub hate: i32,
}

#[derive(Debug, Clone)]
pub struct Mob {
    pub character: Character,
    pub spawning_x: i32,
    pub spawning_y: i32,
    pub armor_level: i32,
    pub weapon_level: i32,
    /// Unique per player; ranked by score on read
    pub hatelist: Vec<HateEntry>,
    pub is_dead: bool,
    pub area: Option<AreaRef>,
    pub attack_rate: Duration,
    pub last_attack: Option<Duration>,
}

impl Mob {
    pub fn new(properties: &MobProperties, x: i32, y: i32, orientation: Orientation) -> Self {
        let mut character = Character::new(orientation);
        character.reset_hit_points(properties.hit_points);
        Self {
            character,
            spawning_x: x,
            spawning_y: y,
            armor_level: properties.armor_level,
            weapon_level: properties.weapon_level,
            hatelist: Vec::new(),
            is_dead: false,
            area: None,
            attack_rate: properties.attack_rate,
            last_attack: None,
        }
    }

    pub fn hates(&self, player: EntityId) -> bool {
        self.hatelist.iter().any(|entry| entry.player == player)
    }

    pub fn increase_hate_for(&mut self, player: EntityId, points: i32) {
        match self.hatelist.iter_mut().find(|entry| entry.player == player) {
            Some(entry) => entry.hate += points,
            None => self.hatelist.push(HateEntry { player, hate: points }),
        }
    }

    /// Player at hate `rank` (1 = most hated). Out-of-range ranks fall back to the most hated.
    pub fn hated_player_id(&self, rank: Option<usize>) -> Option<EntityId> {
        let mut sorted = self.hatelist.clone();
        sorted.sort_by_key(|entry| entry.hate);
        let size = sorted.len();
        let index = match rank {
            Some(rank) if rank >= 1 && rank <= size => size - rank,
            _ => size.checked_sub(1)?,
        };
        sorted.get(index).map(|entry| entry.player)
    }

    /// Drop `player` from the hate list. Returns true when nobody is hated anymore.
    pub fn forget_player(&mut self, player: EntityId) -> bool {
        self.hatelist.retain(|entry| entry.player != player);
        self.hatelist.is_empty()
    }

    pub fn forget_everyone(&mut self) {
        self.hatelist.clear();
    }

    pub fn hated_player_ids(&self) -> Vec<EntityId> {
        self.hatelist.iter().map(|entry| entry.player).collect()
    }

    /// Chebyshev distance from the spawning point
    pub fn distance_to_spawning_point(&self, x: i32, y: i32) -> i32 {
        (x - self.spawning_x).abs().max((y - self.spawning_y).abs())
    }

    pub fn is_attack_ready(&self, now: Duration) -> bool {
        match self.last_attack {
            Some(last) => now >= last + self.attack_rate,
            None => true,
        }
    }

    pub fn register_attack(&mut self, now: Duration) {
        self.last_attack = Some(now);
    }
}
