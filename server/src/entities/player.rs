//! Server-side player state.

use std::collections::BTreeSet;

use realm_shared::{EntityKind, Orientation};

use super::character::Character;
use super::EntityId;
use crate::world::formulas;
use crate::world::properties::{armor_level, weapon_level};

/// Name used when a client sends an empty one
pub const DEFAULT_NAME: &str = "lorem ipsum";

#[derive(Debug, Clone)]
pub struct Player {
    pub character: Character,
    pub name: String,
    pub armor: EntityKind,
    pub weapon: EntityKind,
    pub armor_level: i32,
    pub weapon_level: i32,
    /// Mobs that have this player on their hate list
    pub haters: BTreeSet<EntityId>,
    /// Checkpoint id used to pick the respawn position
    pub last_checkpoint: Option<u32>,
}

impl Player {
    pub fn new(name: String, orientation: Orientation) -> Self {
        let mut player = Self {
            character: Character::new(orientation),
            name,
            armor: EntityKind::ClothArmor,
            weapon: EntityKind::Sword1,
            armor_level: 0,
            weapon_level: 0,
            haters: BTreeSet::new(),
            last_checkpoint: None,
        };
        player.equip_armor(EntityKind::ClothArmor);
        player.equip_weapon(EntityKind::Sword1);
        player.update_hit_points();
        player
    }

    pub fn equip_armor(&mut self, kind: EntityKind) {
        self.armor = kind;
        self.armor_level = armor_level(kind);
    }

    pub fn equip_weapon(&mut self, kind: EntityKind) {
        self.weapon = kind;
        self.weapon_level = weapon_level(kind);
    }

    /// Reset hit points to the maximum allowed by the current armor
    pub fn update_hit_points(&mut self) {
        self.character.reset_hit_points(formulas::hp(self.armor_level));
    }

    pub fn add_hater(&mut self, mob: EntityId) {
        self.haters.insert(mob);
    }

    pub fn remove_hater(&mut self, mob: EntityId) {
        self.haters.remove(&mob);
    }
}

/// Strip markup and control characters from client text
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag || c.is_control() => {}
            _ => out.push(c),
        }
    }
    out.trim().to_string()
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
