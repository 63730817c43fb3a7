//! Server-side entity definitions.
//!
//! Every entity shares identity, kind and position; the role carries the
//! capabilities of players, mobs and items. Cross references between
//! entities are plain ids resolved through the registry.

mod character;
pub mod item;
pub mod mob;
pub mod player;

pub use character::Character;
pub use item::Item;
pub use mob::{HateEntry, Mob};
pub use player::Player;

use std::collections::HashMap;

use realm_shared::{EntityKind, ServerMessage, SpawnState};

use crate::world::map::GroupId;

pub type EntityId = u64;

/// Id ranges per entity type, so ids never collide across types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdPrefix {
    RoamingMob = 1,
    Player = 5,
    StaticMob = 7,
    Npc = 8,
    Item = 9,
}

const ID_RANGE: u64 = 1_000_000_000;

/// Hands out type-prefixed ids
#[derive(Debug, Default)]
pub struct IdAllocator {
    counters: HashMap<IdPrefix, u64>,
}

impl IdAllocator {
    pub fn next(&mut self, prefix: IdPrefix) -> EntityId {
        let counter = self.counters.entry(prefix).or_insert(0);
        *counter += 1;
        prefix as u64 * ID_RANGE + *counter
    }
}

#[derive(Debug, Clone)]
pub enum Role {
    Player(Player),
    Mob(Mob),
    Item(Item),
    Npc,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub x: i32,
    pub y: i32,
    pub group: Option<GroupId>,
    /// Groups left on the last membership change that the new position no longer covers
    pub recently_left_groups: Vec<GroupId>,
    pub role: Role,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, x: i32, y: i32, role: Role) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            group: None,
            recently_left_groups: Vec::new(),
            role,
        }
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub fn is_player(&self) -> bool {
        matches!(self.role, Role::Player(_))
    }

    pub fn is_mob(&self) -> bool {
        matches!(self.role, Role::Mob(_))
    }

    pub fn is_chest(&self) -> bool {
        matches!(self.role, Role::Item(_)) && self.kind.is_chest()
    }

    /// Loot dropped by a mob. It is announced through Drop, never as a plain spawn.
    pub fn is_dropped_loot(&self) -> bool {
        match &self.role {
            Role::Item(item) => !item.is_static && !item.is_from_chest && !self.kind.is_chest(),
            _ => false,
        }
    }

    pub fn character(&self) -> Option<&Character> {
        match &self.role {
            Role::Player(player) => Some(&player.character),
            Role::Mob(mob) => Some(&mob.character),
            _ => None,
        }
    }

    pub fn character_mut(&mut self) -> Option<&mut Character> {
        match &mut self.role {
            Role::Player(player) => Some(&mut player.character),
            Role::Mob(mob) => Some(&mut mob.character),
            _ => None,
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match &self.role {
            Role::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match &mut self.role {
            Role::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_mob(&self) -> Option<&Mob> {
        match &self.role {
            Role::Mob(mob) => Some(mob),
            _ => None,
        }
    }

    pub fn as_mob_mut(&mut self) -> Option<&mut Mob> {
        match &mut self.role {
            Role::Mob(mob) => Some(mob),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match &self.role {
            Role::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_item_mut(&mut self) -> Option<&mut Item> {
        match &mut self.role {
            Role::Item(item) => Some(item),
            _ => None,
        }
    }

    /// Orthogonally adjacent: one step on exactly one axis
    pub fn is_adjacent_non_diagonal(&self, other: &Entity) -> bool {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        (dx == 1 && dy == 0) || (dx == 0 && dy == 1)
    }

    pub fn spawn(&self) -> ServerMessage {
        let state = match &self.role {
            Role::Player(player) => SpawnState::Player {
                name: player.name.clone(),
                orientation: player.character.orientation,
                armor: player.armor,
                weapon: player.weapon,
                target: player.character.target,
            },
            Role::Mob(mob) => SpawnState::Mob {
                orientation: mob.character.orientation,
                target: mob.character.target,
            },
            Role::Item(_) | Role::Npc => SpawnState::Basic,
        };
        ServerMessage::Spawn {
            id: self.id,
            kind: self.kind,
            x: self.x,
            y: self.y,
            state,
        }
    }

    pub fn despawn(&self) -> ServerMessage {
        ServerMessage::Despawn { id: self.id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_shared::Orientation;

    #[test]
    fn test_ids_are_type_prefixed() {
        let mut ids = IdAllocator::default();
        let player = ids.next(IdPrefix::Player);
        let item = ids.next(IdPrefix::Item);
        let second_player = ids.next(IdPrefix::Player);
        assert_eq!(player, 5_000_000_001);
        assert_eq!(item, 9_000_000_001);
        assert_eq!(second_player, 5_000_000_002);
    }

    #[test]
    fn test_dropped_loot_classification() {
        let loot = Entity::new(1, EntityKind::Flask, 1, 1, Role::Item(Item::default()));
        assert!(loot.is_dropped_loot());

        let chest = Entity::new(2, EntityKind::Chest, 1, 1, Role::Item(Item::chest(vec![])));
        assert!(!chest.is_dropped_loot());
        assert!(chest.is_chest());

        let fixture = Entity::new(
            3,
            EntityKind::Burger,
            1,
            1,
            Role::Item(Item {
                is_static: true,
                ..Item::default()
            }),
        );
        assert!(!fixture.is_dropped_loot());
    }

    #[test]
    fn test_adjacency() {
        let player = Player::new("a".into(), Orientation::Up);
        let a = Entity::new(1, EntityKind::Warrior, 5, 5, Role::Player(player));
        let mut b = a.clone();
        b.set_position(6, 5);
        assert!(a.is_adjacent_non_diagonal(&b));
        b.set_position(6, 6);
        assert!(!a.is_adjacent_non_diagonal(&b));
        b.set_position(5, 5);
        assert!(!a.is_adjacent_non_diagonal(&b));
    }
}
