//! Canonical id -> entity table with typed sub-indices.

use std::collections::{BTreeSet, HashMap};

use crate::entities::{Entity, EntityId, Role};

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, Entity>,
    players: BTreeSet<EntityId>,
    mobs: BTreeSet<EntityId>,
    items: BTreeSet<EntityId>,
    npcs: BTreeSet<EntityId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity) {
        let id = entity.id;
        match entity.role {
            Role::Player(_) => self.players.insert(id),
            Role::Mob(_) => self.mobs.insert(id),
            Role::Item(_) => self.items.insert(id),
            Role::Npc => self.npcs.insert(id),
        };
        self.entities.insert(id, entity);
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.players.remove(&id);
        self.mobs.remove(&id);
        self.items.remove(&id);
        self.npcs.remove(&id);
        Some(entity)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn player_ids(&self) -> Vec<EntityId> {
        self.players.iter().copied().collect()
    }

    pub fn mob_ids(&self) -> Vec<EntityId> {
        self.mobs.iter().copied().collect()
    }

    pub fn item_ids(&self) -> Vec<EntityId> {
        self.items.iter().copied().collect()
    }

    pub fn npc_ids(&self) -> Vec<EntityId> {
        self.npcs.iter().copied().collect()
    }

    /// Players then mobs
    pub fn character_ids(&self) -> Vec<EntityId> {
        self.players.iter().chain(self.mobs.iter()).copied().collect()
    }
}
