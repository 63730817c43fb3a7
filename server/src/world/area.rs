//! Mob roaming areas and chest areas.
//!
//! An area tracks its living members. It is full when every expected member
//! is alive and empty when none is; the empty notification fires once per
//! respawn cycle.

use rand::Rng;

use realm_shared::EntityKind;

use crate::entities::EntityId;

use super::map::{ChestAreaDef, Position, RoamingAreaDef, WorldMap};

/// Which area a mob belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaRef {
    Roaming(usize),
    Chest(usize),
}

#[derive(Debug, Clone)]
pub struct Area {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    members: Vec<EntityId>,
    pub nb_entities: usize,
    pub has_completely_respawned: bool,
}

impl Area {
    pub fn new(id: u32, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
            members: Vec::new(),
            nb_entities: 0,
            has_completely_respawned: true,
        }
    }

    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn add(&mut self, id: EntityId) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
        if self.is_full() {
            self.has_completely_respawned = true;
        }
    }

    /// Remove a member. Returns true when this emptied a completely respawned area.
    pub fn remove(&mut self, id: EntityId) -> bool {
        self.members.retain(|member| *member != id);
        if self.is_empty() && self.has_completely_respawned {
            self.has_completely_respawned = false;
            return true;
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() == self.nb_entities
    }

    /// Uniform valid tile in the inclusive rectangle, by rejection sampling.
    /// Areas are checked for at least one valid tile when the map is built.
    pub fn random_position(&self, map: &WorldMap, rng: &mut impl Rng) -> Position {
        loop {
            let x = self.x + rng.gen_range(0..=self.width.max(0));
            let y = self.y + rng.gen_range(0..=self.height.max(0));
            if map.is_valid_position(x, y) {
                return Position::new(x, y);
            }
        }
    }
}

/// A rectangle where a fixed number of mobs of one kind spawn and roam
#[derive(Debug, Clone)]
pub struct MobArea {
    pub area: Area,
    pub kind: EntityKind,
}

impl MobArea {
    pub fn new(def: &RoamingAreaDef) -> Self {
        let mut area = Area::new(def.id, def.x, def.y, def.width, def.height);
        area.nb_entities = def.nb;
        Self { area, kind: def.kind }
    }
}

/// A rectangle guarded by mobs; a chest appears once all of them are dead
#[derive(Debug, Clone)]
pub struct ChestArea {
    pub area: Area,
    pub chest_x: i32,
    pub chest_y: i32,
    pub items: Vec<EntityKind>,
}

impl ChestArea {
    pub fn new(def: &ChestAreaDef) -> Self {
        Self {
            area: Area::new(def.id, def.x, def.y, def.width, def.height),
            chest_x: def.chest_x,
            chest_y: def.chest_y,
            items: def.items.clone(),
        }
    }

    /// Half-open containment: `[x, x + width) x [y, y + height)`
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.area.x
            && y >= self.area.y
            && x < self.area.x + self.area.width
            && y < self.area.y + self.area.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::testing::test_map_data;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_full_and_empty_are_exclusive() {
        let mut area = Area::new(1, 0, 0, 5, 5);
        area.nb_entities = 2;
        assert!(area.is_empty() && !area.is_full());

        area.add(10);
        assert!(!area.is_empty() && !area.is_full());
        area.add(11);
        assert!(area.is_full() && !area.is_empty());
        area.add(11);
        assert!(area.is_full());
    }

    #[test]
    fn test_empty_fires_once_per_cycle() {
        let mut area = Area::new(1, 0, 0, 5, 5);
        area.nb_entities = 2;
        area.add(10);
        area.add(11);

        assert!(!area.remove(10));
        assert!(area.remove(11));
        assert!(!area.has_completely_respawned);
        // Still empty, nothing fires again.
        assert!(!area.remove(11));

        // Partial respawn does not re-arm.
        area.add(10);
        assert!(!area.remove(10));

        area.add(10);
        area.add(11);
        assert!(area.has_completely_respawned);
        area.remove(10);
        assert!(area.remove(11));
    }

    #[test]
    fn test_random_position_is_valid_and_inside() {
        let map = WorldMap::from_data(test_map_data()).unwrap();
        // Covers the wall at (10, 10).
        let area = Area::new(1, 8, 8, 4, 4);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let pos = area.random_position(&map, &mut rng);
            assert!(map.is_valid_position(pos.x, pos.y));
            assert!((8..=12).contains(&pos.x));
            assert!((8..=12).contains(&pos.y));
        }
    }

    #[test]
    fn test_chest_area_containment() {
        let area = ChestArea {
            area: Area::new(1, 10, 10, 3, 2),
            chest_x: 11,
            chest_y: 11,
            items: vec![EntityKind::Flask],
        };
        assert!(area.contains(10, 10));
        assert!(area.contains(12, 11));
        assert!(!area.contains(13, 11));
        assert!(!area.contains(12, 12));
        assert!(!area.contains(9, 10));
    }
}
