//! State shared by players and mobs.

use std::collections::BTreeSet;

use realm_shared::{Orientation, ServerMessage};

use super::EntityId;

#[derive(Debug, Clone)]
pub struct Character {
    pub orientation: Orientation,
    pub hit_points: i32,
    pub max_hit_points: i32,
    /// Weak link, resolved through the registry when used
    pub target: Option<EntityId>,
    /// Ids of the entities currently targeting this one
    pub attackers: BTreeSet<EntityId>,
}

impl Character {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            orientation,
            hit_points: 0,
            max_hit_points: 0,
            target: None,
            attackers: BTreeSet::new(),
        }
    }

    pub fn reset_hit_points(&mut self, max_hit_points: i32) {
        self.max_hit_points = max_hit_points;
        self.hit_points = max_hit_points;
    }

    pub fn regen_health_by(&mut self, value: i32) {
        self.hit_points = (self.hit_points + value).min(self.max_hit_points);
    }

    pub fn has_full_health(&self) -> bool {
        self.hit_points == self.max_hit_points
    }

    pub fn set_target(&mut self, id: EntityId) {
        self.target = Some(id);
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    pub fn add_attacker(&mut self, id: EntityId) {
        self.attackers.insert(id);
    }

    pub fn remove_attacker(&mut self, id: EntityId) {
        self.attackers.remove(&id);
    }

    pub fn health(&self) -> ServerMessage {
        ServerMessage::Health {
            points: self.hit_points,
            regen: false,
        }
    }

    pub fn regen(&self) -> ServerMessage {
        ServerMessage::Health {
            points: self.hit_points,
            regen: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regen_is_capped() {
        let mut character = Character::new(Orientation::Down);
        character.reset_hit_points(100);
        character.hit_points = 90;
        character.regen_health_by(25);
        assert_eq!(character.hit_points, 100);
        assert!(character.has_full_health());
    }
}
