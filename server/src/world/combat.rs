//! Hate, targeting and damage resolution between players and mobs.

use std::time::Duration;

use log::debug;
use rand::Rng;

use realm_shared::ServerMessage;

use crate::entities::{Entity, EntityId};

use super::map::Position;
use super::timers::Task;
use super::{GameWorld, MOB_RETURN_DELAY};

/// Return delay after a player vanishes from a mob's sight
pub const VANISH_RETURN_DELAY: Duration = Duration::from_secs(1);
pub const FORGET_EVERYONE_RETURN_DELAY: Duration = Duration::from_millis(1);
/// A mob dragged further than this from its spawn gives up the chase
pub const MAX_LEASH_DISTANCE: i32 = 50;
const POSITION_ATTEMPTS: usize = 16;

impl GameWorld {
    /// Add hate for `player` on `mob` and let the mob pick its target
    pub(crate) fn handle_mob_hate(&mut self, mob_id: EntityId, player_id: EntityId, points: i32) {
        if !self.entities.contains(player_id) {
            return;
        }
        let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) else {
            return;
        };
        mob.increase_hate_for(player_id, points);
        let alive = mob.character.hit_points > 0;
        self.timers.cancel(Task::MobReturn(mob_id));

        if let Some(player) = self.entities.get_mut(player_id).and_then(Entity::as_player_mut) {
            player.add_hater(mob_id);
        }
        if alive {
            self.choose_mob_target(mob_id, None);
        }
    }

    /// Point the mob at its `rank`-th most hated player
    pub(crate) fn choose_mob_target(&mut self, mob_id: EntityId, rank: Option<usize>) {
        let Some(mob) = self.entities.get(mob_id).and_then(Entity::as_mob) else {
            return;
        };
        let Some(player_id) = mob.hated_player_id(rank) else {
            return;
        };
        let previous = mob.character.target;

        let Some(player) = self.entities.get_mut(player_id).and_then(Entity::as_player_mut) else {
            return;
        };
        if player.character.attackers.contains(&mob_id) {
            return;
        }
        player.character.add_attacker(mob_id);

        self.clear_mob_aggro_link(mob_id, previous.filter(|id| *id != player_id));
        if let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) {
            mob.character.set_target(player_id);
        }
        self.broadcast_attacker(mob_id);
        debug!("Mob {} is now attacking player {}", mob_id, player_id);
    }

    /// Tell the surroundings who `attacker_id` is attacking and bring a mob next to its target
    pub(crate) fn broadcast_attacker(&mut self, attacker_id: EntityId) {
        let Some(attacker) = self.entities.get(attacker_id) else {
            return;
        };
        let Some(target) = attacker.character().and_then(|c| c.target) else {
            return;
        };
        let group = attacker.group;
        let is_mob = attacker.is_mob();

        self.push_to_adjacent_groups(
            group,
            ServerMessage::Attack {
                attacker: attacker_id,
                target,
            },
            Some(attacker_id),
        );

        if is_mob {
            if let Some(pos) = self.find_position_next_to(attacker_id, target) {
                self.move_entity(attacker_id, pos.x, pos.y);
            }
        }
    }

    /// A random valid tile orthogonally next to `target`, or the
    /// entity's current position when none is found
    pub(crate) fn find_position_next_to(&mut self, id: EntityId, target: EntityId) -> Option<Position> {
        let entity = self.entities.get(id)?;
        let target = self.entities.get(target)?;
        let current = Position::new(entity.x, entity.y);
        let (tx, ty) = (target.x, target.y);

        for _ in 0..POSITION_ATTEMPTS {
            let (x, y) = match self.rng.gen_range(0..4) {
                0 => (tx, ty - 1),
                1 => (tx, ty + 1),
                2 => (tx + 1, ty),
                _ => (tx - 1, ty),
            };
            if self.map.is_valid_position(x, y) {
                return Some(Position::new(x, y));
            }
        }
        Some(current)
    }

    /// Notify after `target_id` took `damage` from `attacker_id`; kill it at zero hit points
    pub(crate) fn handle_hurt_entity(&mut self, target_id: EntityId, attacker_id: EntityId, damage: i32) {
        let Some(target) = self.entities.get(target_id) else {
            return;
        };
        let Some(character) = target.character() else {
            return;
        };
        let hit_points = character.hit_points;
        let health = character.health();
        let is_player = target.is_player();
        let group = target.group;
        let (x, y, kind) = (target.x, target.y, target.kind);

        if is_player {
            self.push_to_player(target_id, health);
        } else {
            self.push_to_player(
                attacker_id,
                ServerMessage::Damage {
                    id: target_id,
                    points: damage,
                },
            );
        }

        if hit_points > 0 {
            return;
        }

        if is_player {
            self.handle_player_vanish(target_id);
            self.push_to_adjacent_groups(group, ServerMessage::Despawn { id: target_id }, None);
        } else {
            let drop = self.roll_drop(target_id, x, y);
            self.push_to_player(attacker_id, ServerMessage::Kill { kind });
            self.push_to_adjacent_groups(group, ServerMessage::Despawn { id: target_id }, None);

            if let Some(item_id) = drop {
                let haters = self
                    .entities
                    .get(target_id)
                    .and_then(Entity::as_mob)
                    .map(|mob| mob.hated_player_ids())
                    .unwrap_or_default();
                let item_kind = self.entities.get(item_id).map(|item| item.kind);
                if let Some(item_kind) = item_kind {
                    self.push_to_adjacent_groups(
                        group,
                        ServerMessage::Drop {
                            mob: target_id,
                            item: item_id,
                            kind: item_kind,
                            haters,
                        },
                        None,
                    );
                }
                self.handle_item_despawn(item_id);
            }
        }

        self.remove_entity(target_id);
    }

    /// Roll the mob's drop table and place the result where it died
    fn roll_drop(&mut self, mob_id: EntityId, x: i32, y: i32) -> Option<EntityId> {
        let kind = self.entities.get(mob_id)?.kind;
        let roll = self.rng.gen_range(0..100);
        let dropped = self.properties.mob(kind)?.drop_for_roll(roll)?;
        let item = self.create_item(dropped, x, y);
        Some(self.add_entity(item))
    }

    /// Drop `player_id` from `mob_id`'s hatelist; an emptied list sends the mob home
    pub(crate) fn forget_player(&mut self, mob_id: EntityId, player_id: EntityId, delay: Duration) {
        let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) else {
            return;
        };
        let nobody_left = mob.forget_player(player_id);
        if let Some(player) = self.entities.get_mut(player_id).and_then(Entity::as_player_mut) {
            player.remove_hater(mob_id);
        }
        if nobody_left {
            self.return_to_spawning_position(mob_id, delay);
        }
    }

    pub(crate) fn forget_everyone(&mut self, mob_id: EntityId) {
        let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) else {
            return;
        };
        let hated = mob.hated_player_ids();
        mob.forget_everyone();
        for player_id in hated {
            if let Some(player) = self.entities.get_mut(player_id).and_then(Entity::as_player_mut) {
                player.remove_hater(mob_id);
            }
        }
        self.return_to_spawning_position(mob_id, FORGET_EVERYONE_RETURN_DELAY);
    }

    /// Clear the target and walk home after `delay` (zero means the default)
    pub(crate) fn return_to_spawning_position(&mut self, mob_id: EntityId, delay: Duration) {
        let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) else {
            return;
        };
        mob.character.clear_target();
        let delay = if delay.is_zero() { MOB_RETURN_DELAY } else { delay };
        self.timers.schedule(Task::MobReturn(mob_id), self.now + delay);
    }

    /// Every mob hunting `player_id` loses track of it
    pub(crate) fn handle_player_vanish(&mut self, player_id: EntityId) {
        let attackers: Vec<EntityId> = self
            .entities
            .get(player_id)
            .and_then(Entity::as_player)
            .map(|player| player.character.attackers.iter().copied().collect())
            .unwrap_or_default();

        for mob_id in attackers {
            if let Some(player) = self.entities.get_mut(player_id).and_then(Entity::as_player_mut) {
                player.character.remove_attacker(mob_id);
            }
            if let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) {
                mob.character.clear_target();
            }
            self.forget_player(mob_id, player_id, VANISH_RETURN_DELAY);

            let still_hating = self
                .entities
                .get(mob_id)
                .and_then(Entity::as_mob)
                .map(|mob| !mob.hatelist.is_empty())
                .unwrap_or(false);
            if still_hating {
                self.choose_mob_target(mob_id, Some(1));
            }
        }

        self.update_membership(player_id);
    }

    /// Pull every attacker along with the moving player, releasing those
    /// that would stray too far from home
    pub(crate) fn drag_attackers(&mut self, player_id: EntityId) {
        let attackers: Vec<EntityId> = self
            .entities
            .get(player_id)
            .and_then(Entity::as_player)
            .map(|player| player.character.attackers.iter().copied().collect())
            .unwrap_or_default();

        for mob_id in attackers {
            let Some(mob) = self.entities.get(mob_id).and_then(Entity::as_mob) else {
                continue;
            };
            let Some(target) = mob.character.target else {
                continue;
            };
            let Some(pos) = self.find_position_next_to(mob_id, target) else {
                continue;
            };
            let too_far = self
                .entities
                .get(mob_id)
                .and_then(Entity::as_mob)
                .map(|mob| mob.distance_to_spawning_point(pos.x, pos.y) > MAX_LEASH_DISTANCE)
                .unwrap_or(false);

            if too_far {
                if let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) {
                    mob.character.clear_target();
                }
                self.forget_everyone(mob_id);
                if let Some(player) = self.entities.get_mut(player_id).and_then(Entity::as_player_mut) {
                    player.character.remove_attacker(mob_id);
                }
            } else {
                self.move_entity(mob_id, pos.x, pos.y);
            }
        }
    }

    /// Whether `mob_id` may land a blow on `player_id` right now
    pub(crate) fn can_mob_attack(&self, mob_id: EntityId, player_id: EntityId) -> bool {
        let (Some(mob_entity), Some(player)) = (self.entities.get(mob_id), self.entities.get(player_id)) else {
            return false;
        };
        let Some(mob) = mob_entity.as_mob() else {
            return false;
        };
        mob.character.target == Some(player_id)
            && mob_entity.is_adjacent_non_diagonal(player)
            && mob.is_attack_ready(self.now)
    }

    /// Detach a mob from the player it was attacking
    pub(crate) fn clear_mob_aggro_link(&mut self, mob_id: EntityId, target: Option<EntityId>) {
        let Some(target) = target else {
            return;
        };
        if let Some(player) = self.entities.get_mut(target).and_then(Entity::as_player_mut) {
            player.character.remove_attacker(mob_id);
        }
    }

    /// Detach a mob from every player it hated
    pub(crate) fn clear_mob_hate_links(&mut self, mob_id: EntityId, players: &[EntityId]) {
        for player_id in players {
            if let Some(player) = self.entities.get_mut(*player_id).and_then(Entity::as_player_mut) {
                player.remove_hater(mob_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::testing::{world_with, TestWorld};
    use realm_shared::EntityKind;

    #[test]
    fn test_hate_picks_target_and_links_attacker() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let player = t.enter("alice");
        t.place(player, 20, 8);
        let mob = t.spawn_mob(EntityKind::Rat, 22, 8);

        t.world.handle_mob_hate(mob, player, 5);

        let rat = t.world.entity(mob).unwrap();
        assert_eq!(rat.as_mob().unwrap().character.target, Some(player));
        let p = t.world.entity(player).unwrap().as_player().unwrap();
        assert!(p.character.attackers.contains(&mob));
        assert!(p.haters.contains(&mob));
        // The mob was brought next to its target.
        assert!(rat.is_adjacent_non_diagonal(t.world.entity(player).unwrap()));
    }

    #[test]
    fn test_vanish_retargets_next_most_hated() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let p1 = t.enter("one");
        let p2 = t.enter("two");
        t.place(p1, 20, 8);
        t.place(p2, 20, 10);
        let mob = t.spawn_mob(EntityKind::Goblin, 22, 8);

        t.world.handle_mob_hate(mob, p1, 5);
        t.world.handle_mob_hate(mob, p2, 3);
        assert_eq!(t.mob(mob).character.target, Some(p1));

        t.world.handle_player_vanish(p1);

        let goblin = t.mob(mob);
        assert_eq!(goblin.character.target, Some(p2));
        assert!(!goblin.hates(p1));
        assert!(!t.world.entity(p1).unwrap().as_player().unwrap().character.attackers.contains(&mob));
        assert!(!t.world.entity(p1).unwrap().as_player().unwrap().haters.contains(&mob));
        assert!(t.world.entity(p2).unwrap().as_player().unwrap().haters.contains(&mob));
        assert!(t.world.entity(p2).unwrap().as_player().unwrap().character.attackers.contains(&mob));
    }

    #[test]
    fn test_vanish_sends_lonely_mob_home() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let player = t.enter("alice");
        t.place(player, 20, 8);
        let mob = t.spawn_mob(EntityKind::Rat, 22, 8);
        t.world.handle_mob_hate(mob, player, 5);

        t.world.handle_player_vanish(player);
        assert!(t.mob(mob).character.target.is_none());
        assert!(t.world.timers.is_scheduled(Task::MobReturn(mob)));

        t.world.advance_time(VANISH_RETURN_DELAY);
        let rat = t.world.entity(mob).unwrap();
        assert_eq!((rat.x, rat.y), (22, 8));
    }

    #[test]
    fn test_killing_a_mob_rolls_drop_and_schedules_respawn() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let player = t.enter("alice");
        t.place(player, 20, 8);
        let mob = t.spawn_mob(EntityKind::Rat, 21, 8);
        t.world.handle_mob_hate(mob, player, 5);

        if let Some(rat) = t.world.entities.get_mut(mob).and_then(Entity::as_mob_mut) {
            rat.character.hit_points = 0;
        }
        t.world.handle_hurt_entity(mob, player, 12);
        t.world.tick();

        assert!(t.world.entity(mob).is_none());
        assert!(t.world.timers.is_scheduled(Task::MobRespawn(mob)));
        let p = t.world.entity(player).unwrap().as_player().unwrap();
        assert!(p.character.attackers.is_empty());
        assert!(p.haters.is_empty());

        let sent = t.sent_to(player);
        assert!(sent.contains(&ServerMessage::Damage { id: mob, points: 12 }));
        assert!(sent.contains(&ServerMessage::Kill { kind: EntityKind::Rat }));
        assert!(sent.contains(&ServerMessage::Despawn { id: mob }));
    }

    #[test]
    fn test_drag_releases_mobs_beyond_leash() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let player = t.enter("alice");
        t.place(player, 20, 8);
        let mob = t.spawn_mob(EntityKind::Rat, 21, 8);
        t.world.handle_mob_hate(mob, player, 5);

        t.place(player, 40, 20);
        t.world.drag_attackers(player);
        let rat = t.world.entity(mob).unwrap();
        assert!(rat.is_adjacent_non_diagonal(t.world.entity(player).unwrap()));

        t.place(player, 80, 30);
        t.world.drag_attackers(player);
        let rat = t.mob(mob);
        assert!(rat.character.target.is_none());
        assert!(rat.hatelist.is_empty());
        let p = t.world.entity(player).unwrap().as_player().unwrap();
        assert!(p.character.attackers.is_empty());
        assert!(p.haters.is_empty());
        assert!(t.world.timers.is_scheduled(Task::MobReturn(mob)));
    }

    #[test]
    fn test_mob_attack_needs_adjacency_and_cooldown() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let player = t.enter("alice");
        t.place(player, 20, 8);
        let mob = t.spawn_mob(EntityKind::Rat, 30, 8);
        assert!(!t.world.can_mob_attack(mob, player));

        t.world.handle_mob_hate(mob, player, 5);
        assert!(t.world.can_mob_attack(mob, player));

        if let Some(rat) = t.world.entities.get_mut(mob).and_then(Entity::as_mob_mut) {
            rat.register_attack(Duration::ZERO);
        }
        assert!(!t.world.can_mob_attack(mob, player));
        t.world.advance_time(Duration::from_millis(800));
        assert!(t.world.can_mob_attack(mob, player));

        if let Some(rat) = t.world.entities.get_mut(mob).and_then(Entity::as_mob_mut) {
            rat.character.clear_target();
        }
        assert!(!t.world.can_mob_attack(mob, player));
    }
}
