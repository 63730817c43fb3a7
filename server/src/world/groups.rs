//! Zone-group membership for interest management.
//!
//! An entity standing in group G is a member of every group adjacent to G,
//! so players in any of those groups know about it. A player is additionally
//! listed in exactly G's player list, which is what message routing targets.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::entities::{Entity, EntityId};

use super::map::{GroupId, WorldMap};

#[derive(Debug, Default)]
pub struct ZoneGroup {
    pub entities: BTreeSet<EntityId>,
    /// Players standing in this group, in join order
    pub players: Vec<EntityId>,
    /// Entities not yet announced to this group's players
    pub incoming: Vec<EntityId>,
}

#[derive(Debug, Default)]
pub struct ZoneGroups {
    groups: BTreeMap<GroupId, ZoneGroup>,
}

impl ZoneGroups {
    pub fn new(map: &WorldMap) -> Self {
        Self {
            groups: map.group_ids().map(|id| (id, ZoneGroup::default())).collect(),
        }
    }

    pub fn get(&self, id: GroupId) -> Option<&ZoneGroup> {
        self.groups.get(&id)
    }

    pub fn players_in(&self, id: GroupId) -> &[EntityId] {
        self.groups
            .get(&id)
            .map(|group| group.players.as_slice())
            .unwrap_or(&[])
    }

    /// Ids of groups currently containing `entity`
    #[cfg(test)]
    pub fn groups_containing(&self, entity: EntityId) -> Vec<GroupId> {
        self.groups
            .iter()
            .filter(|(_, group)| group.entities.contains(&entity))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Queue `entity` for announcement in the groups around `group_id` that
    /// do not know it yet. Dropped loot is announced by a Drop message instead.
    fn add_as_incoming(&mut self, map: &WorldMap, entity: &Entity, group_id: GroupId) {
        if entity.is_dropped_loot() {
            return;
        }
        for id in map.adjacent_groups(group_id) {
            if let Some(group) = self.groups.get_mut(&id) {
                if !group.entities.contains(&entity.id) {
                    group.incoming.push(entity.id);
                }
            }
        }
    }

    /// Remove `entity` from all groups around its current group. Returns the groups it left.
    pub fn remove_from_groups(&mut self, map: &WorldMap, entity: &mut Entity) -> Vec<GroupId> {
        let mut old_groups = Vec::new();
        let Some(current) = entity.group.take() else {
            return old_groups;
        };

        if entity.is_player() {
            if let Some(group) = self.groups.get_mut(&current) {
                group.players.retain(|id| *id != entity.id);
            }
        }

        for id in map.adjacent_groups(current) {
            if let Some(group) = self.groups.get_mut(&id) {
                if group.entities.remove(&entity.id) {
                    old_groups.push(id);
                }
            }
        }
        old_groups
    }

    /// Add `entity` to every group around `group_id`. Returns the groups it joined.
    fn add_to_group(&mut self, map: &WorldMap, entity: &mut Entity, group_id: GroupId) -> Vec<GroupId> {
        let mut new_groups = Vec::new();
        if !self.groups.contains_key(&group_id) {
            warn!("Entity {} is outside of any zone group ({})", entity.id, group_id);
            return new_groups;
        }

        for id in map.adjacent_groups(group_id) {
            if let Some(group) = self.groups.get_mut(&id) {
                group.entities.insert(entity.id);
                new_groups.push(id);
            }
        }
        entity.group = Some(group_id);

        if entity.is_player() {
            if let Some(group) = self.groups.get_mut(&group_id) {
                group.players.push(entity.id);
            }
        }
        new_groups
    }

    /// Bring group membership in line with the entity's position.
    /// Returns true when the entity changed groups.
    pub fn update_membership(&mut self, map: &WorldMap, entity: &mut Entity) -> bool {
        let group_id = map.group_id_from_position(entity.x, entity.y);
        if entity.group == Some(group_id) {
            return false;
        }

        // Announce before leaving, so groups adjacent to both positions are skipped.
        self.add_as_incoming(map, entity, group_id);
        let old_groups = self.remove_from_groups(map, entity);
        let new_groups = self.add_to_group(map, entity, group_id);

        if !old_groups.is_empty() {
            entity.recently_left_groups = old_groups
                .into_iter()
                .filter(|id| !new_groups.contains(id))
                .collect();
            debug!(
                "Entity {} left groups {:?}",
                entity.id,
                entity
                    .recently_left_groups
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
            );
        }
        true
    }

    /// Take every non-empty incoming buffer, in group order
    pub fn take_incoming(&mut self) -> Vec<(GroupId, Vec<EntityId>)> {
        self.groups
            .iter_mut()
            .filter(|(_, group)| !group.incoming.is_empty())
            .map(|(id, group)| (*id, std::mem::take(&mut group.incoming)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Item, Player, Role};
    use crate::world::testing::test_map_data;
    use realm_shared::{EntityKind, Orientation};

    fn map() -> WorldMap {
        WorldMap::from_data(test_map_data()).unwrap()
    }

    fn player(id: EntityId, x: i32, y: i32) -> Entity {
        Entity::new(
            id,
            EntityKind::Warrior,
            x,
            y,
            Role::Player(Player::new("p".into(), Orientation::Up)),
        )
    }

    fn assert_consistent(map: &WorldMap, groups: &ZoneGroups, entity: &Entity) {
        let group = entity.group.expect("entity has a group");
        assert_eq!(group, map.group_id_from_position(entity.x, entity.y));
        let mut expected = map.adjacent_groups(group);
        expected.sort();
        assert_eq!(groups.groups_containing(entity.id), expected);
    }

    #[test]
    fn test_membership_follows_position() {
        let map = map();
        let mut groups = ZoneGroups::new(&map);
        let mut entity = player(1, 5, 5);

        assert!(groups.update_membership(&map, &mut entity));
        assert_consistent(&map, &groups, &entity);
        assert_eq!(groups.players_in(GroupId::new(0, 0)), &[1]);

        for (x, y) in [(40, 5), (70, 30), (30, 20), (5, 5)] {
            entity.set_position(x, y);
            groups.update_membership(&map, &mut entity);
            assert_consistent(&map, &groups, &entity);
            let here = map.group_id_from_position(x, y);
            assert_eq!(groups.players_in(here), &[1]);
            let listed: usize = map
                .group_ids()
                .map(|id| groups.players_in(id).iter().filter(|p| **p == 1).count())
                .sum();
            assert_eq!(listed, 1);
        }
    }

    #[test]
    fn test_moves_within_a_group_cause_no_churn() {
        let map = map();
        let mut groups = ZoneGroups::new(&map);
        let mut entity = player(1, 5, 5);
        groups.update_membership(&map, &mut entity);
        groups.take_incoming();

        for _ in 0..10 {
            entity.set_position(6, 5);
            assert!(!groups.update_membership(&map, &mut entity));
            entity.set_position(5, 5);
            assert!(!groups.update_membership(&map, &mut entity));
        }
        assert!(groups.take_incoming().is_empty());
        assert_consistent(&map, &groups, &entity);
    }

    #[test]
    fn test_incoming_only_for_newly_covering_groups() {
        let map = map();
        let mut groups = ZoneGroups::new(&map);
        let mut entity = player(1, 5, 5);
        groups.update_membership(&map, &mut entity);
        let first = groups.take_incoming();
        assert_eq!(first.len(), map.adjacent_groups(GroupId::new(0, 0)).len());

        // 0-0 -> 1-0: only groups around 1-0 that were not around 0-0 learn about it.
        entity.set_position(30, 5);
        groups.update_membership(&map, &mut entity);
        let incoming: Vec<GroupId> = groups.take_incoming().into_iter().map(|(id, _)| id).collect();
        assert_eq!(incoming, vec![GroupId::new(2, 0), GroupId::new(2, 1)]);
        // 2-2 was only reachable through the door of 0-0.
        assert_eq!(entity.recently_left_groups, vec![GroupId::new(2, 2)]);
    }

    #[test]
    fn test_dropped_loot_skips_incoming() {
        let map = map();
        let mut groups = ZoneGroups::new(&map);
        let mut loot = Entity::new(9, EntityKind::Flask, 5, 5, Role::Item(Item::default()));
        groups.update_membership(&map, &mut loot);
        assert!(groups.take_incoming().is_empty());
        assert!(groups.get(GroupId::new(0, 0)).unwrap().entities.contains(&9));

        let mut chest = Entity::new(10, EntityKind::Chest, 5, 5, Role::Item(Item::chest(vec![])));
        groups.update_membership(&map, &mut chest);
        assert!(!groups.take_incoming().is_empty());
    }

    #[test]
    fn test_remove_from_groups() {
        let map = map();
        let mut groups = ZoneGroups::new(&map);
        let mut entity = player(1, 40, 20);
        groups.update_membership(&map, &mut entity);
        let left = groups.remove_from_groups(&map, &mut entity);
        assert_eq!(left.len(), 9);
        assert!(entity.group.is_none());
        assert!(groups.groups_containing(1).is_empty());
        assert!(groups.players_in(GroupId::new(1, 1)).is_empty());
    }
}
