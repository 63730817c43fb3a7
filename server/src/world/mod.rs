//! Game world management.
//!
//! A `GameWorld` exclusively owns its entities, zone groups, areas and
//! timers. Client messages, timer tasks and the fixed-rate tick all run on
//! the same thread through `&mut self`, so no mutation ever interleaves with
//! another.

pub mod area;
mod combat;
pub mod formulas;
pub mod groups;
pub mod map;
pub mod properties;
pub mod registry;
pub mod session;
pub mod timers;

#[cfg(test)]
pub(crate) mod testing;

pub use area::{AreaRef, ChestArea, MobArea};
pub use map::{GroupId, MapData, Position, WorldMap};
pub use properties::Properties;
pub use session::{Connection, Session};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::Rng;

use realm_shared::{EntityKind, Orientation, ServerMessage};

use crate::entities::{Entity, EntityId, IdAllocator, IdPrefix, Item, Mob, Role};

use self::groups::ZoneGroups;
use self::registry::EntityRegistry;
use self::timers::{Task, TimerQueue};

/// Delay before a dead mob comes back
pub const MOB_RESPAWN_DELAY: Duration = Duration::from_secs(30);
/// Delay before a mob that forgot everyone walks back to its spawn
pub const MOB_RETURN_DELAY: Duration = Duration::from_secs(4);
/// Time a dropped item lies still before blinking
pub const ITEM_BLINK_DELAY: Duration = Duration::from_secs(10);
/// Time an item blinks before it is destroyed
pub const ITEM_BLINKING_DURATION: Duration = Duration::from_secs(4);
/// Delay before a static item reappears
pub const ITEM_RESPAWN_DELAY: Duration = Duration::from_secs(30);
pub const FIREPOTION_DURATION: Duration = Duration::from_secs(15);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const ROAM_PERIOD: Duration = Duration::from_millis(500);
/// Each roam pass moves an idle mob with probability 1 / ROAM_CHANCE
pub const ROAM_CHANCE: u32 = 20;
/// Regeneration heals max hit points / REGEN_DIVISOR
pub const REGEN_DIVISOR: i32 = 25;

fn random_orientation(rng: &mut impl Rng) -> Orientation {
    Orientation::ALL[rng.gen_range(0..Orientation::ALL.len())]
}

/// The game world containing all entities
pub struct GameWorld {
    id: String,
    max_players: u32,
    ups: u32,
    map: Arc<WorldMap>,
    properties: Arc<Properties>,
    entities: EntityRegistry,
    /// Dead mobs, taken static items and dead players waiting to come back
    dormant: HashMap<EntityId, Entity>,
    groups: ZoneGroups,
    mob_areas: Vec<MobArea>,
    chest_areas: Vec<ChestArea>,
    sessions: BTreeMap<EntityId, Session>,
    closed_sessions: Vec<EntityId>,
    timers: TimerQueue,
    now: Duration,
    regen_count: u32,
    player_count: u32,
    ids: IdAllocator,
    rng: StdRng,
}

impl GameWorld {
    pub fn new(
        id: impl Into<String>,
        max_players: u32,
        ups: u32,
        map: Arc<WorldMap>,
        properties: Arc<Properties>,
        rng: StdRng,
    ) -> Self {
        let groups = ZoneGroups::new(&map);
        let mut world = Self {
            id: id.into(),
            max_players,
            ups: ups.max(1),
            map,
            properties,
            entities: EntityRegistry::new(),
            dormant: HashMap::new(),
            groups,
            mob_areas: Vec::new(),
            chest_areas: Vec::new(),
            sessions: BTreeMap::new(),
            closed_sessions: Vec::new(),
            timers: TimerQueue::new(),
            now: Duration::ZERO,
            regen_count: 0,
            player_count: 0,
            ids: IdAllocator::default(),
            rng,
        };
        world.populate();
        info!(
            "{} created (capacity: {} players, {} entities)",
            world.id,
            world.max_players,
            world.entities.len()
        );
        world
    }

    /// Spawn area mobs, chests and static content from the map
    fn populate(&mut self) {
        let map = Arc::clone(&self.map);
        let properties = Arc::clone(&self.properties);

        for (index, def) in map.roaming_areas.iter().enumerate() {
            let mut area = MobArea::new(def);
            let Some(mob_properties) = properties.mob(def.kind) else {
                error!("No properties for mob kind {}", def.kind.name());
                continue;
            };
            for _ in 0..def.nb {
                let pos = area.area.random_position(&map, &mut self.rng);
                let id = self.ids.next(IdPrefix::RoamingMob);
                let mut mob = Mob::new(mob_properties, pos.x, pos.y, random_orientation(&mut self.rng));
                mob.area = Some(AreaRef::Roaming(index));
                area.area.add(id);
                self.add_entity(Entity::new(id, def.kind, pos.x, pos.y, Role::Mob(mob)));
            }
            self.mob_areas.push(area);
        }

        self.chest_areas = map.chest_areas.iter().map(ChestArea::new).collect();

        for chest in &map.static_chests {
            let entity = self.create_chest(chest.x, chest.y, chest.items.clone());
            self.add_static_item(entity);
        }

        self.spawn_static_entities(&map, &properties);

        for area in &mut self.chest_areas {
            area.area.nb_entities = area.area.members().len();
        }

        self.timers.schedule(Task::AreaRoam, self.now + ROAM_PERIOD);
    }

    fn spawn_static_entities(&mut self, map: &WorldMap, properties: &Properties) {
        for placement in &map.static_entities {
            let (kind, x, y) = (placement.kind, placement.x, placement.y);
            if kind.is_npc() {
                self.add_npc(kind, x, y);
            } else if kind.is_mob() {
                let Some(mob_properties) = properties.mob(kind) else {
                    error!("No properties for mob kind {}", kind.name());
                    continue;
                };
                let id = self.ids.next(IdPrefix::StaticMob);
                let mob = Mob::new(mob_properties, x, y, random_orientation(&mut self.rng));
                self.add_entity(Entity::new(id, kind, x, y, Role::Mob(mob)));
                self.try_adding_mob_to_chest_area(id);
            } else if kind.is_item() {
                let item = self.create_item(kind, x, y);
                self.add_static_item(item);
            } else {
                debug!("Ignoring static {} at ({}, {})", kind.name(), x, y);
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn player_count(&self) -> u32 {
        self.player_count
    }

    pub fn max_players(&self) -> u32 {
        self.max_players
    }

    pub fn is_full(&self) -> bool {
        self.player_count >= self.max_players
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn map(&self) -> &WorldMap {
        &self.map
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn mob_areas(&self) -> &[MobArea] {
        &self.mob_areas
    }

    pub fn chest_areas(&self) -> &[ChestArea] {
        &self.chest_areas
    }

    pub fn is_valid_position(&self, x: i32, y: i32) -> bool {
        self.map.is_valid_position(x, y)
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Advance the clock by `dt`, then run one tick
    pub fn update(&mut self, dt: Duration) {
        self.advance_time(dt);
        self.tick();
    }

    /// Run every timer task due within the next `dt`, each at its own due time
    pub fn advance_time(&mut self, dt: Duration) {
        let target = self.now + dt;
        while let Some((at, task)) = self.timers.pop_due(target) {
            self.now = self.now.max(at);
            self.run_task(task);
        }
        self.now = target;
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::MobRespawn(id) => self.respawn_mob(id),
            Task::MobReturn(id) => self.return_mob_to_spawn(id),
            Task::ItemBlink(id) => self.blink_item(id),
            Task::ItemDespawn(id) => self.despawn_item(id),
            Task::ItemRespawn(id) => self.respawn_static_item(id),
            Task::FirepotionExpire(id) => self.expire_firepotion(id),
            Task::IdleDisconnect(id) => self.disconnect_idle(id),
            Task::AreaRoam => self.roam(),
        }
    }

    /// One fixed-rate step: announce incoming entities, flush queues, regen
    pub fn tick(&mut self) {
        self.process_groups();
        self.process_queues();

        self.regen_count += 1;
        if self.regen_count >= self.ups * 2 {
            self.regen_count = 0;
            self.regen();
        }
    }

    fn regen(&mut self) {
        for id in self.entities.character_ids() {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let is_player = entity.is_player();
            let Some(character) = entity.character_mut() else {
                continue;
            };
            if character.has_full_health() {
                continue;
            }
            character.regen_health_by(character.max_hit_points / REGEN_DIVISOR);
            if is_player {
                let message = character.regen();
                self.push_to_player(id, message);
            }
        }
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.entities.insert(entity);
        self.update_membership(id);
        id
    }

    fn add_npc(&mut self, kind: EntityKind, x: i32, y: i32) -> EntityId {
        let id = self.ids.next(IdPrefix::Npc);
        self.add_entity(Entity::new(id, kind, x, y, Role::Npc))
    }

    fn create_item(&mut self, kind: EntityKind, x: i32, y: i32) -> Entity {
        let id = self.ids.next(IdPrefix::Item);
        let item = if kind.is_chest() {
            Item::chest(Vec::new())
        } else {
            Item::default()
        };
        Entity::new(id, kind, x, y, Role::Item(item))
    }

    fn create_chest(&mut self, x: i32, y: i32, items: Vec<EntityKind>) -> Entity {
        let id = self.ids.next(IdPrefix::Item);
        Entity::new(id, EntityKind::Chest, x, y, Role::Item(Item::chest(items)))
    }

    fn add_static_item(&mut self, mut entity: Entity) -> EntityId {
        if let Some(item) = entity.as_item_mut() {
            item.is_static = true;
        }
        self.add_entity(entity)
    }

    fn add_item_from_chest(&mut self, kind: EntityKind, x: i32, y: i32) -> EntityId {
        let mut entity = self.create_item(kind, x, y);
        if let Some(item) = entity.as_item_mut() {
            item.is_from_chest = true;
        }
        self.add_entity(entity)
    }

    /// Delete an entity from the world, severing its links and running its
    /// destruction (respawn scheduling for mobs and static items).
    pub fn remove_entity(&mut self, id: EntityId) {
        let Some(mut entity) = self.entities.remove(id) else {
            debug!("Unknown entity: {}", id);
            return;
        };

        if let Some(mob) = entity.as_mob() {
            let target = mob.character.target;
            let haters = mob.hated_player_ids();
            self.clear_mob_aggro_link(id, target);
            self.clear_mob_hate_links(id, &haters);
        }

        self.destroy(&mut entity);
        self.groups.remove_from_groups(&self.map, &mut entity);
        debug!("Removed {} : {}", entity.kind.name(), id);

        let keep = match &entity.role {
            Role::Player(_) | Role::Mob(_) => true,
            Role::Item(item) => item.is_static,
            Role::Npc => false,
        };
        if keep {
            self.dormant.insert(id, entity);
        }
    }

    fn destroy(&mut self, entity: &mut Entity) {
        let id = entity.id;
        match &mut entity.role {
            Role::Player(player) => {
                let attackers = std::mem::take(&mut player.character.attackers);
                let haters = std::mem::take(&mut player.haters);
                for mob_id in attackers {
                    if let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) {
                        mob.character.clear_target();
                    }
                }
                for mob_id in haters {
                    self.forget_player(mob_id, id, Duration::ZERO);
                }
            }
            Role::Mob(mob) => {
                mob.is_dead = true;
                mob.forget_everyone();
                mob.character.clear_target();
                let max = mob.character.max_hit_points;
                mob.character.reset_hit_points(max);
                let (x, y) = (mob.spawning_x, mob.spawning_y);
                let area = mob.area;
                entity.set_position(x, y);
                self.timers.cancel(Task::MobReturn(id));
                self.handle_mob_respawn(id, area);
            }
            Role::Item(item) => {
                self.timers.cancel(Task::ItemBlink(id));
                self.timers.cancel(Task::ItemDespawn(id));
                if item.is_static {
                    self.timers.schedule(Task::ItemRespawn(id), self.now + ITEM_RESPAWN_DELAY);
                }
            }
            Role::Npc => {}
        }
    }

    fn handle_mob_respawn(&mut self, id: EntityId, area: Option<AreaRef>) {
        match area {
            Some(AreaRef::Roaming(index)) => {
                if let Some(area) = self.mob_areas.get_mut(index) {
                    if area.area.remove(id) {
                        debug!("Mob area {} is empty", area.area.id);
                    }
                }
            }
            Some(AreaRef::Chest(index)) => {
                let emptied = self
                    .chest_areas
                    .get_mut(index)
                    .map(|area| area.area.remove(id))
                    .unwrap_or(false);
                if emptied {
                    self.handle_empty_chest_area(index);
                }
            }
            None => {}
        }
        self.timers.schedule(Task::MobRespawn(id), self.now + MOB_RESPAWN_DELAY);
    }

    fn respawn_mob(&mut self, id: EntityId) {
        let Some(mut entity) = self.dormant.remove(&id) else {
            return;
        };
        let area = match entity.as_mob_mut() {
            Some(mob) => {
                mob.is_dead = false;
                mob.area
            }
            None => {
                self.dormant.insert(id, entity);
                return;
            }
        };

        if let Some(AreaRef::Roaming(index)) = area {
            if let Some(mob_area) = self.mob_areas.get(index) {
                let pos = mob_area.area.random_position(&self.map, &mut self.rng);
                entity.set_position(pos.x, pos.y);
            }
        }

        self.add_entity(entity);
        match area {
            Some(AreaRef::Roaming(index)) => {
                if let Some(mob_area) = self.mob_areas.get_mut(index) {
                    mob_area.area.add(id);
                }
            }
            Some(AreaRef::Chest(index)) => {
                if let Some(chest_area) = self.chest_areas.get_mut(index) {
                    chest_area.area.add(id);
                }
            }
            None => {}
        }
        debug!("Mob {} respawned", id);
    }

    fn respawn_static_item(&mut self, id: EntityId) {
        if let Some(entity) = self.dormant.remove(&id) {
            self.add_static_item(entity);
        }
    }

    /// Re-evaluate the entity's group. Returns true when it changed groups.
    fn update_membership(&mut self, id: EntityId) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => self.groups.update_membership(&self.map, entity),
            None => false,
        }
    }

    /// Reposition an entity without telling anyone
    pub fn move_entity(&mut self, id: EntityId, x: i32, y: i32) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.set_position(x, y);
            self.update_membership(id);
        }
    }

    /// Move a mob and broadcast the move to the groups around it
    fn move_mob(&mut self, id: EntityId, x: i32, y: i32) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        entity.set_position(x, y);
        if let Some(group) = entity.group {
            self.push_to_adjacent_groups(Some(group), ServerMessage::Move { id, x, y }, None);
            self.update_membership(id);
        }
    }

    fn return_mob_to_spawn(&mut self, id: EntityId) {
        let Some(mob) = self.entities.get(id).and_then(Entity::as_mob) else {
            return;
        };
        let (x, y) = (mob.spawning_x, mob.spawning_y);
        self.move_mob(id, x, y);
    }

    // =========================================================================
    // Message routing
    // =========================================================================

    /// Queue a message for one player, flushed on the next tick
    pub fn push_to_player(&mut self, id: EntityId, message: ServerMessage) {
        match self.sessions.get_mut(&id) {
            Some(session) if session.has_entered_game => session.outgoing.push(message),
            _ => debug!("push_to_player: no queue for {}", id),
        }
    }

    /// Queue for the players standing in exactly `group`
    pub fn push_to_group(&mut self, group: GroupId, message: ServerMessage, ignored: Option<EntityId>) {
        let Some(zone) = self.groups.get(group) else {
            debug!("{} is not a valid group", group);
            return;
        };
        let players = zone.players.clone();
        for player in players {
            if Some(player) != ignored {
                self.push_to_player(player, message.clone());
            }
        }
    }

    /// Queue for the players in every group adjacent to `group`
    pub fn push_to_adjacent_groups(
        &mut self,
        group: Option<GroupId>,
        message: ServerMessage,
        ignored: Option<EntityId>,
    ) {
        let Some(group) = group else {
            return;
        };
        for id in self.map.adjacent_groups(group) {
            self.push_to_group(id, message.clone(), ignored);
        }
    }

    /// Queue for the groups the entity just left, then forget them
    pub fn push_to_previous_groups(&mut self, id: EntityId, message: ServerMessage) {
        let left = match self.entities.get_mut(id) {
            Some(entity) => std::mem::take(&mut entity.recently_left_groups),
            None => return,
        };
        for group in left {
            self.push_to_group(group, message.clone(), None);
        }
    }

    /// Queue for every player in the world
    pub fn push_broadcast(&mut self, message: ServerMessage, ignored: Option<EntityId>) {
        for (id, session) in self.sessions.iter_mut() {
            if session.has_entered_game && Some(*id) != ignored {
                session.outgoing.push(message.clone());
            }
        }
    }

    /// Send each player's queued messages as one batch
    fn process_queues(&mut self) {
        for session in self.sessions.values_mut() {
            if !session.outgoing.is_empty() {
                let batch = std::mem::take(&mut session.outgoing);
                session.connection.send(&batch);
            }
        }
    }

    /// Announce every incoming entity to the players of its group
    fn process_groups(&mut self) {
        for (group, incoming) in self.groups.take_incoming() {
            for id in incoming {
                let Some(entity) = self.entities.get(id) else {
                    continue;
                };
                let spawn = entity.spawn();
                let ignored = entity.is_player().then_some(id);
                self.push_to_group(group, spawn, ignored);
            }
        }
    }

    /// Send the player the ids of everything its group knows about
    pub fn push_relevant_entity_list_to(&mut self, id: EntityId) {
        let Some(group) = self.entities.get(id).and_then(|entity| entity.group) else {
            return;
        };
        let Some(zone) = self.groups.get(group) else {
            return;
        };
        let ids: Vec<EntityId> = zone.entities.iter().copied().filter(|e| *e != id).collect();
        if !ids.is_empty() {
            self.push_to_player(id, ServerMessage::List { ids });
        }
    }

    pub fn push_spawns_to_player(&mut self, id: EntityId, ids: &[EntityId]) {
        for entity_id in ids {
            if let Some(spawn) = self.entities.get(*entity_id).map(Entity::spawn) {
                self.push_to_player(id, spawn);
            }
        }
        debug!("Pushed {} new spawns to {}", ids.len(), id);
    }

    // =========================================================================
    // Items, chests and areas
    // =========================================================================

    /// Blink after a while, then disappear
    fn handle_item_despawn(&mut self, id: EntityId) {
        self.timers.schedule(Task::ItemBlink(id), self.now + ITEM_BLINK_DELAY);
    }

    fn blink_item(&mut self, id: EntityId) {
        let Some(group) = self.entities.get(id).map(|entity| entity.group) else {
            return;
        };
        self.push_to_adjacent_groups(group, ServerMessage::Blink { id }, None);
        self.timers.schedule(Task::ItemDespawn(id), self.now + ITEM_BLINKING_DURATION);
    }

    fn despawn_item(&mut self, id: EntityId) {
        let Some(group) = self.entities.get(id).map(|entity| entity.group) else {
            return;
        };
        self.push_to_adjacent_groups(group, ServerMessage::Destroy { id }, None);
        self.remove_entity(id);
    }

    fn handle_empty_chest_area(&mut self, index: usize) {
        let Some(area) = self.chest_areas.get(index) else {
            return;
        };
        let (area_id, x, y, items) = (area.area.id, area.chest_x, area.chest_y, area.items.clone());
        let chest = self.create_chest(x, y, items);
        let id = self.add_entity(chest);
        self.handle_item_despawn(id);
        info!("Chest area {} cleared, chest {} at ({}, {})", area_id, id, x, y);
    }

    /// Replace an opened chest with one random item from its pool
    pub fn handle_opened_chest(&mut self, chest_id: EntityId) {
        let Some(chest) = self.entities.get(chest_id) else {
            return;
        };
        let Some(group) = chest.group else {
            return;
        };
        let (x, y) = (chest.x, chest.y);
        let despawn = chest.despawn();
        let kind = chest
            .as_item()
            .and_then(|item| item.random_chest_item(&mut self.rng));

        self.push_to_adjacent_groups(Some(group), despawn, None);
        self.remove_entity(chest_id);

        if let Some(kind) = kind {
            let item = self.add_item_from_chest(kind, x, y);
            self.handle_item_despawn(item);
        }
    }

    fn try_adding_mob_to_chest_area(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        let Some(index) = self
            .chest_areas
            .iter()
            .position(|area| area.contains(entity.x, entity.y))
        else {
            return;
        };
        if let Some(mob) = entity.as_mob_mut() {
            mob.area = Some(AreaRef::Chest(index));
            self.chest_areas[index].area.add(id);
        }
    }

    /// Give every idle area mob a small chance to wander
    fn roam(&mut self) {
        for index in 0..self.mob_areas.len() {
            let members = self.mob_areas[index].area.members().to_vec();
            for id in members {
                if self.rng.gen_range(0..ROAM_CHANCE) != 1 {
                    continue;
                }
                let can_roam = self
                    .entities
                    .get(id)
                    .and_then(Entity::as_mob)
                    .map(|mob| !mob.character.has_target() && !mob.is_dead)
                    .unwrap_or(false);
                if can_roam {
                    let pos = self.mob_areas[index].area.random_position(&self.map, &mut self.rng);
                    self.move_mob(id, pos.x, pos.y);
                }
            }
        }
        self.timers.schedule(Task::AreaRoam, self.now + ROAM_PERIOD);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::map::{ChestAreaData, RoamingAreaData};
    use crate::world::testing::{world_with, TestWorld};
    use realm_shared::ClientMessage;

    /// Tile key placing a static entity at (x, y)
    fn tile(x: i32, y: i32) -> String {
        (y * 84 + x).to_string()
    }

    fn rat_area(data: &mut MapData) {
        data.roaming_areas.push(RoamingAreaData {
            id: 1,
            nb: 3,
            kind: "rat".into(),
            x: 30,
            y: 14,
            width: 6,
            height: 4,
        });
    }

    fn guarded_chest(data: &mut MapData) {
        data.chest_areas.push(ChestAreaData {
            id: 1,
            x: 18,
            y: 6,
            w: 5,
            h: 5,
            tx: 25,
            ty: 8,
            i: vec![35, 36],
        });
        data.static_entities.insert(tile(20, 8), "goblin".into());
    }

    fn in_rat_area(entity: &Entity) -> bool {
        (30..=36).contains(&entity.x) && (14..=18).contains(&entity.y)
    }

    #[test]
    fn test_populate_spawns_area_mobs() {
        let world = world_with(rat_area);
        let mobs = world.entities().mob_ids();
        assert_eq!(mobs.len(), 3);
        for id in &mobs {
            assert_eq!(id / 1_000_000_000, 1);
            let mob = world.entity(*id).unwrap();
            assert_eq!(mob.kind, EntityKind::Rat);
            assert!(in_rat_area(mob));
            assert_eq!(mob.as_mob().unwrap().area, Some(AreaRef::Roaming(0)));
        }
        assert!(world.mob_areas()[0].area.is_full());
    }

    #[test]
    fn test_static_entities_are_placed() {
        let world = world_with(|data| {
            data.static_entities.insert(tile(12, 3), "guard".into());
            data.static_entities.insert(tile(14, 3), "flask".into());
            data.static_chests.push(crate::world::map::StaticChestData {
                x: 16,
                y: 3,
                i: vec![38],
            });
        });
        let npcs = world.entities().npc_ids();
        assert_eq!(npcs.len(), 1);
        let guard = world.entity(npcs[0]).unwrap();
        assert_eq!((guard.kind, guard.x, guard.y), (EntityKind::Guard, 12, 3));
        assert_eq!(npcs[0] / 1_000_000_000, 8);

        let items: Vec<&Entity> = world
            .entities()
            .item_ids()
            .into_iter()
            .filter_map(|id| world.entity(id))
            .collect();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.as_item().unwrap().is_static));
        let chest = items.iter().find(|item| item.is_chest()).unwrap();
        assert_eq!(chest.as_item().unwrap().chest_items, vec![EntityKind::Firepotion]);
    }

    #[test]
    fn test_roaming_mob_respawns_inside_its_area() {
        let mut world = world_with(rat_area);
        let id = world.entities().mob_ids()[0];

        world.remove_entity(id);
        assert!(world.entity(id).is_none());
        assert_eq!(world.mob_areas()[0].area.members().len(), 2);

        world.advance_time(MOB_RESPAWN_DELAY - Duration::from_secs(1));
        assert!(world.entity(id).is_none());
        world.advance_time(Duration::from_secs(1));

        let mob = world.entity(id).unwrap();
        assert!(in_rat_area(mob));
        assert!(!mob.as_mob().unwrap().is_dead);
        assert!(world.mob_areas()[0].area.is_full());
    }

    #[test]
    fn test_roaming_stays_inside_area() {
        let mut world = world_with(rat_area);
        let before: Vec<(i32, i32)> = world
            .entities()
            .mob_ids()
            .into_iter()
            .filter_map(|id| world.entity(id).map(|e| (e.x, e.y)))
            .collect();

        world.advance_time(Duration::from_secs(60));

        let after: Vec<(i32, i32)> = world
            .entities()
            .mob_ids()
            .into_iter()
            .filter_map(|id| world.entity(id).map(|e| (e.x, e.y)))
            .collect();
        assert_ne!(before, after);
        for id in world.entities().mob_ids() {
            let mob = world.entity(id).unwrap();
            assert!(in_rat_area(mob));
            assert_eq!(mob.group, Some(world.map().group_id_from_position(mob.x, mob.y)));
        }
    }

    #[test]
    fn test_static_item_respawns_in_place() {
        let mut t = TestWorld::new(world_with(|data| {
            data.static_entities.insert(tile(30, 8), "burger".into());
        }));
        let player = t.enter("alice");
        t.place(player, 29, 8);
        let burger = t.world.entities().item_ids()[0];

        t.world.handle_message(player, ClientMessage::Loot { item: burger });
        assert!(t.world.entity(burger).is_none());

        t.world.advance_time(ITEM_RESPAWN_DELAY);
        let item = t.world.entity(burger).unwrap();
        assert_eq!((item.kind, item.x, item.y), (EntityKind::Burger, 30, 8));
        assert!(item.as_item().unwrap().is_static);
    }

    #[test]
    fn test_last_guard_death_spawns_chest() {
        let mut t = TestWorld::new(world_with(guarded_chest));
        let player = t.enter("alice");
        t.place(player, 21, 8);
        t.world.tick();
        let guard = t.world.entities().mob_ids()[0];
        assert_eq!(t.world.chest_areas()[0].area.members(), &[guard]);

        t.world.handle_mob_hate(guard, player, 5);
        if let Some(mob) = t.world.entities.get_mut(guard).and_then(Entity::as_mob_mut) {
            mob.character.hit_points = 0;
        }
        t.world.handle_hurt_entity(guard, player, 10);

        let chest_id = t
            .world
            .entities()
            .item_ids()
            .into_iter()
            .find(|id| t.world.entity(*id).map(Entity::is_chest).unwrap_or(false))
            .expect("chest spawned");
        let chest = t.world.entity(chest_id).unwrap();
        assert_eq!((chest.x, chest.y), (25, 8));
        assert_eq!(
            chest.as_item().unwrap().chest_items,
            vec![EntityKind::Flask, EntityKind::Burger]
        );
        assert!(t.world.timers.is_scheduled(Task::ItemBlink(chest_id)));

        t.world.tick();
        assert!(t.sent_to(player).iter().any(|m| matches!(
            m,
            ServerMessage::Spawn { id, kind: EntityKind::Chest, .. } if *id == chest_id
        )));

        t.clear_logs();
        t.world.update(ITEM_BLINK_DELAY);
        assert!(t.sent_to(player).contains(&ServerMessage::Blink { id: chest_id }));
        t.world.update(ITEM_BLINKING_DURATION);
        assert!(t.sent_to(player).contains(&ServerMessage::Destroy { id: chest_id }));
        assert!(t.world.entity(chest_id).is_none());

        // The guard comes back and the area is armed again.
        t.world.advance_time(MOB_RESPAWN_DELAY);
        assert!(t.world.entity(guard).is_some());
        assert!(t.world.chest_areas()[0].area.has_completely_respawned);
    }

    #[test]
    fn test_opening_a_chest_leaves_one_pool_item() {
        let mut t = TestWorld::new(world_with(|data| {
            data.static_chests.push(crate::world::map::StaticChestData {
                x: 16,
                y: 3,
                i: vec![35],
            });
        }));
        let player = t.enter("alice");
        let chest = t.world.entities().item_ids()[0];

        t.world.handle_message(player, ClientMessage::Open { chest });
        assert!(t.world.entity(chest).is_none());

        let items = t.world.entities().item_ids();
        assert_eq!(items.len(), 1);
        let flask = t.world.entity(items[0]).unwrap();
        assert_eq!((flask.kind, flask.x, flask.y), (EntityKind::Flask, 16, 3));
        assert!(flask.as_item().unwrap().is_from_chest);
        assert!(t.world.timers.is_scheduled(Task::ItemBlink(items[0])));

        // Static chests come back too.
        t.world.advance_time(ITEM_RESPAWN_DELAY);
        assert!(t.world.entity(chest).is_some());
    }

    #[test]
    fn test_dropped_item_blinks_then_disappears() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let player = t.enter("alice");
        t.place(player, 5, 5);
        let flask = t.spawn_item(EntityKind::Flask, 6, 6);
        t.world.handle_item_despawn(flask);
        t.world.tick();
        t.clear_logs();

        t.world.update(ITEM_BLINK_DELAY);
        assert_eq!(t.sent_to(player), vec![ServerMessage::Blink { id: flask }]);
        assert!(t.world.entity(flask).is_some());

        t.world.update(ITEM_BLINKING_DURATION);
        assert!(t.world.entity(flask).is_none());
        assert!(t.sent_to(player).contains(&ServerMessage::Destroy { id: flask }));
    }

    #[test]
    fn test_regen_runs_every_two_seconds() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let player = t.enter("alice");
        if let Some(p) = t.world.entities.get_mut(player).and_then(Entity::as_player_mut) {
            p.character.hit_points = 10;
        }
        t.world.tick();
        t.clear_logs();

        // 50 ups: the pass runs on every 100th tick.
        for _ in 0..98 {
            t.world.tick();
        }
        assert_eq!(t.world.entity(player).unwrap().character().unwrap().hit_points, 10);
        t.world.tick();
        t.world.tick();
        assert_eq!(t.world.entity(player).unwrap().character().unwrap().hit_points, 13);
        t.world.tick();
        assert!(t
            .sent_to(player)
            .contains(&ServerMessage::Health { points: 13, regen: true }));
    }

    #[test]
    fn test_incoming_players_are_announced_to_others() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let a = t.enter("a");
        t.place(a, 5, 5);
        t.world.tick();
        t.clear_logs();

        let b = t.enter("b");
        t.place(b, 40, 20);
        t.world.tick();

        let spawns_for = |id: EntityId| {
            t.sent_to(id)
                .into_iter()
                .filter_map(|m| match m {
                    ServerMessage::Spawn { id, .. } => Some(id),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(spawns_for(a), vec![b]);
        assert!(!spawns_for(b).contains(&b));
    }

    #[test]
    fn test_zone_change_destroys_for_left_groups() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let a = t.enter("a");
        let b = t.enter("b");
        t.place(a, 5, 5);
        t.place(b, 80, 30);
        t.world.tick();
        t.clear_logs();

        t.world.handle_message(a, ClientMessage::Move { x: 30, y: 5 });
        t.world.handle_message(a, ClientMessage::Zone);
        t.world.tick();

        // 2-2 only saw a through the door of 0-0.
        assert!(t.sent_to(b).contains(&ServerMessage::Move { id: a, x: 30, y: 5 }));
        assert!(t.sent_to(b).contains(&ServerMessage::Destroy { id: a }));
        assert_eq!(t.world.entity(a).unwrap().group, Some(GroupId::new(1, 0)));
    }

    #[test]
    fn test_shipped_map_populates() {
        use rand::SeedableRng;

        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/maps/world_server.json");
        let map = WorldMap::load(path).unwrap();
        let world = GameWorld::new(
            "world1",
            200,
            50,
            Arc::new(map),
            Arc::new(Properties::standard()),
            StdRng::seed_from_u64(1),
        );
        assert_eq!(world.mob_areas().len(), 3);
        // 9 roaming mobs, 2 chest guards and the boss.
        assert_eq!(world.entities().mob_ids().len(), 12);
        assert_eq!(world.chest_areas()[0].area.nb_entities, 2);
        assert_eq!(world.entities().npc_ids().len(), 3);
    }

    #[test]
    fn test_stale_tasks_are_ignored() {
        let mut t = TestWorld::new(world_with(|_| {}));
        let flask = t.spawn_item(EntityKind::Flask, 6, 6);
        t.world.timers.schedule(Task::ItemBlink(flask), t.world.now());
        t.world.remove_entity(flask);
        t.world.timers.schedule(Task::MobReturn(flask), t.world.now());
        t.world.timers.schedule(Task::FirepotionExpire(12345), t.world.now());
        t.world.update(Duration::from_millis(20));
        assert!(t.world.entity(flask).is_none());
    }
}
