//! Player sessions: handshake, per-message handling and exit.
//!
//! A session is created when a transport connects and lives until the
//! connection closes. The player entity only exists in the world between
//! a successful HELLO and death or exit.

use log::{debug, info, warn};

use realm_shared::{ClientMessage, EntityKind, ServerMessage, MAX_CHAT_LENGTH, MAX_NAME_LENGTH};

use crate::entities::player::{sanitize, truncate_chars, DEFAULT_NAME};
use crate::entities::{Entity, EntityId, IdPrefix, Player, Role};

use super::formulas;
use super::timers::Task;
use super::{random_orientation, GameWorld, FIREPOTION_DURATION, IDLE_TIMEOUT};

const FLASK_HEAL: i32 = 40;
const BURGER_HEAL: i32 = 100;

/// Outbound side of a client transport
pub trait Connection: Send {
    /// Deliver one tick's worth of messages
    fn send(&mut self, batch: &[ServerMessage]);
    /// Deliver a raw text frame ("go", "timeout")
    fn send_text(&mut self, text: &str);
    fn close(&mut self, reason: &str);
}

pub struct Session {
    pub(crate) connection: Box<dyn Connection>,
    pub(crate) outgoing: Vec<ServerMessage>,
    pub(crate) has_entered_game: bool,
}

impl Session {
    fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection,
            outgoing: Vec::new(),
            has_entered_game: false,
        }
    }

    pub fn has_entered_game(&self) -> bool {
        self.has_entered_game
    }
}

impl GameWorld {
    /// Register a new connection. Returns the id its player will use.
    pub fn connect(&mut self, mut connection: Box<dyn Connection>) -> EntityId {
        let id = self.ids.next(IdPrefix::Player);
        connection.send_text("go");
        self.sessions.insert(id, Session::new(connection));
        self.reset_idle_timer(id);
        debug!("New connection {} on {}", id, self.id);
        id
    }

    pub fn has_session(&self, id: EntityId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn session(&self, id: EntityId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Ids of sessions closed since the last call
    pub fn drain_closed(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.closed_sessions)
    }

    /// Decode and handle one raw client message
    pub fn receive(&mut self, id: EntityId, data: &[u8]) {
        if !self.sessions.contains_key(&id) {
            debug!("Message for unknown session {}", id);
            return;
        }
        match ClientMessage::decode(data) {
            Ok(message) => self.handle_message(id, message),
            Err(e) => {
                warn!("Invalid message from {}: {}", id, e);
                self.close_session(id, "invalid message");
            }
        }
    }

    /// Handle one decoded client message
    pub fn handle_message(&mut self, id: EntityId, message: ClientMessage) {
        let Some(entered) = self.sessions.get(&id).map(Session::has_entered_game) else {
            return;
        };
        let is_hello = matches!(message, ClientMessage::Hello { .. });
        if !entered && !is_hello {
            self.close_session(id, "message before HELLO");
            return;
        }
        if entered && is_hello && self.entities.contains(id) {
            self.close_session(id, "HELLO after entering the game");
            return;
        }

        self.reset_idle_timer(id);

        match message {
            ClientMessage::Hello { name, armor, weapon } => self.handle_hello(id, &name, armor, weapon),
            ClientMessage::Who { ids } => self.push_spawns_to_player(id, &ids),
            ClientMessage::Zone => self.handle_zone(id),
            ClientMessage::Chat { message } => self.handle_chat(id, &message),
            ClientMessage::Move { x, y } => self.handle_move(id, x, y),
            ClientMessage::LootMove { x, y, item } => self.handle_loot_move(id, x, y, item),
            ClientMessage::Aggro { mob } => self.handle_mob_hate(mob, id, 5),
            ClientMessage::Attack { mob } => self.handle_attack(id, mob),
            ClientMessage::Hit { mob } => self.handle_hit(id, mob),
            ClientMessage::Hurt { mob } => self.handle_hurt(id, mob),
            ClientMessage::Loot { item } => self.handle_loot(id, item),
            ClientMessage::Teleport { x, y } => self.handle_teleport(id, x, y),
            ClientMessage::Open { chest } => self.handle_open(chest),
            ClientMessage::Check { checkpoint } => self.handle_check(id, checkpoint),
        }
    }

    fn reset_idle_timer(&mut self, id: EntityId) {
        self.timers.schedule(Task::IdleDisconnect(id), self.now + IDLE_TIMEOUT);
    }

    pub(crate) fn disconnect_idle(&mut self, id: EntityId) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        session.connection.send_text("timeout");
        info!("Player {} timed out", id);
        self.close_session(id, "idle timeout");
    }

    fn handle_hello(&mut self, id: EntityId, name: &str, armor: u8, weapon: u8) {
        let name = truncate_chars(&sanitize(name), MAX_NAME_LENGTH);
        let name = if name.is_empty() { DEFAULT_NAME.to_string() } else { name };
        let armor = EntityKind::from_u8(armor)
            .filter(EntityKind::is_armor)
            .unwrap_or(EntityKind::ClothArmor);
        let weapon = EntityKind::from_u8(weapon)
            .filter(EntityKind::is_weapon)
            .unwrap_or(EntityKind::Sword1);
        let orientation = random_orientation(&mut self.rng);

        let mut entity = match self.dormant.remove(&id) {
            Some(entity) if entity.is_player() => entity,
            _ => Entity::new(
                id,
                EntityKind::Warrior,
                0,
                0,
                Role::Player(Player::new(name.clone(), orientation)),
            ),
        };

        let mut checkpoint = None;
        if let Some(player) = entity.as_player_mut() {
            player.name = name.clone();
            player.character.orientation = orientation;
            player.equip_armor(armor);
            player.equip_weapon(weapon);
            player.update_hit_points();
            checkpoint = player.last_checkpoint;
        }
        let hit_points = entity.character().map(|c| c.hit_points).unwrap_or_default();

        let pos = checkpoint
            .and_then(|cp| self.map.checkpoint(cp))
            .map(|cp| cp.random_position(&mut self.rng))
            .unwrap_or_else(|| self.map.random_starting_position(&mut self.rng));
        entity.set_position(pos.x, pos.y);
        self.add_entity(entity);

        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        if !session.has_entered_game {
            self.player_count += 1;
        }
        session.connection.send(&[ServerMessage::Welcome {
            id,
            name: name.clone(),
            x: pos.x,
            y: pos.y,
            hit_points,
        }]);
        session.has_entered_game = true;

        self.push_to_player(
            id,
            ServerMessage::Population {
                world: self.player_count,
                total: None,
            },
        );
        self.push_relevant_entity_list_to(id);
        info!("{} joined {} ({} players)", name, self.id, self.player_count);
    }

    fn handle_zone(&mut self, id: EntityId) {
        if self.update_membership(id) {
            self.push_to_previous_groups(id, ServerMessage::Destroy { id });
            self.push_relevant_entity_list_to(id);
        }
    }

    fn handle_chat(&mut self, id: EntityId, message: &str) {
        let message = truncate_chars(&sanitize(message), MAX_CHAT_LENGTH);
        if message.is_empty() {
            return;
        }
        let Some(group) = self.entities.get(id).and_then(|entity| entity.group) else {
            return;
        };
        debug!("{} says: {}", id, message);
        self.push_to_group(group, ServerMessage::Chat { id, message }, None);
    }

    /// Reposition the player, clear its target and tell the neighbourhood
    fn relocate_player(&mut self, id: EntityId, x: i32, y: i32, message: ServerMessage) -> bool {
        if !self.map.is_valid_position(x, y) {
            return false;
        }
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        entity.set_position(x, y);
        if let Some(character) = entity.character_mut() {
            character.clear_target();
        }
        let group = entity.group;
        self.push_to_adjacent_groups(group, message, Some(id));
        true
    }

    fn handle_move(&mut self, id: EntityId, x: i32, y: i32) {
        if self.relocate_player(id, x, y, ServerMessage::Move { id, x, y }) {
            self.drag_attackers(id);
        }
    }

    fn handle_loot_move(&mut self, id: EntityId, x: i32, y: i32, item: EntityId) {
        if !self.entities.contains(item) {
            return;
        }
        if self.relocate_player(id, x, y, ServerMessage::LootMove { id, item }) {
            self.drag_attackers(id);
        }
    }

    fn handle_attack(&mut self, id: EntityId, mob: EntityId) {
        if !self.entities.contains(mob) {
            return;
        }
        let Some(character) = self.entities.get_mut(id).and_then(Entity::character_mut) else {
            return;
        };
        character.set_target(mob);
        self.broadcast_attacker(id);
    }

    fn handle_hit(&mut self, id: EntityId, mob_id: EntityId) {
        let Some(weapon_level) = self.entities.get(id).and_then(Entity::as_player).map(|p| p.weapon_level) else {
            return;
        };
        let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) else {
            return;
        };
        let damage = formulas::dmg(weapon_level, mob.armor_level, &mut self.rng);
        if damage <= 0 {
            return;
        }
        mob.character.hit_points = (mob.character.hit_points - damage).max(0);
        self.handle_mob_hate(mob_id, id, damage);
        self.handle_hurt_entity(mob_id, id, damage);
    }

    fn handle_hurt(&mut self, id: EntityId, mob_id: EntityId) {
        let Some(weapon_level) = self.entities.get(mob_id).and_then(Entity::as_mob).map(|m| m.weapon_level) else {
            return;
        };
        let alive = self
            .entities
            .get(id)
            .and_then(Entity::character)
            .map(|c| c.hit_points > 0)
            .unwrap_or(false);
        if !alive || !self.can_mob_attack(mob_id, id) {
            return;
        }

        let now = self.now;
        if let Some(mob) = self.entities.get_mut(mob_id).and_then(Entity::as_mob_mut) {
            mob.register_attack(now);
        }
        let Some(player) = self.entities.get_mut(id).and_then(Entity::as_player_mut) else {
            return;
        };
        let damage = formulas::dmg(weapon_level, player.armor_level, &mut self.rng);
        player.character.hit_points = (player.character.hit_points - damage).max(0);
        let died = player.character.hit_points <= 0;

        self.handle_hurt_entity(id, mob_id, damage);
        if died {
            self.timers.cancel(Task::FirepotionExpire(id));
        }
    }

    fn handle_loot(&mut self, id: EntityId, item_id: EntityId) {
        let Some(item) = self.entities.get(item_id) else {
            return;
        };
        if item.as_item().is_none() || !item.kind.is_item() {
            return;
        }
        let kind = item.kind;
        let group = item.group;
        self.push_to_adjacent_groups(group, ServerMessage::Despawn { id: item_id }, Some(id));
        self.remove_entity(item_id);

        let Some(player_entity) = self.entities.get_mut(id) else {
            return;
        };
        let player_group = player_entity.group;
        let Some(player) = player_entity.as_player_mut() else {
            return;
        };

        if kind == EntityKind::Firepotion {
            player.update_hit_points();
            let max = player.character.max_hit_points;
            self.push_to_adjacent_groups(
                player_group,
                ServerMessage::Equip {
                    id,
                    kind: EntityKind::Firefox,
                },
                Some(id),
            );
            self.timers
                .schedule(Task::FirepotionExpire(id), self.now + FIREPOTION_DURATION);
            self.push_to_player(id, ServerMessage::HitPoints { max });
        } else if kind.is_healing_item() {
            if player.character.has_full_health() {
                return;
            }
            let amount = if kind == EntityKind::Flask { FLASK_HEAL } else { BURGER_HEAL };
            player.character.regen_health_by(amount);
            let health = player.character.health();
            self.push_to_player(id, health);
        } else if kind.is_armor() || kind.is_weapon() {
            if kind.is_armor() {
                player.equip_armor(kind);
                player.update_hit_points();
                let max = player.character.max_hit_points;
                self.push_to_player(id, ServerMessage::HitPoints { max });
            } else {
                player.equip_weapon(kind);
            }
            self.push_to_adjacent_groups(player_group, ServerMessage::Equip { id, kind }, Some(id));
        }
    }

    pub(crate) fn expire_firepotion(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        let Some(player) = entity.as_player() else {
            return;
        };
        let message = ServerMessage::Equip {
            id,
            kind: player.armor,
        };
        let group = entity.group;
        self.push_to_adjacent_groups(group, message, Some(id));
    }

    fn handle_teleport(&mut self, id: EntityId, x: i32, y: i32) {
        if self.relocate_player(id, x, y, ServerMessage::Teleport { id, x, y }) {
            self.handle_player_vanish(id);
            self.push_relevant_entity_list_to(id);
        }
    }

    fn handle_open(&mut self, chest: EntityId) {
        if self.entities.get(chest).map(Entity::is_chest).unwrap_or(false) {
            self.handle_opened_chest(chest);
        }
    }

    fn handle_check(&mut self, id: EntityId, checkpoint: u32) {
        if self.map.checkpoint(checkpoint).is_none() {
            return;
        }
        if let Some(player) = self.entities.get_mut(id).and_then(Entity::as_player_mut) {
            player.last_checkpoint = Some(checkpoint);
        }
    }

    /// Close the transport and run exit handling
    pub fn close_session(&mut self, id: EntityId, reason: &str) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.connection.close(reason);
        }
        self.handle_exit(id);
    }

    /// The transport went away
    pub fn handle_exit(&mut self, id: EntityId) {
        self.timers.cancel(Task::FirepotionExpire(id));
        self.timers.cancel(Task::IdleDisconnect(id));

        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        if session.has_entered_game {
            if let Some(group) = self.entities.get(id).map(|entity| entity.group) {
                self.push_to_adjacent_groups(group, ServerMessage::Despawn { id }, Some(id));
                self.handle_player_vanish(id);
                self.remove_entity(id);
            }
            self.dormant.remove(&id);
            self.player_count = self.player_count.saturating_sub(1);
        }

        self.sessions.remove(&id);
        self.closed_sessions.push(id);
        info!("Player {} left {} ({} players)", id, self.id, self.player_count);
    }

    /// Broadcast the world and total population
    pub fn update_population(&mut self, total: u32) {
        self.push_broadcast(
            ServerMessage::Population {
                world: self.player_count,
                total: Some(total),
            },
            None,
        );
    }
}
