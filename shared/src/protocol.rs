//! Network protocol definitions shared between client and server.
//!
//! Every message travels as a JSON array whose first element is the
//! message type tag. Server messages are flushed in batches, one JSON
//! array of message arrays per flush.

use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::kinds::{EntityKind, Orientation};

/// Default server port
pub const DEFAULT_PORT: u16 = 8000;

/// Longest accepted player name
pub const MAX_NAME_LENGTH: usize = 15;

/// Longest accepted chat line
pub const MAX_CHAT_LENGTH: usize = 60;

/// Message type tags, identical for both directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Hello = 0,
    Welcome = 1,
    Spawn = 2,
    Despawn = 3,
    Move = 4,
    LootMove = 5,
    Aggro = 6,
    Attack = 7,
    Hit = 8,
    Hurt = 9,
    Health = 10,
    Chat = 11,
    Loot = 12,
    Equip = 13,
    Drop = 14,
    Teleport = 15,
    Damage = 16,
    Population = 17,
    Kill = 18,
    List = 19,
    Who = 20,
    Zone = 21,
    Destroy = 22,
    HitPoints = 23,
    Blink = 24,
    Open = 25,
    Check = 26,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use MessageType::*;
        const ALL: [MessageType; 27] = [
            Hello, Welcome, Spawn, Despawn, Move, LootMove, Aggro, Attack, Hit, Hurt, Health,
            Chat, Loot, Equip, Drop, Teleport, Damage, Population, Kill, List, Who, Zone,
            Destroy, HitPoints, Blink, Open, Check,
        ];
        ALL.get(value as usize).copied()
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Protocol errors. A connection that produces one is closed.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),
}

// =============================================================================
// Server -> Client
// =============================================================================

/// Kind-specific tail of a Spawn message
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnState {
    /// Items, chests and NPCs carry no extra state
    Basic,
    Mob {
        orientation: Orientation,
        target: Option<u64>,
    },
    Player {
        name: String,
        orientation: Orientation,
        armor: EntityKind,
        weapon: EntityKind,
        target: Option<u64>,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Welcome {
        id: u64,
        name: String,
        x: i32,
        y: i32,
        hit_points: i32,
    },
    Spawn {
        id: u64,
        kind: EntityKind,
        x: i32,
        y: i32,
        state: SpawnState,
    },
    Despawn {
        id: u64,
    },
    Move {
        id: u64,
        x: i32,
        y: i32,
    },
    LootMove {
        id: u64,
        item: u64,
    },
    Attack {
        attacker: u64,
        target: u64,
    },
    /// Current hit points of the receiving player. `regen` marks a regeneration tick.
    Health {
        points: i32,
        regen: bool,
    },
    Chat {
        id: u64,
        message: String,
    },
    Equip {
        id: u64,
        kind: EntityKind,
    },
    /// Loot dropped by a mob, with the ids of the players that hated it
    Drop {
        mob: u64,
        item: u64,
        kind: EntityKind,
        haters: Vec<u64>,
    },
    Teleport {
        id: u64,
        x: i32,
        y: i32,
    },
    Damage {
        id: u64,
        points: i32,
    },
    Population {
        world: u32,
        total: Option<u32>,
    },
    Kill {
        kind: EntityKind,
    },
    List {
        ids: Vec<u64>,
    },
    Destroy {
        id: u64,
    },
    HitPoints {
        max: i32,
    },
    Blink {
        id: u64,
    },
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Welcome { .. } => MessageType::Welcome,
            Self::Spawn { .. } => MessageType::Spawn,
            Self::Despawn { .. } => MessageType::Despawn,
            Self::Move { .. } => MessageType::Move,
            Self::LootMove { .. } => MessageType::LootMove,
            Self::Attack { .. } => MessageType::Attack,
            Self::Health { .. } => MessageType::Health,
            Self::Chat { .. } => MessageType::Chat,
            Self::Equip { .. } => MessageType::Equip,
            Self::Drop { .. } => MessageType::Drop,
            Self::Teleport { .. } => MessageType::Teleport,
            Self::Damage { .. } => MessageType::Damage,
            Self::Population { .. } => MessageType::Population,
            Self::Kill { .. } => MessageType::Kill,
            Self::List { .. } => MessageType::List,
            Self::Destroy { .. } => MessageType::Destroy,
            Self::HitPoints { .. } => MessageType::HitPoints,
            Self::Blink { .. } => MessageType::Blink,
        }
    }

    /// Encode a batch of messages as one JSON array
    pub fn encode_batch(messages: &[ServerMessage]) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(messages)?)
    }
}

impl Serialize for ServerMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        seq.serialize_element(&self.message_type().as_u8())?;
        match self {
            Self::Welcome { id, name, x, y, hit_points } => {
                seq.serialize_element(id)?;
                seq.serialize_element(name)?;
                seq.serialize_element(x)?;
                seq.serialize_element(y)?;
                seq.serialize_element(hit_points)?;
            }
            Self::Spawn { id, kind, x, y, state } => {
                seq.serialize_element(id)?;
                seq.serialize_element(&kind.as_u8())?;
                seq.serialize_element(x)?;
                seq.serialize_element(y)?;
                match state {
                    SpawnState::Basic => {}
                    SpawnState::Mob { orientation, target } => {
                        seq.serialize_element(&orientation.as_u8())?;
                        if let Some(target) = target {
                            seq.serialize_element(target)?;
                        }
                    }
                    SpawnState::Player { name, orientation, armor, weapon, target } => {
                        seq.serialize_element(name)?;
                        seq.serialize_element(&orientation.as_u8())?;
                        seq.serialize_element(&armor.as_u8())?;
                        seq.serialize_element(&weapon.as_u8())?;
                        if let Some(target) = target {
                            seq.serialize_element(target)?;
                        }
                    }
                }
            }
            Self::Despawn { id } | Self::Destroy { id } | Self::Blink { id } => {
                seq.serialize_element(id)?;
            }
            Self::Move { id, x, y } | Self::Teleport { id, x, y } => {
                seq.serialize_element(id)?;
                seq.serialize_element(x)?;
                seq.serialize_element(y)?;
            }
            Self::LootMove { id, item } => {
                seq.serialize_element(id)?;
                seq.serialize_element(item)?;
            }
            Self::Attack { attacker, target } => {
                seq.serialize_element(attacker)?;
                seq.serialize_element(target)?;
            }
            Self::Health { points, regen } => {
                seq.serialize_element(points)?;
                if *regen {
                    seq.serialize_element(&1u8)?;
                }
            }
            Self::Chat { id, message } => {
                seq.serialize_element(id)?;
                seq.serialize_element(message)?;
            }
            Self::Equip { id, kind } => {
                seq.serialize_element(id)?;
                seq.serialize_element(&kind.as_u8())?;
            }
            Self::Drop { mob, item, kind, haters } => {
                seq.serialize_element(mob)?;
                seq.serialize_element(item)?;
                seq.serialize_element(&kind.as_u8())?;
                seq.serialize_element(haters)?;
            }
            Self::Damage { id, points } => {
                seq.serialize_element(id)?;
                seq.serialize_element(points)?;
            }
            Self::Population { world, total } => {
                seq.serialize_element(world)?;
                seq.serialize_element(total)?;
            }
            Self::Kill { kind } => {
                seq.serialize_element(&kind.as_u8())?;
            }
            Self::List { ids } => {
                for id in ids {
                    seq.serialize_element(id)?;
                }
            }
            Self::HitPoints { max } => {
                seq.serialize_element(max)?;
            }
        }
        seq.end()
    }
}

// =============================================================================
// Client -> Server
// =============================================================================

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Enter the game. Armor and weapon are raw kind codes chosen by the client.
    Hello {
        name: String,
        armor: u8,
        weapon: u8,
    },
    /// Ask for the spawn state of the listed entities
    Who {
        ids: Vec<u64>,
    },
    Zone,
    Chat {
        message: String,
    },
    Move {
        x: i32,
        y: i32,
    },
    LootMove {
        x: i32,
        y: i32,
        item: u64,
    },
    Aggro {
        mob: u64,
    },
    Attack {
        mob: u64,
    },
    Hit {
        mob: u64,
    },
    Hurt {
        mob: u64,
    },
    Loot {
        item: u64,
    },
    Teleport {
        x: i32,
        y: i32,
    },
    Open {
        chest: u64,
    },
    Check {
        checkpoint: u32,
    },
}

impl ClientMessage {
    /// Decode one JSON-encoded client message, checking its exact format
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(data)?;
        Ok(serde_json::from_str(text)?)
    }
}

fn field<'de, T, A>(seq: &mut A, index: usize) -> Result<T, A::Error>
where
    T: Deserialize<'de>,
    A: SeqAccess<'de>,
{
    seq.next_element()?
        .ok_or_else(|| de::Error::invalid_length(index, &"more message fields"))
}

struct ClientMessageVisitor;

impl<'de> Visitor<'de> for ClientMessageVisitor {
    type Value = ClientMessage;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a client message array starting with its type tag")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let tag: u8 = field(&mut seq, 0)?;
        let message_type = MessageType::from_u8(tag).ok_or_else(|| {
            de::Error::invalid_value(de::Unexpected::Unsigned(tag as u64), &"a client message type")
        })?;

        let message = match message_type {
            MessageType::Hello => ClientMessage::Hello {
                name: field(&mut seq, 1)?,
                armor: field(&mut seq, 2)?,
                weapon: field(&mut seq, 3)?,
            },
            MessageType::Who => {
                let mut ids = Vec::new();
                while let Some(id) = seq.next_element()? {
                    ids.push(id);
                }
                if ids.is_empty() {
                    return Err(de::Error::invalid_length(1, &"at least one entity id"));
                }
                return Ok(ClientMessage::Who { ids });
            }
            MessageType::Zone => ClientMessage::Zone,
            MessageType::Chat => ClientMessage::Chat {
                message: field(&mut seq, 1)?,
            },
            MessageType::Move => ClientMessage::Move {
                x: field(&mut seq, 1)?,
                y: field(&mut seq, 2)?,
            },
            MessageType::LootMove => ClientMessage::LootMove {
                x: field(&mut seq, 1)?,
                y: field(&mut seq, 2)?,
                item: field(&mut seq, 3)?,
            },
            MessageType::Aggro => ClientMessage::Aggro { mob: field(&mut seq, 1)? },
            MessageType::Attack => ClientMessage::Attack { mob: field(&mut seq, 1)? },
            MessageType::Hit => ClientMessage::Hit { mob: field(&mut seq, 1)? },
            MessageType::Hurt => ClientMessage::Hurt { mob: field(&mut seq, 1)? },
            MessageType::Loot => ClientMessage::Loot { item: field(&mut seq, 1)? },
            MessageType::Teleport => ClientMessage::Teleport {
                x: field(&mut seq, 1)?,
                y: field(&mut seq, 2)?,
            },
            MessageType::Open => ClientMessage::Open { chest: field(&mut seq, 1)? },
            MessageType::Check => ClientMessage::Check {
                checkpoint: field(&mut seq, 1)?,
            },
            other => {
                return Err(de::Error::invalid_value(
                    de::Unexpected::Unsigned(other.as_u8() as u64),
                    &"a message type a client may send",
                ));
            }
        };

        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::custom(format!(
                "too many fields for {:?} message",
                message_type
            )));
        }
        Ok(message)
    }
}

impl<'de> Deserialize<'de> for ClientMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(ClientMessageVisitor)
    }
}
