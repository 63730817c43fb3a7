//! Fixtures shared by the world tests.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use realm_shared::{EntityKind, Orientation, ServerMessage};

use crate::entities::{Entity, EntityId, IdPrefix, Mob, Role};

use super::map::{MapData, WorldMap};
use super::properties::Properties;
use super::session::Connection;
use super::GameWorld;

/// 84x36 tiles (3x3 groups), one wall at (10, 10), a door from group
/// 0-0 into group 2-2, a starting checkpoint and a plain one.
pub fn test_map_data() -> MapData {
    serde_json::from_value(json!({
        "width": 84,
        "height": 36,
        "collisions": [850],
        "doors": [{ "x": 5, "y": 5, "tx": 70, "ty": 30 }],
        "checkpoints": [
            { "id": 1, "x": 2, "y": 2, "w": 4, "h": 3, "s": 1 },
            { "id": 2, "x": 40, "y": 20, "w": 2, "h": 2, "s": 0 }
        ]
    }))
    .expect("valid test map")
}

/// A world on the test map, after `edit` has adjusted the map data
pub fn world_with(edit: impl FnOnce(&mut MapData)) -> GameWorld {
    let mut data = test_map_data();
    edit(&mut data);
    let map = WorldMap::from_data(data).expect("valid map");
    GameWorld::new(
        "test",
        10,
        50,
        Arc::new(map),
        Arc::new(Properties::standard()),
        StdRng::seed_from_u64(42),
    )
}

#[derive(Debug, Default)]
struct Recorded {
    batches: Vec<Vec<ServerMessage>>,
    texts: Vec<String>,
    closed: Option<String>,
}

/// Everything a recording connection was asked to deliver
#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Recorded>>);

impl Log {
    pub fn batches(&self) -> Vec<Vec<ServerMessage>> {
        self.0.lock().unwrap().batches.clone()
    }

    pub fn messages(&self) -> Vec<ServerMessage> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.0.lock().unwrap().texts.clone()
    }

    pub fn closed(&self) -> Option<String> {
        self.0.lock().unwrap().closed.clone()
    }

    pub fn clear(&self) {
        let mut recorded = self.0.lock().unwrap();
        recorded.batches.clear();
        recorded.texts.clear();
    }
}

struct Recorder(Log);

impl Connection for Recorder {
    fn send(&mut self, batch: &[ServerMessage]) {
        (self.0).0.lock().unwrap().batches.push(batch.to_vec());
    }

    fn send_text(&mut self, text: &str) {
        (self.0).0.lock().unwrap().texts.push(text.to_string());
    }

    fn close(&mut self, reason: &str) {
        (self.0).0.lock().unwrap().closed = Some(reason.to_string());
    }
}

/// A world plus the logs of every connection opened through it
pub struct TestWorld {
    pub world: GameWorld,
    logs: Vec<(EntityId, Log)>,
}

impl TestWorld {
    pub fn new(world: GameWorld) -> Self {
        Self {
            world,
            logs: Vec::new(),
        }
    }

    pub fn connect(&mut self) -> (EntityId, Log) {
        let log = Log::default();
        let id = self.world.connect(Box::new(Recorder(log.clone())));
        self.logs.push((id, log.clone()));
        (id, log)
    }

    /// Connect and complete the handshake
    pub fn enter(&mut self, name: &str) -> EntityId {
        let (id, _) = self.connect();
        let hello = format!(r#"[0,"{}",21,60]"#, name);
        self.world.receive(id, hello.as_bytes());
        id
    }

    /// Teleport an entity without any broadcast
    pub fn place(&mut self, id: EntityId, x: i32, y: i32) {
        self.world.move_entity(id, x, y);
    }

    pub fn spawn_mob(&mut self, kind: EntityKind, x: i32, y: i32) -> EntityId {
        let properties = self.world.properties.mob(kind).expect("mob kind").clone();
        let id = self.world.ids.next(IdPrefix::StaticMob);
        let mob = Mob::new(&properties, x, y, Orientation::Down);
        self.world.add_entity(Entity::new(id, kind, x, y, Role::Mob(mob)))
    }

    /// A loose item, as if dropped by a mob
    pub fn spawn_item(&mut self, kind: EntityKind, x: i32, y: i32) -> EntityId {
        let item = self.world.create_item(kind, x, y);
        self.world.add_entity(item)
    }

    pub fn mob(&self, id: EntityId) -> &Mob {
        self.world
            .entity(id)
            .and_then(Entity::as_mob)
            .expect("mob in world")
    }

    pub fn log(&self, id: EntityId) -> Log {
        self.logs
            .iter()
            .find(|(log_id, _)| *log_id == id)
            .map(|(_, log)| log.clone())
            .expect("connection opened through TestWorld")
    }

    /// Every message delivered to `id` so far
    pub fn sent_to(&self, id: EntityId) -> Vec<ServerMessage> {
        self.log(id).messages()
    }

    pub fn clear_logs(&self) {
        for (_, log) in &self.logs {
            log.clear();
        }
    }
}
