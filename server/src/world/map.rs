//! Static world geometry: collision grid, zone groups, doors and checkpoints.
//!
//! The map is built once from exported map data and never mutated by the
//! simulation.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use log::info;
use rand::Rng;
use serde::Deserialize;

use realm_shared::EntityKind;

use crate::config::ConfigError;

/// Zone group width in tiles
pub const ZONE_WIDTH: i32 = 28;
/// Zone group height in tiles
pub const ZONE_HEIGHT: i32 = 12;

// =============================================================================
// Map file format
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub width: i32,
    pub height: i32,
    /// Colliding tile indices (`y * width + x`)
    #[serde(default)]
    pub collisions: Vec<usize>,
    #[serde(default)]
    pub doors: Vec<DoorData>,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointData>,
    #[serde(default)]
    pub roaming_areas: Vec<RoamingAreaData>,
    #[serde(default)]
    pub chest_areas: Vec<ChestAreaData>,
    #[serde(default)]
    pub static_chests: Vec<StaticChestData>,
    /// 1-based tile index -> kind name
    #[serde(default)]
    pub static_entities: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoorData {
    pub x: i32,
    pub y: i32,
    pub tx: i32,
    pub ty: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointData {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// 1 marks a starting area
    #[serde(default)]
    pub s: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoamingAreaData {
    pub id: u32,
    pub nb: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChestAreaData {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub tx: i32,
    pub ty: i32,
    /// Item kind codes the chest may contain
    pub i: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticChestData {
    pub x: i32,
    pub y: i32,
    pub i: Vec<u8>,
}

impl MapData {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

// =============================================================================
// Resolved map
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Zone group coordinates, written "gx-gy" on the wire and in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId {
    pub x: i32,
    pub y: i32,
}

impl GroupId {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.x, self.y)
    }
}

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Checkpoint {
    /// A random tile inside the checkpoint rectangle
    pub fn random_position(&self, rng: &mut impl Rng) -> Position {
        Position {
            x: self.x + rng.gen_range(0..self.width.max(1)),
            y: self.y + rng.gen_range(0..self.height.max(1)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoamingAreaDef {
    pub id: u32,
    pub nb: usize,
    pub kind: EntityKind,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone)]
pub struct ChestAreaDef {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub chest_x: i32,
    pub chest_y: i32,
    pub items: Vec<EntityKind>,
}

#[derive(Debug, Clone)]
pub struct StaticChestDef {
    pub x: i32,
    pub y: i32,
    pub items: Vec<EntityKind>,
}

/// A static placement, already converted to grid coordinates
#[derive(Debug, Clone)]
pub struct StaticEntityDef {
    pub kind: EntityKind,
    pub x: i32,
    pub y: i32,
}

/// Immutable world geometry and content placements
#[derive(Debug)]
pub struct WorldMap {
    pub width: i32,
    pub height: i32,
    pub group_width: i32,
    pub group_height: i32,
    grid: Vec<bool>,
    connected_groups: HashMap<GroupId, Vec<GroupId>>,
    checkpoints: HashMap<u32, Checkpoint>,
    starting_areas: Vec<Checkpoint>,
    pub roaming_areas: Vec<RoamingAreaDef>,
    pub chest_areas: Vec<ChestAreaDef>,
    pub static_chests: Vec<StaticChestDef>,
    pub static_entities: Vec<StaticEntityDef>,
}

fn kind_from_code(code: u8) -> Result<EntityKind, ConfigError> {
    EntityKind::from_u8(code).ok_or_else(|| ConfigError::UnknownKind(code.to_string()))
}

fn kind_from_name(name: &str) -> Result<EntityKind, ConfigError> {
    EntityKind::from_name(name).ok_or_else(|| ConfigError::UnknownKind(name.to_string()))
}

impl WorldMap {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_data(MapData::load(path)?)
    }

    /// Build and validate the map
    pub fn from_data(data: MapData) -> Result<Self, ConfigError> {
        if data.width <= 0 || data.height <= 0 {
            return Err(ConfigError::InvalidDimensions {
                width: data.width,
                height: data.height,
            });
        }

        let tile_count = (data.width * data.height) as usize;
        let mut grid = vec![false; tile_count];
        for &index in &data.collisions {
            let tile = grid
                .get_mut(index)
                .ok_or(ConfigError::CollisionOutOfBounds(index))?;
            *tile = true;
        }

        let mut map = Self {
            width: data.width,
            height: data.height,
            group_width: data.width / ZONE_WIDTH,
            group_height: data.height / ZONE_HEIGHT,
            grid,
            connected_groups: HashMap::new(),
            checkpoints: HashMap::new(),
            starting_areas: Vec::new(),
            roaming_areas: Vec::new(),
            chest_areas: Vec::new(),
            static_chests: Vec::new(),
            static_entities: Vec::new(),
        };

        for door in &data.doors {
            let from = map.group_id_from_position(door.x, door.y);
            let to = map.group_id_from_position(door.tx, door.ty);
            map.connected_groups.entry(from).or_default().push(to);
        }

        for cp in &data.checkpoints {
            let checkpoint = Checkpoint {
                id: cp.id,
                x: cp.x,
                y: cp.y,
                width: cp.w,
                height: cp.h,
            };
            if cp.s == 1 {
                map.starting_areas.push(checkpoint.clone());
            }
            map.checkpoints.insert(checkpoint.id, checkpoint);
        }
        if map.starting_areas.is_empty() {
            return Err(ConfigError::NoStartingArea);
        }

        for area in &data.roaming_areas {
            let kind = kind_from_name(&area.kind)?;
            if !kind.is_mob() {
                return Err(ConfigError::InvalidArea {
                    area: "roaming",
                    id: area.id,
                    reason: format!("'{}' is not a mob", area.kind),
                });
            }
            let def = RoamingAreaDef {
                id: area.id,
                nb: area.nb,
                kind,
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height,
            };
            if !map.has_valid_tile(def.x, def.y, def.width, def.height) {
                return Err(ConfigError::NoValidTile {
                    area: "roaming",
                    id: def.id,
                });
            }
            map.roaming_areas.push(def);
        }

        for area in &data.chest_areas {
            let items = area
                .i
                .iter()
                .map(|&code| kind_from_code(code))
                .collect::<Result<Vec<_>, _>>()?;
            map.chest_areas.push(ChestAreaDef {
                id: area.id,
                x: area.x,
                y: area.y,
                width: area.w,
                height: area.h,
                chest_x: area.tx,
                chest_y: area.ty,
                items,
            });
        }

        for chest in &data.static_chests {
            let items = chest
                .i
                .iter()
                .map(|&code| kind_from_code(code))
                .collect::<Result<Vec<_>, _>>()?;
            map.static_chests.push(StaticChestDef {
                x: chest.x,
                y: chest.y,
                items,
            });
        }

        for (tile, name) in &data.static_entities {
            let tile: usize = tile.parse().map_err(|_| ConfigError::InvalidValue {
                name: "staticEntities",
                reason: format!("'{}' is not a tile index", tile),
            })?;
            let kind = kind_from_name(name)?;
            let pos = map.tile_index_to_grid_position(tile);
            // Placements are exported one tile to the left
            map.static_entities.push(StaticEntityDef {
                kind,
                x: pos.x + 1,
                y: pos.y,
            });
        }
        // Tile keys sort as strings; spawn in numeric order.
        map.static_entities.sort_by_key(|e| (e.y, e.x));

        info!(
            "Map loaded: {}x{} tiles, {}x{} groups, {} doors, {} checkpoints",
            map.width,
            map.height,
            map.group_width,
            map.group_height,
            data.doors.len(),
            map.checkpoints.len()
        );
        Ok(map)
    }

    fn has_valid_tile(&self, x: i32, y: i32, width: i32, height: i32) -> bool {
        (x..=x + width).any(|tx| (y..=y + height).any(|ty| self.is_valid_position(tx, ty)))
    }

    /// Convert a 1-based tile index to grid coordinates
    pub fn tile_index_to_grid_position(&self, tile: usize) -> Position {
        let width = self.width as usize;
        let x = if tile == 0 {
            0
        } else if tile % width == 0 {
            width - 1
        } else {
            tile % width - 1
        };
        let y = tile.saturating_sub(1) / width;
        Position::new(x as i32, y as i32)
    }

    pub fn is_out_of_bounds(&self, x: i32, y: i32) -> bool {
        x <= 0 || x >= self.width || y <= 0 || y >= self.height
    }

    /// Out-of-bounds tiles never collide; bounds are checked separately.
    pub fn is_colliding(&self, x: i32, y: i32) -> bool {
        if self.is_out_of_bounds(x, y) {
            return false;
        }
        self.grid[(y * self.width + x) as usize]
    }

    pub fn is_valid_position(&self, x: i32, y: i32) -> bool {
        !self.is_out_of_bounds(x, y) && !self.is_colliding(x, y)
    }

    pub fn group_id_from_position(&self, x: i32, y: i32) -> GroupId {
        GroupId::new(
            (x - 1).div_euclid(ZONE_WIDTH),
            (y - 1).div_euclid(ZONE_HEIGHT),
        )
    }

    pub fn is_valid_group(&self, id: GroupId) -> bool {
        id.x >= 0 && id.y >= 0 && id.x < self.group_width && id.y < self.group_height
    }

    /// All group ids, column by column
    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        (0..self.group_width)
            .flat_map(move |x| (0..self.group_height).map(move |y| GroupId::new(x, y)))
    }

    /// The group itself, its 8 neighbours and any door-connected groups,
    /// restricted to the map and without duplicates
    pub fn adjacent_groups(&self, id: GroupId) -> Vec<GroupId> {
        let mut list = Vec::with_capacity(9);
        for dy in -1..=1 {
            for dx in -1..=1 {
                list.push(GroupId::new(id.x + dx, id.y + dy));
            }
        }
        if let Some(connected) = self.connected_groups.get(&id) {
            for group in connected {
                if !list.contains(group) {
                    list.push(*group);
                }
            }
        }
        list.retain(|group| self.is_valid_group(*group));
        list
    }

    pub fn checkpoint(&self, id: u32) -> Option<&Checkpoint> {
        self.checkpoints.get(&id)
    }

    pub fn random_starting_position(&self, rng: &mut impl Rng) -> Position {
        // Construction guarantees at least one starting area.
        let area = &self.starting_areas[rng.gen_range(0..self.starting_areas.len())];
        area.random_position(rng)
    }
}
