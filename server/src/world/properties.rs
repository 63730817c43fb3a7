//! Per-kind combat stats and drop tables.
//!
//! Built once at startup and shared read-only between worlds.

use std::collections::HashMap;
use std::time::Duration;

use realm_shared::EntityKind;

/// Default delay between two attacks of the same mob
pub const DEFAULT_ATTACK_RATE: Duration = Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct MobProperties {
    pub hit_points: i32,
    pub armor_level: i32,
    pub weapon_level: i32,
    /// (item, weight percent), rolled in this order
    pub drops: Vec<(EntityKind, u32)>,
    pub attack_rate: Duration,
}

impl MobProperties {
    fn new(hit_points: i32, armor_level: i32, weapon_level: i32, drops: &[(EntityKind, u32)]) -> Self {
        Self {
            hit_points,
            armor_level,
            weapon_level,
            drops: drops.to_vec(),
            attack_rate: DEFAULT_ATTACK_RATE,
        }
    }

    fn with_attack_rate(mut self, rate: Duration) -> Self {
        self.attack_rate = rate;
        self
    }

    /// First-match weighted roll. `roll` is uniform in `0..100`.
    pub fn drop_for_roll(&self, roll: u32) -> Option<EntityKind> {
        let mut cumulative = 0;
        for (kind, weight) in &self.drops {
            cumulative += weight;
            if roll <= cumulative {
                return Some(*kind);
            }
        }
        None
    }
}

/// Immutable table of mob properties keyed by kind
#[derive(Debug, Clone)]
pub struct Properties {
    mobs: HashMap<EntityKind, MobProperties>,
}

impl Properties {
    /// The stock table for every mob kind
    pub fn standard() -> Self {
        use EntityKind::*;

        let mobs = [
            (Rat, MobProperties::new(25, 1, 1, &[(Flask, 40), (Burger, 10), (Firepotion, 5)])),
            (
                Skeleton,
                MobProperties::new(
                    110,
                    2,
                    2,
                    &[(Flask, 40), (MailArmor, 10), (Axe, 20), (Firepotion, 5)],
                ),
            ),
            (
                Goblin,
                MobProperties::new(
                    90,
                    2,
                    1,
                    &[(Flask, 50), (LeatherArmor, 20), (Axe, 10), (Firepotion, 5)],
                ),
            ),
            (
                Ogre,
                MobProperties::new(
                    200,
                    3,
                    2,
                    &[(Burger, 10), (Flask, 50), (PlateArmor, 20), (Morningstar, 20), (Firepotion, 5)],
                ),
            ),
            (
                Spectre,
                MobProperties::new(
                    250,
                    2,
                    4,
                    &[(Flask, 30), (RedArmor, 40), (RedSword, 30), (Firepotion, 5)],
                ),
            ),
            (Deathknight, MobProperties::new(250, 3, 3, &[(Burger, 95), (Firepotion, 5)])),
            (
                Crab,
                MobProperties::new(
                    60,
                    2,
                    1,
                    &[(Flask, 50), (Axe, 20), (LeatherArmor, 10), (Firepotion, 5)],
                ),
            ),
            (
                Snake,
                MobProperties::new(
                    150,
                    3,
                    2,
                    &[(Flask, 50), (MailArmor, 10), (Morningstar, 10), (Firepotion, 5)],
                ),
            ),
            (
                Skeleton2,
                MobProperties::new(
                    200,
                    3,
                    3,
                    &[(Flask, 60), (PlateArmor, 15), (BlueSword, 15), (Firepotion, 5)],
                ),
            ),
            (
                Eye,
                MobProperties::new(
                    200,
                    3,
                    3,
                    &[(Flask, 50), (RedArmor, 20), (RedSword, 10), (Firepotion, 5)],
                ),
            ),
            (Bat, MobProperties::new(80, 2, 1, &[(Flask, 50), (Axe, 10), (Firepotion, 5)])),
            (
                Wizard,
                MobProperties::new(100, 2, 6, &[(Flask, 50), (PlateArmor, 20), (Firepotion, 5)]),
            ),
            (
                Boss,
                MobProperties::new(700, 6, 7, &[(GoldenSword, 100)])
                    .with_attack_rate(Duration::from_millis(2000)),
            ),
        ];

        Self {
            mobs: mobs.into_iter().collect(),
        }
    }

    pub fn mob(&self, kind: EntityKind) -> Option<&MobProperties> {
        self.mobs.get(&kind)
    }
}

/// Level of a player armor; unranked armors count as level 0
pub fn armor_level(kind: EntityKind) -> i32 {
    kind.armor_rank().map(|rank| rank as i32 + 1).unwrap_or(0)
}

/// Level of a player weapon; unranked weapons count as level 0
pub fn weapon_level(kind: EntityKind) -> i32 {
    kind.weapon_rank().map(|rank| rank as i32 + 1).unwrap_or(0)
}
