//! Entity kinds shared between client and server.
//!
//! The numeric codes are part of the wire protocol and must not change.

/// Broad category of an entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindCategory {
    Player,
    Mob,
    Npc,
    Weapon,
    Armor,
    Object,
}

/// Every kind of entity that can exist in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EntityKind {
    Warrior = 1,

    // Mobs
    Rat = 2,
    Skeleton = 3,
    Goblin = 4,
    Ogre = 5,
    Spectre = 6,
    Crab = 7,
    Bat = 8,
    Wizard = 9,
    Eye = 10,
    Snake = 11,
    Skeleton2 = 12,
    Boss = 13,
    Deathknight = 14,

    // Armors
    Firefox = 20,
    ClothArmor = 21,
    LeatherArmor = 22,
    MailArmor = 23,
    PlateArmor = 24,
    RedArmor = 25,
    GoldenArmor = 26,

    // Objects
    Flask = 35,
    Burger = 36,
    Chest = 37,
    Firepotion = 38,
    Cake = 39,

    // NPCs
    Guard = 40,
    King = 41,
    Octocat = 42,
    VillageGirl = 43,
    Villager = 44,
    Priest = 45,
    Scientist = 46,
    Agent = 47,
    Rick = 48,
    Nyan = 49,
    Sorcerer = 50,
    BeachNpc = 51,
    ForestNpc = 52,
    DesertNpc = 53,
    LavaNpc = 54,
    Coder = 55,

    // Weapons
    Sword1 = 60,
    Sword2 = 61,
    RedSword = 62,
    GoldenSword = 63,
    Morningstar = 64,
    Axe = 65,
    BlueSword = 66,
}

/// Weapons from weakest to strongest
pub const RANKED_WEAPONS: [EntityKind; 7] = [
    EntityKind::Sword1,
    EntityKind::Sword2,
    EntityKind::Axe,
    EntityKind::Morningstar,
    EntityKind::BlueSword,
    EntityKind::RedSword,
    EntityKind::GoldenSword,
];

/// Armors from weakest to strongest (firefox is a temporary armor and unranked)
pub const RANKED_ARMORS: [EntityKind; 6] = [
    EntityKind::ClothArmor,
    EntityKind::LeatherArmor,
    EntityKind::MailArmor,
    EntityKind::PlateArmor,
    EntityKind::RedArmor,
    EntityKind::GoldenArmor,
];

/// Name, kind and category for every kind. Names match the map file format.
const KINDS: &[(&str, EntityKind, KindCategory)] = &[
    ("warrior", EntityKind::Warrior, KindCategory::Player),
    ("rat", EntityKind::Rat, KindCategory::Mob),
    ("skeleton", EntityKind::Skeleton, KindCategory::Mob),
    ("goblin", EntityKind::Goblin, KindCategory::Mob),
    ("ogre", EntityKind::Ogre, KindCategory::Mob),
    ("spectre", EntityKind::Spectre, KindCategory::Mob),
    ("deathknight", EntityKind::Deathknight, KindCategory::Mob),
    ("crab", EntityKind::Crab, KindCategory::Mob),
    ("snake", EntityKind::Snake, KindCategory::Mob),
    ("bat", EntityKind::Bat, KindCategory::Mob),
    ("wizard", EntityKind::Wizard, KindCategory::Mob),
    ("eye", EntityKind::Eye, KindCategory::Mob),
    ("skeleton2", EntityKind::Skeleton2, KindCategory::Mob),
    ("boss", EntityKind::Boss, KindCategory::Mob),
    ("sword1", EntityKind::Sword1, KindCategory::Weapon),
    ("sword2", EntityKind::Sword2, KindCategory::Weapon),
    ("axe", EntityKind::Axe, KindCategory::Weapon),
    ("redsword", EntityKind::RedSword, KindCategory::Weapon),
    ("bluesword", EntityKind::BlueSword, KindCategory::Weapon),
    ("goldensword", EntityKind::GoldenSword, KindCategory::Weapon),
    ("morningstar", EntityKind::Morningstar, KindCategory::Weapon),
    ("firefox", EntityKind::Firefox, KindCategory::Armor),
    ("clotharmor", EntityKind::ClothArmor, KindCategory::Armor),
    ("leatherarmor", EntityKind::LeatherArmor, KindCategory::Armor),
    ("mailarmor", EntityKind::MailArmor, KindCategory::Armor),
    ("platearmor", EntityKind::PlateArmor, KindCategory::Armor),
    ("redarmor", EntityKind::RedArmor, KindCategory::Armor),
    ("goldenarmor", EntityKind::GoldenArmor, KindCategory::Armor),
    ("flask", EntityKind::Flask, KindCategory::Object),
    ("cake", EntityKind::Cake, KindCategory::Object),
    ("burger", EntityKind::Burger, KindCategory::Object),
    ("chest", EntityKind::Chest, KindCategory::Object),
    ("firepotion", EntityKind::Firepotion, KindCategory::Object),
    ("guard", EntityKind::Guard, KindCategory::Npc),
    ("villagegirl", EntityKind::VillageGirl, KindCategory::Npc),
    ("villager", EntityKind::Villager, KindCategory::Npc),
    ("coder", EntityKind::Coder, KindCategory::Npc),
    ("scientist", EntityKind::Scientist, KindCategory::Npc),
    ("priest", EntityKind::Priest, KindCategory::Npc),
    ("king", EntityKind::King, KindCategory::Npc),
    ("rick", EntityKind::Rick, KindCategory::Npc),
    ("nyan", EntityKind::Nyan, KindCategory::Npc),
    ("sorcerer", EntityKind::Sorcerer, KindCategory::Npc),
    ("agent", EntityKind::Agent, KindCategory::Npc),
    ("octocat", EntityKind::Octocat, KindCategory::Npc),
    ("beachnpc", EntityKind::BeachNpc, KindCategory::Npc),
    ("forestnpc", EntityKind::ForestNpc, KindCategory::Npc),
    ("desertnpc", EntityKind::DesertNpc, KindCategory::Npc),
    ("lavanpc", EntityKind::LavaNpc, KindCategory::Npc),
];

impl EntityKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        KINDS
            .iter()
            .find(|(_, kind, _)| *kind as u8 == value)
            .map(|(_, kind, _)| *kind)
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Look up a kind by its map-file name (e.g. "goblin")
    pub fn from_name(name: &str) -> Option<Self> {
        KINDS
            .iter()
            .find(|(kind_name, _, _)| *kind_name == name)
            .map(|(_, kind, _)| *kind)
    }

    pub fn name(&self) -> &'static str {
        self.entry().0
    }

    pub fn category(&self) -> KindCategory {
        self.entry().2
    }

    fn entry(&self) -> &'static (&'static str, EntityKind, KindCategory) {
        // Every variant has exactly one row in KINDS.
        KINDS
            .iter()
            .find(|(_, kind, _)| kind == self)
            .unwrap_or(&KINDS[0])
    }

    pub fn is_player(&self) -> bool {
        self.category() == KindCategory::Player
    }

    pub fn is_mob(&self) -> bool {
        self.category() == KindCategory::Mob
    }

    pub fn is_npc(&self) -> bool {
        self.category() == KindCategory::Npc
    }

    pub fn is_armor(&self) -> bool {
        self.category() == KindCategory::Armor
    }

    pub fn is_weapon(&self) -> bool {
        self.category() == KindCategory::Weapon
    }

    pub fn is_chest(&self) -> bool {
        *self == EntityKind::Chest
    }

    /// Lootable items: weapons, armors and objects other than chests
    pub fn is_item(&self) -> bool {
        match self.category() {
            KindCategory::Weapon | KindCategory::Armor => true,
            KindCategory::Object => !self.is_chest(),
            _ => false,
        }
    }

    pub fn is_healing_item(&self) -> bool {
        matches!(self, EntityKind::Flask | EntityKind::Burger)
    }

    /// Position in [`RANKED_WEAPONS`], if ranked
    pub fn weapon_rank(&self) -> Option<usize> {
        RANKED_WEAPONS.iter().position(|kind| kind == self)
    }

    /// Position in [`RANKED_ARMORS`], if ranked
    pub fn armor_rank(&self) -> Option<usize> {
        RANKED_ARMORS.iter().position(|kind| kind == self)
    }
}

/// Facing direction of a character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Orientation {
    Up = 1,
    Down = 2,
    Left = 3,
    Right = 4,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Left,
        Orientation::Right,
        Orientation::Up,
        Orientation::Down,
    ];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}
