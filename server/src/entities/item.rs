//! Items lying on the ground, including chests.

use rand::Rng;

use realm_shared::EntityKind;

#[derive(Debug, Clone, Default)]
pub struct Item {
    /// Permanent fixture that respawns after being picked up or opened
    pub is_static: bool,
    /// One-shot item produced by opening a chest
    pub is_from_chest: bool,
    /// Possible contents, for chests
    pub chest_items: Vec<EntityKind>,
}

impl Item {
    pub fn chest(items: Vec<EntityKind>) -> Self {
        Self {
            chest_items: items,
            ..Self::default()
        }
    }

    pub fn random_chest_item(&self, rng: &mut impl Rng) -> Option<EntityKind> {
        if self.chest_items.is_empty() {
            return None;
        }
        Some(self.chest_items[rng.gen_range(0..self.chest_items.len())])
    }
}
