//! Combat formulas.

use rand::Rng;

/// Damage dealt by `weapon_level` against `armor_level`.
///
/// A non-positive result is replaced by a small random chip in `0..=3`.
pub fn dmg(weapon_level: i32, armor_level: i32, rng: &mut impl Rng) -> i32 {
    let dealt = weapon_level * rng.gen_range(5..=10);
    let absorbed = armor_level * rng.gen_range(1..=3);
    let damage = dealt - absorbed;

    if damage <= 0 {
        rng.gen_range(0..=3)
    } else {
        damage
    }
}

/// Max hit points of a player wearing armor of `armor_level`
pub fn hp(armor_level: i32) -> i32 {
    80 + (armor_level - 1) * 30
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_damage_never_negative() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10_000 {
            let damage = dmg(1, 1, &mut rng);
            assert!((0..=9).contains(&damage), "{}", damage);
        }
    }

    #[test]
    fn test_damage_floor_when_fully_absorbed() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1_000 {
            // Level 0 weapons never out-damage armor.
            let damage = dmg(0, 3, &mut rng);
            assert!((0..=3).contains(&damage));
        }
    }

    #[test]
    fn test_hp_by_armor_level() {
        assert_eq!(hp(1), 80);
        assert_eq!(hp(2), 110);
        assert_eq!(hp(6), 230);
    }
}
