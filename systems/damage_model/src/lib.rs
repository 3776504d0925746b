#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Hit-probability bands for cannon fire.

use broadside_core::{CannonId, CannonView, ShipId, ShipView};
use broadside_system_firing_geometry::hull_midpoint;

/// Hit chance, in percent, at point-blank range with a firepower of ten.
pub const BASE_HIT_PERCENT: f64 = 25.0;

/// Exponential decay applied per tile of distance.
pub const DISTANCE_DECAY: f64 = 0.008;

/// Multiplier applied to the base chance for a two-damage hit.
pub const TWO_DAMAGE_MULTIPLIER: f64 = 1.7;

/// Multiplier applied to the base chance for a one-damage hit.
pub const ONE_DAMAGE_MULTIPLIER: f64 = 6.5;

/// Chance, in percent, of a hit dealing at least the named damage.
///
/// The bands are nested: the heaviest hit is the least likely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DamageLikelihood {
    /// Chance of a three-damage hit; the base chance.
    pub three_damage: u8,
    /// Chance of a hit dealing two or more.
    pub two_damage: u8,
    /// Chance of any hit at all.
    pub one_damage: u8,
}

impl DamageLikelihood {
    /// Derives the three bands from a base chance.
    #[must_use]
    pub fn from_base(base: f64) -> Self {
        Self {
            three_damage: percent(base),
            two_damage: percent(base * TWO_DAMAGE_MULTIPLIER),
            one_damage: percent(base * ONE_DAMAGE_MULTIPLIER),
        }
    }
}

/// Base hit chance in percent.
///
/// Decays exponentially with distance and grows linearly with firepower.
#[must_use]
pub fn base_hit_chance(distance: f64, firepower: f64) -> f64 {
    BASE_HIT_PERCENT * (-DISTANCE_DECAY * distance).exp() * firepower / 10.0
}

/// Likelihood that `cannon` damages `target` at current positions.
///
/// Distance is measured between hull midpoints and firepower is the cannon's
/// own plus the firing ship's hull bonus. Unresolvable entities yield `None`.
#[must_use]
pub fn damage_likelihood(
    cannon: CannonId,
    target: ShipId,
    ships: &ShipView,
    cannons: &CannonView,
) -> Option<DamageLikelihood> {
    let cannon = cannons.get(cannon)?;
    let firer = ships.get(cannon.ship)?;
    let target = ships.get(target)?;

    let distance = hull_midpoint(firer).distance(hull_midpoint(target));
    let firepower = f64::from(cannon.firepower) + f64::from(firer.firepower);
    Some(DamageLikelihood::from_base(base_hit_chance(
        f64::from(distance),
        firepower,
    )))
}

fn percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_blank_base_chance_scales_with_firepower() {
        assert!((base_hit_chance(0.0, 10.0) - 25.0).abs() < 1e-9);
        assert!((base_hit_chance(0.0, 20.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn bands_apply_multipliers_and_clamp() {
        let likelihood = DamageLikelihood::from_base(10.0);
        assert_eq!(likelihood.three_damage, 10);
        assert_eq!(likelihood.two_damage, 17);
        assert_eq!(likelihood.one_damage, 65);

        let saturated = DamageLikelihood::from_base(40.0);
        assert_eq!(saturated.one_damage, 100);
    }

    #[test]
    fn negative_base_clamps_to_zero() {
        let likelihood = DamageLikelihood::from_base(-3.0);
        assert_eq!(likelihood.three_damage, 0);
        assert_eq!(likelihood.one_damage, 0);
    }
}
