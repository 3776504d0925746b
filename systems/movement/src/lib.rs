#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic move-card projection used to preview committed maneuvers.
//!
//! A move card describes a maneuver at unit speed with full sails. The ship's
//! speed and sail deployment scale the card before it is projected from the
//! ship's bow, producing the pose the ledger will resolve once the move is
//! revealed.

use broadside_core::{
    Coord, Move, MoveCard, MoveCardView, SailPosition, ShipId, ShipSnapshot, ShipView,
};
use broadside_system_firing_geometry::{position_by_vector, stern_position};

/// Speed at which a move card applies unscaled.
pub const REFERENCE_SPEED: f32 = 10.0;

/// Fraction of a card travelled with lowered sails.
pub const LOWERED_SAIL_FACTOR: f32 = 0.7;

/// Bow position and heading of a ship after a maneuver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShipPose {
    /// Bow position.
    pub position: Coord,
    /// Heading in degrees, normalized to `[0, 360)`.
    pub rotation: f32,
}

/// Projected outcome of one selected or committed move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovePreview {
    /// Ship performing the maneuver.
    pub ship: ShipId,
    /// Card after speed and sail scaling.
    pub card: MoveCard,
    /// Pose after the maneuver.
    pub pose: ShipPose,
    /// Whether bow and stern remain inside the world.
    pub in_bounds: bool,
}

/// Fraction of a move card covered with the provided sail deployment.
#[must_use]
pub const fn sail_factor(sail: SailPosition) -> f32 {
    match sail {
        SailPosition::Full => 1.0,
        SailPosition::Lowered => LOWERED_SAIL_FACTOR,
        SailPosition::Torn => 0.0,
    }
}

/// Scales a move card by ship speed and sail deployment.
///
/// Speed stretches the distance only; sails scale distance, direction and
/// rotation alike, so torn sails leave the ship where it is.
#[must_use]
pub fn effective_card(card: &MoveCard, speed: f32, sail: SailPosition) -> MoveCard {
    let sail = sail_factor(sail);
    MoveCard {
        id: card.id,
        distance: card.distance * (speed / REFERENCE_SPEED) * sail,
        rotation: card.rotation * sail,
        direction: card.direction * sail,
    }
}

/// Pose of `ship` after performing `card`.
#[must_use]
pub fn final_pose(ship: &ShipSnapshot, card: &MoveCard) -> ShipPose {
    let card = effective_card(card, ship.speed, ship.sail);
    ShipPose {
        position: position_by_vector(ship.position, ship.rotation, card.distance, card.direction),
        rotation: (ship.rotation + card.rotation).rem_euclid(360.0),
    }
}

/// Reports whether bow and stern of a hull at `pose` lie inside the circular world.
#[must_use]
pub fn is_in_bounds(pose: &ShipPose, length: f32, world_size: f32) -> bool {
    let stern = stern_position(pose.position, pose.rotation, length);
    [pose.position, stern]
        .iter()
        .all(|point| point.distance(Coord::ORIGIN) <= world_size)
}

/// Applies a move to a ship snapshot, returning the moved ship.
#[must_use]
pub fn apply_move(ship: &ShipSnapshot, card: &MoveCard) -> ShipSnapshot {
    let pose = final_pose(ship, card);
    ShipSnapshot {
        position: pose.position,
        rotation: pose.rotation,
        ..*ship
    }
}

/// Previews every move whose ship and card still resolve, in move order.
#[must_use]
pub fn preview_moves(
    moves: &[Move],
    ships: &ShipView,
    cards: &MoveCardView,
    world_size: f32,
) -> Vec<MovePreview> {
    moves
        .iter()
        .filter_map(|entry| {
            let ship = ships.get(entry.ship)?;
            let card = cards.get(entry.card)?;
            let pose = final_pose(ship, card);
            Some(MovePreview {
                ship: entry.ship,
                card: effective_card(card, ship.speed, ship.sail),
                pose,
                in_bounds: is_in_bounds(&pose, ship.length, world_size),
            })
        })
        .collect()
}
