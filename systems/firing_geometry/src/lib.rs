#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Firing-arc geometry for ship-mounted cannons.
//!
//! Headings are nautical bearings in degrees: 0° points along +y and angles
//! grow clockwise. A ship's position is its bow; the stern lies `length`
//! units behind it. Each cannon reaches a quadrilateral anchored on the hull:
//! broadside cannons sweep the whole hull side, pivot cannons project a narrow
//! wedge from the bow or stern.

use broadside_core::{
    CannonFiringArea, CannonId, CannonSnapshot, CannonView, Coord, FiringArea, ShipId,
    ShipSnapshot, ShipView,
};
use glam::Vec2;

/// Half-width of every firing arc, in degrees.
pub const ARC_HALF_WIDTH_DEG: f32 = 10.0;

/// Maximum distance from 90° or 270° at which a cannon still counts as broadside.
pub const BROADSIDE_TOLERANCE_DEG: f32 = 10.0;

const DEGENERATE_AREA: f32 = 1e-6;

/// Projects `origin` by `distance` along `rotation + direction`.
#[must_use]
pub fn position_by_vector(origin: Coord, rotation: f32, distance: f32, direction: f32) -> Coord {
    from_vec(to_vec(origin) + heading(rotation + direction) * distance)
}

/// Point `length` units behind `bow` along the reverse heading.
#[must_use]
pub fn stern_position(bow: Coord, rotation: f32, length: f32) -> Coord {
    position_by_vector(bow, rotation, length, 180.0)
}

/// Point halfway between `a` and `b`.
#[must_use]
pub fn midpoint(a: Coord, b: Coord) -> Coord {
    from_vec(to_vec(a).lerp(to_vec(b), 0.5))
}

/// Bow-to-stern segment of a ship.
#[must_use]
pub fn hull_segment(ship: &ShipSnapshot) -> [Coord; 2] {
    [
        ship.position,
        stern_position(ship.position, ship.rotation, ship.length),
    ]
}

/// Midpoint of a ship's hull.
#[must_use]
pub fn hull_midpoint(ship: &ShipSnapshot) -> Coord {
    let [bow, stern] = hull_segment(ship);
    midpoint(bow, stern)
}

/// Reports whether a cannon mounted at `rotation` fires over the side of the hull.
#[must_use]
pub fn is_broadside(rotation: f32) -> bool {
    let rotation = normalize(rotation);
    (rotation - 90.0).abs() <= BROADSIDE_TOLERANCE_DEG
        || (rotation - 270.0).abs() <= BROADSIDE_TOLERANCE_DEG
}

/// Quadrilateral reachable by one cannon.
///
/// Broadside arcs are `[bow, stern, stern corner, bow corner]` and lean 10°
/// towards bow and stern respectively, so the starboard arc (80°/100°) and
/// the port arc (280°/260°) mirror each other across the hull centerline.
/// Pivot arcs start and end at the bow for forward cannons and at the stern
/// for aft cannons. A range of zero yields a degenerate polygon.
#[must_use]
pub fn firing_area(
    ship_position: Coord,
    range: f32,
    ship_length: f32,
    ship_rotation: f32,
    cannon_rotation: f32,
) -> FiringArea {
    let bow = ship_position;
    let stern = stern_position(bow, ship_rotation, ship_length);

    if is_broadside(cannon_rotation) {
        let spread = if normalize(cannon_rotation) < 180.0 {
            ARC_HALF_WIDTH_DEG
        } else {
            -ARC_HALF_WIDTH_DEG
        };
        let aim = ship_rotation + cannon_rotation;
        return FiringArea {
            corners: [
                bow,
                stern,
                position_by_vector(stern, aim, range, spread),
                position_by_vector(bow, aim, range, -spread),
            ],
        };
    }

    let facing_forward = heading(cannon_rotation).y >= 0.0;
    let pivot = if facing_forward { bow } else { stern };
    let aim = ship_rotation + cannon_rotation;
    FiringArea {
        corners: [
            pivot,
            position_by_vector(pivot, aim, range, -ARC_HALF_WIDTH_DEG),
            position_by_vector(pivot, aim, range, ARC_HALF_WIDTH_DEG),
            pivot,
        ],
    }
}

/// Firing area of one cannon mounted on the provided ship.
#[must_use]
pub fn cannon_firing_area(ship: &ShipSnapshot, cannon: &CannonSnapshot) -> FiringArea {
    firing_area(
        ship.position,
        cannon.range,
        ship.length,
        ship.rotation,
        cannon.rotation,
    )
}

/// Reports whether the target segment touches the firing area.
///
/// A hit is either endpoint lying inside the polygon or the segment crossing
/// one of its edges. Polygons with no area never contain anything.
#[must_use]
pub fn in_firing_area(target: [Coord; 2], area: &FiringArea) -> bool {
    let polygon = area.corners.map(to_vec);
    if signed_area(&polygon).abs() <= DEGENERATE_AREA {
        return false;
    }

    let [start, end] = target.map(to_vec);
    if contains(&polygon, start) || contains(&polygon, end) {
        return true;
    }

    (0..polygon.len()).any(|index| {
        let next = polygon[(index + 1) % polygon.len()];
        segments_intersect(start, end, polygon[index], next)
    })
}

/// Firing areas of every cannon mounted on `ship`, in cannon order.
///
/// Missing and sunk ships have no firing areas.
#[must_use]
pub fn firing_areas_for_ship(
    ship: ShipId,
    ships: &ShipView,
    cannons: &CannonView,
) -> Vec<CannonFiringArea> {
    let Some(snapshot) = ships.get(ship).filter(|snapshot| !snapshot.is_sunk()) else {
        return Vec::new();
    };

    cannons
        .for_ship(ship)
        .map(|cannon| CannonFiringArea {
            cannon: cannon.id,
            loaded: cannon.loaded,
            area: cannon_firing_area(snapshot, cannon),
        })
        .collect()
}

/// Ships whose hull currently touches the firing arc of `cannon`.
///
/// The firing ship, its fleet mates and sunk ships are never targeted. A
/// cannon or firing ship that no longer resolves yields no targets.
#[must_use]
pub fn targeted_ships(cannon: CannonId, ships: &ShipView, cannons: &CannonView) -> Vec<ShipId> {
    let Some(cannon) = cannons.get(cannon) else {
        return Vec::new();
    };
    let Some(firer) = ships.get(cannon.ship).filter(|ship| !ship.is_sunk()) else {
        return Vec::new();
    };

    let area = cannon_firing_area(firer, cannon);
    ships
        .iter()
        .filter(|target| target.id != firer.id && target.owner != firer.owner)
        .filter(|target| !target.is_sunk())
        .filter(|target| in_firing_area(hull_segment(target), &area))
        .map(|target| target.id)
        .collect()
}

fn heading(degrees: f32) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(sin, cos)
}

fn normalize(degrees: f32) -> f32 {
    degrees.rem_euclid(360.0)
}

fn to_vec(coord: Coord) -> Vec2 {
    Vec2::new(coord.x(), coord.y())
}

fn from_vec(vector: Vec2) -> Coord {
    Coord::new(vector.x, vector.y)
}

fn signed_area(polygon: &[Vec2; 4]) -> f32 {
    let twice: f32 = (0..polygon.len())
        .map(|index| polygon[index].perp_dot(polygon[(index + 1) % polygon.len()]))
        .sum();
    twice * 0.5
}

fn contains(polygon: &[Vec2; 4], point: Vec2) -> bool {
    let mut inside = false;
    let mut previous = polygon[polygon.len() - 1];
    for &current in polygon {
        if (current.y > point.y) != (previous.y > point.y) {
            let crossing =
                (previous.x - current.x) * (point.y - current.y) / (previous.y - current.y)
                    + current.x;
            if point.x < crossing {
                inside = !inside;
            }
        }
        previous = current;
    }
    inside
}

fn orientation(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

fn within_bounds(a: Vec2, b: Vec2, point: Vec2) -> bool {
    point.x >= a.x.min(b.x)
        && point.x <= a.x.max(b.x)
        && point.y >= a.y.min(b.y)
        && point.y <= a.y.max(b.y)
}

fn segments_intersect(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if d1 * d2 < 0.0 && d3 * d4 < 0.0 {
        return true;
    }

    (d1 == 0.0 && within_bounds(q1, q2, p1))
        || (d2 == 0.0 && within_bounds(q1, q2, p2))
        || (d3 == 0.0 && within_bounds(p1, p2, q1))
        || (d4 == 0.0 && within_bounds(p1, p2, q2))
}
