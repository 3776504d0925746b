use broadside_core::{
    Command, Coord, Move, MoveCard, MoveCardId, OwnerId, SailPosition, ShipId, ShipSnapshot,
};
use broadside_system_movement::{apply_move, final_pose, preview_moves};
use broadside_world::{self as world, query, World};

fn ship(id: u32, position: Coord, rotation: f32, sail: SailPosition) -> ShipSnapshot {
    ShipSnapshot {
        id: ShipId::new(id),
        owner: OwnerId::new(1),
        position,
        rotation,
        length: 10.0,
        speed: 10.0,
        health: 8,
        max_health: 8,
        sail,
        firepower: 0.0,
        on_fire: 0,
        damaged_cannons: 0,
    }
}

fn straight(id: u32, distance: f32) -> MoveCard {
    MoveCard {
        id: MoveCardId::new(id),
        distance,
        rotation: 0.0,
        direction: 0.0,
    }
}

#[test]
fn straight_move_advances_along_heading() {
    let east = ship(1, Coord::new(0.0, 0.0), 90.0, SailPosition::Full);
    let pose = final_pose(&east, &straight(1, 20.0));
    assert!((pose.position.x() - 20.0).abs() < 1e-3, "{pose:?}");
    assert!(pose.position.y().abs() < 1e-3, "{pose:?}");

    let moved = apply_move(&east, &straight(1, 20.0));
    assert_eq!(moved.id, east.id);
    assert_eq!(moved.health, east.health);
    assert_eq!(moved.position, pose.position);
}

#[test]
fn preview_skips_unresolvable_moves_and_flags_bounds() {
    let mut world = World::new();
    let mut events = Vec::new();
    for ship in [
        ship(1, Coord::new(0.0, 0.0), 0.0, SailPosition::Full),
        ship(2, Coord::new(0.0, 40.0), 0.0, SailPosition::Full),
    ] {
        world::apply(&mut world, Command::SyncShip { ship }, &mut events);
    }
    world::apply(
        &mut world,
        Command::SyncMoveCard {
            card: straight(1, 20.0),
        },
        &mut events,
    );

    let moves = [
        Move {
            ship: ShipId::new(1),
            card: MoveCardId::new(1),
        },
        Move {
            ship: ShipId::new(2),
            card: MoveCardId::new(1),
        },
        Move {
            ship: ShipId::new(3),
            card: MoveCardId::new(1),
        },
        Move {
            ship: ShipId::new(1),
            card: MoveCardId::new(9),
        },
    ];

    let previews = preview_moves(
        &moves,
        &query::ship_view(&world),
        &query::move_card_view(&world),
        50.0,
    );

    assert_eq!(previews.len(), 2);
    assert!(previews[0].in_bounds);
    assert!(!previews[1].in_bounds, "ship 2 sails past the world edge");
}
