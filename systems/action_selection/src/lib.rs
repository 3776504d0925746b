#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-ship action and move selection for the local player.
//!
//! Player intents are validated against the current phase and the ship's
//! local state before they become store commands. The system also reacts to
//! store events to invalidate selections that no longer make sense (a claimed
//! crate, a sunk or captured ship) and encodes the final action batch for the
//! transaction collaborator.

use broadside_core::{
    ActionSlot, ActionType, CannonId, Command, CrateId, EncodedAction, Event, GameId, MoveCardId,
    Phase, SailPosition, SelectedActions, ShipId, ShipSnapshot, SpecialEntity, Submission,
    SubmissionKind, TxId, TxStatus,
};
use broadside_system_firing_geometry::targeted_ships;
use broadside_world::{query, World};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix of the authoritative system identifiers hashed into action batches.
pub const SYSTEM_NAMESPACE: &str = "broadside.system";

/// Player input routed through the selection system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionIntent {
    /// Toggle an action that needs no cannon or crate.
    ToggleSimple {
        /// Acting ship.
        ship: ShipId,
        /// Action to toggle.
        kind: ActionType,
    },
    /// Toggle loading or firing one cannon.
    ToggleCannon {
        /// Acting ship.
        ship: ShipId,
        /// Either [`ActionType::Load`] or [`ActionType::Fire`].
        kind: ActionType,
        /// Cannon mounted on the acting ship.
        cannon: CannonId,
    },
    /// Toggle claiming a crate.
    ToggleCrate {
        /// Acting ship.
        ship: ShipId,
        /// Crate to claim.
        crate_id: CrateId,
    },
    /// Choose the move a ship will commit to.
    SelectMove {
        /// Moving ship.
        ship: ShipId,
        /// Chosen card.
        card: MoveCardId,
    },
    /// Drop the move chosen for a ship.
    ClearMove {
        /// Moving ship.
        ship: ShipId,
    },
}

impl SelectionIntent {
    fn ship(&self) -> ShipId {
        match *self {
            Self::ToggleSimple { ship, .. }
            | Self::ToggleCannon { ship, .. }
            | Self::ToggleCrate { ship, .. }
            | Self::SelectMove { ship, .. }
            | Self::ClearMove { ship } => ship,
        }
    }

    fn required_phase(&self) -> Phase {
        match self {
            Self::SelectMove { .. } | Self::ClearMove { .. } => Phase::Commit,
            _ => Phase::Action,
        }
    }
}

/// Reasons a selection or submission is aborted before reaching the store.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// The game has not started or is not configured.
    #[error("the game is not running")]
    NotRunning,
    /// The intent is only legal in another phase.
    #[error("intent requires the {required:?} phase but the clock reads {current:?}")]
    WrongPhase {
        /// Phase the intent needs.
        required: Phase,
        /// Phase currently active.
        current: Phase,
    },
    /// The ship is missing, sunk or owned by someone else.
    #[error("ship {0:?} is not a live ship of the local player")]
    ShipNotControlled(ShipId),
    /// The ship's state forbids the action.
    #[error("{kind:?} is not possible for ship {ship:?}")]
    ActionNotPossible {
        /// Rejected action.
        kind: ActionType,
        /// Acting ship.
        ship: ShipId,
    },
    /// The cannon does not exist or is mounted on another ship.
    #[error("cannon {cannon:?} is not mounted on ship {ship:?}")]
    CannonNotMounted {
        /// Requested cannon.
        cannon: CannonId,
        /// Acting ship.
        ship: ShipId,
    },
    /// The cannon cannot perform the requested action in its current state.
    #[error("cannon {cannon:?} cannot {kind:?} right now")]
    CannonNotReady {
        /// Requested cannon.
        cannon: CannonId,
        /// Requested action.
        kind: ActionType,
    },
    /// The crate no longer exists.
    #[error("crate {0:?} no longer exists")]
    UnknownCrate(CrateId),
    /// The move card is not part of the catalogue.
    #[error("move card {0:?} is not in the catalogue")]
    UnknownMoveCard(MoveCardId),
    /// A submission was attempted with nothing selected.
    #[error("no actions selected")]
    NoActions,
    /// Action metadata could not be encoded.
    #[error("failed to encode action metadata")]
    Encoding(#[from] bincode::Error),
}

/// Reports whether `kind` may be toggled through the simple entry point for `ship`.
///
/// Cannon and crate actions have dedicated entry points and are rejected here.
#[must_use]
pub fn check_action_possible(kind: ActionType, ship: &ShipSnapshot) -> bool {
    match kind {
        ActionType::ExtinguishFire => ship.on_fire > 0,
        ActionType::RepairCannons => ship.damaged_cannons > 0,
        ActionType::LowerSail => ship.sail == SailPosition::Full,
        ActionType::RaiseSail => ship.sail == SailPosition::Lowered,
        ActionType::RepairSail => ship.sail == SailPosition::Torn,
        ActionType::None | ActionType::Load | ActionType::Fire | ActionType::ClaimCrate => false,
    }
}

/// Wire-level variant of [`check_action_possible`]; unknown indices are always rejected.
#[must_use]
pub fn check_action_index_possible(index: u8, ship: &ShipSnapshot) -> bool {
    ActionType::try_from(index).is_ok_and(|kind| check_action_possible(kind, ship))
}

/// Identifier of the authoritative system resolving `kind`; all zeroes for an empty slot.
#[must_use]
pub fn action_system_hash(kind: ActionType) -> [u8; 32] {
    if kind == ActionType::None {
        return [0; 32];
    }
    let mut hasher = Sha256::new();
    hasher.update(SYSTEM_NAMESPACE.as_bytes());
    hasher.update(b".");
    hasher.update(kind.name().as_bytes());
    hasher.finalize().into()
}

/// Encodes one ship's selection into the resolver's batch element format.
///
/// Load and ClaimCrate carry their entity id, Fire carries the cannon and the
/// ships currently inside its arc, every other slot carries no metadata.
pub fn encode_action(
    world: &World,
    ship: ShipId,
    actions: &SelectedActions,
) -> Result<EncodedAction, SelectionError> {
    let ships = query::ship_view(world);
    let cannons = query::cannon_view(world);

    let mut action_hashes = [[0; 32]; 2];
    let mut metadata = [Vec::new(), Vec::new()];
    for (index, slot) in actions.slots().iter().enumerate() {
        action_hashes[index] = action_system_hash(slot.kind);
        metadata[index] = match (slot.kind, slot.special) {
            (ActionType::Fire, Some(SpecialEntity::Cannon(cannon))) => {
                let targets = targeted_ships(cannon, &ships, &cannons);
                bincode::serialize(&(cannon, targets))?
            }
            (ActionType::Load, Some(SpecialEntity::Cannon(cannon))) => {
                bincode::serialize(&cannon)?
            }
            (ActionType::ClaimCrate, Some(SpecialEntity::Crate(crate_id))) => {
                bincode::serialize(&crate_id)?
            }
            _ => Vec::new(),
        };
    }

    Ok(EncodedAction {
        ship,
        action_hashes,
        metadata,
    })
}

/// Tracks the action submission of the current turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubmissionState {
    Idle,
    Awaiting { turn: u32 },
    InFlight { tx: TxId, turn: u32 },
}

/// Selection system that validates intents and submits the action batch.
#[derive(Debug)]
pub struct ActionSelection {
    submission: SubmissionState,
}

impl Default for ActionSelection {
    fn default() -> Self {
        Self {
            submission: SubmissionState::Idle,
        }
    }
}

impl ActionSelection {
    /// Creates a selection system with no submission in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether an action batch is waiting for confirmation.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submission != SubmissionState::Idle
    }

    /// Validates a player intent and emits the resulting store commands.
    ///
    /// `phase` is the phase read from the display clock; `None` means the game
    /// is not running yet.
    pub fn apply_intent(
        &mut self,
        intent: SelectionIntent,
        phase: Option<Phase>,
        world: &World,
        out: &mut Vec<Command>,
    ) -> Result<(), SelectionError> {
        let current = phase.ok_or(SelectionError::NotRunning)?;
        let required = intent.required_phase();
        if current != required {
            return Err(SelectionError::WrongPhase { required, current });
        }

        let ship_id = intent.ship();
        let ship = query::ship(world, ship_id)
            .filter(|_| query::is_local_ship(world, ship_id))
            .ok_or(SelectionError::ShipNotControlled(ship_id))?;

        match intent {
            SelectionIntent::ToggleSimple { ship: _, kind } => {
                let entity_action = matches!(
                    kind,
                    ActionType::None | ActionType::Load | ActionType::Fire | ActionType::ClaimCrate
                );
                let mut actions = query::selected_actions(world, ship_id);
                let possible = actions.contains(kind) || check_action_possible(kind, ship);
                if entity_action || !possible {
                    return Err(SelectionError::ActionNotPossible {
                        kind,
                        ship: ship_id,
                    });
                }
                if actions.toggle_simple(kind) {
                    out.push(Command::SetSelectedActions {
                        ship: ship_id,
                        actions,
                    });
                }
            }
            SelectionIntent::ToggleCannon {
                ship: _,
                kind,
                cannon,
            } => toggle_cannon(world, ship_id, kind, cannon, out)?,
            SelectionIntent::ToggleCrate { ship: _, crate_id } => {
                let mut actions = query::selected_actions(world, ship_id);
                let selected = actions.references(SpecialEntity::Crate(crate_id));
                if !selected && query::crate_view(world).get(crate_id).is_none() {
                    return Err(SelectionError::UnknownCrate(crate_id));
                }
                if actions.toggle_crate(crate_id) {
                    out.push(Command::SetSelectedActions {
                        ship: ship_id,
                        actions,
                    });
                }
            }
            SelectionIntent::SelectMove { ship: _, card } => {
                if query::move_card(world, card).is_none() {
                    return Err(SelectionError::UnknownMoveCard(card));
                }
                out.push(Command::SetSelectedMove {
                    ship: ship_id,
                    card: Some(card),
                });
            }
            SelectionIntent::ClearMove { ship: _ } => {
                out.push(Command::SetSelectedMove {
                    ship: ship_id,
                    card: None,
                });
            }
        }

        out.push(Command::SelectShip {
            ship: Some(ship_id),
        });
        Ok(())
    }

    /// Reacts to store events: invalidates stale selections and tracks the action transaction.
    pub fn handle(&mut self, events: &[Event], world: &World, out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::CrateRemoved { crate_id } => {
                    clear_references(world, SpecialEntity::Crate(*crate_id), out);
                }
                Event::CannonRemoved { cannon } => {
                    clear_references(world, SpecialEntity::Cannon(*cannon), out);
                }
                Event::ShipSunk { ship } | Event::ShipOwnershipChanged { ship, .. } => {
                    clear_ship(world, *ship, out);
                }
                Event::SubmissionRequested {
                    tx,
                    kind: SubmissionKind::Actions,
                } => {
                    if let SubmissionState::Awaiting { turn } = self.submission {
                        self.submission = SubmissionState::InFlight { tx: *tx, turn };
                    }
                }
                Event::TransactionStatusChanged {
                    tx,
                    kind: SubmissionKind::Actions,
                    status,
                } => self.on_transaction(*tx, *status, out),
                _ => {}
            }
        }
    }

    fn on_transaction(&mut self, tx: TxId, status: TxStatus, out: &mut Vec<Command>) {
        let SubmissionState::InFlight { tx: tracked, turn } = self.submission else {
            return;
        };
        if tracked != tx {
            return;
        }
        match status {
            TxStatus::Complete => {
                log::info!("actions for turn {turn} confirmed");
                out.push(Command::RecordLastAction { turn });
                self.submission = SubmissionState::Idle;
            }
            TxStatus::Failed => {
                log::warn!("action submission for turn {turn} failed");
                self.submission = SubmissionState::Idle;
            }
            _ => {}
        }
    }

    /// Encodes every live local ship's selection and hands the batch to the collaborator.
    ///
    /// An empty batch is rejected unless `force` is set. Returns the number of
    /// encoded ships.
    pub fn submit_actions(
        &mut self,
        world: &World,
        turn: u32,
        force: bool,
        out: &mut Vec<Command>,
    ) -> Result<usize, SelectionError> {
        let game: GameId = query::game_id(world).ok_or(SelectionError::NotRunning)?;
        let selections = query::player_ships_with_actions(world);
        if selections.is_empty() && !force {
            log::debug!("skipping action submission for turn {turn}: nothing selected");
            return Err(SelectionError::NoActions);
        }

        let actions = selections
            .iter()
            .map(|(ship, selection)| encode_action(world, *ship, selection))
            .collect::<Result<Vec<_>, _>>()?;
        let count = actions.len();

        log::info!("submitting {count} ship action(s) for turn {turn}");
        out.push(Command::Submit {
            submission: Submission::Actions { game, actions },
        });
        self.submission = SubmissionState::Awaiting { turn };
        Ok(count)
    }
}

fn toggle_cannon(
    world: &World,
    ship: ShipId,
    kind: ActionType,
    cannon: CannonId,
    out: &mut Vec<Command>,
) -> Result<(), SelectionError> {
    if !matches!(kind, ActionType::Load | ActionType::Fire) {
        return Err(SelectionError::ActionNotPossible { kind, ship });
    }
    let snapshot = query::cannon(world, cannon)
        .filter(|snapshot| snapshot.ship == ship)
        .ok_or(SelectionError::CannonNotMounted { cannon, ship })?;

    let mut actions = query::selected_actions(world, ship);
    let special = SpecialEntity::Cannon(cannon);
    let deselecting = actions
        .slots()
        .iter()
        .any(|slot| slot.special == Some(special));
    if !deselecting {
        let ready = match kind {
            ActionType::Load => !snapshot.loaded,
            _ => snapshot.loaded,
        };
        if !ready || query::is_cannon_executed(world, cannon) {
            return Err(SelectionError::CannonNotReady { cannon, kind });
        }
    }

    if !actions.toggle_cannon(kind, cannon) {
        return Ok(());
    }
    out.push(Command::SetSelectedActions { ship, actions });

    let firing = actions.slots().iter().any(|slot| {
        *slot
            == ActionSlot {
                kind: ActionType::Fire,
                special: Some(special),
            }
    });
    let targets = if firing {
        targeted_ships(cannon, &query::ship_view(world), &query::cannon_view(world))
    } else {
        Vec::new()
    };
    out.push(Command::SetTargeted { ships: targets });
    Ok(())
}

fn clear_references(world: &World, special: SpecialEntity, out: &mut Vec<Command>) {
    for (ship, mut actions) in query::selected_actions_view(world).iter() {
        if actions.clear_special(special) {
            log::debug!("cleared {special:?} from the selection of ship {ship:?}");
            out.push(Command::SetSelectedActions { ship, actions });
        }
    }
}

fn clear_ship(world: &World, ship: ShipId, out: &mut Vec<Command>) {
    if !query::selected_actions(world, ship).is_empty() {
        out.push(Command::SetSelectedActions {
            ship,
            actions: SelectedActions::default(),
        });
    }
    if query::selected_move(world, ship).is_some() {
        out.push(Command::SetSelectedMove { ship, card: None });
    }
}
