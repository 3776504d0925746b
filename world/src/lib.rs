#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Local entity store for the Broadside client.
//!
//! The world mirrors the authoritative ledger state (ships, cannons, move
//! cards, crates) alongside the local player's transient intent (selections,
//! projections, commitment, tracked transactions). It is mutated exclusively
//! through [`apply`] and read through the [`query`] module. Every distinct value
//! transition produces exactly one [`Event`].

use std::collections::{BTreeMap, BTreeSet};

use broadside_core::{
    ActionType, CannonFiringArea, CannonId, CannonSnapshot, Command, Commitment, CrateId,
    CrateSnapshot, Event, GameConfig, GameId, HoveredAction, Move, MoveCard, MoveCardId, OwnerId,
    SelectedActions, ShipId, ShipSnapshot, SpecialEntity, Submission, TxId, TxStatus,
};

/// Settled transactions kept for lookup; older ones are forgotten.
pub const SETTLED_TRANSACTION_HISTORY: usize = 16;

/// Represents the local Broadside entity store.
#[derive(Debug, Default)]
pub struct World {
    game: Option<GameId>,
    config: Option<GameConfig>,
    local_player: Option<OwnerId>,
    ships: BTreeMap<ShipId, ShipSnapshot>,
    cannons: BTreeMap<CannonId, CannonSnapshot>,
    move_cards: BTreeMap<MoveCardId, MoveCard>,
    crates: BTreeMap<CrateId, CrateSnapshot>,
    selected_ship: Option<ShipId>,
    selected_moves: BTreeMap<ShipId, MoveCardId>,
    selected_actions: BTreeMap<ShipId, SelectedActions>,
    hovered_action: Option<HoveredAction>,
    executed_actions: BTreeMap<ShipId, Vec<ActionType>>,
    executed_cannons: BTreeSet<CannonId>,
    targeted: Vec<ShipId>,
    firing_areas: Option<(ShipId, Vec<CannonFiringArea>)>,
    commitment: Option<Commitment>,
    committed_moves: BTreeMap<ShipId, MoveCardId>,
    last_action_turn: Option<u32>,
    transactions: BTreeMap<TxId, TrackedTransaction>,
    next_tx: u64,
}

impl World {
    /// Creates an empty, unconfigured world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sync_ship(&mut self, ship: ShipSnapshot, out_events: &mut Vec<Event>) {
        let previous = self.ships.insert(ship.id, ship);
        if previous == Some(ship) {
            return;
        }
        out_events.push(Event::ShipSynced { ship: ship.id });

        let Some(previous) = previous else {
            return;
        };
        if previous.owner != ship.owner {
            out_events.push(Event::ShipOwnershipChanged {
                ship: ship.id,
                previous: previous.owner,
                owner: ship.owner,
            });
        }
        if !previous.is_sunk() && ship.is_sunk() {
            out_events.push(Event::ShipSunk { ship: ship.id });
        }
    }

    fn remove_ship(&mut self, ship: ShipId, out_events: &mut Vec<Event>) {
        if self.ships.remove(&ship).is_none() {
            return;
        }
        out_events.push(Event::ShipRemoved { ship });

        if self.selected_ship == Some(ship) {
            self.selected_ship = None;
            out_events.push(Event::SelectedShipChanged { ship: None });
        }
        if self.selected_moves.remove(&ship).is_some() {
            out_events.push(Event::SelectedMoveChanged { ship, card: None });
        }
        if self.selected_actions.remove(&ship).is_some() {
            out_events.push(Event::SelectedActionsChanged {
                ship,
                actions: SelectedActions::default(),
            });
        }
        if self.hovered_action.map(|hovered| hovered.ship) == Some(ship) {
            self.hovered_action = None;
            out_events.push(Event::HoveredActionChanged { hovered: None });
        }
        let _ = self.executed_actions.remove(&ship);
        if self.targeted.contains(&ship) {
            self.targeted.retain(|targeted| *targeted != ship);
            out_events.push(Event::TargetedChanged {
                ships: self.targeted.clone(),
            });
        }
        if self.firing_areas.as_ref().map(|(owner, _)| *owner) == Some(ship) {
            self.firing_areas = None;
        }
        if self.committed_moves.remove(&ship).is_some() {
            out_events.push(Event::CommittedMovesChanged {
                moves: self.committed_moves(),
            });
        }
    }

    fn remove_crate(&mut self, crate_id: CrateId, out_events: &mut Vec<Event>) {
        if self.crates.remove(&crate_id).is_none() {
            return;
        }
        out_events.push(Event::CrateRemoved { crate_id });
        if self
            .hovered_action
            .and_then(|hovered| hovered.special)
            .is_some_and(|special| special == SpecialEntity::Crate(crate_id))
        {
            self.hovered_action = None;
            out_events.push(Event::HoveredActionChanged { hovered: None });
        }
    }

    fn set_selected_actions(
        &mut self,
        ship: ShipId,
        actions: SelectedActions,
        out_events: &mut Vec<Event>,
    ) {
        let current = self.selected_actions.get(&ship).copied().unwrap_or_default();
        if current == actions {
            return;
        }
        if actions.is_empty() {
            let _ = self.selected_actions.remove(&ship);
        } else {
            let _ = self.selected_actions.insert(ship, actions);
        }
        out_events.push(Event::SelectedActionsChanged { ship, actions });
    }

    fn clear_turn_projections(&mut self, out_events: &mut Vec<Event>) {
        let dirty = !self.selected_actions.is_empty()
            || self.hovered_action.is_some()
            || !self.executed_actions.is_empty()
            || !self.executed_cannons.is_empty()
            || !self.targeted.is_empty();
        if !dirty {
            return;
        }
        self.selected_actions.clear();
        self.hovered_action = None;
        self.executed_actions.clear();
        self.executed_cannons.clear();
        self.targeted.clear();
        out_events.push(Event::TurnProjectionsCleared);
    }

    fn set_committed_moves(&mut self, moves: Vec<Move>, out_events: &mut Vec<Event>) {
        let replacement: BTreeMap<ShipId, MoveCardId> =
            moves.into_iter().map(|entry| (entry.ship, entry.card)).collect();
        if replacement == self.committed_moves {
            return;
        }
        self.committed_moves = replacement;
        out_events.push(Event::CommittedMovesChanged {
            moves: self.committed_moves(),
        });
    }

    fn submit(&mut self, submission: Submission, out_events: &mut Vec<Event>) {
        self.next_tx = self.next_tx.saturating_add(1);
        let tx = TxId::new(self.next_tx);
        let kind = submission.kind();
        let _ = self.transactions.insert(
            tx,
            TrackedTransaction {
                submission,
                status: TxStatus::Requested,
            },
        );
        out_events.push(Event::SubmissionRequested { tx, kind });
    }

    fn update_transaction(&mut self, tx: TxId, status: TxStatus, out_events: &mut Vec<Event>) {
        let Some(tracked) = self.transactions.get_mut(&tx) else {
            log::debug!("ignoring status {status:?} for unknown transaction {tx:?}");
            return;
        };
        if tracked.status.is_terminal() {
            log::debug!("ignoring status {status:?} for settled transaction {tx:?}");
            return;
        }
        if tracked.status == status {
            return;
        }
        tracked.status = status;
        out_events.push(Event::TransactionStatusChanged {
            tx,
            kind: tracked.submission.kind(),
            status,
        });
        if status.is_terminal() {
            self.prune_settled_transactions();
        }
    }

    fn prune_settled_transactions(&mut self) {
        let settled: Vec<TxId> = self
            .transactions
            .iter()
            .filter(|(_, tracked)| tracked.status.is_terminal())
            .map(|(tx, _)| *tx)
            .collect();
        let excess = settled.len().saturating_sub(SETTLED_TRANSACTION_HISTORY);
        for tx in &settled[..excess] {
            let _ = self.transactions.remove(tx);
        }
    }

    fn committed_moves(&self) -> Vec<Move> {
        self.committed_moves
            .iter()
            .map(|(ship, card)| Move {
                ship: *ship,
                card: *card,
            })
            .collect()
    }

    fn is_local_ship(&self, ship: ShipId) -> bool {
        match (self.local_player, self.ships.get(&ship)) {
            (Some(owner), Some(snapshot)) => snapshot.owner == owner && !snapshot.is_sunk(),
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
struct TrackedTransaction {
    submission: Submission,
    status: TxStatus,
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureGame { game, config } => {
            if world.game == Some(game) && world.config == Some(config) {
                return;
            }
            world.game = Some(game);
            world.config = Some(config);
            out_events.push(Event::GameConfigured { game });
        }
        Command::SetLocalPlayer { owner } => {
            if world.local_player != Some(owner) {
                world.local_player = Some(owner);
                out_events.push(Event::LocalPlayerChanged { owner });
            }
        }
        Command::SyncShip { ship } => world.sync_ship(ship, out_events),
        Command::RemoveShip { ship } => world.remove_ship(ship, out_events),
        Command::SyncCannon { cannon } => {
            if world.cannons.insert(cannon.id, cannon) != Some(cannon) {
                out_events.push(Event::CannonSynced { cannon: cannon.id });
            }
        }
        Command::RemoveCannon { cannon } => {
            if world.cannons.remove(&cannon).is_some() {
                let _ = world.executed_cannons.remove(&cannon);
                out_events.push(Event::CannonRemoved { cannon });
            }
        }
        Command::SyncMoveCard { card } => {
            if world.move_cards.insert(card.id, card) != Some(card) {
                out_events.push(Event::MoveCardSynced { card: card.id });
            }
        }
        Command::SyncCrate { crate_snapshot } => {
            if world.crates.insert(crate_snapshot.id, crate_snapshot) != Some(crate_snapshot) {
                out_events.push(Event::CrateSynced {
                    crate_id: crate_snapshot.id,
                });
            }
        }
        Command::RemoveCrate { crate_id } => world.remove_crate(crate_id, out_events),
        Command::SelectShip { ship } => {
            if world.selected_ship != ship {
                world.selected_ship = ship;
                out_events.push(Event::SelectedShipChanged { ship });
            }
        }
        Command::SetSelectedMove { ship, card } => {
            let previous = match card {
                Some(card) => world.selected_moves.insert(ship, card),
                None => world.selected_moves.remove(&ship),
            };
            if previous != card {
                out_events.push(Event::SelectedMoveChanged { ship, card });
            }
        }
        Command::SetSelectedActions { ship, actions } => {
            world.set_selected_actions(ship, actions, out_events);
        }
        Command::SetHoveredAction { hovered } => {
            if world.hovered_action != hovered {
                world.hovered_action = hovered;
                out_events.push(Event::HoveredActionChanged { hovered });
            }
        }
        Command::RecordExecutedAction { ship, kind } => {
            world.executed_actions.entry(ship).or_default().push(kind);
            out_events.push(Event::ActionExecuted { ship, kind });
        }
        Command::RecordExecutedCannon { cannon } => {
            if world.executed_cannons.insert(cannon) {
                out_events.push(Event::CannonExecuted { cannon });
            }
        }
        Command::SetTargeted { mut ships } => {
            ships.sort_unstable();
            ships.dedup();
            if world.targeted != ships {
                world.targeted = ships.clone();
                out_events.push(Event::TargetedChanged { ships });
            }
        }
        Command::ClearTurnProjections => world.clear_turn_projections(out_events),
        Command::ClearSelectedMoves => {
            if !world.selected_moves.is_empty() {
                world.selected_moves.clear();
                out_events.push(Event::SelectedMovesCleared);
            }
        }
        Command::SetFiringAreas { ship, areas } => {
            let replacement = Some((ship, areas));
            if world.firing_areas != replacement {
                world.firing_areas = replacement;
                out_events.push(Event::FiringAreasPublished { ship });
            }
        }
        Command::SetCommitment { commitment } => {
            if world.commitment != commitment {
                let hash = commitment.as_ref().map(|commitment| commitment.hash);
                world.commitment = commitment;
                out_events.push(Event::CommitmentChanged { hash });
            }
        }
        Command::SetCommittedMoves { moves } => world.set_committed_moves(moves, out_events),
        Command::RecordLastAction { turn } => {
            if world.last_action_turn != Some(turn) {
                world.last_action_turn = Some(turn);
                out_events.push(Event::LastActionRecorded { turn });
            }
        }
        Command::Submit { submission } => world.submit(submission, out_events),
        Command::UpdateTransaction { tx, status } => {
            world.update_transaction(tx, status, out_events);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use broadside_core::{
        ActionType, CannonFiringArea, CannonId, CannonSnapshot, CannonView, Commitment, CrateView,
        GameConfig, GameId, HoveredAction, Move, MoveCard, MoveCardId, MoveCardView, OwnerId,
        SelectedActions, SelectedActionsView, ShipId, ShipSnapshot, ShipView, Submission,
        SubmissionKind, TxId, TxStatus,
    };

    use super::World;

    /// Game configuration, absent until the game has been configured.
    #[must_use]
    pub fn config(world: &World) -> Option<&GameConfig> {
        world.config.as_ref()
    }

    /// Identifier of the configured game.
    #[must_use]
    pub fn game_id(world: &World) -> Option<GameId> {
        world.game
    }

    /// Player this client acts for.
    #[must_use]
    pub fn local_player(world: &World) -> Option<OwnerId> {
        world.local_player
    }

    /// Captures a read-only view of every ship.
    #[must_use]
    pub fn ship_view(world: &World) -> ShipView {
        ShipView::from_snapshots(world.ships.values().copied().collect())
    }

    /// Looks up a single ship.
    #[must_use]
    pub fn ship(world: &World, ship: ShipId) -> Option<&ShipSnapshot> {
        world.ships.get(&ship)
    }

    /// Reports whether the ship exists, is alive and belongs to the local player.
    #[must_use]
    pub fn is_local_ship(world: &World, ship: ShipId) -> bool {
        world.is_local_ship(ship)
    }

    /// Captures a read-only view of every cannon.
    #[must_use]
    pub fn cannon_view(world: &World) -> CannonView {
        CannonView::from_snapshots(world.cannons.values().copied().collect())
    }

    /// Looks up a single cannon.
    #[must_use]
    pub fn cannon(world: &World, cannon: CannonId) -> Option<&CannonSnapshot> {
        world.cannons.get(&cannon)
    }

    /// Captures a read-only view of the move card catalogue.
    #[must_use]
    pub fn move_card_view(world: &World) -> MoveCardView {
        MoveCardView::from_cards(world.move_cards.values().copied().collect())
    }

    /// Looks up a single move card.
    #[must_use]
    pub fn move_card(world: &World, card: MoveCardId) -> Option<&MoveCard> {
        world.move_cards.get(&card)
    }

    /// Captures a read-only view of every crate.
    #[must_use]
    pub fn crate_view(world: &World) -> CrateView {
        CrateView::from_snapshots(world.crates.values().copied().collect())
    }

    /// Ship currently focused by the player.
    #[must_use]
    pub fn selected_ship(world: &World) -> Option<ShipId> {
        world.selected_ship
    }

    /// Move card selected for the provided ship.
    #[must_use]
    pub fn selected_move(world: &World, ship: ShipId) -> Option<MoveCardId> {
        world.selected_moves.get(&ship).copied()
    }

    /// Pending action selection of the provided ship.
    #[must_use]
    pub fn selected_actions(world: &World, ship: ShipId) -> SelectedActions {
        world
            .selected_actions
            .get(&ship)
            .copied()
            .unwrap_or_default()
    }

    /// Borrowed view over every stored action selection.
    #[must_use]
    pub fn selected_actions_view(world: &World) -> SelectedActionsView<'_> {
        SelectedActionsView::new(&world.selected_actions)
    }

    /// Action currently hovered by the pointer.
    #[must_use]
    pub fn hovered_action(world: &World) -> Option<HoveredAction> {
        world.hovered_action
    }

    /// Actions the authoritative feed reported as executed this turn.
    #[must_use]
    pub fn executed_actions(world: &World, ship: ShipId) -> &[ActionType] {
        world
            .executed_actions
            .get(&ship)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Reports whether the cannon was reported as fired this turn.
    #[must_use]
    pub fn is_cannon_executed(world: &World, cannon: CannonId) -> bool {
        world.executed_cannons.contains(&cannon)
    }

    /// Ships highlighted as targeted, in id order.
    #[must_use]
    pub fn targeted(world: &World) -> &[ShipId] {
        &world.targeted
    }

    /// Most recently published firing areas and the ship they belong to.
    #[must_use]
    pub fn firing_areas(world: &World) -> Option<(ShipId, &[CannonFiringArea])> {
        world
            .firing_areas
            .as_ref()
            .map(|(ship, areas)| (*ship, areas.as_slice()))
    }

    /// Hidden commitment held for the current turn.
    #[must_use]
    pub fn commitment(world: &World) -> Option<&Commitment> {
        world.commitment.as_ref()
    }

    /// Moves mirrored as committed, ordered by ship.
    #[must_use]
    pub fn committed_moves(world: &World) -> Vec<Move> {
        world.committed_moves()
    }

    /// Committed card of the provided ship.
    #[must_use]
    pub fn committed_move(world: &World, ship: ShipId) -> Option<MoveCardId> {
        world.committed_moves.get(&ship).copied()
    }

    /// Last turn in which the local player's actions were confirmed.
    #[must_use]
    pub fn last_action_turn(world: &World) -> Option<u32> {
        world.last_action_turn
    }

    /// Selected moves of every live ship owned by the local player.
    ///
    /// Stale, sunk and foreign ships are skipped rather than reported.
    #[must_use]
    pub fn player_ships_with_moves(world: &World) -> Vec<Move> {
        world
            .selected_moves
            .iter()
            .filter(|(ship, _)| world.is_local_ship(**ship))
            .map(|(ship, card)| Move {
                ship: *ship,
                card: *card,
            })
            .collect()
    }

    /// Non-empty action selections of every live ship owned by the local player.
    #[must_use]
    pub fn player_ships_with_actions(world: &World) -> Vec<(ShipId, SelectedActions)> {
        world
            .selected_actions
            .iter()
            .filter(|(ship, actions)| !actions.is_empty() && world.is_local_ship(**ship))
            .map(|(ship, actions)| (*ship, *actions))
            .collect()
    }

    /// Looks up a pending or recently settled transaction.
    #[must_use]
    pub fn transaction(world: &World, tx: TxId) -> Option<TransactionSnapshot<'_>> {
        world.transactions.get(&tx).map(|tracked| TransactionSnapshot {
            tx,
            kind: tracked.submission.kind(),
            status: tracked.status,
            submission: &tracked.submission,
        })
    }

    /// Every transaction that has not reached a terminal state, in allocation order.
    #[must_use]
    pub fn pending_transactions(world: &World) -> Vec<TransactionSnapshot<'_>> {
        world
            .transactions
            .iter()
            .filter(|(_, tracked)| !tracked.status.is_terminal())
            .map(|(tx, tracked)| TransactionSnapshot {
                tx: *tx,
                kind: tracked.submission.kind(),
                status: tracked.status,
                submission: &tracked.submission,
            })
            .collect()
    }

    /// Immutable representation of a tracked transaction.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct TransactionSnapshot<'a> {
        /// Identifier allocated at submission.
        pub tx: TxId,
        /// Protocol step the transaction performs.
        pub kind: SubmissionKind,
        /// Current lifecycle status.
        pub status: TxStatus,
        /// Payload handed to the collaborator.
        pub submission: &'a Submission,
    }
}
