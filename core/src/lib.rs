#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Broadside client simulation.
//!
//! This crate defines the message surface that connects adapters, the local
//! entity store, and pure systems. Adapters and systems submit [`Command`]
//! values describing desired mutations, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.
//!
//! Coordinates live in tile space. Rotations are nautical bearings measured in
//! degrees: 0° points along +y and angles grow clockwise, so a heading `θ`
//! has the unit vector `(sin θ, cos θ)`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unique identifier assigned to a ship entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShipId(u32);

impl ShipId {
    /// Creates a new ship identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a cannon entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CannonId(u32);

impl CannonId {
    /// Creates a new cannon identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a move card in the shared catalogue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MoveCardId(u32);

impl MoveCardId {
    /// Creates a new move card identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a claimable crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CrateId(u32);

impl CrateId {
    /// Creates a new crate identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of the player that owns a ship.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Creates a new owner identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Identifier of the game instance that commitments are bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(u64);

impl GameId {
    /// Creates a new game identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Identifier allocated by the world to a tracked ledger transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(u64);

impl TxId {
    /// Creates a new transaction identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Closed set of entity kinds held by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A player-controlled ship.
    Ship,
    /// A cannon mounted on a ship.
    Cannon,
    /// A catalogue entry describing one maneuver.
    MoveCard,
    /// A claimable crate floating in the world.
    Crate,
}

/// Entity referenced by an action slot that needs a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialEntity {
    /// A cannon that is loaded or fired.
    Cannon(CannonId),
    /// A crate that is claimed.
    Crate(CrateId),
}

impl SpecialEntity {
    /// Reports which entity table the reference points into.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Cannon(_) => EntityKind::Cannon,
            Self::Crate(_) => EntityKind::Crate,
        }
    }
}

/// Position expressed in tile-space units.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    x: f32,
    y: f32,
}

impl Coord {
    /// Origin of the world.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Creates a new coordinate from its components.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Horizontal component.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical component.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Euclidean distance between two coordinates.
    #[must_use]
    pub fn distance(self, other: Coord) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One of the three phases that compose a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Players choose a hidden move and publish its commitment.
    Commit,
    /// Players disclose the move bound by their commitment.
    Reveal,
    /// Players choose and submit up to two actions per ship.
    Action,
}

/// Singleton game configuration written once at game creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Unix timestamp, in seconds, at which turn zero begins.
    pub start_time: u64,
    /// Length of the commit phase in seconds.
    pub commit_phase_length: u32,
    /// Length of the reveal phase in seconds.
    pub reveal_phase_length: u32,
    /// Length of the action phase in seconds.
    pub action_phase_length: u32,
    /// Radius of the world before it starts to shrink.
    pub world_size: u32,
    /// Shrink applied per turn after the cutoff, in hundredths of a tile.
    pub shrink_rate: u32,
    /// Number of turns during which new players may enter and the world holds its size.
    pub entry_cutoff_turns: u32,
    /// Perlin noise threshold above which terrain becomes an island.
    pub island_threshold: u32,
    /// Spawn budget available to each player.
    pub budget: u32,
    /// Seed used by the terrain noise function.
    pub perlin_seed: u64,
}

impl GameConfig {
    /// Duration of one full Commit → Reveal → Action cycle, in seconds.
    #[must_use]
    pub const fn turn_length(&self) -> u32 {
        self.commit_phase_length
            .saturating_add(self.reveal_phase_length)
            .saturating_add(self.action_phase_length)
    }

    /// Length of the provided phase, in seconds.
    #[must_use]
    pub const fn phase_length(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Commit => self.commit_phase_length,
            Phase::Reveal => self.reveal_phase_length,
            Phase::Action => self.action_phase_length,
        }
    }

    /// Reports whether every phase has a positive length.
    #[must_use]
    pub const fn has_valid_phases(&self) -> bool {
        self.commit_phase_length > 0 && self.reveal_phase_length > 0 && self.action_phase_length > 0
    }
}

/// Phase, turn and countdown derived from the wall clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockReading {
    /// Phase active at the sampled instant.
    pub phase: Phase,
    /// Zero-based turn index at the sampled instant.
    pub turn: u32,
    /// Seconds remaining until the current phase ends.
    pub seconds_until_next_phase: f64,
}

/// Deployment state of a ship's sails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SailPosition {
    /// Sails are torn and must be repaired before use.
    Torn,
    /// Sails are lowered, trading speed for stability.
    Lowered,
    /// Sails are fully raised.
    Full,
}

impl SailPosition {
    /// Wire index used by the authoritative contracts.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Torn => 0,
            Self::Lowered => 1,
            Self::Full => 2,
        }
    }

    /// Resolves a wire index back into a sail position.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Torn),
            1 => Some(Self::Lowered),
            2 => Some(Self::Full),
            _ => None,
        }
    }
}

/// Immutable representation of a single ship used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShipSnapshot {
    /// Identifier of the ship entity.
    pub id: ShipId,
    /// Player that owns the ship.
    pub owner: OwnerId,
    /// Bow position in tile space.
    pub position: Coord,
    /// Heading in degrees.
    pub rotation: f32,
    /// Hull length measured from bow to stern.
    pub length: f32,
    /// Base speed applied to move cards.
    pub speed: f32,
    /// Remaining hull points. Zero marks the ship as sunk.
    pub health: u32,
    /// Hull points of an undamaged ship.
    pub max_health: u32,
    /// Current sail deployment.
    pub sail: SailPosition,
    /// Hull firepower bonus added to every cannon on the ship.
    pub firepower: f32,
    /// Fire damage currently burning aboard.
    pub on_fire: u32,
    /// Cannon damage awaiting repair.
    pub damaged_cannons: u32,
}

impl ShipSnapshot {
    /// Reports whether the ship has been sunk.
    #[must_use]
    pub const fn is_sunk(&self) -> bool {
        self.health == 0
    }
}

/// Immutable representation of a single cannon used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CannonSnapshot {
    /// Identifier of the cannon entity.
    pub id: CannonId,
    /// Ship the cannon is mounted on.
    pub ship: ShipId,
    /// Mounting angle relative to the hull, in degrees.
    pub rotation: f32,
    /// Maximum reach of the cannon.
    pub range: f32,
    /// Cannon firepower before the hull bonus.
    pub firepower: f32,
    /// Whether the cannon currently holds a charge.
    pub loaded: bool,
}

/// Catalogue entry describing one possible maneuver outcome.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveCard {
    /// Identifier of the catalogue entry.
    pub id: MoveCardId,
    /// Distance travelled at unit speed with full sails.
    pub distance: f32,
    /// Heading change applied at the end of the move, in degrees.
    pub rotation: f32,
    /// Direction of travel relative to the current heading, in degrees.
    pub direction: f32,
}

/// Immutable representation of a claimable crate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrateSnapshot {
    /// Identifier of the crate entity.
    pub id: CrateId,
    /// Crate location in tile space.
    pub position: Coord,
}

/// Read-only snapshot describing all ships in deterministic order.
#[derive(Clone, Debug, Default)]
pub struct ShipView {
    snapshots: Vec<ShipSnapshot>,
}

impl ShipView {
    /// Creates a new ship view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<ShipSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured ship snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &ShipSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a single ship by identifier.
    #[must_use]
    pub fn get(&self, ship: ShipId) -> Option<&ShipSnapshot> {
        self.snapshots
            .binary_search_by_key(&ship, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<ShipSnapshot> {
        self.snapshots
    }
}

/// Read-only snapshot describing all cannons in deterministic order.
#[derive(Clone, Debug, Default)]
pub struct CannonView {
    snapshots: Vec<CannonSnapshot>,
}

impl CannonView {
    /// Creates a new cannon view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<CannonSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured cannon snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &CannonSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a single cannon by identifier.
    #[must_use]
    pub fn get(&self, cannon: CannonId) -> Option<&CannonSnapshot> {
        self.snapshots
            .binary_search_by_key(&cannon, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Iterator over the cannons mounted on the provided ship.
    pub fn for_ship(&self, ship: ShipId) -> impl Iterator<Item = &CannonSnapshot> {
        self.snapshots
            .iter()
            .filter(move |snapshot| snapshot.ship == ship)
    }
}

/// Read-only snapshot of the move card catalogue.
#[derive(Clone, Debug, Default)]
pub struct MoveCardView {
    cards: Vec<MoveCard>,
}

impl MoveCardView {
    /// Creates a new catalogue view from the provided cards.
    #[must_use]
    pub fn from_cards(mut cards: Vec<MoveCard>) -> Self {
        cards.sort_by_key(|card| card.id);
        Self { cards }
    }

    /// Iterator over the catalogue in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &MoveCard> {
        self.cards.iter()
    }

    /// Looks up a single card by identifier.
    #[must_use]
    pub fn get(&self, card: MoveCardId) -> Option<&MoveCard> {
        self.cards
            .binary_search_by_key(&card, |entry| entry.id)
            .ok()
            .map(|index| &self.cards[index])
    }
}

/// Read-only snapshot describing all crates in deterministic order.
#[derive(Clone, Debug, Default)]
pub struct CrateView {
    snapshots: Vec<CrateSnapshot>,
}

impl CrateView {
    /// Creates a new crate view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<CrateSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured crates in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &CrateSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a single crate by identifier.
    #[must_use]
    pub fn get(&self, crate_id: CrateId) -> Option<&CrateSnapshot> {
        self.snapshots
            .binary_search_by_key(&crate_id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }
}

/// Actions a ship may perform during the Action phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionType {
    /// Empty slot.
    None,
    /// Load a cannon.
    Load,
    /// Fire a loaded cannon.
    Fire,
    /// Raise lowered sails to full.
    RaiseSail,
    /// Lower full sails.
    LowerSail,
    /// Put out a fire burning aboard.
    ExtinguishFire,
    /// Repair damaged cannons.
    RepairCannons,
    /// Repair torn sails.
    RepairSail,
    /// Claim a nearby crate.
    ClaimCrate,
}

impl ActionType {
    /// Every action type in wire order.
    pub const ALL: [ActionType; 9] = [
        ActionType::None,
        ActionType::Load,
        ActionType::Fire,
        ActionType::RaiseSail,
        ActionType::LowerSail,
        ActionType::ExtinguishFire,
        ActionType::RepairCannons,
        ActionType::RepairSail,
        ActionType::ClaimCrate,
    ];

    /// Wire index used by the authoritative contracts.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Load => 1,
            Self::Fire => 2,
            Self::RaiseSail => 3,
            Self::LowerSail => 4,
            Self::ExtinguishFire => 5,
            Self::RepairCannons => 6,
            Self::RepairSail => 7,
            Self::ClaimCrate => 8,
        }
    }

    /// Name of the authoritative system that resolves the action.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Load => "Load",
            Self::Fire => "Fire",
            Self::RaiseSail => "RaiseSail",
            Self::LowerSail => "LowerSail",
            Self::ExtinguishFire => "ExtinguishFire",
            Self::RepairCannons => "RepairCannons",
            Self::RepairSail => "RepairSail",
            Self::ClaimCrate => "ClaimCrate",
        }
    }

    /// Reports whether the action carries a cannon or crate reference.
    #[must_use]
    pub const fn uses_special_entity(self) -> bool {
        matches!(self, Self::Load | Self::Fire | Self::ClaimCrate)
    }
}

/// Rejection produced when decoding an unknown action index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownActionType(pub u8);

impl TryFrom<u8> for ActionType {
    type Error = UnknownActionType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ActionType::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(UnknownActionType(value))
    }
}

/// One of the two action slots a ship fills each turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionSlot {
    /// Action occupying the slot; `ActionType::None` marks a free slot.
    pub kind: ActionType,
    /// Cannon or crate the action refers to, if any.
    pub special: Option<SpecialEntity>,
}

impl ActionSlot {
    /// Slot holding no action.
    pub const EMPTY: Self = Self {
        kind: ActionType::None,
        special: None,
    };

    /// Reports whether the slot can accept a new action.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.kind, ActionType::None)
    }
}

impl Default for ActionSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Player-authored actions pending for one ship.
///
/// Slot order follows insertion order. Toggling an entry that is already
/// present clears its slot; toggling a new entry fills the first free slot or
/// does nothing when both slots are occupied. The matching rule differs by
/// entry point: simple actions match by type, cannon actions by cannon and
/// crate actions by crate, so the same cannon never occupies two slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SelectedActions {
    slots: [ActionSlot; 2],
}

impl SelectedActions {
    /// Number of slots available per ship per turn.
    pub const SLOT_COUNT: usize = 2;

    /// Creates a selection from explicit slots.
    #[must_use]
    pub const fn from_slots(slots: [ActionSlot; 2]) -> Self {
        Self { slots }
    }

    /// Both slots in insertion order.
    #[must_use]
    pub const fn slots(&self) -> &[ActionSlot; 2] {
        &self.slots
    }

    /// Reports whether both slots are free.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(ActionSlot::is_free)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_free()).count()
    }

    /// Reports whether an action of the provided type occupies a slot.
    #[must_use]
    pub fn contains(&self, kind: ActionType) -> bool {
        kind != ActionType::None && self.slots.iter().any(|slot| slot.kind == kind)
    }

    /// Reports whether a slot refers to the provided cannon or crate.
    #[must_use]
    pub fn references(&self, special: SpecialEntity) -> bool {
        self.slots.iter().any(|slot| slot.special == Some(special))
    }

    /// Toggles an action that carries no special entity. Returns whether the selection changed.
    pub fn toggle_simple(&mut self, kind: ActionType) -> bool {
        if kind == ActionType::None {
            return false;
        }
        self.toggle_matching(
            |slot| slot.kind == kind,
            ActionSlot {
                kind,
                special: None,
            },
        )
    }

    /// Toggles a cannon action, matching existing slots by cannon.
    ///
    /// Returns whether the selection changed.
    pub fn toggle_cannon(&mut self, kind: ActionType, cannon: CannonId) -> bool {
        if kind == ActionType::None {
            return false;
        }
        let special = SpecialEntity::Cannon(cannon);
        self.toggle_matching(
            |slot| slot.special == Some(special),
            ActionSlot {
                kind,
                special: Some(special),
            },
        )
    }

    /// Toggles a crate claim, matching existing slots by crate.
    ///
    /// Returns whether the selection changed.
    pub fn toggle_crate(&mut self, crate_id: CrateId) -> bool {
        let special = SpecialEntity::Crate(crate_id);
        self.toggle_matching(
            |slot| slot.special == Some(special),
            ActionSlot {
                kind: ActionType::ClaimCrate,
                special: Some(special),
            },
        )
    }

    /// Clears every slot that refers to the provided entity. Returns whether the selection changed.
    pub fn clear_special(&mut self, special: SpecialEntity) -> bool {
        let mut changed = false;
        for slot in &mut self.slots {
            if slot.special == Some(special) {
                *slot = ActionSlot::EMPTY;
                changed = true;
            }
        }
        changed
    }

    fn toggle_matching<F>(&mut self, matches: F, fill: ActionSlot) -> bool
    where
        F: Fn(&ActionSlot) -> bool,
    {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| !slot.is_free() && matches(slot))
        {
            *slot = ActionSlot::EMPTY;
            return true;
        }

        match self.slots.iter_mut().find(|slot| slot.is_free()) {
            Some(slot) => {
                *slot = fill;
                true
            }
            None => false,
        }
    }
}

/// Borrowed view over the per-ship action selections.
#[derive(Clone, Copy, Debug)]
pub struct SelectedActionsView<'a> {
    entries: &'a BTreeMap<ShipId, SelectedActions>,
}

impl<'a> SelectedActionsView<'a> {
    /// Captures a new view backed by the provided table.
    #[must_use]
    pub fn new(entries: &'a BTreeMap<ShipId, SelectedActions>) -> Self {
        Self { entries }
    }

    /// Selection for the provided ship; ships without an entry have an empty selection.
    #[must_use]
    pub fn get(&self, ship: ShipId) -> SelectedActions {
        self.entries.get(&ship).copied().unwrap_or_default()
    }

    /// Iterator over ships with a stored selection, in ship order.
    pub fn iter(&self) -> impl Iterator<Item = (ShipId, SelectedActions)> + 'a {
        self.entries
            .iter()
            .map(|(ship, selection)| (*ship, *selection))
    }
}

/// Action the pointer currently hovers, used for previews.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoveredAction {
    /// Ship the hovered action belongs to.
    pub ship: ShipId,
    /// Hovered action type.
    pub kind: ActionType,
    /// Cannon or crate referenced by the hovered action.
    pub special: Option<SpecialEntity>,
}

/// A player's chosen maneuver for one ship.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Move {
    /// Ship performing the maneuver.
    pub ship: ShipId,
    /// Catalogue entry describing the maneuver.
    pub card: MoveCardId,
}

/// Random value mixed into a commitment to hide the committed moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt([u8; 32]);

impl Salt {
    /// Placeholder salt accepted by resolvers that predate randomized salts.
    pub const ZERO: Self = Self([0; 32]);

    /// Wraps raw salt bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw salt bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Full move batch bound by a commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveBatch {
    /// Game the moves belong to.
    pub game: GameId,
    /// Committed moves, ordered by ship.
    pub moves: Vec<Move>,
    /// Salt hiding the moves until reveal.
    pub salt: Salt,
}

/// Hidden commitment held client-side until the Reveal phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Encoded [`MoveBatch`]; never transmitted before the Reveal phase.
    pub encoding: Vec<u8>,
    /// Digest of the encoding, published during the Commit phase.
    pub hash: [u8; 32],
}

/// Encoded action batch element consumed by the authoritative resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedAction {
    /// Ship performing the actions.
    pub ship: ShipId,
    /// System identifiers of both slots; all zeroes for an empty slot.
    pub action_hashes: [[u8; 32]; 2],
    /// Encoded arguments of both slots; empty for actions without arguments.
    pub metadata: [Vec<u8>; 2],
}

/// Payload handed to the transaction collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Submission {
    /// Publishes a commitment hash during the Commit phase.
    Commit {
        /// Game the commitment belongs to.
        game: GameId,
        /// Commitment digest.
        hash: [u8; 32],
    },
    /// Discloses the committed moves during the Reveal phase.
    Reveal {
        /// Game the moves belong to.
        game: GameId,
        /// Moves bound by the commitment.
        moves: Vec<Move>,
        /// Salt used when committing.
        salt: Salt,
    },
    /// Submits the selected actions during the Action phase.
    Actions {
        /// Game the actions belong to.
        game: GameId,
        /// One element per acting ship.
        actions: Vec<EncodedAction>,
    },
}

impl Submission {
    /// Reports which protocol step the submission performs.
    #[must_use]
    pub const fn kind(&self) -> SubmissionKind {
        match self {
            Self::Commit { .. } => SubmissionKind::Commit,
            Self::Reveal { .. } => SubmissionKind::Reveal,
            Self::Actions { .. } => SubmissionKind::Actions,
        }
    }
}

/// Protocol step performed by a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionKind {
    /// Commitment publication.
    Commit,
    /// Move disclosure.
    Reveal,
    /// Action batch.
    Actions,
}

/// Lifecycle of a tracked transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    /// Handed to the collaborator but not yet picked up.
    Requested,
    /// Sent and awaiting execution.
    Executing,
    /// Executed and awaiting the resulting state updates.
    WaitingForEvents,
    /// Confirmed by the ledger.
    Complete,
    /// Rejected or reverted by the ledger.
    Failed,
}

impl TxStatus {
    /// Reports whether the transaction reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Quadrilateral region a cannon can reach.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiringArea {
    /// Corners in winding order.
    pub corners: [Coord; 4],
}

/// Firing area of one cannon published for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CannonFiringArea {
    /// Cannon the area belongs to.
    pub cannon: CannonId,
    /// Whether the cannon was loaded when the area was computed.
    pub loaded: bool,
    /// Reachable region.
    pub area: FiringArea,
}

/// Commands that express all permissible store mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Installs the game configuration singleton.
    ConfigureGame {
        /// Game the configuration belongs to.
        game: GameId,
        /// Configuration written at game creation.
        config: GameConfig,
    },
    /// Declares which player this client acts for.
    SetLocalPlayer {
        /// Owner identifier of the local player.
        owner: OwnerId,
    },
    /// Inserts or replaces a ship from the authoritative feed.
    SyncShip {
        /// Latest authoritative ship state.
        ship: ShipSnapshot,
    },
    /// Removes a ship that is no longer resolvable.
    RemoveShip {
        /// Ship to remove.
        ship: ShipId,
    },
    /// Inserts or replaces a cannon from the authoritative feed.
    SyncCannon {
        /// Latest authoritative cannon state.
        cannon: CannonSnapshot,
    },
    /// Removes a cannon that is no longer resolvable.
    RemoveCannon {
        /// Cannon to remove.
        cannon: CannonId,
    },
    /// Inserts or replaces a move card in the catalogue.
    SyncMoveCard {
        /// Catalogue entry.
        card: MoveCard,
    },
    /// Inserts or replaces a crate from the authoritative feed.
    SyncCrate {
        /// Latest authoritative crate state.
        crate_snapshot: CrateSnapshot,
    },
    /// Removes a crate, typically because a rival claimed it.
    RemoveCrate {
        /// Crate to remove.
        crate_id: CrateId,
    },
    /// Marks the ship currently focused by the player.
    SelectShip {
        /// Focused ship, or `None` to clear the focus.
        ship: Option<ShipId>,
    },
    /// Sets or clears the move selected for a ship.
    SetSelectedMove {
        /// Ship the move applies to.
        ship: ShipId,
        /// Selected card, or `None` to clear.
        card: Option<MoveCardId>,
    },
    /// Replaces the pending actions of a ship.
    SetSelectedActions {
        /// Ship the actions apply to.
        ship: ShipId,
        /// New selection; an empty selection removes the entry.
        actions: SelectedActions,
    },
    /// Sets or clears the hovered action preview.
    SetHoveredAction {
        /// Hovered action, or `None` to clear.
        hovered: Option<HoveredAction>,
    },
    /// Records an action the authoritative feed reported as executed this turn.
    RecordExecutedAction {
        /// Ship that acted.
        ship: ShipId,
        /// Executed action.
        kind: ActionType,
    },
    /// Records a cannon the authoritative feed reported as fired this turn.
    RecordExecutedCannon {
        /// Cannon that fired.
        cannon: CannonId,
    },
    /// Replaces the set of ships highlighted as targeted.
    SetTargeted {
        /// Targeted ships.
        ships: Vec<ShipId>,
    },
    /// Clears selection and projection state at the start of a turn.
    ClearTurnProjections,
    /// Clears every selected move.
    ClearSelectedMoves,
    /// Publishes the firing areas of a ship's cannons.
    SetFiringAreas {
        /// Ship the areas belong to.
        ship: ShipId,
        /// One area per cannon.
        areas: Vec<CannonFiringArea>,
    },
    /// Sets or clears the local commitment.
    SetCommitment {
        /// Commitment, or `None` to clear.
        commitment: Option<Commitment>,
    },
    /// Replaces the committed move mirror; an empty list clears it.
    SetCommittedMoves {
        /// Moves bound by the current commitment.
        moves: Vec<Move>,
    },
    /// Records the last turn in which the local player's actions were confirmed.
    RecordLastAction {
        /// Turn of the confirmed action batch.
        turn: u32,
    },
    /// Hands a payload to the transaction collaborator.
    Submit {
        /// Payload to submit.
        submission: Submission,
    },
    /// Reports a lifecycle transition of a tracked transaction.
    UpdateTransaction {
        /// Transaction that changed.
        tx: TxId,
        /// New status.
        status: TxStatus,
    },
}

/// Events broadcast by the store after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The game configuration was installed or replaced.
    GameConfigured {
        /// Game the configuration belongs to.
        game: GameId,
    },
    /// The local player changed.
    LocalPlayerChanged {
        /// New local player.
        owner: OwnerId,
    },
    /// A ship was inserted or its state changed.
    ShipSynced {
        /// Ship that changed.
        ship: ShipId,
    },
    /// A ship changed hands.
    ShipOwnershipChanged {
        /// Ship that changed hands.
        ship: ShipId,
        /// Previous owner.
        previous: OwnerId,
        /// New owner.
        owner: OwnerId,
    },
    /// A ship's health reached zero.
    ShipSunk {
        /// Ship that sank.
        ship: ShipId,
    },
    /// A ship was removed from the store.
    ShipRemoved {
        /// Ship that was removed.
        ship: ShipId,
    },
    /// A cannon was inserted or its state changed.
    CannonSynced {
        /// Cannon that changed.
        cannon: CannonId,
    },
    /// A cannon was removed from the store.
    CannonRemoved {
        /// Cannon that was removed.
        cannon: CannonId,
    },
    /// A move card was inserted or replaced.
    MoveCardSynced {
        /// Card that changed.
        card: MoveCardId,
    },
    /// A crate was inserted or its state changed.
    CrateSynced {
        /// Crate that changed.
        crate_id: CrateId,
    },
    /// A crate disappeared.
    CrateRemoved {
        /// Crate that disappeared.
        crate_id: CrateId,
    },
    /// The focused ship changed.
    SelectedShipChanged {
        /// Newly focused ship.
        ship: Option<ShipId>,
    },
    /// The selected move of a ship changed.
    SelectedMoveChanged {
        /// Ship whose move changed.
        ship: ShipId,
        /// New card, if any.
        card: Option<MoveCardId>,
    },
    /// The pending actions of a ship changed.
    SelectedActionsChanged {
        /// Ship whose actions changed.
        ship: ShipId,
        /// New selection.
        actions: SelectedActions,
    },
    /// The hovered action changed.
    HoveredActionChanged {
        /// New hovered action.
        hovered: Option<HoveredAction>,
    },
    /// An executed action was recorded.
    ActionExecuted {
        /// Ship that acted.
        ship: ShipId,
        /// Executed action.
        kind: ActionType,
    },
    /// An executed cannon was recorded.
    CannonExecuted {
        /// Cannon that fired.
        cannon: CannonId,
    },
    /// The set of targeted ships changed.
    TargetedChanged {
        /// Newly targeted ships.
        ships: Vec<ShipId>,
    },
    /// Selection and projection state was cleared for a new turn.
    TurnProjectionsCleared,
    /// Every selected move was cleared.
    SelectedMovesCleared,
    /// Firing areas of a ship were published.
    FiringAreasPublished {
        /// Ship the areas belong to.
        ship: ShipId,
    },
    /// The local commitment changed.
    CommitmentChanged {
        /// Digest of the new commitment, if any.
        hash: Option<[u8; 32]>,
    },
    /// The committed move mirror changed.
    CommittedMovesChanged {
        /// Moves now mirrored as committed.
        moves: Vec<Move>,
    },
    /// The last confirmed action turn changed.
    LastActionRecorded {
        /// Turn of the confirmed action batch.
        turn: u32,
    },
    /// A payload was handed to the transaction collaborator.
    SubmissionRequested {
        /// Identifier allocated to the transaction.
        tx: TxId,
        /// Protocol step the payload performs.
        kind: SubmissionKind,
    },
    /// A tracked transaction changed status.
    TransactionStatusChanged {
        /// Transaction that changed.
        tx: TxId,
        /// Protocol step the transaction performs.
        kind: SubmissionKind,
        /// New status.
        status: TxStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::{
        ActionSlot, ActionType, CannonId, CrateId, GameConfig, GameId, Move, MoveBatch,
        MoveCardId, Phase, Salt, SelectedActions, ShipId, SpecialEntity, Submission,
        UnknownActionType,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    fn config() -> GameConfig {
        GameConfig {
            start_time: 0,
            commit_phase_length: 25,
            reveal_phase_length: 9,
            action_phase_length: 25,
            world_size: 120,
            shrink_rate: 50,
            entry_cutoff_turns: 4,
            island_threshold: 33,
            budget: 10,
            perlin_seed: 7,
        }
    }

    #[test]
    fn turn_length_sums_phase_lengths() {
        let config = config();
        assert_eq!(config.turn_length(), 59);
        assert_eq!(config.phase_length(Phase::Reveal), 9);
        assert!(config.has_valid_phases());
    }

    #[test]
    fn zero_length_phase_is_invalid() {
        let config = GameConfig {
            reveal_phase_length: 0,
            ..config()
        };
        assert!(!config.has_valid_phases());
    }

    #[test]
    fn action_type_decodes_known_indices_only() {
        for kind in ActionType::ALL {
            assert_eq!(ActionType::try_from(kind.index()), Ok(kind));
        }
        assert_eq!(ActionType::try_from(9), Err(UnknownActionType(9)));
        assert_eq!(ActionType::try_from(u8::MAX), Err(UnknownActionType(u8::MAX)));
    }

    #[test]
    fn simple_toggle_fills_first_free_slot_then_clears() {
        let mut selection = SelectedActions::default();
        assert!(selection.toggle_simple(ActionType::RaiseSail));
        assert!(selection.toggle_simple(ActionType::RepairSail));
        assert_eq!(selection.occupied(), 2);
        assert_eq!(selection.slots()[0].kind, ActionType::RaiseSail);

        assert!(!selection.toggle_simple(ActionType::ExtinguishFire));
        assert_eq!(selection.occupied(), 2);

        assert!(selection.toggle_simple(ActionType::RaiseSail));
        assert_eq!(selection.slots()[0], ActionSlot::EMPTY);
        assert!(selection.toggle_simple(ActionType::ExtinguishFire));
        assert_eq!(selection.slots()[0].kind, ActionType::ExtinguishFire);
    }

    #[test]
    fn cannon_toggle_matches_by_cannon_not_type() {
        let mut selection = SelectedActions::default();
        assert!(selection.toggle_cannon(ActionType::Load, CannonId::new(1)));
        assert!(selection.toggle_cannon(ActionType::Load, CannonId::new(2)));
        assert_eq!(selection.occupied(), 2);

        assert!(selection.toggle_cannon(ActionType::Fire, CannonId::new(1)));
        assert!(!selection.references(SpecialEntity::Cannon(CannonId::new(1))));
        assert!(selection.references(SpecialEntity::Cannon(CannonId::new(2))));
    }

    #[test]
    fn crate_toggle_assigns_claim_and_clears_on_removal() {
        let mut selection = SelectedActions::default();
        assert!(selection.toggle_crate(CrateId::new(3)));
        assert!(selection.contains(ActionType::ClaimCrate));

        assert!(selection.clear_special(SpecialEntity::Crate(CrateId::new(3))));
        assert!(selection.is_empty());
        assert!(!selection.clear_special(SpecialEntity::Crate(CrateId::new(3))));
    }

    #[test]
    fn none_is_never_selected() {
        let mut selection = SelectedActions::default();
        assert!(!selection.toggle_simple(ActionType::None));
        assert!(!selection.toggle_cannon(ActionType::None, CannonId::new(1)));
        assert!(selection.is_empty());
        assert!(!selection.contains(ActionType::None));
    }

    #[test]
    fn move_batch_round_trips_through_bincode() {
        let batch = MoveBatch {
            game: GameId::new(9),
            moves: vec![Move {
                ship: ShipId::new(1),
                card: MoveCardId::new(4),
            }],
            salt: Salt::from_bytes([7; 32]),
        };
        assert_round_trip(&batch);
    }

    #[test]
    fn submission_round_trips_through_bincode() {
        let submission = Submission::Commit {
            game: GameId::new(1),
            hash: [3; 32],
        };
        assert_round_trip(&submission);
    }
}
