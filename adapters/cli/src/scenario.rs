use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{bail, Context, Result};
use broadside_core::{
    ActionType, CannonId, CannonSnapshot, Command, Coord, CrateId, CrateSnapshot, GameConfig,
    GameId, MoveCard, MoveCardId, OwnerId, SailPosition, ShipId, ShipSnapshot, SubmissionKind,
};
use broadside_system_action_selection::SelectionIntent;
use serde::Deserialize;

const SUPPORTED_SCENARIO_VERSION: u32 = 1;
const DEFAULT_LEDGER_LATENCY_MS: u64 = 1500;

/// Validated session description loaded from a TOML scenario file.
#[derive(Clone, Debug)]
pub(crate) struct Scenario {
    pub(crate) game: GameId,
    pub(crate) local_player: OwnerId,
    pub(crate) salt_seed: Option<u64>,
    /// Raw wall-clock instant the simulation starts at, in milliseconds.
    pub(crate) start_ms: u64,
    pub(crate) config: GameConfig,
    pub(crate) ships: Vec<ShipSnapshot>,
    pub(crate) cannons: Vec<CannonSnapshot>,
    pub(crate) move_cards: Vec<MoveCard>,
    pub(crate) crates: Vec<CrateSnapshot>,
    /// Player intents ordered by their offset from `start_ms`.
    pub(crate) intents: Vec<ScriptedIntent>,
    pub(crate) ledger: LedgerSettings,
    /// Reveal secret restored before the first tick.
    pub(crate) restore_secret: Option<String>,
}

/// Player intent replayed at a fixed offset into the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ScriptedIntent {
    pub(crate) at_ms: u64,
    pub(crate) intent: SelectionIntent,
}

/// Behaviour of the mock ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LedgerSettings {
    pub(crate) latency_ms: u64,
    pub(crate) seed: u64,
    pub(crate) failures: Vec<FailureRule>,
}

/// Rejects the `nth` submission (1-based) of `kind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FailureRule {
    pub(crate) kind: SubmissionKind,
    pub(crate) nth: u32,
}

impl Scenario {
    /// Reads and validates the scenario stored at `path`.
    pub(crate) fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario at {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Parses and validates scenario TOML contents.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let file: ScenarioFile =
            toml::from_str(contents).context("failed to parse scenario toml contents")?;
        if file.version != SUPPORTED_SCENARIO_VERSION {
            bail!(
                "unsupported scenario version {}; expected {}",
                file.version,
                SUPPORTED_SCENARIO_VERSION
            );
        }
        if !file.config.has_valid_phases() {
            bail!("every phase must last at least one second");
        }

        let ships = unique(file.ships.into_iter().map(ShipEntry::into_snapshot), |ship| {
            ship.id.get()
        })
        .context("duplicate ship id")?;
        let ship_ids: BTreeSet<ShipId> = ships.iter().map(|ship| ship.id).collect();

        let cannons = unique(
            file.cannons.into_iter().map(CannonEntry::into_snapshot),
            |cannon| cannon.id.get(),
        )
        .context("duplicate cannon id")?;
        for cannon in &cannons {
            if !ship_ids.contains(&cannon.ship) {
                bail!(
                    "cannon {} is mounted on unknown ship {}",
                    cannon.id.get(),
                    cannon.ship.get()
                );
            }
        }

        let move_cards = unique(
            file.move_cards.into_iter().map(MoveCardEntry::into_card),
            |card| card.id.get(),
        )
        .context("duplicate move card id")?;
        let crates = unique(
            file.crates.into_iter().map(CrateEntry::into_snapshot),
            |crate_snapshot| crate_snapshot.id.get(),
        )
        .context("duplicate crate id")?;

        let mut intents = file
            .intents
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .resolve(&ship_ids)
                    .with_context(|| format!("intent #{}", index + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        intents.sort_by_key(|scripted| scripted.at_ms);

        let ledger = file.ledger.resolve()?;
        let start_ms = file
            .start_ms
            .unwrap_or_else(|| file.config.start_time.saturating_mul(1000));

        Ok(Self {
            game: GameId::new(file.game_id),
            local_player: OwnerId::new(file.local_player),
            salt_seed: file.salt_seed,
            start_ms,
            config: file.config,
            ships,
            cannons,
            move_cards,
            crates,
            intents,
            ledger,
            restore_secret: file.restore_secret,
        })
    }

    /// Commands that load the scenario into an empty world.
    pub(crate) fn setup_commands(&self) -> Vec<Command> {
        let mut commands = vec![
            Command::ConfigureGame {
                game: self.game,
                config: self.config,
            },
            Command::SetLocalPlayer {
                owner: self.local_player,
            },
        ];
        commands.extend(self.ships.iter().map(|ship| Command::SyncShip { ship: *ship }));
        commands.extend(
            self.cannons
                .iter()
                .map(|cannon| Command::SyncCannon { cannon: *cannon }),
        );
        commands.extend(
            self.move_cards
                .iter()
                .map(|card| Command::SyncMoveCard { card: *card }),
        );
        commands.extend(
            self.crates
                .iter()
                .map(|crate_snapshot| Command::SyncCrate {
                    crate_snapshot: *crate_snapshot,
                }),
        );
        commands
    }
}

fn unique<T>(items: impl Iterator<Item = T>, id: impl Fn(&T) -> u32) -> Result<Vec<T>> {
    let mut seen = BTreeSet::new();
    let mut collected = Vec::new();
    for item in items {
        let key = id(&item);
        if !seen.insert(key) {
            bail!("id {key} appears more than once");
        }
        collected.push(item);
    }
    Ok(collected)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    version: u32,
    game_id: u64,
    local_player: u64,
    #[serde(default)]
    salt_seed: Option<u64>,
    #[serde(default)]
    start_ms: Option<u64>,
    #[serde(default)]
    restore_secret: Option<String>,
    config: GameConfig,
    #[serde(default)]
    ships: Vec<ShipEntry>,
    #[serde(default)]
    cannons: Vec<CannonEntry>,
    #[serde(default)]
    move_cards: Vec<MoveCardEntry>,
    #[serde(default)]
    crates: Vec<CrateEntry>,
    #[serde(default)]
    intents: Vec<IntentEntry>,
    #[serde(default)]
    ledger: LedgerEntry,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShipEntry {
    id: u32,
    owner: u64,
    x: f32,
    y: f32,
    #[serde(default)]
    rotation: f32,
    length: f32,
    speed: f32,
    health: u32,
    #[serde(default)]
    max_health: Option<u32>,
    #[serde(default = "default_sail")]
    sail: SailPosition,
    #[serde(default)]
    firepower: f32,
    #[serde(default)]
    on_fire: u32,
    #[serde(default)]
    damaged_cannons: u32,
}

fn default_sail() -> SailPosition {
    SailPosition::Full
}

impl ShipEntry {
    fn into_snapshot(self) -> ShipSnapshot {
        ShipSnapshot {
            id: ShipId::new(self.id),
            owner: OwnerId::new(self.owner),
            position: Coord::new(self.x, self.y),
            rotation: self.rotation,
            length: self.length,
            speed: self.speed,
            health: self.health,
            max_health: self.max_health.unwrap_or(self.health),
            sail: self.sail,
            firepower: self.firepower,
            on_fire: self.on_fire,
            damaged_cannons: self.damaged_cannons,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CannonEntry {
    id: u32,
    ship: u32,
    rotation: f32,
    range: f32,
    #[serde(default)]
    firepower: f32,
    #[serde(default)]
    loaded: bool,
}

impl CannonEntry {
    fn into_snapshot(self) -> CannonSnapshot {
        CannonSnapshot {
            id: CannonId::new(self.id),
            ship: ShipId::new(self.ship),
            rotation: self.rotation,
            range: self.range,
            firepower: self.firepower,
            loaded: self.loaded,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MoveCardEntry {
    id: u32,
    distance: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default)]
    direction: f32,
}

impl MoveCardEntry {
    fn into_card(self) -> MoveCard {
        MoveCard {
            id: MoveCardId::new(self.id),
            distance: self.distance,
            rotation: self.rotation,
            direction: self.direction,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CrateEntry {
    id: u32,
    x: f32,
    y: f32,
}

impl CrateEntry {
    fn into_snapshot(self) -> CrateSnapshot {
        CrateSnapshot {
            id: CrateId::new(self.id),
            position: Coord::new(self.x, self.y),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IntentEntry {
    at_ms: u64,
    ship: u32,
    kind: String,
    #[serde(default)]
    card: Option<u32>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    cannon: Option<u32>,
    #[serde(default, rename = "crate")]
    crate_id: Option<u32>,
}

impl IntentEntry {
    fn resolve(&self, ships: &BTreeSet<ShipId>) -> Result<ScriptedIntent> {
        let ship = ShipId::new(self.ship);
        if !ships.contains(&ship) {
            bail!("unknown ship {}", self.ship);
        }

        let intent = match self.kind.as_str() {
            "select_move" => {
                let Some(card) = self.card else {
                    bail!("select_move requires `card`");
                };
                SelectionIntent::SelectMove {
                    ship,
                    card: MoveCardId::new(card),
                }
            }
            "clear_move" => SelectionIntent::ClearMove { ship },
            "toggle" => {
                let name = self
                    .action
                    .as_deref()
                    .context("toggle requires `action`")?;
                let kind = parse_action(name)?;
                match kind {
                    ActionType::Load | ActionType::Fire => {
                        let Some(cannon) = self.cannon else {
                            bail!("{name} requires `cannon`");
                        };
                        SelectionIntent::ToggleCannon {
                            ship,
                            kind,
                            cannon: CannonId::new(cannon),
                        }
                    }
                    ActionType::ClaimCrate => {
                        let Some(crate_id) = self.crate_id else {
                            bail!("ClaimCrate requires `crate`");
                        };
                        SelectionIntent::ToggleCrate {
                            ship,
                            crate_id: CrateId::new(crate_id),
                        }
                    }
                    ActionType::None => bail!("`None` cannot be toggled"),
                    _ => SelectionIntent::ToggleSimple { ship, kind },
                }
            }
            other => bail!("unknown intent kind `{other}`"),
        };

        Ok(ScriptedIntent {
            at_ms: self.at_ms,
            intent,
        })
    }
}

fn parse_action(name: &str) -> Result<ActionType> {
    ActionType::ALL
        .into_iter()
        .find(|kind| kind.name().eq_ignore_ascii_case(name))
        .with_context(|| format!("unknown action `{name}`"))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LedgerEntry {
    #[serde(default = "default_latency")]
    latency_ms: u64,
    #[serde(default)]
    seed: u64,
    #[serde(default)]
    failures: Vec<FailureEntry>,
}

impl Default for LedgerEntry {
    fn default() -> Self {
        Self {
            latency_ms: DEFAULT_LEDGER_LATENCY_MS,
            seed: 0,
            failures: Vec::new(),
        }
    }
}

fn default_latency() -> u64 {
    DEFAULT_LEDGER_LATENCY_MS
}

impl LedgerEntry {
    fn resolve(self) -> Result<LedgerSettings> {
        let failures = self
            .failures
            .into_iter()
            .map(|entry| {
                let kind = match entry.kind.as_str() {
                    "commit" => SubmissionKind::Commit,
                    "reveal" => SubmissionKind::Reveal,
                    "actions" => SubmissionKind::Actions,
                    other => bail!("unknown submission kind `{other}` in ledger failures"),
                };
                if entry.nth == 0 {
                    bail!("ledger failure occurrences start at 1");
                }
                Ok(FailureRule {
                    kind,
                    nth: entry.nth,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LedgerSettings {
            latency_ms: self.latency_ms,
            seed: self.seed,
            failures,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FailureEntry {
    kind: String,
    nth: u32,
}
