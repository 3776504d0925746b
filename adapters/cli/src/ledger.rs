use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, ensure, Context, Result};
use broadside_core::{
    ActionType, CannonId, CannonSnapshot, Command, CrateId, EncodedAction, GameId, Move,
    SailPosition, Salt, ShipId, ShipSnapshot, Submission, SubmissionKind, TxId, TxStatus,
};
use broadside_system_action_selection::action_system_hash;
use broadside_system_commit_reveal::build_commitment;
use broadside_system_damage_model::damage_likelihood;
use broadside_system_movement::apply_move;
use broadside_world::{query, World};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::scenario::{FailureRule, LedgerSettings};

/// In-process stand-in for the remote ledger.
///
/// Every submission is picked up on the first poll after it was requested and
/// settles once the configured latency has elapsed. Confirmed submissions are
/// applied to the world the way the authoritative resolver would report them.
#[derive(Debug)]
pub(crate) struct MockLedger {
    latency_ms: u64,
    failures: Vec<FailureRule>,
    rng: StdRng,
    seen: HashMap<SubmissionKind, u32>,
    in_flight: BTreeMap<TxId, u64>,
    commitments: HashMap<GameId, [u8; 32]>,
}

/// Terminal outcome of one settled transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Settlement {
    pub(crate) tx: TxId,
    pub(crate) kind: SubmissionKind,
    pub(crate) status: TxStatus,
    pub(crate) note: Option<String>,
}

impl MockLedger {
    /// Creates a ledger with the provided latency and failure script.
    pub(crate) fn new(settings: &LedgerSettings) -> Self {
        Self {
            latency_ms: settings.latency_ms,
            failures: settings.failures.clone(),
            rng: StdRng::seed_from_u64(settings.seed),
            seen: HashMap::new(),
            in_flight: BTreeMap::new(),
            commitments: HashMap::new(),
        }
    }

    /// Records a commitment published before the session started.
    pub(crate) fn acknowledge_commit(&mut self, game: GameId, hash: [u8; 32]) {
        let _ = self.commitments.insert(game, hash);
    }

    /// Advances every pending transaction to `now_ms`.
    pub(crate) fn poll(
        &mut self,
        now_ms: u64,
        world: &World,
        out: &mut Vec<Command>,
    ) -> Vec<Settlement> {
        let mut settled = Vec::new();
        for pending in query::pending_transactions(world) {
            let Some(&due_ms) = self.in_flight.get(&pending.tx) else {
                let _ = self
                    .in_flight
                    .insert(pending.tx, now_ms.saturating_add(self.latency_ms));
                out.push(Command::UpdateTransaction {
                    tx: pending.tx,
                    status: TxStatus::Executing,
                });
                continue;
            };
            if now_ms < due_ms {
                continue;
            }
            let _ = self.in_flight.remove(&pending.tx);

            let occurrence = self.seen.entry(pending.kind).or_insert(0);
            *occurrence += 1;
            let scripted_failure = self
                .failures
                .iter()
                .any(|rule| rule.kind == pending.kind && rule.nth == *occurrence);

            let (status, note) = if scripted_failure {
                (TxStatus::Failed, Some("scripted failure".to_owned()))
            } else {
                match self.resolve(pending.submission, world) {
                    Ok((effects, note)) => {
                        out.extend(effects);
                        (TxStatus::Complete, note)
                    }
                    Err(error) => {
                        log::warn!("ledger rejected tx {}: {error:#}", pending.tx.get());
                        (TxStatus::Failed, Some(format!("{error:#}")))
                    }
                }
            };
            out.push(Command::UpdateTransaction {
                tx: pending.tx,
                status,
            });
            settled.push(Settlement {
                tx: pending.tx,
                kind: pending.kind,
                status,
                note,
            });
        }
        settled
    }

    fn resolve(
        &mut self,
        submission: &Submission,
        world: &World,
    ) -> Result<(Vec<Command>, Option<String>)> {
        match submission {
            Submission::Commit { game, hash } => {
                let _ = self.commitments.insert(*game, *hash);
                Ok((Vec::new(), None))
            }
            Submission::Reveal { game, moves, salt } => {
                self.resolve_reveal(*game, moves, *salt, world)
            }
            Submission::Actions { game: _, actions } => self.resolve_actions(actions, world),
        }
    }

    fn resolve_reveal(
        &mut self,
        game: GameId,
        moves: &[Move],
        salt: Salt,
        world: &World,
    ) -> Result<(Vec<Command>, Option<String>)> {
        let committed = self
            .commitments
            .remove(&game)
            .context("no commitment on record for this turn")?;
        let revealed = build_commitment(game, moves, salt).context("reveal is not encodable")?;
        ensure!(
            revealed.hash == committed,
            "revealed moves do not match the commitment"
        );

        let mut effects = Vec::new();
        for entry in moves {
            let (Some(ship), Some(card)) = (
                query::ship(world, entry.ship),
                query::move_card(world, entry.card),
            ) else {
                log::debug!("skipping move of unknown ship or card: {entry:?}");
                continue;
            };
            if ship.is_sunk() {
                continue;
            }
            effects.push(Command::SyncShip {
                ship: apply_move(ship, card),
            });
        }
        let note = format!("{} move(s) resolved", effects.len());
        Ok((effects, Some(note)))
    }

    fn resolve_actions(
        &mut self,
        actions: &[EncodedAction],
        world: &World,
    ) -> Result<(Vec<Command>, Option<String>)> {
        let ship_view = query::ship_view(world);
        let cannon_view = query::cannon_view(world);
        let mut ships: BTreeMap<ShipId, ShipSnapshot> = BTreeMap::new();
        let mut cannons: BTreeMap<CannonId, CannonSnapshot> = BTreeMap::new();
        let mut effects = Vec::new();
        let mut damage = 0;

        for action in actions {
            for (hash, metadata) in action.action_hashes.iter().zip(&action.metadata) {
                let kind = ActionType::ALL
                    .into_iter()
                    .find(|kind| action_system_hash(*kind) == *hash)
                    .context("unknown action system")?;
                if kind == ActionType::None {
                    continue;
                }

                let ship = ships
                    .entry(action.ship)
                    .or_insert(*query::ship(world, action.ship).context("unknown acting ship")?);
                match kind {
                    ActionType::Load => {
                        let cannon: CannonId = bincode::deserialize(metadata)?;
                        let snapshot = cannon_entry(&mut cannons, world, cannon)?;
                        ensure!(snapshot.ship == action.ship, "cannon is not mounted on ship");
                        snapshot.loaded = true;
                        effects.push(Command::RecordExecutedCannon { cannon });
                    }
                    ActionType::Fire => {
                        let (cannon, targets): (CannonId, Vec<ShipId>) =
                            bincode::deserialize(metadata)?;
                        let snapshot = cannon_entry(&mut cannons, world, cannon)?;
                        ensure!(snapshot.loaded, "cannon {} is not loaded", cannon.get());
                        snapshot.loaded = false;
                        for target in targets {
                            let Some(likelihood) =
                                damage_likelihood(cannon, target, &ship_view, &cannon_view)
                            else {
                                continue;
                            };
                            let roll: u8 = self.rng.gen_range(0..100);
                            let hits = if roll < likelihood.three_damage {
                                3
                            } else if roll < likelihood.two_damage {
                                2
                            } else if roll < likelihood.one_damage {
                                1
                            } else {
                                0
                            };
                            if hits == 0 {
                                continue;
                            }
                            let Some(current) = query::ship(world, target) else {
                                continue;
                            };
                            let victim = ships.entry(target).or_insert(*current);
                            victim.health = victim.health.saturating_sub(hits);
                            damage += hits;
                        }
                        effects.push(Command::RecordExecutedCannon { cannon });
                    }
                    ActionType::RaiseSail | ActionType::RepairSail => {
                        ship.sail = SailPosition::Full;
                    }
                    ActionType::LowerSail => ship.sail = SailPosition::Lowered,
                    ActionType::ExtinguishFire => ship.on_fire = 0,
                    ActionType::RepairCannons => ship.damaged_cannons = 0,
                    ActionType::ClaimCrate => {
                        let crate_id: CrateId = bincode::deserialize(metadata)?;
                        if query::crate_view(world).get(crate_id).is_none() {
                            bail!("crate {} is gone", crate_id.get());
                        }
                        effects.push(Command::RemoveCrate { crate_id });
                    }
                    ActionType::None => {}
                }
                effects.push(Command::RecordExecutedAction {
                    ship: action.ship,
                    kind,
                });
            }
        }

        effects.extend(ships.into_values().map(|ship| Command::SyncShip { ship }));
        effects.extend(
            cannons
                .into_values()
                .map(|cannon| Command::SyncCannon { cannon }),
        );
        let note = format!("{} ship(s) acted, {damage} damage dealt", actions.len());
        Ok((effects, Some(note)))
    }
}

fn cannon_entry<'a>(
    cannons: &'a mut BTreeMap<CannonId, CannonSnapshot>,
    world: &World,
    cannon: CannonId,
) -> Result<&'a mut CannonSnapshot> {
    let current = *query::cannon(world, cannon)
        .with_context(|| format!("unknown cannon {}", cannon.get()))?;
    Ok(cannons.entry(cannon).or_insert(current))
}
