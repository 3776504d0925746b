#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Client half of the commit-reveal move protocol.
//!
//! During the Commit phase the selected moves are encoded together with the
//! game id and a random salt; only the SHA-256 digest of that encoding is
//! published. The encoding itself stays local until the Reveal phase, when it
//! is decoded and disclosed so the resolver can check it against the digest.
//!
//! The local commitment is only stored once the ledger confirms the commit
//! transaction. A failed commit rolls every optimistic record back so the
//! player can recommit while the phase lasts.

use broadside_core::{
    Command, Commitment, Event, GameId, Move, MoveBatch, Salt, Submission, SubmissionKind, TxId,
    TxStatus,
};
use broadside_world::{query, World};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Lifecycle of the local commitment within one turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommitRevealState {
    /// No commitment has been requested this turn.
    Idle,
    /// A commit transaction awaits confirmation.
    Committing,
    /// The ledger confirmed the commitment.
    Committed,
    /// A reveal transaction awaits confirmation.
    Revealing,
    /// The ledger accepted the reveal.
    Revealed,
    /// The reveal was rejected; the move is forfeited for this turn.
    Failed,
}

/// Reasons a commit or reveal is aborted before reaching the store.
#[derive(Debug, Error)]
pub enum CommitRevealError {
    /// No game is configured.
    #[error("the game is not running")]
    NotRunning,
    /// No live local ship has a selected move.
    #[error("no moves selected")]
    NoMoves,
    /// The coordinator is in a state that does not accept the request.
    #[error("cannot proceed while {0:?}")]
    Busy(CommitRevealState),
    /// There is no commitment to reveal.
    #[error("no commitment to reveal")]
    NoCommitment,
    /// The commitment encoding could not be produced or read back.
    #[error("malformed commitment encoding")]
    Encoding(#[from] bincode::Error),
}

/// Encodes a move batch and derives its digest.
///
/// Moves are ordered by ship before encoding so identical selections always
/// produce identical bytes.
pub fn build_commitment(
    game: GameId,
    moves: &[Move],
    salt: Salt,
) -> Result<Commitment, bincode::Error> {
    let mut moves = moves.to_vec();
    moves.sort_unstable();
    let encoding = bincode::serialize(&MoveBatch { game, moves, salt })?;
    let hash = commitment_hash(&encoding);
    Ok(Commitment { encoding, hash })
}

/// Recovers the move batch bound by a commitment encoding.
pub fn decode_commitment(encoding: &[u8]) -> Result<MoveBatch, bincode::Error> {
    bincode::deserialize(encoding)
}

/// SHA-256 digest of a commitment encoding.
#[must_use]
pub fn commitment_hash(encoding: &[u8]) -> [u8; 32] {
    Sha256::digest(encoding).into()
}

#[derive(Clone, Debug)]
struct PendingCommit {
    tx: Option<TxId>,
    commitment: Commitment,
    moves: Vec<Move>,
}

/// Coordinator driving the commit and reveal transactions of the local player.
#[derive(Debug)]
pub struct CommitReveal {
    rng: ChaCha20Rng,
    state: CommitRevealState,
    pending: Option<PendingCommit>,
    reveal_tx: Option<TxId>,
}

impl CommitReveal {
    /// Creates a coordinator whose salts are drawn from a generator seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            state: CommitRevealState::Idle,
            pending: None,
            reveal_tx: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> CommitRevealState {
        self.state
    }

    /// Returns to [`CommitRevealState::Idle`] for a new turn.
    pub fn reset(&mut self) {
        self.state = CommitRevealState::Idle;
        self.pending = None;
        self.reveal_tx = None;
    }

    /// Builds a commitment from the selected moves and submits its digest.
    ///
    /// An empty move set is rejected unless `force` is set, in which case an
    /// empty batch is committed.
    pub fn submit_commit(
        &mut self,
        world: &World,
        force: bool,
        out: &mut Vec<Command>,
    ) -> Result<(), CommitRevealError> {
        if self.state != CommitRevealState::Idle {
            return Err(CommitRevealError::Busy(self.state));
        }
        let game = query::game_id(world).ok_or(CommitRevealError::NotRunning)?;
        let moves = query::player_ships_with_moves(world);
        if moves.is_empty() && !force {
            log::debug!("skipping commit: no moves selected");
            return Err(CommitRevealError::NoMoves);
        }

        let mut salt = [0; 32];
        self.rng.fill_bytes(&mut salt);
        let commitment = build_commitment(game, &moves, Salt::from_bytes(salt))?;

        log::info!("committing {} move(s)", moves.len());
        out.push(Command::Submit {
            submission: Submission::Commit {
                game,
                hash: commitment.hash,
            },
        });
        self.state = CommitRevealState::Committing;
        self.pending = Some(PendingCommit {
            tx: None,
            commitment,
            moves,
        });
        Ok(())
    }

    /// Discloses the moves bound by `commitment`.
    pub fn submit_reveal(
        &mut self,
        commitment: Option<&Commitment>,
        out: &mut Vec<Command>,
    ) -> Result<(), CommitRevealError> {
        let commitment = commitment.ok_or(CommitRevealError::NoCommitment)?;
        if !matches!(
            self.state,
            CommitRevealState::Idle | CommitRevealState::Committed
        ) {
            return Err(CommitRevealError::Busy(self.state));
        }

        let batch = decode_commitment(&commitment.encoding)?;
        log::info!("revealing {} move(s)", batch.moves.len());
        out.push(Command::Submit {
            submission: Submission::Reveal {
                game: batch.game,
                moves: batch.moves,
                salt: batch.salt,
            },
        });
        self.state = CommitRevealState::Revealing;
        self.reveal_tx = None;
        Ok(())
    }

    /// Reinstates a commitment from its encoding, for example after a client restart.
    pub fn restore(
        &mut self,
        encoding: Vec<u8>,
        out: &mut Vec<Command>,
    ) -> Result<MoveBatch, CommitRevealError> {
        let batch = decode_commitment(&encoding)?;
        let hash = commitment_hash(&encoding);
        out.push(Command::SetCommitment {
            commitment: Some(Commitment { encoding, hash }),
        });
        out.push(Command::SetCommittedMoves {
            moves: batch.moves.clone(),
        });
        self.state = CommitRevealState::Committed;
        self.pending = None;
        Ok(batch)
    }

    /// Tracks commit and reveal transactions through their lifecycle.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::SubmissionRequested { tx, kind } => self.on_requested(*tx, *kind),
                Event::TransactionStatusChanged {
                    tx,
                    kind: SubmissionKind::Commit,
                    status,
                } => self.on_commit_status(*tx, *status, out),
                Event::TransactionStatusChanged {
                    tx,
                    kind: SubmissionKind::Reveal,
                    status,
                } => self.on_reveal_status(*tx, *status),
                _ => {}
            }
        }
    }

    fn on_requested(&mut self, tx: TxId, kind: SubmissionKind) {
        match (kind, self.state) {
            (SubmissionKind::Commit, CommitRevealState::Committing) => {
                if let Some(pending) = self
                    .pending
                    .as_mut()
                    .filter(|pending| pending.tx.is_none())
                {
                    pending.tx = Some(tx);
                }
            }
            (SubmissionKind::Reveal, CommitRevealState::Revealing) if self.reveal_tx.is_none() => {
                self.reveal_tx = Some(tx);
            }
            _ => {}
        }
    }

    fn on_commit_status(&mut self, tx: TxId, status: TxStatus, out: &mut Vec<Command>) {
        let tracked = self.pending.as_ref().and_then(|pending| pending.tx);
        if tracked != Some(tx) {
            return;
        }
        match status {
            TxStatus::Complete => {
                let Some(pending) = self.pending.take() else {
                    return;
                };
                log::info!("commitment confirmed");
                out.push(Command::SetCommitment {
                    commitment: Some(pending.commitment),
                });
                out.push(Command::SetCommittedMoves {
                    moves: pending.moves,
                });
                self.state = CommitRevealState::Committed;
            }
            TxStatus::Failed => {
                log::warn!("commit failed; rolling back local commitment");
                out.push(Command::SetCommitment { commitment: None });
                out.push(Command::SetCommittedMoves { moves: Vec::new() });
                self.pending = None;
                self.state = CommitRevealState::Idle;
            }
            _ => {}
        }
    }

    fn on_reveal_status(&mut self, tx: TxId, status: TxStatus) {
        if self.reveal_tx != Some(tx) {
            return;
        }
        match status {
            TxStatus::Complete => {
                log::info!("reveal confirmed");
                self.state = CommitRevealState::Revealed;
            }
            TxStatus::Failed => {
                log::warn!("reveal failed; the committed move is forfeited this turn");
                self.state = CommitRevealState::Failed;
            }
            _ => {}
        }
    }
}
