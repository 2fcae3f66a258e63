//! Battle resolution between two cards of the same owner.
//!
//! The resolver holds no ledger authority of its own: it acts through the
//! ledger under its own address, which must have been granted `FRIEND`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::access::Role;
use crate::address::Address;
use crate::error::LedgerError;
use crate::ledger::{Ledger, Score, TokenId};

/// How the winner of a battle is chosen.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WinnerPolicy {
    /// Random draw where each side weighs `max(score, 0) + 1`.
    #[default]
    ScoreWeighted,
    /// Higher score wins; ties go to the lower id.
    HigherScore,
}

impl WinnerPolicy {
    pub fn pick<R: Rng + ?Sized>(
        self,
        first: (TokenId, Score),
        second: (TokenId, Score),
        rng: &mut R,
    ) -> TokenId {
        match self {
            WinnerPolicy::ScoreWeighted => {
                let weight_first = weight(first.1);
                let weight_second = weight(second.1);
                let draw = rng.gen_range(0..weight_first + weight_second);
                if draw < weight_first {
                    first.0
                } else {
                    second.0
                }
            }
            WinnerPolicy::HigherScore => {
                if first.1 > second.1 || (first.1 == second.1 && first.0 < second.0) {
                    first.0
                } else {
                    second.0
                }
            }
        }
    }
}

fn weight(score: Score) -> u128 {
    u128::from(score.max(0).unsigned_abs()) + 1
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    BattleCompleted {
        first_id: TokenId,
        second_id: TokenId,
        winner_id: TokenId,
        caller: Address,
    },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleOutcome {
    pub winner_id: TokenId,
    pub loser_id: TokenId,
    pub winner_score: Score,
}

#[derive(Clone, Debug)]
pub struct BattleResolver {
    address: Address,
    policy: WinnerPolicy,
    events: Vec<BattleEvent>,
}

impl BattleResolver {
    pub fn new(address: Address, policy: WinnerPolicy) -> Self {
        Self {
            address,
            policy,
            events: Vec::new(),
        }
    }

    /// Principal the resolver acts as against the ledger.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn policy(&self) -> WinnerPolicy {
        self.policy
    }

    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    /// Fights `first_id` against `second_id`, both owned by `caller`.
    ///
    /// The winner gains one point and the loser is burned. Every check runs
    /// before the first ledger write, so a refused battle leaves the ledger
    /// untouched.
    pub fn battle<R: Rng + ?Sized>(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        first_id: TokenId,
        second_id: TokenId,
        rng: &mut R,
    ) -> Result<BattleOutcome, LedgerError> {
        for id in [first_id, second_id] {
            if ledger.balance_of(&caller, id) != 1 {
                return Err(LedgerError::NotOwner { owner: caller, id });
            }
        }
        if first_id == second_id {
            return Err(LedgerError::InvalidInput("a card cannot battle itself"));
        }
        ledger
            .access()
            .ensure_any(&self.address, &[Role::Admin, Role::Friend], "resolve battles")?;

        let winner_id = self.policy.pick(
            (first_id, ledger.score(first_id)),
            (second_id, ledger.score(second_id)),
            rng,
        );
        let loser_id = if winner_id == first_id {
            second_id
        } else {
            first_id
        };
        let previous = ledger.score(winner_id);
        let winner_score = previous.checked_add(1).ok_or(LedgerError::Overflow)?;

        ledger.set_score(self.address, winner_id, winner_score)?;
        if let Err(err) = ledger.burn(self.address, caller, loser_id) {
            ledger.set_score(self.address, winner_id, previous)?;
            return Err(err);
        }

        self.events.push(BattleEvent::BattleCompleted {
            first_id,
            second_id,
            winner_id,
            caller,
        });
        info!(first_id, second_id, winner_id, loser_id, caller = %caller, "battle completed");
        Ok(BattleOutcome {
            winner_id,
            loser_id,
            winner_score,
        })
    }
}
