//! Serialized transaction boundary.
//!
//! [`Runtime`] owns the ledger, the battle resolver and the native bank behind
//! a single lock. Each call runs to completion under the write lock, so no
//! caller observes another call half-applied; queries share the read lock.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::access::Role;
use crate::address::Address;
use crate::auth::{AuthError, SignedCall};
use crate::battle::{BattleEvent, BattleResolver, WinnerPolicy};
use crate::config::{ConfigError, LedgerConfig};
use crate::error::LedgerError;
use crate::ledger::{Amount, Ledger, LedgerEvent, LedgerSnapshot, Score, TokenId};
use crate::payment::NativeBank;

/// Externally tagged on the wire (`{"mint": {"payment": 1}}`, `"withdraw"`);
/// `u128` amounts do not survive serde's buffered tagged representations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    Mint {
        payment: Amount,
    },
    MintBatch {
        count: u64,
        payment: Amount,
    },
    Burn {
        owner: Address,
        id: TokenId,
    },
    SetScore {
        id: TokenId,
        value: Score,
    },
    SetMintPrice {
        tier: usize,
        price: Amount,
    },
    SetActiveTier {
        tier: usize,
    },
    Withdraw,
    GrantRole {
        role: Role,
        principal: Address,
    },
    RevokeRole {
        role: Role,
        principal: Address,
    },
    RenounceRole {
        role: Role,
    },
    Battle {
        first_id: TokenId,
        second_id: TokenId,
    },
}

/// What a successful call produced. Externally tagged, like [`Call`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Receipt {
    Minted {
        id: TokenId,
    },
    BatchMinted {
        first_id: TokenId,
        last_id: TokenId,
    },
    Withdrawn {
        amount: Amount,
    },
    BattleCompleted {
        winner_id: TokenId,
        loser_id: TokenId,
        winner_score: Score,
    },
    Applied,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

struct World {
    ledger: Ledger,
    resolver: BattleResolver,
    bank: NativeBank,
    rng: StdRng,
    applied: BTreeSet<[u8; 32]>,
}

impl World {
    fn apply(&mut self, caller: Address, call: &Call) -> Result<Receipt, LedgerError> {
        let World {
            ledger,
            resolver,
            bank,
            rng,
            ..
        } = self;
        match *call {
            Call::Mint { payment } => {
                bank.ensure_covers(&caller, payment)?;
                let id = ledger.mint(caller, payment)?;
                bank.debit(&caller, payment)?;
                Ok(Receipt::Minted { id })
            }
            Call::MintBatch { count, payment } => {
                bank.ensure_covers(&caller, payment)?;
                let ids = ledger.mint_batch(caller, count, payment)?;
                bank.debit(&caller, payment)?;
                Ok(Receipt::BatchMinted {
                    first_id: ids.start,
                    last_id: ids.end - 1,
                })
            }
            Call::Burn { owner, id } => {
                ledger.burn(caller, owner, id)?;
                Ok(Receipt::Applied)
            }
            Call::SetScore { id, value } => {
                ledger.set_score(caller, id, value)?;
                Ok(Receipt::Applied)
            }
            Call::SetMintPrice { tier, price } => {
                ledger.set_mint_price(caller, tier, price)?;
                Ok(Receipt::Applied)
            }
            Call::SetActiveTier { tier } => {
                ledger.set_active_tier(caller, tier)?;
                Ok(Receipt::Applied)
            }
            Call::Withdraw => {
                let amount = ledger.withdraw(caller, bank)?;
                Ok(Receipt::Withdrawn { amount })
            }
            Call::GrantRole { role, principal } => {
                ledger.grant_role(caller, role, principal)?;
                Ok(Receipt::Applied)
            }
            Call::RevokeRole { role, principal } => {
                ledger.revoke_role(caller, role, principal)?;
                Ok(Receipt::Applied)
            }
            Call::RenounceRole { role } => {
                ledger.renounce_role(caller, role);
                Ok(Receipt::Applied)
            }
            Call::Battle {
                first_id,
                second_id,
            } => {
                let outcome = resolver.battle(ledger, caller, first_id, second_id, rng)?;
                Ok(Receipt::BattleCompleted {
                    winner_id: outcome.winner_id,
                    loser_id: outcome.loser_id,
                    winner_score: outcome.winner_score,
                })
            }
        }
    }
}

pub struct Runtime {
    world: RwLock<World>,
}

impl Runtime {
    /// Creates the ledger with `admin` as `ADMIN`, then performs the one-time
    /// `FRIEND` grant to the resolver as an ordinary admin call.
    pub fn deploy(
        config: &LedgerConfig,
        admin: Address,
        resolver: Address,
        policy: WinnerPolicy,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let mut ledger = Ledger::new(config, admin)?;
        ledger
            .grant_role(admin, Role::Friend, resolver)
            .map_err(|_| ConfigError::Invalid("resolver address cannot hold roles"))?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            world: RwLock::new(World {
                ledger,
                resolver: BattleResolver::new(resolver, policy),
                bank: NativeBank::new(),
                rng,
                applied: BTreeSet::new(),
            }),
        })
    }

    /// Applies `call` on behalf of `caller` as one indivisible transaction.
    pub fn execute(&self, caller: Address, call: Call) -> Result<Receipt, LedgerError> {
        let mut world = self.world.write();
        let result = world.apply(caller, &call);
        if let Err(err) = &result {
            debug!(caller = %caller, ?call, error = %err, "call rejected");
        }
        result
    }

    /// Verifies the envelope, then applies its call as the signer.
    ///
    /// A call that was already applied is refused; a call that failed may be
    /// resubmitted unchanged.
    pub fn submit(&self, signed: &SignedCall) -> Result<Receipt, SubmitError> {
        let caller = signed.verify()?;
        let digest = signed.digest()?;

        let mut world = self.world.write();
        if world.applied.contains(&digest) {
            return Err(AuthError::Replayed(hex::encode(digest)).into());
        }
        let receipt = world.apply(caller, &signed.call).map_err(|err| {
            debug!(caller = %caller, call = ?signed.call, error = %err, "signed call rejected");
            err
        })?;
        world.applied.insert(digest);
        Ok(receipt)
    }

    /// Credits native currency from outside the ledger.
    pub fn fund(&self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        self.world.write().bank.deposit(account, amount)
    }

    /// Makes `account` refuse incoming payments.
    pub fn refuse_payments(&self, account: Address) {
        self.world.write().bank.refuse_payments(account);
    }

    pub fn native_balance(&self, account: &Address) -> Amount {
        self.world.read().bank.balance_of(account)
    }

    pub fn balance_of(&self, owner: &Address, id: TokenId) -> u64 {
        self.world.read().ledger.balance_of(owner, id)
    }

    pub fn total_supply(&self) -> u64 {
        self.world.read().ledger.total_supply()
    }

    pub fn max_supply(&self) -> u64 {
        self.world.read().ledger.max_supply()
    }

    pub fn score(&self, id: TokenId) -> Score {
        self.world.read().ledger.score(id)
    }

    pub fn uri(&self, id: TokenId) -> String {
        self.world.read().ledger.uri(id)
    }

    pub fn mint_price(&self) -> Amount {
        self.world.read().ledger.mint_price()
    }

    pub fn accumulated_funds(&self) -> Amount {
        self.world.read().ledger.accumulated_funds()
    }

    pub fn has_role(&self, role: Role, principal: &Address) -> bool {
        self.world.read().ledger.has_role(role, principal)
    }

    pub fn resolver_address(&self) -> Address {
        self.world.read().resolver.address()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.world.read().ledger.snapshot()
    }

    pub fn ledger_events(&self) -> Vec<LedgerEvent> {
        self.world.read().ledger.events().to_vec()
    }

    pub fn battle_events(&self) -> Vec<BattleEvent> {
        self.world.read().resolver.events().to_vec()
    }

    /// Runs `f` against a consistent view of the ledger.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&Ledger) -> T) -> T {
        f(&self.world.read().ledger)
    }
}
