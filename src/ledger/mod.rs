use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::access::{AccessControl, Role};
use crate::address::Address;
use crate::config::{ConfigError, LedgerConfig};
use crate::error::LedgerError;
use crate::payment::PaymentSink;

pub type TokenId = u64;
pub type Amount = u128;
pub type Score = i64;

/// Roles allowed to destroy tokens and rewrite scores.
const OPERATOR_ROLES: &[Role] = &[Role::Admin, Role::Friend];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub id: TokenId,
    pub owner: Address,
    pub score: Score,
}

/// Indexed mint prices; minting charges the active tier.
///
/// `active` always indexes into a non-empty `tiers`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PriceTable {
    tiers: Vec<Amount>,
    active: usize,
}

impl PriceTable {
    pub(crate) fn new(tiers: Vec<Amount>, active: usize) -> Result<Self, LedgerError> {
        let table = Self { tiers, active: 0 };
        table.check_index(active)?;
        Ok(Self { active, ..table })
    }

    pub fn active_price(&self) -> Amount {
        self.tiers[self.active]
    }

    pub fn active_tier(&self) -> usize {
        self.active
    }

    pub fn tiers(&self) -> &[Amount] {
        &self.tiers
    }

    fn check_index(&self, index: usize) -> Result<(), LedgerError> {
        if index >= self.tiers.len() {
            return Err(LedgerError::InvalidTier {
                index,
                len: self.tiers.len(),
            });
        }
        Ok(())
    }
}

/// Externally tagged (`{"withdrawn": {"amount": .., "receiver": ..}}`) so that
/// `u128` amounts read back.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    Minted {
        id: TokenId,
        minter: Address,
    },
    BatchMinted {
        first_id: TokenId,
        last_id: TokenId,
        minter: Address,
    },
    Burned {
        id: TokenId,
        owner: Address,
        operator: Address,
    },
    Withdrawn {
        amount: Amount,
        receiver: Address,
    },
    MintPriceChanged {
        tier: usize,
        price: Amount,
    },
    ActiveTierChanged {
        tier: usize,
    },
    RoleGranted {
        role: Role,
        principal: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        principal: Address,
        sender: Address,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub max_supply: u64,
    pub total_supply: u64,
    pub next_id: TokenId,
    pub mint_price: Amount,
    pub accumulated_funds: Amount,
    pub owners: BTreeMap<TokenId, Address>,
    pub scores: BTreeMap<TokenId, Score>,
    pub state_root: [u8; 32],
}

/// Token registry and treasury.
///
/// Each token id is owned by at most one principal, so the balance of an
/// `(owner, id)` pair is either 0 or 1 and the live supply is the number of
/// owned ids.
#[derive(Clone, Debug)]
pub struct Ledger {
    max_supply: u64,
    base_uri: String,
    access: AccessControl,
    prices: PriceTable,
    next_id: TokenId,
    owners: BTreeMap<TokenId, Address>,
    scores: BTreeMap<TokenId, Score>,
    accumulated_funds: Amount,
    events: Vec<LedgerEvent>,
}

impl Ledger {
    /// Deploys a ledger with `admin` holding `ADMIN`.
    pub fn new(config: &LedgerConfig, admin: Address) -> Result<Self, ConfigError> {
        config.validate()?;
        if admin.is_zero() {
            return Err(ConfigError::Invalid("admin must not be the zero address"));
        }
        Ok(Self {
            max_supply: config.max_supply,
            base_uri: config.base_uri.clone(),
            access: AccessControl::new(admin),
            prices: PriceTable::new(config.price_tiers.clone(), config.active_tier)
                .map_err(|_| ConfigError::Invalid("active tier out of range"))?,
            next_id: 0,
            owners: BTreeMap::new(),
            scores: BTreeMap::new(),
            accumulated_funds: 0,
            events: Vec::new(),
        })
    }

    pub fn mint(&mut self, caller: Address, payment: Amount) -> Result<TokenId, LedgerError> {
        if caller.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.ensure_supply(1)?;
        self.ensure_paid(1, payment)?;
        let funds = self.credited_funds(payment)?;

        let id = self.next_id;
        self.next_id += 1;
        self.owners.insert(id, caller);
        self.scores.insert(id, 0);
        self.accumulated_funds = funds;
        self.events.push(LedgerEvent::Minted { id, minter: caller });
        info!(id, minter = %caller, payment, "token minted");
        Ok(id)
    }

    /// Mints `count` consecutive ids to `caller`, or nothing at all.
    pub fn mint_batch(
        &mut self,
        caller: Address,
        count: u64,
        payment: Amount,
    ) -> Result<Range<TokenId>, LedgerError> {
        if count == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if caller.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.ensure_supply(count)?;
        self.ensure_paid(count, payment)?;
        let funds = self.credited_funds(payment)?;
        let end = self
            .next_id
            .checked_add(count)
            .ok_or(LedgerError::Overflow)?;

        let ids = self.next_id..end;
        for id in ids.clone() {
            self.owners.insert(id, caller);
            self.scores.insert(id, 0);
        }
        self.next_id = end;
        self.accumulated_funds = funds;
        self.events.push(LedgerEvent::BatchMinted {
            first_id: ids.start,
            last_id: end - 1,
            minter: caller,
        });
        info!(first = ids.start, last = end - 1, minter = %caller, payment, "batch minted");
        Ok(ids)
    }

    pub fn burn(&mut self, caller: Address, owner: Address, id: TokenId) -> Result<(), LedgerError> {
        self.access.ensure_any(&caller, OPERATOR_ROLES, "burn tokens")?;
        if owner.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        if self.owners.is_empty() {
            return Err(LedgerError::NothingToBurn);
        }
        if self.balance_of(&owner, id) != 1 {
            return Err(LedgerError::NotOwner { owner, id });
        }

        self.owners.remove(&id);
        self.events.push(LedgerEvent::Burned {
            id,
            owner,
            operator: caller,
        });
        info!(id, owner = %owner, operator = %caller, "token burned");
        Ok(())
    }

    /// Scores are protocol state, so no ownership or liveness check applies.
    pub fn set_score(&mut self, caller: Address, id: TokenId, value: Score) -> Result<(), LedgerError> {
        self.access.ensure_any(&caller, OPERATOR_ROLES, "set score")?;
        self.scores.insert(id, value);
        info!(id, score = value, operator = %caller, "score set");
        Ok(())
    }

    pub fn score(&self, id: TokenId) -> Score {
        self.scores.get(&id).copied().unwrap_or(0)
    }

    pub fn set_mint_price(
        &mut self,
        caller: Address,
        tier: usize,
        price: Amount,
    ) -> Result<(), LedgerError> {
        self.access.ensure_any(&caller, &[Role::Admin], "set mint price")?;
        self.prices.check_index(tier)?;
        self.prices.tiers[tier] = price;
        self.events.push(LedgerEvent::MintPriceChanged { tier, price });
        info!(tier, price, "mint price changed");
        Ok(())
    }

    pub fn set_active_tier(&mut self, caller: Address, tier: usize) -> Result<(), LedgerError> {
        self.access.ensure_any(&caller, &[Role::Admin], "select price tier")?;
        self.prices.check_index(tier)?;
        self.prices.active = tier;
        self.events.push(LedgerEvent::ActiveTierChanged { tier });
        info!(tier, price = self.prices.active_price(), "active price tier changed");
        Ok(())
    }

    /// Sends every accumulated unit to `caller`.
    ///
    /// The balance is cleared before the push, so the recipient never observes
    /// a ledger that still holds the funds it is being paid.
    pub fn withdraw<P: PaymentSink>(
        &mut self,
        caller: Address,
        sink: &mut P,
    ) -> Result<Amount, LedgerError> {
        self.access.ensure_any(&caller, &[Role::Admin], "withdraw funds")?;
        let amount = self.accumulated_funds;
        if amount == 0 {
            return Err(LedgerError::NothingToWithdraw);
        }

        self.accumulated_funds = 0;
        if let Err(err) = sink.push(&caller, amount) {
            self.accumulated_funds = amount;
            warn!(receiver = %caller, amount, error = %err, "withdrawal transfer failed");
            return Err(LedgerError::TransferFailed {
                recipient: caller,
                amount,
            });
        }
        self.events.push(LedgerEvent::Withdrawn {
            amount,
            receiver: caller,
        });
        info!(receiver = %caller, amount, "funds withdrawn");
        Ok(amount)
    }

    pub fn uri(&self, id: TokenId) -> String {
        format!("{}{}.json", self.base_uri, id)
    }

    pub fn grant_role(
        &mut self,
        caller: Address,
        role: Role,
        principal: Address,
    ) -> Result<(), LedgerError> {
        if self.access.grant_role(&caller, role, principal)? {
            self.events.push(LedgerEvent::RoleGranted {
                role,
                principal,
                sender: caller,
            });
            info!(%role, principal = %principal, sender = %caller, "role granted");
        }
        Ok(())
    }

    pub fn revoke_role(
        &mut self,
        caller: Address,
        role: Role,
        principal: Address,
    ) -> Result<(), LedgerError> {
        if self.access.revoke_role(&caller, role, &principal)? {
            self.events.push(LedgerEvent::RoleRevoked {
                role,
                principal,
                sender: caller,
            });
            info!(%role, principal = %principal, sender = %caller, "role revoked");
        }
        Ok(())
    }

    pub fn renounce_role(&mut self, caller: Address, role: Role) {
        if self.access.renounce_role(&caller, role) {
            self.events.push(LedgerEvent::RoleRevoked {
                role,
                principal: caller,
                sender: caller,
            });
            info!(%role, principal = %caller, "role renounced");
        }
    }

    pub fn has_role(&self, role: Role, principal: &Address) -> bool {
        self.access.has_role(role, principal)
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn balance_of(&self, owner: &Address, id: TokenId) -> u64 {
        match self.owners.get(&id) {
            Some(holder) if holder == owner => 1,
            _ => 0,
        }
    }

    pub fn owner_of(&self, id: TokenId) -> Option<Address> {
        self.owners.get(&id).copied()
    }

    pub fn token(&self, id: TokenId) -> Option<Token> {
        self.owner_of(id).map(|owner| Token {
            id,
            owner,
            score: self.score(id),
        })
    }

    pub fn tokens_of<'a>(&'a self, owner: &'a Address) -> impl Iterator<Item = TokenId> + 'a {
        self.owners
            .iter()
            .filter(move |(_, holder)| *holder == owner)
            .map(|(id, _)| *id)
    }

    pub fn total_supply(&self) -> u64 {
        self.owners.len() as u64
    }

    pub fn max_supply(&self) -> u64 {
        self.max_supply
    }

    pub fn next_id(&self) -> TokenId {
        self.next_id
    }

    pub fn mint_price(&self) -> Amount {
        self.prices.active_price()
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn accumulated_funds(&self) -> Amount {
        self.accumulated_funds
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            max_supply: self.max_supply,
            total_supply: self.total_supply(),
            next_id: self.next_id,
            mint_price: self.mint_price(),
            accumulated_funds: self.accumulated_funds,
            owners: self.owners.clone(),
            scores: self.scores.clone(),
            state_root: compute_state_root(&self.owners, &self.scores, self.accumulated_funds),
        }
    }

    fn ensure_supply(&self, requested: u64) -> Result<(), LedgerError> {
        let available = self.max_supply.saturating_sub(self.total_supply());
        if requested > available {
            return Err(LedgerError::SupplyExceeded {
                requested,
                available,
            });
        }
        Ok(())
    }

    fn ensure_paid(&self, count: u64, payment: Amount) -> Result<(), LedgerError> {
        let required = self
            .mint_price()
            .checked_mul(Amount::from(count))
            .ok_or(LedgerError::Overflow)?;
        if payment < required {
            return Err(LedgerError::InsufficientFunds {
                required,
                provided: payment,
            });
        }
        Ok(())
    }

    fn credited_funds(&self, payment: Amount) -> Result<Amount, LedgerError> {
        self.accumulated_funds
            .checked_add(payment)
            .ok_or(LedgerError::Overflow)
    }
}

fn compute_state_root(
    owners: &BTreeMap<TokenId, Address>,
    scores: &BTreeMap<TokenId, Score>,
    funds: Amount,
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(owners.len() + 1);
    for (id, owner) in owners {
        let mut hasher = Sha256::new();
        hasher.update(b"card");
        hasher.update(id.to_le_bytes());
        hasher.update(owner.as_bytes());
        hasher.update(scores.get(id).copied().unwrap_or(0).to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    let mut hasher = Sha256::new();
    hasher.update(b"funds");
    hasher.update(funds.to_le_bytes());
    leaves.push(hasher.finalize().into());
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"cardwars-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
