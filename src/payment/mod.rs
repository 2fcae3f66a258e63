//! Native currency movement in and out of the ledger.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::address::Address;
use crate::error::LedgerError;
use crate::ledger::Amount;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("recipient {0} does not accept funds")]
    Rejected(Address),
    #[error("recipient {0} balance would overflow")]
    Overflow(Address),
}

/// Pushes native currency to a recipient.
///
/// Implementations either deliver the full amount or return an error and
/// deliver nothing.
pub trait PaymentSink {
    fn push(&mut self, recipient: &Address, amount: Amount) -> Result<(), PaymentError>;
}

/// In-memory native balances for every principal.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NativeBank {
    balances: BTreeMap<Address, Amount>,
    refusing: BTreeSet<Address>,
}

impl NativeBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn deposit(&mut self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Fails without touching balances if `payer` cannot cover `amount`.
    pub fn ensure_covers(&self, payer: &Address, amount: Amount) -> Result<(), LedgerError> {
        let available = self.balance_of(payer);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                payer: *payer,
                required: amount,
                available,
            });
        }
        Ok(())
    }

    pub fn debit(&mut self, payer: &Address, amount: Amount) -> Result<(), LedgerError> {
        self.ensure_covers(payer, amount)?;
        if let Some(balance) = self.balances.get_mut(payer) {
            *balance -= amount;
        }
        Ok(())
    }

    /// Marks `account` as unable to receive funds, like a contract without
    /// a payable fallback.
    pub fn refuse_payments(&mut self, account: Address) {
        self.refusing.insert(account);
    }

    pub fn accept_payments(&mut self, account: &Address) {
        self.refusing.remove(account);
    }
}

impl PaymentSink for NativeBank {
    fn push(&mut self, recipient: &Address, amount: Amount) -> Result<(), PaymentError> {
        if self.refusing.contains(recipient) {
            warn!(recipient = %recipient, amount, "payment refused by recipient");
            return Err(PaymentError::Rejected(*recipient));
        }
        let balance = self.balances.entry(*recipient).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(PaymentError::Overflow(*recipient))?;
        Ok(())
    }
}
