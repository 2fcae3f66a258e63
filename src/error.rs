use thiserror::Error;

use crate::address::Address;
use crate::ledger::{Amount, TokenId};

/// Every way a state transition can be refused.
///
/// A returned error means the call had no effect on ledger, role or
/// resolver state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Minting would push the live supply past the cap.
    #[error("maximum token supply exceeded: requested {requested}, {available} left")]
    SupplyExceeded { requested: u64, available: u64 },

    /// Attached payment is below the price of the tokens requested.
    #[error("insufficient funds: required {required}, provided {provided}")]
    InsufficientFunds { required: Amount, provided: Amount },

    #[error("mint amount must be greater than zero")]
    InvalidAmount,

    /// Caller lacks every role that would permit the action.
    #[error("{caller} is not allowed to {action}")]
    Unauthorized {
        caller: Address,
        action: &'static str,
    },

    #[error("burn from the zero address is not allowed")]
    ZeroAddress,

    #[error("there are no tokens to burn")]
    NothingToBurn,

    #[error("not enough balance to withdraw")]
    NothingToWithdraw,

    #[error("token {id} is not owned by {owner}")]
    NotOwner { owner: Address, id: TokenId },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("price tier {index} does not exist ({len} tiers)")]
    InvalidTier { index: usize, len: usize },

    /// The payment facility refused to deliver funds to the recipient.
    #[error("transfer of {amount} to {recipient} failed")]
    TransferFailed { recipient: Address, amount: Amount },

    /// The payer cannot cover the payment attached to a call.
    #[error("{payer} holds {available}, cannot pay {required}")]
    InsufficientBalance {
        payer: Address,
        required: Amount,
        available: Amount,
    },
}
