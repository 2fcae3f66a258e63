//! Card ledger with role-gated scoring and battles.
//!
//! * [`ledger`]: supply-bounded token registry: minting against payment,
//!   burning, scores, tiered prices and the accumulated treasury.
//! * [`access`]: `ADMIN`/`FRIEND` role membership consulted by every
//!   privileged ledger call.
//! * [`battle`]: resolves a battle between two cards of one owner, acting on
//!   the ledger through its own `FRIEND` grant.
//! * [`runtime`]: runs calls as serialized transactions over shared state.
//! * [`auth`]: ed25519 signed call envelopes.
//! * [`payment`]: native currency sink and in-memory bank.

pub mod access;
pub mod address;
pub mod auth;
pub mod battle;
pub mod config;
pub mod ledger;
pub mod payment;
pub mod runtime;
pub mod script;

mod error;

pub use address::Address;
pub use error::LedgerError;
