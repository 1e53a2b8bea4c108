//! Core state machine for the HPS staking stack.
//!
//! * [`ledger`] — operator-gated stake/unstake accounting with a conserved
//!   running total, and staker-gated escrow requests.
//! * [`registry`] — the escrow factory and its membership set.
//! * [`custody`] — the fungible asset the ledger pulls stake through.
//! * [`chain`] — the serialized host that applies calls atomically.
//! * [`deploy`] — wiring of all contracts into a fresh chain.

pub mod chain;
pub mod custody;
pub mod deploy;
pub mod events;
pub mod ledger;
pub mod registry;
pub mod rewards;
pub mod types;

mod error;

pub use chain::{Call, Chain, Receipt};
pub use error::{ChainError, CustodyError, LedgerError, RegistryError};
pub use types::{Address, AddressParseError, Amount, TxHash, UNLIMITED};
