use thiserror::Error;

use crate::types::{Address, Amount};

/// Failures raised by the custody asset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodyError {
    /// Account balance is below the requested amount.
    #[error("insufficient funds in {account}: have {have}, need {need}")]
    InsufficientFunds {
        account: Address,
        have: Amount,
        need: Amount,
    },

    /// Spender has not been approved for the requested amount.
    #[error("insufficient allowance for {spender} on {owner}: have {have}, need {need}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        have: Amount,
        need: Amount,
    },

    /// Caller holds no mint rights on this asset.
    #[error("{0} is not a minter")]
    NotMinter(Address),

    /// Supply or balance would exceed the amount range.
    #[error("amount overflow")]
    Overflow,
}

/// Failures raised by the escrow factory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Derived escrow address is already registered.
    #[error("escrow address {0} already issued")]
    AddressCollision(Address),
}

/// Failures raised by the staking ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("HPS09 - NOT AUTHORIZED")]
    Unauthorized { caller: Address },

    #[error("HPS10 - THIS ADDRESS IS NOT AN STAKER")]
    NotAStaker { participant: Address },

    #[error("insufficient staked balance for {participant}: have {have}, need {need}")]
    InsufficientBalance {
        participant: Address,
        have: Amount,
        need: Amount,
    },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("staked total overflow")]
    Overflow,

    /// A collaborator other than the one bound at construction was supplied.
    #[error("{component} at {actual} is not the wired {component} {expected}")]
    WiringMismatch {
        component: &'static str,
        expected: Address,
        actual: Address,
    },

    #[error("custody failure: {0}")]
    Custody(#[from] CustodyError),

    #[error("registry failure: {0}")]
    Registry(#[from] RegistryError),
}

/// Failure of a single call submitted to the chain host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error("call encoding failed: {0}")]
    Encoding(String),
}

impl ChainError {
    /// Reason string surfaced to external callers.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// True when the failure originated in the custody asset, at any depth.
    pub fn is_custody_failure(&self) -> bool {
        matches!(
            self,
            ChainError::Custody(_) | ChainError::Ledger(LedgerError::Custody(_))
        )
    }
}
