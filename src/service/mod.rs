//! Operator endpoints, without a transport.
//!
//! Both operations require the static credential pair from the config. The
//! identities they act as are explicit config values.

use hps_core::{custody::CustodyAsset, Address, Amount, Call, Chain, ChainError, UNLIMITED};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const ESCROW_CREATED_MESSAGE: &str = "Escrow created successfully";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StakeResponse {
    pub staked_amount: Amount,
    pub staker_address: Address,
    pub tx_hash: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EscrowResponse {
    pub message: String,
    pub tx_hash: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("unauthorized")]
    Unauthorized,

    /// The ledger refused the transaction.
    #[error("{0}")]
    Rejected(String),

    /// The custody asset failed underneath the ledger.
    #[error("{0}")]
    Custody(String),
}

impl ServiceError {
    /// Status a transport should answer with. Any failure past the
    /// credential check is a server error carrying the reason.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Unauthorized => 401,
            ServiceError::Rejected(_) | ServiceError::Custody(_) => 500,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}

impl From<ChainError> for ServiceError {
    fn from(err: ChainError) -> Self {
        if err.is_custody_failure() {
            ServiceError::Custody(err.reason())
        } else {
            ServiceError::Rejected(err.reason())
        }
    }
}

pub struct ApiService {
    operator: Address,
    staker: Address,
    amount_to_stake: Amount,
    credentials: Credentials,
}

impl ApiService {
    pub fn new(config: &Config) -> Self {
        Self {
            operator: config.accounts.operator,
            staker: config.accounts.staker,
            amount_to_stake: config.amount_to_stake,
            credentials: Credentials {
                user: config.auth.user.clone(),
                password: config.auth.password.clone(),
            },
        }
    }

    pub fn authorize(&self, presented: &Credentials) -> Result<(), ServiceError> {
        if presented != &self.credentials {
            tracing::warn!(user = %presented.user, "credential mismatch");
            return Err(ServiceError::Unauthorized);
        }
        Ok(())
    }

    /// Approve the ledger on the staker's behalf, then stake the configured
    /// amount for them as the operator.
    pub fn stake(
        &self,
        chain: &mut Chain,
        presented: &Credentials,
    ) -> Result<StakeResponse, ServiceError> {
        self.authorize(presented)?;
        let ledger = chain.ledger().address();
        let custody_balance = chain.token().balance_of(&self.staker);
        tracing::debug!(staker = %self.staker, custody_balance, amount = self.amount_to_stake, "staking");

        chain
            .transact(
                self.staker,
                Call::Approve {
                    spender: ledger,
                    amount: UNLIMITED,
                },
            )
            .map_err(|err| self.failed("approve", err))?;
        let receipt = chain
            .transact(
                self.operator,
                Call::Stake {
                    participant: self.staker,
                    amount: self.amount_to_stake,
                },
            )
            .map_err(|err| self.failed("stake", err))?;

        Ok(StakeResponse {
            staked_amount: chain.ledger().get_balance_of(&self.staker),
            staker_address: self.staker,
            tx_hash: receipt.tx_hash.to_string(),
        })
    }

    /// Request an escrow for the staker with an empty requester list.
    pub fn escrow(
        &self,
        chain: &mut Chain,
        presented: &Credentials,
    ) -> Result<EscrowResponse, ServiceError> {
        self.authorize(presented)?;
        let receipt = chain
            .transact(
                self.operator,
                Call::CreateEscrow {
                    participant: self.staker,
                    requesters: Vec::new(),
                },
            )
            .map_err(|err| self.failed("escrow", err))?;
        if let Some(escrow) = receipt.created {
            tracing::info!(%escrow, tx_hash = %receipt.tx_hash, "escrow endpoint succeeded");
        }
        Ok(EscrowResponse {
            message: ESCROW_CREATED_MESSAGE.to_string(),
            tx_hash: receipt.tx_hash.to_string(),
        })
    }

    fn failed(&self, operation: &'static str, err: ChainError) -> ServiceError {
        tracing::error!(operation, staker = %self.staker, reason = %err, "operation failed");
        err.into()
    }
}
