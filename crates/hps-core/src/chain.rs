//! Serialized execution host.
//!
//! Every state change goes through [`Chain::transact`]: the call runs against a
//! staged copy of the world and is committed only if it succeeds, so a failed
//! call leaves balances, allowances, registry membership, nonce and height
//! exactly as they were.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    custody::{CustodyAsset, Token},
    error::ChainError,
    events::{EventLog, EventRecord},
    ledger::StakingLedger,
    registry::EscrowRegistry,
    rewards::RewardsPool,
    types::{Address, Amount, TxHash},
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Call {
    /// Grant the spender an allowance on the custody asset.
    Approve { spender: Address, amount: Amount },
    /// Mint custody asset; the caller must be a minter.
    Mint { to: Address, amount: Amount },
    Transfer { to: Address, amount: Amount },
    Stake { participant: Address, amount: Amount },
    Unstake { participant: Address, amount: Amount },
    CreateEscrow {
        participant: Address,
        #[serde(default)]
        requesters: Vec<Address>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub height: u64,
    pub caller: Address,
    pub call: Call,
    /// Escrow address produced by a `CreateEscrow` call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Address>,
    pub events: Vec<EventRecord>,
}

/// Every contract the host executes against.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldState {
    pub token: Token,
    pub staking_token: Token,
    pub registry: EscrowRegistry,
    pub rewards_pool: RewardsPool,
    pub ledger: StakingLedger,
}

impl WorldState {
    fn apply(
        &mut self,
        caller: &Address,
        call: &Call,
        height: u64,
        log: &mut EventLog,
    ) -> Result<Option<Address>, ChainError> {
        match call {
            Call::Approve { spender, amount } => {
                self.token.approve(caller, spender, *amount, log);
                Ok(None)
            }
            Call::Mint { to, amount } => {
                self.token.mint(caller, to, *amount, log)?;
                Ok(None)
            }
            Call::Transfer { to, amount } => {
                self.token.transfer(caller, to, *amount, log)?;
                Ok(None)
            }
            Call::Stake {
                participant,
                amount,
            } => {
                self.ledger
                    .stake(caller, participant, *amount, &mut self.token, log)?;
                Ok(None)
            }
            Call::Unstake {
                participant,
                amount,
            } => {
                self.ledger
                    .unstake(caller, participant, *amount, &mut self.token, log)?;
                Ok(None)
            }
            Call::CreateEscrow {
                participant,
                requesters,
            } => {
                let escrow = self.ledger.create_escrow(
                    participant,
                    requesters.clone(),
                    &mut self.registry,
                    height,
                    log,
                )?;
                Ok(Some(escrow))
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chain {
    height: u64,
    nonce: u64,
    state: WorldState,
    receipts: Vec<Receipt>,
}

impl Chain {
    pub fn new(state: WorldState) -> Self {
        Self {
            height: 0,
            nonce: 0,
            state,
            receipts: Vec::new(),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn ledger(&self) -> &StakingLedger {
        &self.state.ledger
    }

    pub fn token(&self) -> &Token {
        &self.state.token
    }

    pub fn registry(&self) -> &EscrowRegistry {
        &self.state.registry
    }

    pub fn rewards_pool(&self) -> &RewardsPool {
        &self.state.rewards_pool
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn receipt(&self, tx_hash: &TxHash) -> Option<&Receipt> {
        self.receipts.iter().find(|receipt| &receipt.tx_hash == tx_hash)
    }

    /// Apply one call atomically and in order.
    pub fn transact(&mut self, caller: Address, call: Call) -> Result<Receipt, ChainError> {
        let tx_hash = self.tx_hash(&caller, &call)?;
        let height = self.height + 1;
        let mut staged = self.state.clone();
        let mut log = EventLog::new();

        let created = match staged.apply(&caller, &call, height, &mut log) {
            Ok(created) => created,
            Err(err) => {
                tracing::warn!(%caller, %tx_hash, reason = %err, "call reverted");
                return Err(err);
            }
        };

        self.state = staged;
        self.height = height;
        self.nonce += 1;
        let receipt = Receipt {
            tx_hash,
            height,
            caller,
            call,
            created,
            events: log.seal(tx_hash),
        };
        tracing::debug!(%caller, %tx_hash, height, events = receipt.events.len(), "call committed");
        self.receipts.push(receipt.clone());
        Ok(receipt)
    }

    fn tx_hash(&self, caller: &Address, call: &Call) -> Result<TxHash, ChainError> {
        let encoded = serde_json::to_vec(call).map_err(|e| ChainError::Encoding(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(b"hps-tx");
        hasher.update(caller.as_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.update(&encoded);
        Ok(TxHash::from_bytes(hasher.finalize().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{CustodyError, LedgerError},
        ledger::LedgerWiring,
    };

    fn chain() -> (Chain, Address) {
        let operator = Address::from_seed("operator");
        let mut token = Token::new(Address::from_seed("token"), "HMT");
        token.add_minter(operator);
        let staking_token = Token::new(Address::from_seed("stk"), "STK");
        let registry = EscrowRegistry::new(Address::from_seed("factory"), token.address());
        let rewards_pool = RewardsPool::new(
            Address::from_seed("pool"),
            staking_token.address(),
            token.address(),
        );
        let ledger = StakingLedger::new(
            Address::from_seed("ledger"),
            LedgerWiring {
                operator,
                custody: token.address(),
                registry: registry.address(),
                rewards_pool: rewards_pool.address(),
                auto_fund_on_stake: false,
            },
        );
        let state = WorldState {
            token,
            staking_token,
            registry,
            rewards_pool,
            ledger,
        };
        (Chain::new(state), operator)
    }

    #[test]
    fn committed_calls_advance_height_and_tag_events() {
        let (mut chain, operator) = chain();
        let alice = Address::from_seed("alice");
        let receipt = chain
            .transact(operator, Call::Mint { to: alice, amount: 50 })
            .unwrap();
        assert_eq!(receipt.height, 1);
        assert_eq!(chain.height(), 1);
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(receipt.events[0].tx_hash, receipt.tx_hash);
        assert_eq!(chain.receipt(&receipt.tx_hash), Some(&receipt));
    }

    #[test]
    fn identical_calls_get_distinct_hashes() {
        let (mut chain, operator) = chain();
        let alice = Address::from_seed("alice");
        let call = Call::Mint { to: alice, amount: 1 };
        let first = chain.transact(operator, call.clone()).unwrap();
        let second = chain.transact(operator, call).unwrap();
        assert_ne!(first.tx_hash, second.tx_hash);
    }

    #[test]
    fn failed_stake_leaves_chain_untouched() {
        let (mut chain, operator) = chain();
        let alice = Address::from_seed("alice");
        chain
            .transact(operator, Call::Mint { to: alice, amount: 100 })
            .unwrap();
        let before = chain.clone();

        let err = chain
            .transact(
                operator,
                Call::Stake {
                    participant: alice,
                    amount: 10,
                },
            )
            .unwrap_err();
        assert!(err.is_custody_failure());
        assert!(matches!(
            err,
            ChainError::Ledger(LedgerError::Custody(CustodyError::InsufficientAllowance { .. }))
        ));
        assert_eq!(chain, before);
    }

    #[test]
    fn world_state_round_trips_through_json() {
        let (mut chain, operator) = chain();
        let alice = Address::from_seed("alice");
        chain
            .transact(operator, Call::Mint { to: alice, amount: 100 })
            .unwrap();
        let ledger = chain.ledger().address();
        chain
            .transact(alice, Call::Approve { spender: ledger, amount: 100 })
            .unwrap();
        chain
            .transact(operator, Call::Stake { participant: alice, amount: 40 })
            .unwrap();
        let encoded = serde_json::to_string(&chain).unwrap();
        let decoded: Chain = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, chain);
        assert_eq!(decoded.ledger().get_balance_of(&alice), 40);
    }
}
