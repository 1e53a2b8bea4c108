use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    custody::CustodyAsset,
    error::LedgerError,
    events::{Event, EventLog},
    registry::EscrowRegistry,
    types::{Address, Amount},
};

/// Addresses and policy bound into the ledger when it is deployed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerWiring {
    pub operator: Address,
    pub custody: Address,
    pub registry: Address,
    pub rewards_pool: Address,
    /// Mint the stake amount to participants whose custody balance is short.
    #[serde(default)]
    pub auto_fund_on_stake: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakingLedger {
    address: Address,
    wiring: LedgerWiring,
    total_staked: Amount,
    balances: BTreeMap<Address, Amount>,
}

impl StakingLedger {
    pub fn new(address: Address, wiring: LedgerWiring) -> Self {
        Self {
            address,
            wiring,
            total_staked: 0,
            balances: BTreeMap::new(),
        }
    }

    /// Custody address the ledger holds staked funds under.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wiring(&self) -> &LedgerWiring {
        &self.wiring
    }

    pub fn operator(&self) -> Address {
        self.wiring.operator
    }

    pub fn get_balance_of(&self, participant: &Address) -> Amount {
        self.balances.get(participant).copied().unwrap_or(0)
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    pub fn is_staker(&self, participant: &Address) -> bool {
        self.get_balance_of(participant) > 0
    }

    /// Every participant that has ever staked, zero balances included.
    pub fn stakers(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    /// True when the running total equals the sum of all entries.
    pub fn is_conserved(&self) -> bool {
        let sum = self
            .balances
            .values()
            .try_fold(0u64, |acc, amount| acc.checked_add(*amount));
        sum == Some(self.total_staked)
    }

    pub fn stake<C: CustodyAsset + ?Sized>(
        &mut self,
        caller: &Address,
        participant: &Address,
        amount: Amount,
        custody: &mut C,
        log: &mut EventLog,
    ) -> Result<(), LedgerError> {
        self.ensure_operator(caller)?;
        self.ensure_wired("custody asset", self.wiring.custody, custody.address())?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let current = self.get_balance_of(participant);
        let balance = current.checked_add(amount).ok_or(LedgerError::Overflow)?;
        let total = self
            .total_staked
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        if self.wiring.auto_fund_on_stake && custody.balance_of(participant) < amount {
            tracing::debug!(participant = %participant, amount, "auto-funding participant before stake");
            custody.mint(&self.address, participant, amount, log)?;
        }
        custody.transfer_from(&self.address, participant, &self.address, amount, log)?;

        self.balances.insert(*participant, balance);
        self.total_staked = total;
        log.emit(Event::Staked {
            participant: *participant,
            amount,
        });
        tracing::info!(participant = %participant, amount, total_staked = total, "stake applied");
        Ok(())
    }

    pub fn unstake<C: CustodyAsset + ?Sized>(
        &mut self,
        caller: &Address,
        participant: &Address,
        amount: Amount,
        custody: &mut C,
        log: &mut EventLog,
    ) -> Result<(), LedgerError> {
        self.ensure_operator(caller)?;
        self.ensure_wired("custody asset", self.wiring.custody, custody.address())?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let have = self.get_balance_of(participant);
        if have < amount {
            return Err(LedgerError::InsufficientBalance {
                participant: *participant,
                have,
                need: amount,
            });
        }

        custody.transfer(&self.address, participant, amount, log)?;

        self.balances.insert(*participant, have - amount);
        self.total_staked -= amount;
        log.emit(Event::Unstaked {
            participant: *participant,
            amount,
        });
        tracing::info!(participant = %participant, amount, total_staked = self.total_staked, "unstake applied");
        Ok(())
    }

    /// Ask the wired factory for a new escrow on behalf of a staker. Any caller
    /// may request this; only the participant's stake is checked.
    pub fn create_escrow(
        &self,
        participant: &Address,
        requesters: Vec<Address>,
        registry: &mut EscrowRegistry,
        height: u64,
        log: &mut EventLog,
    ) -> Result<Address, LedgerError> {
        self.ensure_wired("escrow registry", self.wiring.registry, registry.address())?;
        if !self.is_staker(participant) {
            return Err(LedgerError::NotAStaker {
                participant: *participant,
            });
        }
        let escrow = registry.create_escrow(&self.address, participant, requesters, height)?;
        log.emit(Event::EscrowCreated {
            escrow_address: escrow,
            participant: *participant,
        });
        tracing::info!(participant = %participant, escrow = %escrow, "escrow created");
        Ok(escrow)
    }

    /// Merkle commitment over every balance entry and the running total.
    pub fn state_root(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(self.balances.len() + 1);
        for (participant, amount) in &self.balances {
            let mut hasher = Sha256::new();
            hasher.update(b"stake");
            hasher.update(participant.as_bytes());
            hasher.update(amount.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        let mut hasher = Sha256::new();
        hasher.update(b"total");
        hasher.update(self.total_staked.to_le_bytes());
        leaves.push(hasher.finalize().into());
        build_merkle(leaves)
    }

    fn ensure_operator(&self, caller: &Address) -> Result<(), LedgerError> {
        if *caller != self.wiring.operator {
            tracing::warn!(caller = %caller, "rejected call from non-operator");
            return Err(LedgerError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    fn ensure_wired(
        &self,
        component: &'static str,
        expected: Address,
        actual: Address,
    ) -> Result<(), LedgerError> {
        if expected != actual {
            return Err(LedgerError::WiringMismatch {
                component,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"hps-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            // Odd node is paired with itself.
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{custody::Token, error::CustodyError, types::UNLIMITED};

    struct Fixture {
        ledger: StakingLedger,
        token: Token,
        registry: EscrowRegistry,
        operator: Address,
    }

    fn fixture(auto_fund: bool) -> Fixture {
        let operator = Address::from_seed("operator");
        let mut token = Token::new(Address::from_seed("token"), "HMT");
        token.add_minter(operator);
        let registry = EscrowRegistry::new(Address::from_seed("factory"), token.address());
        let ledger_address = Address::from_seed("ledger");
        if auto_fund {
            token.add_minter(ledger_address);
        }
        let ledger = StakingLedger::new(
            ledger_address,
            LedgerWiring {
                operator,
                custody: token.address(),
                registry: registry.address(),
                rewards_pool: Address::from_seed("pool"),
                auto_fund_on_stake: auto_fund,
            },
        );
        Fixture {
            ledger,
            token,
            registry,
            operator,
        }
    }

    impl Fixture {
        fn fund_and_approve(&mut self, who: &Address, amount: Amount) {
            let mut log = EventLog::new();
            self.token.mint(&self.operator, who, amount, &mut log).unwrap();
            self.token
                .approve(who, &self.ledger.address(), UNLIMITED, &mut log);
        }
    }

    #[test]
    fn stake_pulls_custody_and_credits_balance() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        fx.fund_and_approve(&alice, 1_000);
        let mut log = EventLog::new();
        fx.ledger
            .stake(&fx.operator, &alice, 10, &mut fx.token, &mut log)
            .unwrap();
        assert_eq!(fx.ledger.get_balance_of(&alice), 10);
        assert_eq!(fx.ledger.total_staked(), 10);
        assert_eq!(fx.token.balance_of(&alice), 990);
        assert_eq!(fx.token.balance_of(&fx.ledger.address()), 10);
        assert!(fx.ledger.is_conserved());
        assert_eq!(
            log.into_events().last(),
            Some(&Event::Staked {
                participant: alice,
                amount: 10
            })
        );
    }

    #[test]
    fn non_operator_cannot_stake() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        fx.fund_and_approve(&alice, 1_000);
        let err = fx
            .ledger
            .stake(&alice, &alice, 10, &mut fx.token, &mut EventLog::new())
            .unwrap_err();
        assert_eq!(err, LedgerError::Unauthorized { caller: alice });
        assert_eq!(err.to_string(), "HPS09 - NOT AUTHORIZED");
        assert_eq!(fx.ledger.total_staked(), 0);
        assert_eq!(fx.token.balance_of(&alice), 1_000);
    }

    #[test]
    fn stake_without_allowance_is_a_custody_failure() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        fx.token
            .mint(&fx.operator, &alice, 100, &mut EventLog::new())
            .unwrap();
        let err = fx
            .ledger
            .stake(&fx.operator, &alice, 10, &mut fx.token, &mut EventLog::new())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Custody(CustodyError::InsufficientAllowance { .. })
        ));
        assert_eq!(fx.ledger.get_balance_of(&alice), 0);
    }

    #[test]
    fn short_balance_fails_without_auto_fund() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        fx.fund_and_approve(&alice, 5);
        let err = fx
            .ledger
            .stake(&fx.operator, &alice, 10, &mut fx.token, &mut EventLog::new())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Custody(CustodyError::InsufficientFunds { have: 5, need: 10, .. })
        ));
    }

    #[test]
    fn auto_fund_mints_short_balance_before_pulling() {
        let mut fx = fixture(true);
        let alice = Address::from_seed("alice");
        fx.fund_and_approve(&alice, 0);
        let mut log = EventLog::new();
        fx.ledger
            .stake(&fx.operator, &alice, 1_000, &mut fx.token, &mut log)
            .unwrap();
        assert_eq!(fx.ledger.get_balance_of(&alice), 1_000);
        assert_eq!(fx.token.balance_of(&alice), 0);
        assert!(matches!(log.into_events()[0], Event::Mint { amount: 1_000, .. }));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        let err = fx
            .ledger
            .stake(&fx.operator, &alice, 0, &mut fx.token, &mut EventLog::new())
            .unwrap_err();
        assert_eq!(err, LedgerError::ZeroAmount);
    }

    #[test]
    fn unstake_returns_custody_and_rejects_overdraw() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        fx.fund_and_approve(&alice, 1_000);
        let mut log = EventLog::new();
        fx.ledger
            .stake(&fx.operator, &alice, 10, &mut fx.token, &mut log)
            .unwrap();
        fx.ledger
            .unstake(&fx.operator, &alice, 1, &mut fx.token, &mut log)
            .unwrap();
        assert_eq!(fx.ledger.get_balance_of(&alice), 9);
        assert_eq!(fx.token.balance_of(&alice), 991);

        let err = fx
            .ledger
            .unstake(&fx.operator, &alice, 10, &mut fx.token, &mut log)
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                participant: alice,
                have: 9,
                need: 10
            }
        );
        assert_eq!(fx.ledger.total_staked(), 9);
    }

    #[test]
    fn fully_unstaked_participant_keeps_zero_entry_and_loses_staker_status() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        fx.fund_and_approve(&alice, 1_000);
        let mut log = EventLog::new();
        fx.ledger
            .stake(&fx.operator, &alice, 3, &mut fx.token, &mut log)
            .unwrap();
        fx.ledger
            .unstake(&fx.operator, &alice, 3, &mut fx.token, &mut log)
            .unwrap();
        assert_eq!(fx.ledger.stakers().count(), 1);
        assert!(!fx.ledger.is_staker(&alice));
        let err = fx
            .ledger
            .create_escrow(&alice, vec![], &mut fx.registry, 1, &mut log)
            .unwrap_err();
        assert_eq!(err, LedgerError::NotAStaker { participant: alice });
    }

    #[test]
    fn create_escrow_is_gated_on_stake() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        let mut log = EventLog::new();
        let err = fx
            .ledger
            .create_escrow(&alice, vec![], &mut fx.registry, 1, &mut log)
            .unwrap_err();
        assert_eq!(err.to_string(), "HPS10 - THIS ADDRESS IS NOT AN STAKER");
        assert!(fx.registry.is_empty());

        fx.fund_and_approve(&alice, 1_000);
        fx.ledger
            .stake(&fx.operator, &alice, 10, &mut fx.token, &mut log)
            .unwrap();
        let escrow = fx
            .ledger
            .create_escrow(&alice, vec![], &mut fx.registry, 2, &mut log)
            .unwrap();
        assert!(fx.registry.has_escrow(&escrow));
        assert_eq!(fx.registry.escrow(&escrow).unwrap().launcher, fx.ledger.address());
    }

    #[test]
    fn foreign_registry_is_refused() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        fx.fund_and_approve(&alice, 1_000);
        let mut log = EventLog::new();
        fx.ledger
            .stake(&fx.operator, &alice, 10, &mut fx.token, &mut log)
            .unwrap();
        let mut rogue = EscrowRegistry::new(Address::from_seed("rogue"), fx.token.address());
        let err = fx
            .ledger
            .create_escrow(&alice, vec![], &mut rogue, 1, &mut log)
            .unwrap_err();
        assert!(matches!(err, LedgerError::WiringMismatch { component: "escrow registry", .. }));
        assert!(rogue.is_empty());
    }

    #[test]
    fn state_root_tracks_balances() {
        let mut fx = fixture(false);
        let alice = Address::from_seed("alice");
        let empty = fx.ledger.state_root();
        assert_eq!(empty, fx.ledger.state_root());
        fx.fund_and_approve(&alice, 1_000);
        fx.ledger
            .stake(&fx.operator, &alice, 10, &mut fx.token, &mut EventLog::new())
            .unwrap();
        assert_ne!(empty, fx.ledger.state_root());
    }
}
