//! Fungible custody asset consumed by the staking ledger.
//!
//! The ledger only ever talks to the asset through [`CustodyAsset`]: it reads
//! balances, pulls funds through an allowance the owner granted beforehand,
//! pays funds back out of its own custody address, and (when auto-funding is
//! enabled) mints. [`Token`] is the in-memory implementation deployed by the
//! chain host.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::CustodyError,
    events::{Event, EventLog},
    types::{Address, Amount, UNLIMITED},
};

pub trait CustodyAsset {
    /// Address the asset is deployed at.
    fn address(&self) -> Address;

    fn balance_of(&self, owner: &Address) -> Amount;

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    /// Replace the allowance `spender` may pull from `owner`.
    fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount, log: &mut EventLog);

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
        log: &mut EventLog,
    ) -> Result<(), CustodyError>;

    /// Move funds out of `from` on behalf of `spender`, consuming allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
        log: &mut EventLog,
    ) -> Result<(), CustodyError>;

    fn mint(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
        log: &mut EventLog,
    ) -> Result<(), CustodyError>;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    address: Address,
    symbol: String,
    total_supply: Amount,
    minters: BTreeSet<Address>,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
}

impl Token {
    pub fn new(address: Address, symbol: impl Into<String>) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            total_supply: 0,
            minters: BTreeSet::new(),
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn add_minter(&mut self, minter: Address) {
        self.minters.insert(minter);
    }

    pub fn is_minter(&self, account: &Address) -> bool {
        self.minters.contains(account)
    }

    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    fn debit(&mut self, account: &Address, amount: Amount) -> Result<(), CustodyError> {
        let have = self.balance_of(account);
        if have < amount {
            return Err(CustodyError::InsufficientFunds {
                account: *account,
                have,
                need: amount,
            });
        }
        self.balances.insert(*account, have - amount);
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: Amount) -> Result<(), CustodyError> {
        let balance = self.balances.entry(*account).or_default();
        *balance = balance.checked_add(amount).ok_or(CustodyError::Overflow)?;
        Ok(())
    }

    fn move_funds(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
        log: &mut EventLog,
    ) -> Result<(), CustodyError> {
        if amount == 0 {
            return Ok(());
        }
        self.debit(from, amount)?;
        // Supply is bounded, so crediting after a successful debit cannot overflow.
        self.credit(to, amount)?;
        log.emit(Event::Transfer {
            asset: self.address,
            from: *from,
            to: *to,
            amount,
        });
        Ok(())
    }
}

impl CustodyAsset for Token {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, owner: &Address) -> Amount {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|granted| granted.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount, log: &mut EventLog) {
        self.allowances
            .entry(*owner)
            .or_default()
            .insert(*spender, amount);
        log.emit(Event::Approval {
            asset: self.address,
            owner: *owner,
            spender: *spender,
            amount,
        });
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
        log: &mut EventLog,
    ) -> Result<(), CustodyError> {
        self.move_funds(from, to, amount, log)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
        log: &mut EventLog,
    ) -> Result<(), CustodyError> {
        let have = self.allowance(from, spender);
        if have < amount {
            return Err(CustodyError::InsufficientAllowance {
                owner: *from,
                spender: *spender,
                have,
                need: amount,
            });
        }
        self.move_funds(from, to, amount, log)?;
        if have != UNLIMITED {
            self.allowances
                .entry(*from)
                .or_default()
                .insert(*spender, have - amount);
        }
        Ok(())
    }

    fn mint(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
        log: &mut EventLog,
    ) -> Result<(), CustodyError> {
        if !self.is_minter(caller) {
            return Err(CustodyError::NotMinter(*caller));
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(CustodyError::Overflow)?;
        self.credit(to, amount)?;
        self.total_supply = supply;
        log.emit(Event::Mint {
            asset: self.address,
            to: *to,
            amount,
        });
        Ok(())
    }
}
