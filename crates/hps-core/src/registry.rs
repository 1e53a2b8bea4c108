use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{error::RegistryError, types::Address};

/// Escrow instance as recorded by the factory. Its workflow lives elsewhere.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Escrow {
    pub address: Address,
    pub token: Address,
    pub launcher: Address,
    pub staker: Address,
    pub trusted_handlers: Vec<Address>,
    pub created_at: u64,
}

/// Factory and membership set for escrow instances.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowRegistry {
    address: Address,
    token: Address,
    counter: u64,
    escrows: BTreeMap<Address, Escrow>,
}

impl EscrowRegistry {
    pub fn new(address: Address, token: Address) -> Self {
        Self {
            address,
            token,
            counter: 0,
            escrows: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn token(&self) -> Address {
        self.token
    }

    /// Instantiate and register a new escrow; the returned address is a member
    /// as soon as this returns.
    pub fn create_escrow(
        &mut self,
        launcher: &Address,
        staker: &Address,
        trusted_handlers: Vec<Address>,
        height: u64,
    ) -> Result<Address, RegistryError> {
        let address = Address::contract(&self.address, self.counter);
        if self.escrows.contains_key(&address) {
            return Err(RegistryError::AddressCollision(address));
        }
        self.counter += 1;
        self.escrows.insert(
            address,
            Escrow {
                address,
                token: self.token,
                launcher: *launcher,
                staker: *staker,
                trusted_handlers,
                created_at: height,
            },
        );
        tracing::debug!(escrow = %address, staker = %staker, "escrow registered");
        Ok(address)
    }

    pub fn has_escrow(&self, address: &Address) -> bool {
        self.escrows.contains_key(address)
    }

    pub fn escrow(&self, address: &Address) -> Option<&Escrow> {
        self.escrows.get(address)
    }

    pub fn escrows(&self) -> impl Iterator<Item = &Escrow> {
        self.escrows.values()
    }

    pub fn len(&self) -> usize {
        self.escrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escrows.is_empty()
    }
}
