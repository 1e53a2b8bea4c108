use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, TxHash};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Transfer {
        asset: Address,
        from: Address,
        to: Address,
        amount: Amount,
    },
    Approval {
        asset: Address,
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    Mint {
        asset: Address,
        to: Address,
        amount: Amount,
    },
    Staked {
        participant: Address,
        amount: Amount,
    },
    Unstaked {
        participant: Address,
        amount: Amount,
    },
    EscrowCreated {
        #[serde(rename = "escrowAddress")]
        escrow_address: Address,
        participant: Address,
    },
}

/// Ordered buffer of events emitted while a call executes.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Attach the committing transaction hash to every buffered event.
    pub fn seal(self, tx_hash: TxHash) -> Vec<EventRecord> {
        self.events
            .into_iter()
            .map(|event| EventRecord { tx_hash, event })
            .collect()
    }
}

/// Event as surfaced to observers, tagged with its transaction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    #[serde(rename = "txHash")]
    pub tx_hash: TxHash,
    #[serde(flatten)]
    pub event: Event,
}
