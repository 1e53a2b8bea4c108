use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use hps_core::{Address, Amount};
use serde::{Deserialize, Serialize};

pub const DEFAULT_AMOUNT_TO_STAKE: Amount = 1_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// JSON file holding the persisted chain state.
    pub state_path: PathBuf,
    pub auto_fund_on_stake: bool,
    pub amount_to_stake: Amount,
    pub accounts: AccountsConfig,
    pub auth: AuthConfig,
    pub seed: SeedConfig,
}

/// Identities the operator endpoints act as.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AccountsConfig {
    pub operator: Address,
    pub staker: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    pub user: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SeedConfig {
    /// Custody balances minted at `init`, keyed by account.
    pub balances: Vec<SeedBalance>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedBalance {
    pub account: Address,
    pub amount: Amount,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("hps-state.json"),
            auto_fund_on_stake: false,
            amount_to_stake: DEFAULT_AMOUNT_TO_STAKE,
            accounts: AccountsConfig::default(),
            auth: AuthConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            operator: Address::from_seed("signer-0"),
            staker: Address::from_seed("signer-1"),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user: "admin".to_string(),
            password: "human-protocol".to_string(),
        }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        let accounts = AccountsConfig::default();
        let balances = [
            accounts.operator,
            accounts.staker,
            Address::from_seed("signer-2"),
        ]
        .into_iter()
        .map(|account| SeedBalance {
            account,
            amount: DEFAULT_AMOUNT_TO_STAKE,
        })
        .collect();
        Self { balances }
    }
}

impl Config {
    /// Load configuration; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// State path, resolved against the config file's directory when relative.
    pub fn resolve_state_path(&self, config_path: &Path) -> PathBuf {
        if self.state_path.is_absolute() {
            return self.state_path.clone();
        }
        match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(&self.state_path),
            _ => self.state_path.clone(),
        }
    }

    pub fn seed_balances(&self) -> Vec<(Address, Amount)> {
        self.seed
            .balances
            .iter()
            .map(|seed| (seed.account, seed.amount))
            .collect()
    }
}
