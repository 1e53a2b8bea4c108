use std::{fs, io::Write, path::Path};

use anyhow::{bail, Context, Result};
use hps_core::{deploy::DeploymentSummary, Chain};
use serde::{Deserialize, Serialize};

const STATE_VERSION: u8 = 1;

/// On-disk form of a deployed chain.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u8,
    pub deployment: DeploymentSummary,
    pub chain: Chain,
}

impl StateFile {
    pub fn new(deployment: DeploymentSummary, chain: Chain) -> Self {
        Self {
            version: STATE_VERSION,
            deployment,
            chain,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| {
            format!(
                "failed to read state {} (run `hps init` first)",
                path.display()
            )
        })?;
        let state: StateFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse state {}", path.display()))?;
        if state.version != STATE_VERSION {
            bail!(
                "unsupported state version {} in {}",
                state.version,
                path.display()
            );
        }
        Ok(state)
    }

    /// Written to a sibling temp file, then renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let encoded = serde_json::to_vec_pretty(self).context("failed to encode state")?;
        let tmp = path.with_extension("json.tmp");
        let mut file =
            fs::File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
        file.write_all(&encoded)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to move state into {}", path.display()))?;
        tracing::debug!(path = %path.display(), height = self.chain.height(), "state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hps_core::{
        deploy::{deploy, DeployOptions},
        Address,
    };

    #[test]
    fn saved_state_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let operator = Address::from_seed("operator");
        let options = DeployOptions {
            auto_fund_on_stake: false,
            seed_balances: vec![(operator, 10)],
        };
        let (chain, summary) = deploy(operator, &options).unwrap();
        StateFile::new(summary.clone(), chain.clone())
            .save(&path)
            .unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded.deployment, summary);
        assert_eq!(loaded.chain, chain);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_state_points_at_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = StateFile::load(&dir.path().join("none.json")).unwrap_err();
        assert!(err.to_string().contains("hps init"));
    }
}
