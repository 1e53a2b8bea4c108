use std::{fs, path::Path};

use anyhow::{Context, Result};
use ed25519_dalek::SigningKey;
use hps_core::Address;
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct GeneratedIdentity {
    pub address: Address,
    pub public_key: String,
}

/// Generate an ed25519 identity and write `sk.hex`, `pk.hex` and
/// `address.txt` into `out_dir`.
pub fn generate_identity(out_dir: &Path) -> Result<GeneratedIdentity> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut sk_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut sk_bytes);
    let sk = SigningKey::from_bytes(&sk_bytes);
    let pk = sk.verifying_key();
    let address = Address::from_public_key(pk.as_bytes());

    write_file(&out_dir.join("sk.hex"), &hex::encode(sk_bytes))?;
    write_file(&out_dir.join("pk.hex"), &hex::encode(pk.as_bytes()))?;
    write_file(&out_dir.join("address.txt"), &address.to_string())?;

    Ok(GeneratedIdentity {
        address,
        public_key: hex::encode(pk.as_bytes()),
    })
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
