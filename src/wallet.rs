//! Fee payer keypair loading

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;

const KEYPAIR_LEN: usize = 64;

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != KEYPAIR_LEN {
        anyhow::bail!(
            "Invalid keypair length: expected {} bytes, got {}",
            KEYPAIR_LEN,
            bytes.len()
        );
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes).context("Invalid keypair bytes")
}

/// Signing key of the fee payer
#[derive(Clone)]
pub struct Wallet {
    keypair: Arc<Keypair>,
}

impl Wallet {
    /// Load from a base58-encoded 64-byte secret key, as exported by most wallets
    pub fn from_base58(secret: &str) -> Result<Self> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .context("Secret key is not valid base58")?;
        Ok(Self::from_keypair(keypair_from_bytes(&bytes)?))
    }

    /// Load from a keypair file: a JSON byte array (solana-keygen format) or 64 raw bytes
    pub fn from_file(path: &str) -> Result<Self> {
        let file_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path))?;

        let keypair = if file_bytes.len() == KEYPAIR_LEN {
            keypair_from_bytes(&file_bytes)?
        } else {
            let json: Vec<u8> = serde_json::from_slice(&file_bytes)
                .context("Failed to parse keypair JSON")?;
            keypair_from_bytes(&json)?
        };
        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").field("pubkey", &self.pubkey()).finish()
    }
}
