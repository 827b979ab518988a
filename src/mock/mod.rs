//! In-process backends
//!
//! [`InMemoryLedger`] and [`SimulatedEncryption`] implement the ledger and
//! encryption traits without any network. They share one proof scheme so a
//! bundle produced by the simulated service is accepted by the in-memory
//! ledger, and a tampered bundle is not.

mod encryption;
mod ledger;

pub use encryption::SimulatedEncryption;
pub use ledger::{InMemoryLedger, InMemorySigner};

use sha2::{Digest, Sha256};

/// Proof the simulated service attaches to a clear-values bundle
pub fn decryption_proof(clear_values: &str) -> String {
    digest(&["decrypt", clear_values])
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    format!("0x{}", hex::encode(hasher.finalize()))
}

fn random_hex(bytes: usize) -> String {
    let buf: Vec<u8> = (0..bytes).map(|_| rand::random::<u8>()).collect();
    format!("0x{}", hex::encode(buf))
}
