//! Reversible hex stub. NOT cryptographically secure.
//!
//! Output is `<key>:<sequence>:<hex>`. The sequence number grows on every
//! call, so encrypting the same plaintext twice gives different ciphertext,
//! like a real non-deterministic cipher.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::Encryptor;
use crate::error::{CipherError, KeyError, Result};

#[derive(Debug, Default)]
pub struct HexEncryptor {
    keys: Option<BTreeSet<String>>,
    sequence: AtomicU64,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

impl HexEncryptor {
    /// Accepts every key name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts only the given key names; others fail with `KeyError::Unknown`.
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Some(keys.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn resolve(&self, key: &str) -> Result<()> {
        match &self.keys {
            Some(keys) if !keys.contains(key) => Err(KeyError::Unknown(key.to_string()).into()),
            _ => Ok(()),
        }
    }
}

impl Encryptor for HexEncryptor {
    fn name(&self) -> &'static str {
        "hex"
    }

    fn encrypt(&self, plaintext: &str, key: &str) -> Result<String> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.resolve(key)?;
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let hex: String = plaintext.bytes().map(|b| format!("{:02x}", b)).collect();
        Ok(format!("{}:{}:{}", key, seq, hex))
    }

    fn decrypt(&self, ciphertext: &str, key: &str) -> Result<String> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.resolve(key)?;

        let mut parts = ciphertext.splitn(3, ':');
        let (Some(owner), Some(seq), Some(hex)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CipherError::DecryptionFailed("malformed hex ciphertext".to_string()).into());
        };
        if owner != key {
            return Err(CipherError::DecryptionFailed(format!(
                "encrypted under key '{}', not '{}'",
                owner, key
            ))
            .into());
        }
        if seq.parse::<u64>().is_err()
            || hex.len() % 2 != 0
            || !hex.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(CipherError::DecryptionFailed("malformed hex ciphertext".to_string()).into());
        }

        let bytes: std::result::Result<Vec<u8>, _> = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect();
        let bytes =
            bytes.map_err(|e| CipherError::DecryptionFailed(format!("invalid hex: {}", e)))?;

        String::from_utf8(bytes)
            .map_err(|e| CipherError::DecryptionFailed(format!("UTF-8 error: {}", e)).into())
    }
}
