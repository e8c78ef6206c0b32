//! Age encryption backend.

use std::io::{Read, Write};

use ::age::x25519;
use tracing::trace;

use super::Encryptor;
use crate::core::keys::KeyRing;
use crate::error::{CipherError, Result};

/// Age x25519 encryption, one identity per key name.
#[derive(Debug, Clone)]
pub struct AgeEncryptor {
    keys: KeyRing,
}

impl AgeEncryptor {
    pub fn new(keys: KeyRing) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }
}

impl Encryptor for AgeEncryptor {
    fn name(&self) -> &'static str {
        "age"
    }

    fn encrypt(&self, plaintext: &str, key: &str) -> Result<String> {
        let recipient = self.keys.recipient(key)?;
        encrypt_for(plaintext, &recipient)
    }

    fn decrypt(&self, ciphertext: &str, key: &str) -> Result<String> {
        let identity = self.keys.identity(key)?;
        decrypt_with(ciphertext, &identity)
    }
}

/// Encrypt `plaintext` for one recipient into ASCII-armored age.
pub fn encrypt_for(plaintext: &str, recipient: &x25519::Recipient) -> Result<String> {
    trace!(plaintext_len = plaintext.len(), "encrypting");

    let encryptor =
        ::age::Encryptor::with_recipients(std::iter::once(recipient as &dyn ::age::Recipient))
            .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(
            ::age::armor::ArmoredWriter::wrap_output(
                &mut encrypted,
                ::age::armor::Format::AsciiArmor,
            )
            .map_err(|e| CipherError::ArmorFailed(e.to_string()))?,
        )
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    writer
        .write_all(plaintext.as_bytes())
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;
    let armored = writer
        .finish()
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;
    armored
        .finish()
        .map_err(|e| CipherError::ArmorFailed(e.to_string()))?;

    trace!(ciphertext_len = encrypted.len(), "encrypted");

    String::from_utf8(encrypted)
        .map_err(|e| CipherError::EncryptionFailed(format!("UTF-8 error: {}", e)).into())
}

/// Decrypt ASCII-armored age with one identity.
pub fn decrypt_with(ciphertext: &str, identity: &x25519::Identity) -> Result<String> {
    trace!(ciphertext_len = ciphertext.len(), "decrypting");

    let reader = ::age::armor::ArmoredReader::new(ciphertext.as_bytes());
    let decryptor = ::age::Decryptor::new(reader)
        .map_err(|e| CipherError::DecryptionFailed(e.to_string()))?;

    let mut decrypted = Vec::new();
    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn ::age::Identity))
        .map_err(|e| CipherError::DecryptionFailed(e.to_string()))?;

    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| CipherError::DecryptionFailed(e.to_string()))?;

    trace!(plaintext_len = decrypted.len(), "decrypted");

    String::from_utf8(decrypted)
        .map_err(|e| CipherError::DecryptionFailed(format!("UTF-8 error: {}", e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, KeyError};
    use tempfile::TempDir;

    fn encryptor() -> (TempDir, AgeEncryptor) {
        let tmp = TempDir::new().unwrap();
        KeyRing::generate_at(&tmp.path().join("default.key")).unwrap();
        let mut keys = KeyRing::new(tmp.path());
        keys.insert("default", "default.key");
        (tmp, AgeEncryptor::new(keys))
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let (_tmp, age) = encryptor();
        let encrypted = age.encrypt("Hello, World!", "default").unwrap();

        assert!(encrypted.contains("-----BEGIN AGE ENCRYPTED FILE-----"));
        assert_eq!(age.decrypt(&encrypted, "default").unwrap(), "Hello, World!");
    }

    #[test]
    fn test_encryption_is_not_deterministic() {
        let (_tmp, age) = encryptor();
        let a = age.encrypt("same", "default").unwrap();
        let b = age.encrypt("same", "default").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_identity_fails() {
        let (_tmp, age) = encryptor();
        let encrypted = age.encrypt("secret", "default").unwrap();
        let other = x25519::Identity::generate();
        assert!(matches!(
            decrypt_with(&encrypted, &other),
            Err(Error::Cipher(CipherError::DecryptionFailed(_)))
        ));
    }

    #[test]
    fn test_garbage_ciphertext_fails() {
        let (_tmp, age) = encryptor();
        assert!(matches!(
            age.decrypt("definitely not age", "default"),
            Err(Error::Cipher(_))
        ));
    }

    #[test]
    fn test_unknown_key_name_fails_on_use() {
        let (_tmp, age) = encryptor();
        assert!(matches!(
            age.encrypt("x", "archive"),
            Err(Error::Key(KeyError::Unknown(_)))
        ));
    }
}
