use std::path::Path;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::info;

const PREFIX: &str = "AES";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
  #[error("cipher key must be 32 bytes, got {0}")]
  InvalidKey(usize),

  #[error("encryption failed")]
  Encrypt,

  #[error("decryption failed")]
  Decrypt,

  #[error("malformed encrypted value")]
  Malformed,

  #[error("invalid base64: {0}")]
  Decode(#[from] base64::DecodeError),

  #[error("key file error: {0}")]
  Io(#[from] std::io::Error),
}

/// Seals values of secure plugin keys before they are persisted.
pub trait SecretCipher: Send + Sync {
  fn encrypt(&self, plain: &str) -> Result<String, CipherError>;
  fn decrypt(&self, sealed: &str) -> Result<String, CipherError>;
}

/// AES-256-GCM cipher. Sealed values look like `AES:<nonce>:<ciphertext>`,
/// both parts base64, with a fresh random nonce per value.
pub struct AesCipher {
  cipher: Aes256Gcm,
}

impl AesCipher {
  pub fn new(key: &[u8]) -> Result<Self, CipherError> {
    if key.len() != KEY_LEN {
      return Err(CipherError::InvalidKey(key.len()));
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKey(key.len()))?;
    Ok(Self { cipher })
  }

  /// A cipher with a random key. Returns the key so it can be stored.
  pub fn generate() -> (Self, Vec<u8>) {
    let key = Aes256Gcm::generate_key(OsRng);
    let cipher = Self {
      cipher: Aes256Gcm::new(&key),
    };
    (cipher, key.to_vec())
  }

  /// Load the base64 key stored at `path`, creating one on first use.
  pub async fn load_or_create(path: &Path) -> Result<Self, CipherError> {
    match tokio::fs::read_to_string(path).await {
      Ok(encoded) => Self::new(&STANDARD.decode(encoded.trim())?),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        let (cipher, key) = Self::generate();
        if let Some(parent) = path.parent() {
          tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, STANDARD.encode(&key)).await?;
        info!(path = %path.display(), "generated cipher key");
        Ok(cipher)
      }
      Err(e) => Err(e.into()),
    }
  }
}

impl SecretCipher for AesCipher {
  fn encrypt(&self, plain: &str) -> Result<String, CipherError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = self
      .cipher
      .encrypt(&nonce, plain.as_bytes())
      .map_err(|_| CipherError::Encrypt)?;
    Ok(format!(
      "{PREFIX}:{}:{}",
      STANDARD.encode(nonce),
      STANDARD.encode(ciphertext)
    ))
  }

  fn decrypt(&self, sealed: &str) -> Result<String, CipherError> {
    let mut parts = sealed.splitn(3, ':');
    let (Some(PREFIX), Some(nonce), Some(ciphertext)) = (parts.next(), parts.next(), parts.next())
    else {
      return Err(CipherError::Malformed);
    };

    let nonce = STANDARD.decode(nonce)?;
    if nonce.len() != NONCE_LEN {
      return Err(CipherError::Malformed);
    }
    let ciphertext = STANDARD.decode(ciphertext)?;

    let plain = self
      .cipher
      .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
      .map_err(|_| CipherError::Decrypt)?;
    String::from_utf8(plain).map_err(|_| CipherError::Decrypt)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sealed_value_format() {
    let (cipher, key) = AesCipher::generate();
    assert_eq!(key.len(), KEY_LEN);

    let sealed = cipher.encrypt("s3cret").unwrap();

    assert!(sealed.starts_with("AES:"));
    assert_eq!(sealed.split(':').count(), 3);
    assert!(!sealed.contains("s3cret"));
    assert_eq!(cipher.decrypt(&sealed).unwrap(), "s3cret");
  }

  #[test]
  fn test_nonce_differs_per_value() {
    let (cipher, _) = AesCipher::generate();
    assert_ne!(cipher.encrypt("x").unwrap(), cipher.encrypt("x").unwrap());
  }

  #[test]
  fn test_wrong_key_cannot_decrypt() {
    let (alice, _) = AesCipher::generate();
    let (bob, _) = AesCipher::generate();
    let sealed = alice.encrypt("token").unwrap();
    assert!(matches!(bob.decrypt(&sealed), Err(CipherError::Decrypt)));
  }

  #[test]
  fn test_malformed_values_are_rejected() {
    let (cipher, _) = AesCipher::generate();
    assert!(matches!(cipher.decrypt("plain"), Err(CipherError::Malformed)));
    assert!(matches!(cipher.decrypt("DES:a:b"), Err(CipherError::Malformed)));
    assert!(matches!(cipher.decrypt("AES:AAAA:AAAA"), Err(CipherError::Malformed)));
  }

  #[test]
  fn test_short_key_is_rejected() {
    assert!(matches!(AesCipher::new(&[0u8; 16]), Err(CipherError::InvalidKey(16))));
  }

  #[tokio::test]
  async fn test_key_file_is_created_then_reused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cipher.key");

    let first = AesCipher::load_or_create(&path).await.unwrap();
    let sealed = first.encrypt("token").unwrap();
    assert!(path.exists());

    let second = AesCipher::load_or_create(&path).await.unwrap();
    assert_eq!(second.decrypt(&sealed).unwrap(), "token");
  }
}
