//! ChaCha20-Poly1305 record cipher.

use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit, Nonce};

use crate::{CipherError, Decrypter, Encrypter};

/// Nonce length for ChaCha20-Poly1305.
const NONCE_LEN: usize = 12;

/// Key length for ChaCha20-Poly1305.
const KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 cipher bound to one key.
#[derive(Clone)]
pub struct ChaChaCipher {
    cipher: ChaCha20Poly1305,
}

impl ChaChaCipher {
    /// Creates a cipher from a raw 256-bit key.
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(&key.into()),
        }
    }

    /// Creates a cipher from a hex-encoded 256-bit key.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidKey` if the key is not 64 hex characters.
    pub fn from_hex(kid: &str, key_hex: &str) -> Result<Self, CipherError> {
        let bytes = hex::decode(key_hex.trim()).map_err(|e| CipherError::InvalidKey {
            kid: kid.to_string(),
            reason: e.to_string(),
        })?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| CipherError::InvalidKey {
            kid: kid.to_string(),
            reason: format!("expected {KEY_LEN} bytes, got {}", b.len()),
        })?;
        Ok(Self::new(key))
    }
}

impl std::fmt::Debug for ChaChaCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaChaCipher").finish_non_exhaustive()
    }
}

impl Decrypter for ChaChaCipher {
    fn decrypt_message(&self, cipher: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CipherError> {
        if nonce.len() != NONCE_LEN {
            return Err(CipherError::InvalidNonce {
                expected: NONCE_LEN,
                actual: nonce.len(),
            });
        }
        self.cipher
            .decrypt(Nonce::from_slice(nonce), cipher)
            .map_err(|_| CipherError::Decrypt)
    }
}

impl Encrypter for ChaChaCipher {
    fn encrypt_message(&self, message: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CipherError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from(nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, message)
            .map_err(|_| CipherError::Encrypt)?;
        Ok((ciphertext, nonce_bytes.to_vec()))
    }
}
