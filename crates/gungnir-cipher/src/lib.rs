//! Decrypter registry for stored device records.
//!
//! Every record carries the algorithm tag and key id it was encrypted with.
//! [`Ciphers`] maps that `(algorithm, key id)` pair to a [`Decrypter`]
//! handle. The registry is built once from configuration and shared
//! read-only between requests.
//!
//! Two algorithms are supported:
//!
//! | Tag | Type | Notes |
//! |-----|------|-------|
//! | `none` | [`NoopCipher`] | identity, used for unencrypted deployments and tests |
//! | `chacha20poly1305` | [`ChaChaCipher`] | AEAD with a 256-bit key and 96-bit nonce |

mod algorithm;
mod chacha;
mod error;
mod registry;

pub use algorithm::AlgorithmType;
pub use chacha::ChaChaCipher;
pub use error::CipherError;
pub use registry::{CipherConfig, Ciphers};

/// Decrypts record payloads.
pub trait Decrypter: Send + Sync {
    /// Decrypts `cipher` with the record's `nonce`.
    ///
    /// # Errors
    ///
    /// Returns `CipherError` if the ciphertext fails authentication or the
    /// nonce is malformed.
    fn decrypt_message(&self, cipher: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Encrypts record payloads. Returns `(ciphertext, nonce)`.
///
/// The API itself only reads records; encryption is used by record writers
/// and by tests that need realistic stored data.
pub trait Encrypter: Send + Sync {
    /// Encrypts `message` under a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Encrypt` if the cipher rejects the input.
    fn encrypt_message(&self, message: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CipherError>;
}

/// Pass-through cipher for the `none` algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCipher;

impl Decrypter for NoopCipher {
    fn decrypt_message(&self, cipher: &[u8], _nonce: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(cipher.to_vec())
    }
}

impl Encrypter for NoopCipher {
    fn encrypt_message(&self, message: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CipherError> {
        Ok((message.to_vec(), Vec::new()))
    }
}
