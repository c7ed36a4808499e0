//! Error types for the cipher registry.

/// Errors that can occur while building ciphers or processing payloads.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// The configured algorithm tag is not supported.
    #[error("unknown cipher algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Key material was missing, not hex, or the wrong length.
    #[error("invalid key for kid '{kid}': {reason}")]
    InvalidKey {
        /// The key id the key was configured for.
        kid: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The nonce does not have the length the algorithm requires.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonce {
        /// Required nonce length in bytes.
        expected: usize,
        /// Length of the nonce supplied with the record.
        actual: usize,
    },

    /// Authentication failed or the ciphertext is corrupt.
    #[error("failed to decrypt message")]
    Decrypt,

    /// The cipher rejected the plaintext.
    #[error("failed to encrypt message")]
    Encrypt,
}
