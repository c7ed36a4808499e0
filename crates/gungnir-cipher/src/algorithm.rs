//! Algorithm tags found on stored records.

use crate::error::CipherError;

/// Supported encryption algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmType {
    /// No encryption.
    None,
    /// ChaCha20-Poly1305 AEAD.
    ChaCha20Poly1305,
}

impl AlgorithmType {
    /// Returns the canonical tag for this algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ChaCha20Poly1305 => "chacha20poly1305",
        }
    }
}

impl std::fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlgorithmType {
    type Err = CipherError;

    /// Parses a tag case-insensitively. An empty tag means `none`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "noop" => Ok(Self::None),
            "chacha20poly1305" | "chacha20-poly1305" => Ok(Self::ChaCha20Poly1305),
            _ => Err(CipherError::UnknownAlgorithm(s.to_string())),
        }
    }
}
