//! Lookup table from `(algorithm, key id)` to decrypter.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::{AlgorithmType, ChaChaCipher, CipherError, Decrypter, NoopCipher};

/// One configured decrypter.
///
/// ```toml
/// [[cipher]]
/// alg = "chacha20poly1305"
/// kid = "current"
/// key = "000102...1f"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CipherConfig {
    /// Algorithm tag, as found on records.
    pub alg: String,
    /// Key id, as found on records.
    pub kid: String,
    /// Hex-encoded key. Required for every algorithm except `none`.
    #[serde(default)]
    pub key: Option<String>,
}

/// Registry of decrypters keyed by algorithm and key id.
#[derive(Clone, Default)]
pub struct Ciphers {
    decrypters: HashMap<(AlgorithmType, String), Arc<dyn Decrypter>>,
}

impl Ciphers {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from configuration entries.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::UnknownAlgorithm` for unsupported tags and
    /// `CipherError::InvalidKey` for missing or malformed keys.
    pub fn from_config(entries: &[CipherConfig]) -> Result<Self, CipherError> {
        let mut ciphers = Self::new();
        for entry in entries {
            let alg: AlgorithmType = entry.alg.parse()?;
            let decrypter: Arc<dyn Decrypter> = match alg {
                AlgorithmType::None => Arc::new(NoopCipher),
                AlgorithmType::ChaCha20Poly1305 => {
                    let key = entry.key.as_deref().ok_or_else(|| CipherError::InvalidKey {
                        kid: entry.kid.clone(),
                        reason: "missing key".to_string(),
                    })?;
                    Arc::new(ChaChaCipher::from_hex(&entry.kid, key)?)
                }
            };
            tracing::debug!(alg = %alg, kid = %entry.kid, "registered decrypter");
            ciphers.register(alg, &entry.kid, decrypter);
        }
        Ok(ciphers)
    }

    /// Adds or replaces the decrypter for `(alg, kid)`.
    pub fn register(&mut self, alg: AlgorithmType, kid: &str, decrypter: Arc<dyn Decrypter>) {
        self.decrypters.insert((alg, kid.to_string()), decrypter);
    }

    /// Resolves the decrypter for a record's algorithm tag and key id.
    ///
    /// Returns `None` if the tag is not a supported algorithm or no
    /// decrypter is registered for the pair.
    pub fn get(&self, alg: &str, kid: &str) -> Option<Arc<dyn Decrypter>> {
        let alg: AlgorithmType = alg.parse().ok()?;
        self.decrypters.get(&(alg, kid.to_string())).cloned()
    }

    /// Number of registered decrypters.
    pub fn len(&self) -> usize {
        self.decrypters.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.decrypters.is_empty()
    }
}

impl std::fmt::Debug for Ciphers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .decrypters
            .keys()
            .map(|(alg, kid)| format!("{alg}/{kid}"))
            .collect();
        keys.sort();
        f.debug_struct("Ciphers").field("decrypters", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Encrypter;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[derive(Deserialize)]
    struct File {
        cipher: Vec<CipherConfig>,
    }

    #[test]
    fn builds_registry_from_toml() {
        let file: File = toml::from_str(&format!(
            r#"
            [[cipher]]
            alg = "none"
            kid = "none"

            [[cipher]]
            alg = "chacha20poly1305"
            kid = "current"
            key = "{KEY_HEX}"
            "#
        ))
        .unwrap();

        let ciphers = Ciphers::from_config(&file.cipher).unwrap();
        assert_eq!(ciphers.len(), 2);
        assert!(ciphers.get("none", "none").is_some());
        assert!(ciphers.get("chacha20poly1305", "current").is_some());
    }

    #[test]
    fn lookup_is_keyed_by_algorithm_and_kid() {
        let mut ciphers = Ciphers::new();
        ciphers.register(AlgorithmType::None, "none", Arc::new(NoopCipher));

        assert!(ciphers.get("none", "none").is_some());
        assert!(ciphers.get("none", "other").is_none());
        assert!(ciphers.get("chacha20poly1305", "none").is_none());
        assert!(ciphers.get("rot13", "none").is_none());
    }

    #[test]
    fn resolved_decrypter_opens_matching_ciphertext() {
        let entries = vec![CipherConfig {
            alg: "chacha20poly1305".to_string(),
            kid: "current".to_string(),
            key: Some(KEY_HEX.to_string()),
        }];
        let ciphers = Ciphers::from_config(&entries).unwrap();
        let writer = ChaChaCipher::from_hex("current", KEY_HEX).unwrap();
        let (data, nonce) = writer.encrypt_message(b"payload").unwrap();

        let decrypter = ciphers.get("chacha20poly1305", "current").unwrap();
        assert_eq!(decrypter.decrypt_message(&data, &nonce).unwrap(), b"payload");
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let entries = vec![CipherConfig {
            alg: "chacha20poly1305".to_string(),
            kid: "current".to_string(),
            key: None,
        }];
        let err = Ciphers::from_config(&entries).unwrap_err();
        assert!(matches!(err, CipherError::InvalidKey { kid, .. } if kid == "current"));
    }

    #[test]
    fn unknown_algorithm_is_a_config_error() {
        let entries = vec![CipherConfig {
            alg: "box".to_string(),
            kid: "current".to_string(),
            key: None,
        }];
        assert!(matches!(
            Ciphers::from_config(&entries).unwrap_err(),
            CipherError::UnknownAlgorithm(_)
        ));
    }
}
