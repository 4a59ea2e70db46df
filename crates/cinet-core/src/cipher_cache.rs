//! Passphrase-keyed Blowfish cipher cache.
//!
//! Keyed by the passphrase string's content, not by device identity: several
//! devices commonly share a passphrase, and key expansion is the most
//! expensive part of preparing a cipher. A `RwLock` favors the common case
//! (a passphrase already seen, looked up under a shared read lock) over the
//! rare one (a brand-new passphrase, which takes the write lock once).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use cinet_proto::PassphraseCipher;

/// Caches one [`PassphraseCipher`] per distinct passphrase string.
#[derive(Default)]
pub struct CipherCache {
    ciphers: RwLock<HashMap<String, Arc<PassphraseCipher>>>,
}

impl CipherCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cipher for `passphrase`, building and caching it on first
    /// use.
    #[allow(clippy::expect_used)] // Only poisoned if a prior holder panicked mid-cache-update.
    #[must_use]
    pub fn get(&self, passphrase: &str) -> Arc<PassphraseCipher> {
        if let Some(cipher) = self
            .ciphers
            .read()
            .expect("cipher cache lock poisoned")
            .get(passphrase)
        {
            return Arc::clone(cipher);
        }

        let mut ciphers = self.ciphers.write().expect("cipher cache lock poisoned");
        Arc::clone(
            ciphers
                .entry(passphrase.to_string())
                .or_insert_with(|| Arc::new(PassphraseCipher::new(passphrase))),
        )
    }

    /// Number of distinct passphrases currently cached.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ciphers.read().expect("cipher cache lock poisoned").len()
    }

    /// Whether the cache currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
