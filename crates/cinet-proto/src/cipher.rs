//! Blowfish/ECB cipher wrapper for the 96-byte encrypted region of a ciNet
//! frame.
//!
//! The key schedule is the passphrase's raw ASCII bytes fed directly into
//! Blowfish's key expansion: not hashed, not salted, not stretched (see
//! `DESIGN.md` for why — the original `blowfish.py` was not part of the
//! retrieved source, this is the most literal reading of §4.2's "passphrase
//! bytes are the key material"). The encrypted region is always exactly 96
//! bytes, 12 Blowfish blocks, so no padding scheme is involved: callers must
//! hand in buffers that are already a multiple of 8 bytes.

use blowfish::Blowfish;
use cipher::block_padding::NoPadding;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};

type EcbEncryptor = ecb::Encryptor<Blowfish>;
type EcbDecryptor = ecb::Decryptor<Blowfish>;

/// A Blowfish/ECB cipher keyed by a device's passphrase.
///
/// Constructed once per distinct passphrase and cached by
/// `cinet_core::cipher_cache`; cheap to clone, cheap to keep around.
#[derive(Clone)]
pub struct PassphraseCipher {
    key: Vec<u8>,
}

impl PassphraseCipher {
    /// Builds a cipher from the raw bytes of a device passphrase.
    ///
    /// # Panics
    ///
    /// Never panics on construction; key expansion is deferred to
    /// [`encrypt`](Self::encrypt)/[`decrypt`](Self::decrypt), which return
    /// `None` if `passphrase` is not a valid Blowfish key length.
    #[must_use]
    pub fn new(passphrase: &str) -> Self {
        Self {
            key: passphrase.as_bytes().to_vec(),
        }
    }

    /// Decrypts `ciphertext` in place, returning the plaintext.
    ///
    /// Returns `None` if `ciphertext` is not a non-zero multiple of 8 bytes,
    /// or if the passphrase is not a valid Blowfish key length.
    #[must_use]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Option<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % 8 != 0 {
            return None;
        }
        let decryptor = EcbDecryptor::new_from_slice(&self.key).ok()?;
        decryptor
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
            .ok()
    }

    /// Encrypts `plaintext` in place, returning the ciphertext.
    ///
    /// Returns `None` if `plaintext` is not a non-zero multiple of 8 bytes,
    /// or if the passphrase is not a valid Blowfish key length.
    #[must_use]
    pub fn encrypt(&self, plaintext: &[u8]) -> Option<Vec<u8>> {
        if plaintext.is_empty() || plaintext.len() % 8 != 0 {
            return None;
        }
        let encryptor = EcbEncryptor::new_from_slice(&self.key).ok()?;
        Some(encryptor.encrypt_padded_vec_mut::<NoPadding>(plaintext))
    }
}
