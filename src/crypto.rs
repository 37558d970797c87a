use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{Error, Result};

/// Length of the AES-256-GCM-SIV key in bytes.
pub const KEY_LEN: usize = 32;

// Two encryptions of the same plaintext under the same key must compare
// equal as strings, so indexed lookups can run on ciphertext. GCM-SIV under
// a repeated nonce reveals plaintext equality and nothing else.
const FIXED_NONCE: [u8; 12] = [0u8; 12];

/// Symmetric encryption of individual field values.
pub trait Privatiser: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// AES-256-GCM-SIV with a fixed nonce. Ciphertext is URL-safe base64 so it
/// can live in the storage key space.
pub struct AesPrivatiser {
    cipher: Aes256GcmSiv,
}

impl AesPrivatiser {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(Error::Crypto(format!(
                "key must be {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256GcmSiv::new_from_slice(key)
            .map_err(|_| Error::Crypto("failed to initialize cipher".to_string()))?;
        Ok(Self { cipher })
    }
}

impl Privatiser for AesPrivatiser {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&FIXED_NONCE), plaintext.as_bytes())
            .map_err(|_| Error::Crypto("encryption failed".to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(ciphertext))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|_| Error::Crypto("ciphertext is not valid base64".to_string()))?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&FIXED_NONCE), raw.as_ref())
            .map_err(|_| Error::Crypto("decryption failed".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|_| Error::Crypto("decrypted value is not valid UTF-8".to_string()))
    }
}
