//! Passphrase-based symmetric encryption for API keys and time payloads.
//!
//! Wire format: `base64(salt[16] | nonce[12] | ciphertext | tag[16])`.
//! The AES-256-GCM key is derived per message with PBKDF2-HMAC-SHA256 over
//! the passphrase and the random salt.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::Hmac;
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;

use super::{CryptoError, Result};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const PBKDF2_ROUNDS: u32 = 4_096;

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

/// Encrypt raw bytes under `passphrase`.
pub fn encrypt(plaintext: &[u8], passphrase: &str) -> Result<String> {
    let salt: [u8; SALT_LEN] = rand::thread_rng().r#gen();
    let nonce: [u8; NONCE_LEN] = rand::thread_rng().r#gen();

    let key = derive_key(passphrase, &salt)?;
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|e| CryptoError::Encrypt(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(out))
}

/// Decrypt a payload produced by [`encrypt`]. A wrong passphrase, tampered
/// bytes, or malformed input all come back as `Err`.
pub fn decrypt(encoded: &str, passphrase: &str) -> Result<Vec<u8>> {
    let raw = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::Encoding(e.to_string()))?;
    if raw.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Truncated(raw.len()));
    }

    let (salt, rest) = raw.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt)?;
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|e| CryptoError::Decrypt(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| CryptoError::Decrypt(e.to_string()))
}

/// Encrypt any serializable payload as JSON.
pub fn encrypt_json<T: Serialize>(payload: &T, passphrase: &str) -> Result<String> {
    let json = serde_json::to_vec(payload).map_err(|e| CryptoError::Payload(e.to_string()))?;
    encrypt(&json, passphrase)
}

/// Decrypt and deserialize a payload produced by [`encrypt_json`].
pub fn decrypt_json<T: DeserializeOwned>(encoded: &str, passphrase: &str) -> Result<T> {
    let bytes = decrypt(encoded, passphrase)?;
    serde_json::from_slice(&bytes).map_err(|e| CryptoError::Payload(e.to_string()))
}
