//! Envelope cipher.
//!
//! Tokens are XChaCha20-Poly1305 with a random 24-byte nonce and an embedded
//! issue timestamp, wrapped in URL-safe base64 so they can live in JSON.
//!
//! Token wire format (before base64):
//!   [ version (1) | issued_at secs BE (8) | nonce (24) | ciphertext + tag ]
//!
//! Version and timestamp are authenticated as associated data.

use base64::{engine::general_purpose, Engine as _};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

pub const KEY_LEN: usize = 32;
pub const TOKEN_VERSION: u8 = 0xA1;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + 8;
const MIN_TOKEN_LEN: usize = HEADER_LEN + NONCE_LEN + TAG_LEN;

/// 32-byte symmetric key, zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey(Zeroizing<[u8; KEY_LEN]>);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        let key = Self::from_bytes(bytes);
        zeroize::Zeroize::zeroize(&mut bytes);
        key
    }

    /// URL-safe base64, the textual key encoding stored inside the key file.
    pub fn to_encoded(&self) -> Zeroizing<String> {
        Zeroizing::new(general_purpose::URL_SAFE.encode(self.0.as_slice()))
    }

    pub fn from_encoded(encoded: &[u8]) -> Result<Self> {
        let raw = Zeroizing::new(
            general_purpose::URL_SAFE
                .decode(encoded)
                .map_err(|e| VaultError::Encoding(format!("key encoding: {e}")))?,
        );
        let bytes: [u8; KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::Encoding("key length invalid".into()))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    encrypt_at(plaintext, key, Utc::now().timestamp().max(0) as u64)
}

fn encrypt_at(plaintext: &[u8], key: &SymmetricKey, issued_at: u64) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encoding(format!("cipher init: {e}")))?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let mut header = [0u8; HEADER_LEN];
    header[0] = TOKEN_VERSION;
    header[1..].copy_from_slice(&issued_at.to_be_bytes());

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: &header,
            },
        )
        .map_err(|e| VaultError::Encoding(format!("encrypt: {e}")))?;

    let mut raw = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ciphertext.len());
    raw.extend_from_slice(&header);
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);
    Ok(general_purpose::URL_SAFE.encode(raw).into_bytes())
}

/// Fails with `AuthenticationFailed` for anything `encrypt` did not produce
/// under `key`.
pub fn decrypt(token: &[u8], key: &SymmetricKey) -> Result<Zeroizing<Vec<u8>>> {
    let raw = decode_token(token)?;
    let (header, rest) = raw.split_at(HEADER_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| VaultError::AuthenticationFailed)?;
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| VaultError::AuthenticationFailed)?;
    Ok(Zeroizing::new(plaintext))
}

pub fn encrypt_str(text: &str, key: &SymmetricKey) -> Result<String> {
    let token = encrypt(text.as_bytes(), key)?;
    String::from_utf8(token).map_err(|e| VaultError::Encoding(e.to_string()))
}

pub fn decrypt_str(token: &str, key: &SymmetricKey) -> Result<String> {
    let plaintext = decrypt(token.as_bytes(), key)?;
    String::from_utf8(plaintext.to_vec())
        .map_err(|e| VaultError::Encoding(format!("plaintext is not UTF-8: {e}")))
}

/// Issue time embedded in a token. Not authenticated until the token is
/// decrypted.
pub fn issued_at(token: &[u8]) -> Result<DateTime<Utc>> {
    let raw = decode_token(token)?;
    let secs = u64::from_be_bytes(
        raw[1..HEADER_LEN]
            .try_into()
            .map_err(|_| VaultError::AuthenticationFailed)?,
    );
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .ok_or(VaultError::AuthenticationFailed)
}

fn decode_token(token: &[u8]) -> Result<Vec<u8>> {
    let raw = general_purpose::URL_SAFE
        .decode(token)
        .map_err(|_| VaultError::AuthenticationFailed)?;
    if raw.len() < MIN_TOKEN_LEN || raw[0] != TOKEN_VERSION {
        return Err(VaultError::AuthenticationFailed);
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_bytes() {
        let key = SymmetricKey::generate();
        for plaintext in [&b""[..], b"x", b"tok_abc", &[0u8, 255, 7, 128][..]] {
            let token = encrypt(plaintext, &key).unwrap();
            assert_eq!(decrypt(&token, &key).unwrap().as_slice(), plaintext);
        }
    }

    #[test]
    fn roundtrip_unicode_string() {
        let key = SymmetricKey::generate();
        let token = encrypt_str("pässwörd 🔐 密码", &key).unwrap();
        assert_eq!(decrypt_str(&token, &key).unwrap(), "pässwörd 🔐 密码");
    }

    #[test]
    fn encryption_is_randomized() {
        let key = SymmetricKey::generate();
        let a = encrypt(b"github", &key).unwrap();
        let b = encrypt(b"github", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let token = encrypt(b"secret", &SymmetricKey::generate()).unwrap();
        let err = decrypt(&token, &SymmetricKey::generate()).unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailed));
    }

    #[test]
    fn flipping_any_byte_is_detected() {
        let key = SymmetricKey::generate();
        let token = encrypt(b"do not touch", &key).unwrap();
        for i in 0..token.len() {
            let mut tampered = token.clone();
            tampered[i] ^= 0x01;
            let err = decrypt(&tampered, &key).unwrap_err();
            assert!(
                matches!(err, VaultError::AuthenticationFailed),
                "byte {i} was not detected"
            );
        }
    }

    #[test]
    fn tampered_raw_payload_is_detected() {
        let key = SymmetricKey::generate();
        let token = encrypt(b"payload", &key).unwrap();
        let mut raw = general_purpose::URL_SAFE.decode(&token).unwrap();
        for i in 0..raw.len() {
            raw[i] ^= 0x80;
            let reencoded = general_purpose::URL_SAFE.encode(&raw);
            assert!(decrypt(reencoded.as_bytes(), &key).is_err());
            raw[i] ^= 0x80;
        }
    }

    #[test]
    fn truncated_and_garbage_tokens_fail() {
        let key = SymmetricKey::generate();
        assert!(matches!(decrypt(b"", &key), Err(VaultError::AuthenticationFailed)));
        assert!(matches!(decrypt(b"not base64!", &key), Err(VaultError::AuthenticationFailed)));
        let token = encrypt(b"abc", &key).unwrap();
        let raw = general_purpose::URL_SAFE.decode(&token).unwrap();
        let short = general_purpose::URL_SAFE.encode(&raw[..MIN_TOKEN_LEN - 1]);
        assert!(matches!(decrypt(short.as_bytes(), &key), Err(VaultError::AuthenticationFailed)));
    }

    #[test]
    fn invalid_utf8_plaintext_is_encoding_error() {
        let key = SymmetricKey::generate();
        let token = encrypt(&[0xff, 0xfe, 0xfd], &key).unwrap();
        let token = String::from_utf8(token).unwrap();
        assert!(matches!(decrypt_str(&token, &key), Err(VaultError::Encoding(_))));
    }

    #[test]
    fn issued_at_reads_embedded_timestamp() {
        let key = SymmetricKey::generate();
        let token = encrypt_at(b"t", &key, 1_700_000_000).unwrap();
        assert_eq!(issued_at(&token).unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn key_encoding_roundtrip() {
        let key = SymmetricKey::generate();
        let encoded = key.to_encoded();
        assert_eq!(SymmetricKey::from_encoded(encoded.as_bytes()).unwrap(), key);
        assert!(SymmetricKey::from_encoded(b"c2hvcnQ=").is_err());
    }
}
