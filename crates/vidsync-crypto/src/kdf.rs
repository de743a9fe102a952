//! Key derivation: PBKDF2 password → base key, HKDF-SHA512 base key → sub-keys

use base64::{engine::general_purpose::STANDARD, Engine};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SubKey;
use crate::{BASE_KEY_SIZE, KEY_SIZE};

/// HKDF salt for every sub-key derivation. Never change this.
const STATIC_SALT: [u8; 16] = [
    51, 69, 157, 79, 128, 11, 35, 38, 129, 168, 7, 182, 196, 238, 180, 247,
];

/// Hash used as the PBKDF2 PRF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfHash {
    Sha256,
    Sha384,
    Sha512,
}

/// Versioned PBKDF2 parameters.
///
/// Append-only: re-deriving an old login must reproduce the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub version: &'static str,
    /// When this version was introduced (RFC 3339)
    pub introduced: &'static str,
    pub algorithm: KdfHash,
    pub iterations: u32,
}

pub const KDF_PARAMS: &[KdfParams] = &[KdfParams {
    version: "1",
    introduced: "2023-08-07T10:00:00Z",
    algorithm: KdfHash::Sha512,
    iterations: 2_000_000,
}];

impl KdfParams {
    /// The newest registered parameter set
    pub fn latest() -> &'static KdfParams {
        &KDF_PARAMS[KDF_PARAMS.len() - 1]
    }

    pub fn by_version(version: &str) -> Option<&'static KdfParams> {
        KDF_PARAMS.iter().find(|p| p.version == version)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::latest().clone()
    }
}

/// Base key material derived once per login. Only used as HKDF input.
///
/// Zeroized on drop.
#[derive(Clone)]
pub struct PasswordDigest {
    bytes: [u8; BASE_KEY_SIZE],
}

impl PasswordDigest {
    /// Run PBKDF2 over `password` with `SHA-512(salt)` as salt.
    ///
    /// Uses [`KdfParams::latest`] when `params` is `None`. This is CPU-bound
    /// (millions of iterations); async callers should run it on a blocking thread.
    pub fn from_password(
        password: &SecretString,
        salt: &str,
        params: Option<&KdfParams>,
    ) -> Self {
        let params = params.unwrap_or_else(|| KdfParams::latest());
        let digested_salt = Sha512::digest(salt.as_bytes());
        let password = password.expose_secret().as_bytes();

        let mut bytes = [0u8; BASE_KEY_SIZE];
        match params.algorithm {
            KdfHash::Sha256 => {
                pbkdf2::pbkdf2_hmac::<Sha256>(password, &digested_salt, params.iterations, &mut bytes)
            }
            KdfHash::Sha384 => {
                pbkdf2::pbkdf2_hmac::<Sha384>(password, &digested_salt, params.iterations, &mut bytes)
            }
            KdfHash::Sha512 => {
                pbkdf2::pbkdf2_hmac::<Sha512>(password, &digested_salt, params.iterations, &mut bytes)
            }
        }

        tracing::debug!(version = params.version, "base key derived");
        Self { bytes }
    }

    /// Inverse of [`PasswordDigest::export`].
    pub fn from_exported(digest: &str) -> CryptoResult<Self> {
        let mut decoded = STANDARD.decode(digest.trim())?;
        if decoded.len() != BASE_KEY_SIZE {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidLength {
                what: "base key",
                expected: BASE_KEY_SIZE.to_string(),
                actual,
            });
        }

        let mut bytes = [0u8; BASE_KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    /// Raw base key as base64.
    pub fn export(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    /// Deterministic HKDF-SHA512 expansion with `tag` as info.
    ///
    /// `bits` must be a positive multiple of 8.
    pub fn derive_bytes(&self, tag: &str, bits: usize) -> CryptoResult<Vec<u8>> {
        if bits == 0 || bits % 8 != 0 {
            return Err(CryptoError::Derive(format!(
                "bit length must be a positive multiple of 8, got {bits}"
            )));
        }

        let hkdf = Hkdf::<Sha512>::new(Some(&STATIC_SALT), &self.bytes);
        let mut okm = vec![0u8; bits / 8];
        hkdf.expand(tag.as_bytes(), &mut okm)
            .map_err(|e| CryptoError::Derive(format!("HKDF expand failed: {e}")))?;
        Ok(okm)
    }

    /// [`PasswordDigest::derive_bytes`] as base64.
    pub fn derive_string(&self, tag: &str, bits: usize) -> CryptoResult<String> {
        let mut bytes = self.derive_bytes(tag, bits)?;
        let encoded = STANDARD.encode(&bytes);
        bytes.zeroize();
        Ok(encoded)
    }

    /// AES-256-GCM key for `tag`.
    pub fn derive_key(&self, tag: &str) -> CryptoResult<SubKey> {
        let mut okm = self.derive_bytes(tag, KEY_SIZE * 8)?;
        let key = SubKey::from_slice(&okm);
        okm.zeroize();
        key
    }
}

impl Drop for PasswordDigest {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordDigest")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn fast_params() -> KdfParams {
    KdfParams {
        version: "test",
        introduced: "2024-01-01T00:00:00Z",
        algorithm: KdfHash::Sha512,
        iterations: 16,
    }
}
