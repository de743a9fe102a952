//! AES-256-GCM sub-keys and the sealed `iv$ciphertext` text format

use aes_gcm::{
    aead::{consts::U96, generic_array::GenericArray, Aead, KeyInit, Payload},
    aes::Aes256,
    Aes256Gcm, AesGcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::PasswordDigest;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// GCM with a 96-byte IV. Older clients mistook the 96-bit IV length for bytes.
type Aes256GcmLongIv = AesGcm<Aes256, U96>;

/// Length of the IV written by older clients
pub const LEGACY_IV_SIZE: usize = 96;

/// Separator between IV and ciphertext in sealed text
const SEALED_SEPARATOR: char = '$';

/// A 256-bit AES-GCM key derived from a [`PasswordDigest`]. Zeroized on drop.
#[derive(Clone)]
pub struct SubKey {
    bytes: [u8; KEY_SIZE],
}

impl SubKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                what: "key",
                expected: KEY_SIZE.to_string(),
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Encrypt with an explicit 96-bit nonce.
    ///
    /// Output: `[ciphertext][16-byte tag]`
    pub fn encrypt(&self, nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidLength {
                what: "nonce",
                expected: NONCE_SIZE.to_string(),
                actual: nonce.len(),
            });
        }

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.bytes));
        cipher
            .encrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::Encrypt)
    }

    /// Reverse of [`SubKey::encrypt`]. Also accepts the 96-byte IVs of older clients.
    pub fn decrypt(&self, nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::Malformed(format!(
                "ciphertext too short: {} bytes (expected at least {TAG_SIZE})",
                ciphertext.len()
            )));
        }

        let payload = Payload {
            msg: ciphertext,
            aad,
        };
        let key = GenericArray::from_slice(&self.bytes);

        match nonce.len() {
            NONCE_SIZE => Aes256Gcm::new(key)
                .decrypt(Nonce::from_slice(nonce), payload)
                .map_err(|_| CryptoError::Decrypt),
            LEGACY_IV_SIZE => Aes256GcmLongIv::new(key)
                .decrypt(GenericArray::from_slice(nonce), payload)
                .map_err(|_| CryptoError::Decrypt),
            actual => Err(CryptoError::InvalidLength {
                what: "nonce",
                expected: format!("{NONCE_SIZE} or {LEGACY_IV_SIZE}"),
                actual,
            }),
        }
    }

    /// Encrypt under a fresh random nonce and encode as `base64(iv)$base64(ciphertext)`.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> CryptoResult<String> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self.encrypt(&nonce, plaintext, aad)?;
        Ok(format!(
            "{}{SEALED_SEPARATOR}{}",
            STANDARD.encode(nonce),
            STANDARD.encode(ciphertext)
        ))
    }

    /// Reverse of [`SubKey::seal`].
    pub fn open(&self, sealed: &str, aad: &[u8]) -> CryptoResult<Vec<u8>> {
        let (iv, ciphertext) = sealed.split_once(SEALED_SEPARATOR).ok_or_else(|| {
            CryptoError::Malformed(format!("missing '{SEALED_SEPARATOR}' separator"))
        })?;
        if ciphertext.contains(SEALED_SEPARATOR) {
            return Err(CryptoError::Malformed(format!(
                "more than one '{SEALED_SEPARATOR}' separator"
            )));
        }

        let iv = STANDARD.decode(iv)?;
        let ciphertext = STANDARD.decode(ciphertext)?;
        self.decrypt(&iv, &ciphertext, aad)
    }

    /// [`SubKey::open`] for UTF-8 payloads.
    pub fn open_string(&self, sealed: &str, aad: &[u8]) -> CryptoResult<String> {
        Ok(String::from_utf8(self.open(sealed, aad)?)?)
    }
}

impl Drop for SubKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SubKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl PasswordDigest {
    /// Deterministically encrypt `plaintext`: key from `tag`, IV from `tag + "--iv"`.
    ///
    /// Equal inputs give equal outputs, so this is only for values that must
    /// be comparable while encrypted (remote key names).
    pub fn encrypt_string(&self, tag: &str, plaintext: &str) -> CryptoResult<String> {
        let key = self.derive_key(tag)?;
        let iv = self.derive_bytes(&format!("{tag}--iv"), NONCE_SIZE * 8)?;
        let ciphertext = key.encrypt(&iv, plaintext.as_bytes(), &[])?;
        Ok(STANDARD.encode(ciphertext))
    }

    /// Reverse of [`PasswordDigest::encrypt_string`].
    pub fn decrypt_string(&self, tag: &str, ciphertext: &str) -> CryptoResult<String> {
        let key = self.derive_key(tag)?;
        let iv = self.derive_bytes(&format!("{tag}--iv"), NONCE_SIZE * 8)?;
        let ciphertext = STANDARD.decode(ciphertext.trim())?;
        Ok(String::from_utf8(key.decrypt(&iv, &ciphertext, &[])?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::fast_params;
    use proptest::prelude::*;
    use secrecy::SecretString;

    fn test_key() -> SubKey {
        SubKey::from_bytes([42u8; KEY_SIZE])
    }

    fn test_digest() -> PasswordDigest {
        PasswordDigest::from_password(&SecretString::from("pw"), "salt", Some(&fast_params()))
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let sealed = key.seal(b"{\"a\":1}", b"remote-key").unwrap();
        assert_eq!(sealed.matches('$').count(), 1);
        assert_eq!(key.open(&sealed, b"remote-key").unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_seal_uses_fresh_nonces() {
        let key = test_key();
        let a = key.seal(b"same", b"").unwrap();
        let b = key.seal(b"same", b"").unwrap();
        assert_ne!(a, b, "random nonces must give different sealed text");
    }

    #[test]
    fn test_open_wrong_aad_fails() {
        let key = test_key();
        let sealed = key.seal(b"payload", b"key-one").unwrap();
        assert!(matches!(
            key.open(&sealed, b"key-two"),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn test_open_wrong_key_fails() {
        let sealed = test_key().seal(b"payload", b"").unwrap();
        let other = SubKey::from_bytes([7u8; KEY_SIZE]);
        assert!(other.open(&sealed, b"").is_err());
    }

    #[test]
    fn test_open_malformed() {
        let key = test_key();
        assert!(matches!(
            key.open("no-separator", b""),
            Err(CryptoError::Malformed(_))
        ));
        assert!(matches!(
            key.open("a$b$c", b""),
            Err(CryptoError::Malformed(_))
        ));
        assert!(matches!(key.open("!!$!!", b""), Err(CryptoError::Decode(_))));

        // valid base64, but a nonce of the wrong size must not panic
        let sealed = format!(
            "{}${}",
            STANDARD.encode([0u8; 5]),
            STANDARD.encode([0u8; 32])
        );
        assert!(matches!(
            key.open(&sealed, b""),
            Err(CryptoError::InvalidLength { actual: 5, .. })
        ));
    }

    #[test]
    fn test_open_legacy_long_iv() {
        let key = test_key();
        let iv = [9u8; LEGACY_IV_SIZE];
        let cipher = Aes256GcmLongIv::new(GenericArray::from_slice(key.as_bytes()));
        let ct = cipher
            .encrypt(
                GenericArray::from_slice(&iv),
                Payload {
                    msg: b"legacy",
                    aad: b"k",
                },
            )
            .unwrap();
        let sealed = format!("{}${}", STANDARD.encode(iv), STANDARD.encode(ct));

        assert_eq!(key.open(&sealed, b"k").unwrap(), b"legacy");
    }

    #[test]
    fn test_ciphertext_size() {
        let ct = test_key().encrypt(&[0u8; NONCE_SIZE], b"12345", b"").unwrap();
        assert_eq!(ct.len(), 5 + TAG_SIZE);
    }

    #[test]
    fn test_encrypt_string_is_deterministic() {
        let digest = test_digest();
        let a = digest.encrypt_string("ExtensionDataSync-key--", "stacks::main").unwrap();
        let b = digest.encrypt_string("ExtensionDataSync-key--", "stacks::main").unwrap();
        assert_eq!(a, b, "remote key names must be stable");
        assert_eq!(
            digest.decrypt_string("ExtensionDataSync-key--", &a).unwrap(),
            "stacks::main"
        );
    }

    #[test]
    fn test_decrypt_string_wrong_tag_fails() {
        let digest = test_digest();
        let ct = digest.encrypt_string("tag-a", "value").unwrap();
        assert!(digest.decrypt_string("tag-b", &ct).is_err());
    }

    #[test]
    fn test_from_slice_length() {
        assert!(SubKey::from_slice(&[0u8; 16]).is_err());
        assert!(SubKey::from_slice(&[0u8; KEY_SIZE]).is_ok());
    }

    proptest! {
        #[test]
        fn prop_seal_open_roundtrip(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            aad in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let key = test_key();
            let sealed = key.seal(&data, &aad).unwrap();
            prop_assert_eq!(key.open(&sealed, &aad).unwrap(), data);
        }

        #[test]
        fn prop_encrypt_string_roundtrip(value in ".{0,200}") {
            let digest = test_digest();
            let ct = digest.encrypt_string("prop", &value).unwrap();
            prop_assert_eq!(digest.decrypt_string("prop", &ct).unwrap(), value);
        }
    }
}
