//! vidsync-crypto: client-side E2E encryption for vidsync
//!
//! Key hierarchy:
//! ```text
//! Base Key (1024-bit, PBKDF2 from password, salt = SHA-512(base64(SHA-512(username))))
//!   ├── API password     (HKDF-SHA512, info="Login-api_password", 512-bit, base64)
//!   ├── Remote key names (HKDF-SHA512, info="ExtensionDataSync-key--", AES-256-GCM,
//!   │                     nonce = HKDF(info=tag+"--iv", 96-bit), deterministic)
//!   ├── Entry values     (HKDF-SHA512, info="ExtensionDataSync-cipher--"+key, AES-256-GCM,
//!   │                     random 96-bit nonce, AAD = encrypted key name)
//!   └── Account data     (HKDF-SHA512, info="InvidiousDataSync-cipher", AES-256-GCM, random nonce)
//! ```
//!
//! Every HKDF expansion uses the same static salt. Changing it invalidates
//! every stored login.

pub mod error;
pub mod kdf;
pub mod keys;
pub mod login;

pub use error::{CryptoError, CryptoResult};
pub use kdf::{KdfHash, KdfParams, PasswordDigest, KDF_PARAMS};
pub use keys::SubKey;
pub use login::{
    validate_password, validate_username, ApiCredentials, CredentialError, Login, StoredLogin,
};

/// Size of the exported base key in bytes (1024-bit)
pub const BASE_KEY_SIZE: usize = 128;

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of a standard AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag
pub const TAG_SIZE: usize = 16;
