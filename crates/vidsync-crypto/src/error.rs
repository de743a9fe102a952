use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("invalid {what} length: {actual} bytes (expected {expected})")]
    InvalidLength {
        what: &'static str,
        expected: String,
        actual: usize,
    },

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("key derivation failed: {0}")]
    Derive(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed: wrong key or corrupted data")]
    Decrypt,

    #[error("decrypted data is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}
