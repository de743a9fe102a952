//! Digested login credentials: username, derived API password and base key

use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;
use zeroize::Zeroize;

use crate::error::CryptoResult;
use crate::kdf::{KdfParams, PasswordDigest};

/// HKDF tag of the password sent to the server instead of the real one
const API_PASSWORD_TAG: &str = "Login-api_password";
const API_PASSWORD_BITS: usize = 512;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 255;
const PASSWORD_MIN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("username is required")]
    UsernameRequired,
    #[error("username must be between {USERNAME_MIN} and {USERNAME_MAX} characters long")]
    UsernameLength,
    #[error("username may only contain a-z, A-Z, 0-9, '-' and '_'")]
    UsernameCharset,
    #[error("password is required")]
    PasswordRequired,
    #[error("password must be at least {PASSWORD_MIN} characters long")]
    PasswordLength,
}

pub fn validate_username(username: &str) -> Result<(), CredentialError> {
    if username.is_empty() {
        return Err(CredentialError::UsernameRequired);
    }
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(CredentialError::UsernameLength);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CredentialError::UsernameCharset);
    }
    Ok(())
}

pub fn validate_password(password: &SecretString) -> Result<(), CredentialError> {
    let password = password.expose_secret();
    if password.is_empty() {
        return Err(CredentialError::PasswordRequired);
    }
    if password.chars().count() < PASSWORD_MIN {
        return Err(CredentialError::PasswordLength);
    }
    Ok(())
}

/// HTTP Basic credentials for the sync server
pub struct ApiCredentials {
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Persisted form of a [`Login`]. Holds the raw base key, never the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLogin {
    pub username: String,
    pub base_key: String,
}

impl Drop for StoredLogin {
    fn drop(&mut self) {
        self.base_key.zeroize();
    }
}

impl std::fmt::Debug for StoredLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredLogin")
            .field("username", &self.username)
            .field("base_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug)]
pub struct Login {
    credentials: ApiCredentials,
    digest: PasswordDigest,
}

impl Login {
    /// Derive everything from the user's password.
    ///
    /// The PBKDF2 salt is `base64(SHA-512(username))`. Expensive; see
    /// [`PasswordDigest::from_password`].
    pub fn from_credentials(
        username: &str,
        password: &SecretString,
        params: Option<&KdfParams>,
    ) -> CryptoResult<Self> {
        let salt = STANDARD.encode(Sha512::digest(username.as_bytes()));
        let digest = PasswordDigest::from_password(password, &salt, params);
        Self::from_digest(username.to_string(), digest)
    }

    pub fn from_export(stored: &StoredLogin) -> CryptoResult<Self> {
        let digest = PasswordDigest::from_exported(&stored.base_key)?;
        Self::from_digest(stored.username.clone(), digest)
    }

    fn from_digest(username: String, digest: PasswordDigest) -> CryptoResult<Self> {
        let api_password = digest.derive_string(API_PASSWORD_TAG, API_PASSWORD_BITS)?;
        Ok(Self {
            credentials: ApiCredentials {
                username,
                password: SecretString::from(api_password),
            },
            digest,
        })
    }

    pub fn export(&self) -> StoredLogin {
        StoredLogin {
            username: self.credentials.username.clone(),
            base_key: self.digest.export(),
        }
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn api_credentials(&self) -> &ApiCredentials {
        &self.credentials
    }

    pub fn digest(&self) -> &PasswordDigest {
        &self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::fast_params;

    fn login(username: &str, password: &str) -> Login {
        Login::from_credentials(username, &SecretString::from(password), Some(&fast_params()))
            .unwrap()
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username(""), Err(CredentialError::UsernameRequired));
        assert_eq!(validate_username("ab"), Err(CredentialError::UsernameLength));
        assert_eq!(
            validate_username(&"a".repeat(256)),
            Err(CredentialError::UsernameLength)
        );
        assert_eq!(
            validate_username("bad name"),
            Err(CredentialError::UsernameCharset)
        );
        assert_eq!(
            validate_username("user:x"),
            Err(CredentialError::UsernameCharset)
        );
        assert!(validate_username("alice_01-b").is_ok());
        assert!(validate_username(&"a".repeat(255)).is_ok());
    }

    #[test]
    fn test_validate_password() {
        assert_eq!(
            validate_password(&SecretString::from("")),
            Err(CredentialError::PasswordRequired)
        );
        assert_eq!(
            validate_password(&SecretString::from("short")),
            Err(CredentialError::PasswordLength)
        );
        assert!(validate_password(&SecretString::from("twelve chars")).is_ok());
    }

    #[test]
    fn test_api_password_is_not_the_password() {
        let l = login("alice", "hunter2hunter2");
        let api = l.api_credentials();
        assert_eq!(api.username, "alice");
        assert_ne!(api.password.expose_secret(), "hunter2hunter2");
        // 512 bits as base64
        assert_eq!(STANDARD.decode(api.password.expose_secret()).unwrap().len(), 64);
    }

    #[test]
    fn test_username_is_the_salt() {
        let a = login("alice", "same password!");
        let b = login("bob", "same password!");
        assert_ne!(a.export().base_key, b.export().base_key);
    }

    #[test]
    fn test_export_restore() {
        let original = login("alice", "hunter2hunter2");
        let stored = original.export();
        let restored = Login::from_export(&stored).unwrap();

        assert_eq!(restored.username(), "alice");
        assert_eq!(
            restored.api_credentials().password.expose_secret(),
            original.api_credentials().password.expose_secret()
        );
    }

    #[test]
    fn test_stored_login_wire_format() {
        let stored = login("alice", "hunter2hunter2").export();
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json["baseKey"].is_string());

        let back: StoredLogin = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
        assert!(!format!("{back:?}").contains(&back.base_key));
    }
}
