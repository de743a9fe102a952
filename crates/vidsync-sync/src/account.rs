//! Account registration, credential checks and the persisted login.

use secrecy::ExposeSecret;

use vidsync_core::keys::LOGIN;
use vidsync_core::types::Registration;
use vidsync_crypto::{Login, StoredLogin};
use vidsync_storage::{LocalStore, LocalStoreExt};

use crate::api::UserApi;
use crate::error::{SyncError, SyncResult};

/// Create the account for `login` on the server.
///
/// The server only ever sees the derived API password.
pub async fn register(users: &dyn UserApi, login: &Login) -> SyncResult<()> {
    let auth = login.api_credentials();
    let body = Registration {
        username: auth.username.clone(),
        password: auth.password.expose_secret().to_string(),
    };

    match users.register(&body).await {
        Ok(()) => {
            tracing::info!(username = %auth.username, "account registered");
            Ok(())
        }
        Err(e) if e.is_status(409) => {
            Err(SyncError::Invalid("username is already taken".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Whether the server accepts the credentials of `login`.
pub async fn test_login(users: &dyn UserApi, login: &Login) -> SyncResult<bool> {
    match users.test_login(login.api_credentials()).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_status(401) || e.is_status(403) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// The login stored by [`store_login`], if any.
pub async fn restore_login(local: &dyn LocalStore) -> SyncResult<Option<Login>> {
    let Some(stored) = local.get::<StoredLogin>(LOGIN).await? else {
        return Ok(None);
    };
    Ok(Some(Login::from_export(&stored)?))
}

/// Persist the export of `login`, or forget the stored one.
pub async fn store_login(local: &dyn LocalStore, login: Option<&Login>) -> SyncResult<()> {
    match login {
        Some(login) => local.set(LOGIN, &login.export()).await?,
        None => local.delete(LOGIN).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRemote;
    use crate::test_support::test_login as make_login;
    use vidsync_storage::MemoryStore;

    #[tokio::test]
    async fn test_register_then_login() {
        let remote = MemoryRemote::new();
        let login = make_login("alice");

        assert!(!test_login(&remote, &login).await.unwrap());
        register(&remote, &login).await.unwrap();
        assert!(test_login(&remote, &login).await.unwrap());

        let other = make_login("bob");
        assert!(!test_login(&remote, &other).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_taken_username() {
        let remote = MemoryRemote::new();
        let login = make_login("alice");
        register(&remote, &login).await.unwrap();

        let err = register(&remote, &login).await.unwrap_err();
        assert!(matches!(err, SyncError::Invalid(ref m) if m.contains("already taken")));
    }

    #[tokio::test]
    async fn test_offline_is_an_error_not_a_rejection() {
        let remote = MemoryRemote::new();
        remote.set_online(false);
        let login = make_login("alice");
        assert!(matches!(
            test_login(&remote, &login).await,
            Err(SyncError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_store_and_restore_login() {
        let local = MemoryStore::new();
        assert!(restore_login(&local).await.unwrap().is_none());

        let login = make_login("alice");
        store_login(&local, Some(&login)).await.unwrap();

        let restored = restore_login(&local).await.unwrap().unwrap();
        assert_eq!(restored.username(), "alice");
        assert_eq!(
            restored.api_credentials().password.expose_secret(),
            login.api_credentials().password.expose_secret()
        );

        store_login(&local, None).await.unwrap();
        assert!(restore_login(&local).await.unwrap().is_none());
    }
}
