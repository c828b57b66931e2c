/// Registration, login and token resolution
///
/// Ties the password codec and the token service to user persistence. Argon2
/// is CPU and memory heavy, so hashing and verification run on the blocking
/// pool instead of an async worker thread.

use crate::auth::password::{hash_password, verify_password, PasswordError, PasswordParams};
use crate::auth::token::{issue_token, validate_token, Claims, TokenError};
use crate::auth::types::User;
use crate::deadline::Deadline;
use crate::store::{StoreError, UserStore};
use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Password checked against on the unknown-email path
const DUMMY_PASSWORD: &str = "potaflow-dummy-password";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; the two are not told apart
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already exists")]
    EmailExists,

    #[error("invalid token")]
    InvalidToken,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("token signing failed: {0}")]
    TokenIssue(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Encode(reason) => AuthError::TokenIssue(reason),
        }
    }
}

/// Account service used by the HTTP layer
pub struct AuthService {
    store: Arc<dyn UserStore>,
    params: PasswordParams,
    secret: Vec<u8>,
    token_ttl: Duration,
    /// Hash verified when no account matches, so both login failures cost one Argon2 run
    dummy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        params: PasswordParams,
        secret: impl Into<Vec<u8>>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            params,
            secret: secret.into(),
            token_ttl,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Hash the password and create the account
    pub async fn register(&self, deadline: Deadline, email: &str, password: &str) -> Result<User, AuthError> {
        let params = self.params;
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password, &params))
            .await
            .map_err(|e| PasswordError::Hash(e.to_string()))??;

        let user = deadline
            .run(self.store.create_user(email, &hash))
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::EmailExists,
                other => AuthError::Store(other),
            })?;

        tracing::info!("👤 Registered user {}", user.id);
        Ok(user)
    }

    /// Verify credentials and issue a session token
    ///
    /// An unknown email still pays for a password verification.
    pub async fn login(&self, deadline: Deadline, email: &str, password: &str) -> Result<(User, String), AuthError> {
        let record = match deadline.run(self.store.get_user_by_email(email)).await {
            Ok(record) => Some(record),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(AuthError::Store(e)),
        };

        let encoded = match &record {
            Some(record) => record.password_hash.clone(),
            None => self.dummy_hash().await?.to_string(),
        };
        let matched = check_password(password, encoded).await?;

        match record {
            Some(record) if matched => {
                let token = issue_token(&record.user.id, &record.user.email, &self.secret, self.token_ttl)?;
                Ok((record.user, token))
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn dummy_hash(&self) -> Result<&str, AuthError> {
        let params = self.params;
        self.dummy_hash
            .get_or_try_init(|| async move {
                match tokio::task::spawn_blocking(move || hash_password(DUMMY_PASSWORD, &params)).await {
                    Ok(hashed) => hashed.map_err(AuthError::from),
                    Err(e) => Err(AuthError::from(PasswordError::Hash(e.to_string()))),
                }
            })
            .await
            .map(String::as_str)
    }

    /// Resolve a bearer token into its claims
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(validate_token(token, &self.secret)?)
    }

    /// Look up the account behind validated claims. A subject that no longer
    /// exists makes the token invalid.
    pub async fn get_user(&self, deadline: Deadline, id: &str) -> Result<User, AuthError> {
        match deadline.run(self.store.get_user_by_id(id)).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => Err(AuthError::InvalidToken),
            Err(e) => Err(AuthError::Store(e)),
        }
    }
}

async fn check_password(password: &str, encoded: String) -> Result<bool, AuthError> {
    let password = password.to_string();
    let matched = tokio::task::spawn_blocking(move || verify_password(&password, &encoded))
        .await
        .map_err(|e| PasswordError::Hash(e.to_string()))??;
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::UserRecord;
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use std::time::Duration as StdDuration;

    fn fast_params() -> PasswordParams {
        PasswordParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
            salt_length: 16,
            key_length: 32,
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(StdDuration::from_secs(5))
    }

    async fn service() -> AuthService {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        AuthService::new(store, fast_params(), "secret", Duration::hours(1))
    }

    /// Store whose every call fails with a database-level error
    struct BrokenStore;

    #[async_trait]
    impl UserStore for BrokenStore {
        async fn create_user(&self, _: &str, _: &str) -> Result<User, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn get_user_by_email(&self, _: &str) -> Result<UserRecord, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn get_user_by_id(&self, _: &str) -> Result<User, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let svc = service().await;

        let user = svc.register(deadline(), "test@example.com", "password123").await.unwrap();
        assert_eq!(user.email, "test@example.com");

        let (logged_in, token) = svc.login(deadline(), "test@example.com", "password123").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let claims = svc.validate(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        let me = svc.get_user(deadline(), &claims.sub).await.unwrap();
        assert_eq!(me.id, user.id);
        assert_eq!(me.email, user.email);
    }

    #[tokio::test]
    async fn register_duplicate_email() {
        let svc = service().await;
        svc.register(deadline(), "dup@example.com", "pw").await.unwrap();

        let err = svc.register(deadline(), "dup@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailExists), "got {err:?}");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let svc = service().await;
        svc.register(deadline(), "test@example.com", "secret").await.unwrap();

        let wrong = svc.login(deadline(), "test@example.com", "wrong").await.unwrap_err();
        let unknown = svc.login(deadline(), "missing@example.com", "secret").await.unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn unknown_email_still_verifies_a_password() {
        let svc = service().await;
        assert!(svc.dummy_hash.get().is_none());

        let err = svc.login(deadline(), "missing@example.com", DUMMY_PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let dummy = svc.dummy_hash.get().expect("dummy hash computed on the unknown-email path");
        assert!(dummy.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"), "got {dummy}");
        assert!(verify_password(DUMMY_PASSWORD, dummy).unwrap());
    }

    #[tokio::test]
    async fn oversized_token_ttl_fails_login_without_panicking() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let svc = AuthService::new(store, fast_params(), "secret", Duration::seconds(i64::MAX / 1000));
        svc.register(deadline(), "a@example.com", "pw").await.unwrap();

        assert!(matches!(
            svc.login(deadline(), "a@example.com", "pw").await,
            Err(AuthError::TokenIssue(_))
        ));
    }

    #[tokio::test]
    async fn store_failures_pass_through() {
        let svc = AuthService::new(Arc::new(BrokenStore), fast_params(), "secret", Duration::hours(1));

        assert!(matches!(
            svc.register(deadline(), "a@example.com", "pw").await,
            Err(AuthError::Store(StoreError::Database(_)))
        ));
        assert!(matches!(
            svc.login(deadline(), "a@example.com", "pw").await,
            Err(AuthError::Store(StoreError::Database(_)))
        ));
    }

    #[tokio::test]
    async fn tokens_from_another_secret_are_rejected() {
        let svc = service().await;
        let foreign = issue_token("user-1", "a@example.com", b"other", Duration::hours(1)).unwrap();

        assert!(matches!(svc.validate(&foreign), Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn deleted_subject_is_an_invalid_token() {
        let svc = service().await;
        assert!(matches!(
            svc.get_user(deadline(), "no-such-user").await,
            Err(AuthError::InvalidToken)
        ));
    }
}
