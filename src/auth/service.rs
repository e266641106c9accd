use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::auth::dto::GoogleUser;
use crate::auth::error::AuthError;
use crate::auth::identity;
use crate::auth::jwt::{JwtKeys, TokenPair};
use crate::auth::password;
use crate::auth::repo::{NewUser, User, UserStore};

/// Authentication method presented at login.
#[derive(Debug, Clone)]
pub enum Credential {
    Password { email: String, password: String },
    Google(GoogleUser),
}

/// A successfully authenticated user together with a fresh token pair.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub tokens: TokenPair,
}

/// Orchestrates credential verification, google-account reconciliation and
/// the refresh-token lifecycle on top of a [`UserStore`].
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// Create an account with a password and log it in immediately.
    pub async fn register(
        &self,
        email: String,
        password: String,
        name: Option<String>,
    ) -> Result<AuthSession, AuthError> {
        if self.users.find_by_email(&email).await?.is_some() {
            warn!(%email, "registration for taken email");
            return Err(AuthError::DuplicateEmail);
        }

        let hash = hash_blocking(password).await?;
        let user = self
            .users
            .create(NewUser {
                email,
                password_hash: Some(hash),
                name,
                email_verified: false,
                ..Default::default()
            })
            .await
            .context("create user")?;

        info!(user_id = user.id, email = %user.email, "user registered");
        self.issue_session(user).await
    }

    /// Authenticate with one of the supported methods and start a session.
    pub async fn login(&self, credential: Credential) -> Result<AuthSession, AuthError> {
        let user = match credential {
            Credential::Password { email, password } => {
                self.validate_user(&email, password).await?
            }
            Credential::Google(profile) => {
                identity::resolve(self.users.as_ref(), profile).await?
            }
        };
        info!(user_id = user.id, "user logged in");
        self.issue_session(user).await
    }

    // All three failure cases collapse into InvalidCredentials so a caller
    // cannot tell a missing account from a wrong password.
    async fn validate_user(&self, email: &str, password: String) -> Result<User, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            warn!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash.clone() else {
            warn!(user_id = user.id, "login for account without password");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_blocking(password, hash).await? {
            warn!(user_id = user.id, "login with invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Exchange a refresh token for a new pair, rotating the stored token.
    ///
    /// A superseded token is still a validly signed JWT; only the exact
    /// string currently stored for the user is accepted.
    pub async fn refresh_tokens(
        &self,
        user_id: i64,
        presented: &str,
    ) -> Result<AuthSession, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        match user.refresh_token.as_deref() {
            Some(stored) if stored == presented => {}
            _ => {
                warn!(user_id, "presented refresh token does not match stored one");
                return Err(AuthError::InvalidRefreshToken);
            }
        }

        self.issue_session(user).await
    }

    /// Clear the stored refresh token. Idempotent.
    pub async fn logout(&self, user_id: i64) -> Result<(), AuthError> {
        self.users.update_refresh_token(user_id, None).await?;
        info!(user_id, "user logged out");
        Ok(())
    }

    /// Replace an existing password after verifying the current one.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: String,
        new_password: String,
    ) -> Result<(), AuthError> {
        let user = self.users.find_by_id(user_id).await?;
        let hash = match user.and_then(|u| u.password_hash) {
            Some(h) => h,
            None => return Err(AuthError::InvalidAccount),
        };

        if !verify_blocking(current_password, hash).await? {
            warn!(user_id, "change password with invalid current password");
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = hash_blocking(new_password).await?;
        self.users.update_password(user_id, &new_hash).await?;
        info!(user_id, "password changed");
        Ok(())
    }

    /// Set a first password on a google-only account.
    ///
    /// Requires a linked google identity as a fallback so the account can
    /// never end up with no way to authenticate.
    pub async fn set_initial_password(
        &self,
        user_id: i64,
        new_password: String,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidAccount)?;

        if user.password_hash.is_some() {
            return Err(AuthError::PasswordAlreadySet);
        }
        if user.google_id.is_none() {
            return Err(AuthError::NoFallbackAuth);
        }

        let hash = hash_blocking(new_password).await?;
        self.users.update_password(user_id, &hash).await?;
        info!(user_id, "initial password set");
        Ok(())
    }

    // Sign a fresh pair and persist the refresh token, superseding any
    // previous one.
    async fn issue_session(&self, user: User) -> Result<AuthSession, AuthError> {
        let tokens = self.keys.issue_pair(user.id, &user.email)?;
        self.users
            .update_refresh_token(user.id, Some(&tokens.refresh_token))
            .await?;
        Ok(AuthSession { user, tokens })
    }
}

// Argon2 is deliberately expensive; keep it off the async dispatch path.
async fn hash_blocking(plain: String) -> Result<String, AuthError> {
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AuthError::Internal(e.into()))??;
    Ok(hash)
}

async fn verify_blocking(plain: String, hash: String) -> Result<bool, AuthError> {
    let ok = tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash))
        .await
        .map_err(|e| AuthError::Internal(e.into()))??;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    #[derive(Default)]
    struct MemStore {
        users: Mutex<Vec<User>>,
    }

    impl MemStore {
        fn get(&self, id: i64) -> Option<User> {
            self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
        }

        fn count(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        fn seed(
            &self,
            email: &str,
            password_hash: Option<&str>,
            google_id: Option<&str>,
        ) -> i64 {
            let mut users = self.users.lock().unwrap();
            let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
            let now = OffsetDateTime::now_utc();
            users.push(User {
                id,
                email: email.to_string(),
                password_hash: password_hash.map(str::to_string),
                google_id: google_id.map(str::to_string),
                name: None,
                picture: None,
                email_verified: false,
                refresh_token: None,
                created_at: now,
                updated_at: now,
            });
            id
        }
    }

    #[async_trait]
    impl UserStore for MemStore {
        async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
            Ok(self.get(id))
        }

        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn find_by_google_id(&self, google_id: &str) -> anyhow::Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.google_id.as_deref() == Some(google_id))
                .cloned())
        }

        async fn create(&self, new: NewUser) -> anyhow::Result<User> {
            let mut users = self.users.lock().unwrap();
            let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
            let now = OffsetDateTime::now_utc();
            let user = User {
                id,
                email: new.email,
                password_hash: new.password_hash,
                google_id: new.google_id,
                name: new.name,
                picture: new.picture,
                email_verified: new.email_verified,
                refresh_token: None,
                created_at: now,
                updated_at: now,
            };
            users.push(user.clone());
            Ok(user)
        }

        async fn update_refresh_token(
            &self,
            id: i64,
            refresh_token: Option<&str>,
        ) -> anyhow::Result<()> {
            let mut users = self.users.lock().unwrap();
            if let Some(user) = users.iter_mut().find(|u| u.id == id) {
                user.refresh_token = refresh_token.map(str::to_string);
                user.updated_at = OffsetDateTime::now_utc();
            }
            Ok(())
        }

        async fn update_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()> {
            let mut users = self.users.lock().unwrap();
            if let Some(user) = users.iter_mut().find(|u| u.id == id) {
                user.password_hash = Some(password_hash.to_string());
                user.updated_at = OffsetDateTime::now_utc();
            }
            Ok(())
        }

        async fn link_google_account(
            &self,
            id: i64,
            google_id: &str,
            picture: Option<&str>,
        ) -> anyhow::Result<User> {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| anyhow::anyhow!("user not found"))?;
            user.google_id = Some(google_id.to_string());
            if let Some(picture) = picture {
                user.picture = Some(picture.to_string());
            }
            user.email_verified = true;
            user.updated_at = OffsetDateTime::now_utc();
            Ok(user.clone())
        }
    }

    fn make_service() -> (AuthService, Arc<MemStore>) {
        let store = Arc::new(MemStore::default());
        let keys = JwtKeys::from_config(&JwtConfig {
            access_secret: "access-test-secret".into(),
            refresh_secret: "refresh-test-secret".into(),
            issuer: "tasknest".into(),
            audience: "tasknest-users".into(),
            access_ttl_minutes: 5,
            refresh_ttl_days: 7,
        });
        (AuthService::new(store.clone(), keys), store)
    }

    fn google_profile(email: &str, google_id: &str) -> GoogleUser {
        GoogleUser {
            email: email.to_string(),
            google_id: google_id.to_string(),
            name: Some("Gee User".to_string()),
            picture: Some("https://example.com/p.png".to_string()),
        }
    }

    #[tokio::test]
    async fn register_then_login_succeeds() {
        let (service, _store) = make_service();
        let registered = service
            .register("a@example.com".into(), "hunter2hunter2".into(), None)
            .await
            .expect("register");

        let session = service
            .login(Credential::Password {
                email: "a@example.com".into(),
                password: "hunter2hunter2".into(),
            })
            .await
            .expect("login");

        assert_eq!(session.user.id, registered.user.id);
        let claims = service
            .keys()
            .verify_access(&session.tokens.access_token)
            .expect("verify access");
        assert_eq!(claims.sub, registered.user.id);
        assert_eq!(claims.email, "a@example.com");
    }

    #[tokio::test]
    async fn register_duplicate_email_fails_without_side_effects() {
        let (service, store) = make_service();
        let first = service
            .register("a@example.com".into(), "hunter2hunter2".into(), None)
            .await
            .expect("register");

        let err = service
            .register("a@example.com".into(), "other-password".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(store.count(), 1);

        // Existing record untouched: the original password still works.
        let relogin = service
            .login(Credential::Password {
                email: "a@example.com".into(),
                password: "hunter2hunter2".into(),
            })
            .await
            .expect("login");
        assert_eq!(relogin.user.id, first.user.id);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let (service, _store) = make_service();
        service
            .register("a@example.com".into(), "hunter2hunter2".into(), None)
            .await
            .expect("register");

        let unknown = service
            .login(Credential::Password {
                email: "nobody@example.com".into(),
                password: "whatever-pass".into(),
            })
            .await
            .unwrap_err();
        let wrong = service
            .login(Credential::Password {
                email: "a@example.com".into(),
                password: "wrong-password".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn password_login_fails_for_google_only_account() {
        let (service, store) = make_service();
        store.seed("g@example.com", None, Some("google-1"));

        let err = service
            .login(Credential::Password {
                email: "g@example.com".into(),
                password: "whatever-pass".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn refresh_rotates_and_invalidates_old_token() {
        let (service, _store) = make_service();
        let session = service
            .register("a@example.com".into(), "hunter2hunter2".into(), None)
            .await
            .expect("register");
        let user_id = session.user.id;
        let t1 = session.tokens.refresh_token;

        let rotated = service.refresh_tokens(user_id, &t1).await.expect("refresh");
        let t2 = rotated.tokens.refresh_token;
        assert_ne!(t1, t2);

        // The superseded token is dead even though its signature is valid.
        let err = service.refresh_tokens(user_id, &t1).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));

        // The current one keeps working.
        service.refresh_tokens(user_id, &t2).await.expect("refresh with t2");
    }

    #[tokio::test]
    async fn refresh_fails_for_unknown_user() {
        let (service, _store) = make_service();
        let err = service.refresh_tokens(999, "anything").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn logout_invalidates_refresh_and_is_idempotent() {
        let (service, _store) = make_service();
        let session = service
            .register("a@example.com".into(), "hunter2hunter2".into(), None)
            .await
            .expect("register");
        let user_id = session.user.id;

        service.logout(user_id).await.expect("logout");
        service.logout(user_id).await.expect("logout again");

        let err = service
            .refresh_tokens(user_id, &session.tokens.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn google_login_is_idempotent() {
        let (service, store) = make_service();
        let first = service
            .login(Credential::Google(google_profile("g@example.com", "google-1")))
            .await
            .expect("first google login");
        let second = service
            .login(Credential::Google(google_profile("g@example.com", "google-1")))
            .await
            .expect("second google login");

        assert_eq!(first.user.id, second.user.id);
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn google_login_creates_password_less_verified_user() {
        let (service, store) = make_service();
        let session = service
            .login(Credential::Google(google_profile("g@example.com", "google-1")))
            .await
            .expect("google login");

        let user = store.get(session.user.id).expect("stored user");
        assert!(user.password_hash.is_none());
        assert_eq!(user.google_id.as_deref(), Some("google-1"));
        assert!(user.email_verified);
    }

    #[tokio::test]
    async fn google_login_links_existing_local_account() {
        let (service, store) = make_service();
        let local = service
            .register("a@example.com".into(), "hunter2hunter2".into(), None)
            .await
            .expect("register");

        let google = service
            .login(Credential::Google(google_profile("a@example.com", "google-1")))
            .await
            .expect("google login");

        assert_eq!(google.user.id, local.user.id);
        assert_eq!(store.count(), 1);
        let user = store.get(local.user.id).expect("stored user");
        assert_eq!(user.google_id.as_deref(), Some("google-1"));
        assert!(user.email_verified);
        // The local password survives the link.
        assert!(user.password_hash.is_some());
    }

    #[tokio::test]
    async fn change_password_replaces_hash() {
        let (service, _store) = make_service();
        let session = service
            .register("a@example.com".into(), "old-password-1".into(), None)
            .await
            .expect("register");

        service
            .change_password(session.user.id, "old-password-1".into(), "new-password-1".into())
            .await
            .expect("change password");

        let old = service
            .login(Credential::Password {
                email: "a@example.com".into(),
                password: "old-password-1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(old, AuthError::InvalidCredentials));

        service
            .login(Credential::Password {
                email: "a@example.com".into(),
                password: "new-password-1".into(),
            })
            .await
            .expect("login with new password");
    }

    #[tokio::test]
    async fn change_password_with_wrong_current_leaves_hash_untouched() {
        let (service, store) = make_service();
        let session = service
            .register("a@example.com".into(), "old-password-1".into(), None)
            .await
            .expect("register");
        let before = store.get(session.user.id).unwrap().password_hash;

        let err = service
            .change_password(session.user.id, "not-the-password".into(), "new-password-1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let after = store.get(session.user.id).unwrap().password_hash;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn change_password_rejects_account_without_password() {
        let (service, store) = make_service();
        let id = store.seed("g@example.com", None, Some("google-1"));

        let err = service
            .change_password(id, "anything-at-all".into(), "new-password-1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAccount));
    }

    #[tokio::test]
    async fn set_initial_password_requires_google_fallback() {
        let (service, store) = make_service();

        // Google-only account: allowed, and the password then works.
        let google_only = store.seed("g@example.com", None, Some("google-1"));
        service
            .set_initial_password(google_only, "first-password-1".into())
            .await
            .expect("set initial password");
        service
            .login(Credential::Password {
                email: "g@example.com".into(),
                password: "first-password-1".into(),
            })
            .await
            .expect("login with initial password");

        // Already has a password: rejected.
        let err = service
            .set_initial_password(google_only, "second-password-1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PasswordAlreadySet));

        // No fallback method at all: rejected.
        let orphan = store.seed("o@example.com", None, None);
        let err = service
            .set_initial_password(orphan, "some-password-1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NoFallbackAuth));
    }
}
