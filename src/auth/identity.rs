use anyhow::Context;
use tracing::info;

use crate::auth::dto::GoogleUser;
use crate::auth::error::AuthError;
use crate::auth::repo::{NewUser, User, UserStore};

/// Reconcile a verified Google profile against the user store.
///
/// Precedence: an account already carrying this google id wins (repeat login
/// is idempotent); otherwise an account with the same email gets the google
/// id attached and its email marked verified (the provider has verified
/// ownership); otherwise a new password-less account is created.
pub(crate) async fn resolve(store: &dyn UserStore, profile: GoogleUser) -> Result<User, AuthError> {
    if let Some(user) = store.find_by_google_id(&profile.google_id).await? {
        return Ok(user);
    }

    if let Some(user) = store.find_by_email(&profile.email).await? {
        // Existing email/password account: link the google identity.
        let linked = store
            .link_google_account(user.id, &profile.google_id, profile.picture.as_deref())
            .await?;
        info!(user_id = linked.id, "google account linked");
        return Ok(linked);
    }

    let user = store
        .create(NewUser {
            email: profile.email,
            password_hash: None,
            google_id: Some(profile.google_id),
            name: profile.name,
            picture: profile.picture,
            email_verified: true,
        })
        .await
        .context("create google user")?;
    info!(user_id = user.id, "user created from google profile");
    Ok(user)
}
