use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{PgUserStore, UserStore};
use crate::auth::service::AuthService;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub auth: AuthService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(db.clone()));
        let auth = AuthService::new(users.clone(), JwtKeys::from_config(&config.jwt));

        Ok(Self {
            db,
            config,
            users,
            auth,
        })
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.auth.keys().clone()
    }
}
