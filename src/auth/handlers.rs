use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, GoogleUser, LoginRequest, MessageResponse,
            ProfileResponse, PublicUser, RefreshRequest, RegisterRequest, SetPasswordRequest,
        },
        error::AuthError,
        extractors::AuthUser,
        service::{AuthSession, Credential},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google/callback", post(google_callback))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
        .route("/auth/set-password", post(set_password))
        .route("/auth/profile", get(profile))
}

/// Handler-level failures: request-shape rejections plus everything the
/// auth core reports.
pub enum ApiError {
    BadRequest(String),
    Unauthorized(&'static str),
    Auth(AuthError),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, message.to_string()).into_response()
            }
            ApiError::Auth(e) => e.into_response(),
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        warn!(%email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 6 {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters long".into(),
        ));
    }
    if password.len() > 100 {
        return Err(ApiError::BadRequest(
            "Password must not exceed 100 characters".into(),
        ));
    }
    Ok(())
}

fn auth_response(session: AuthSession) -> Json<AuthResponse> {
    Json(AuthResponse {
        access_token: session.tokens.access_token,
        refresh_token: session.tokens.refresh_token,
        user: PublicUser {
            id: session.user.id,
            email: session.user.email,
            name: session.user.name,
            picture: session.user.picture,
        },
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;
    if let Some(name) = &payload.name {
        if name.len() < 2 || name.len() > 50 {
            return Err(ApiError::BadRequest(
                "Name must be between 2 and 50 characters".into(),
            ));
        }
    }

    let session = state
        .auth
        .register(payload.email, payload.password, payload.name)
        .await?;
    Ok(auth_response(session))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    validate_email(&payload.email)?;

    let session = state
        .auth
        .login(Credential::Password {
            email: payload.email,
            password: payload.password,
        })
        .await?;
    Ok(auth_response(session))
}

/// Final leg of the OAuth flow. The upstream exchange has already verified
/// the profile with Google; this endpoint only reconciles it with our users.
#[instrument(skip(state, payload))]
pub async fn google_callback(
    State(state): State<AppState>,
    Json(mut payload): Json<GoogleUser>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    validate_email(&payload.email)?;

    let session = state.auth.login(Credential::Google(payload)).await?;
    Ok(auth_response(session))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    // The signature tells us who is asking; the store decides whether this
    // exact token is still the live one.
    let claims = state.auth.keys().verify_refresh(&payload.refresh_token)?;
    let session = state
        .auth
        .refresh_tokens(claims.sub, &payload.refresh_token)
        .await?;
    Ok(auth_response(session))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.logout(user_id).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully",
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_password(&payload.new_password)?;

    state
        .auth
        .change_password(user_id, payload.current_password, payload.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

#[instrument(skip(state, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_password(&payload.new_password)?;

    state
        .auth
        .set_initial_password(user_id, payload.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password set successfully",
    }))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(AuthError::Internal)?
        .ok_or(ApiError::Unauthorized("User not found"))?;

    Ok(Json(ProfileResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        picture: user.picture,
        email_verified: user.email_verified,
        has_password: user.password_hash.is_some(),
        has_google_account: user.google_id.is_some(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("user@nodot"));
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(101)).is_err());
    }
}
