use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failures surfaced by the authentication core.
///
/// `InvalidCredentials` deliberately covers both "no such user" and "wrong
/// password" so responses cannot be used to enumerate accounts.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Cannot change password for this account")]
    InvalidAccount,
    #[error("Password already set")]
    PasswordAlreadySet,
    #[error("No alternative authentication method")]
    NoFallbackAuth,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::DuplicateEmail => (StatusCode::CONFLICT, "Email already registered".to_string()),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()),
            AuthError::InvalidRefreshToken => {
                (StatusCode::UNAUTHORIZED, "Invalid refresh token".to_string())
            }
            // Verification failures collapse to one outward message.
            AuthError::InvalidToken | AuthError::ExpiredToken => {
                (StatusCode::UNAUTHORIZED, "Invalid or expired token".to_string())
            }
            AuthError::InvalidAccount => (
                StatusCode::BAD_REQUEST,
                "Cannot change password for this account".to_string(),
            ),
            AuthError::PasswordAlreadySet => (
                StatusCode::BAD_REQUEST,
                "Password already set. Use change password instead.".to_string(),
            ),
            AuthError::NoFallbackAuth => (
                StatusCode::BAD_REQUEST,
                "Cannot set password without alternative authentication method".to_string(),
            ),
            AuthError::Internal(e) => {
                error!(error = %e, "internal auth error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_share_one_message() {
        // Enumeration resistance: unknown email and wrong password must be
        // indistinguishable from the outside.
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid credentials"
        );
    }

    #[test]
    fn token_failures_collapse_outward() {
        let invalid = AuthError::InvalidToken.into_response();
        let expired = AuthError::ExpiredToken.into_response();
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    }
}
