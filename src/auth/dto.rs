use serde::{Deserialize, Serialize};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Verified Google profile handed over by the OAuth callback layer.
/// The core never talks to the provider itself.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUser {
    pub email: String,
    pub google_id: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body for changing an existing password.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Request body for setting a first password on a google-only account.
#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub new_password: String,
}

/// Response returned after register, login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Account overview for the profile endpoint.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub email_verified: bool,
    pub has_password: bool,
    pub has_google_account: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_serialization() {
        let response = AuthResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            user: PublicUser {
                id: 1,
                email: "test@example.com".into(),
                name: None,
                picture: None,
            },
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("access_token"));
        assert!(json.contains("refresh_token"));
    }

    #[test]
    fn google_user_deserializes_without_optionals() {
        let json = r#"{"email":"g@example.com","google_id":"g-123"}"#;
        let user: GoogleUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.google_id, "g-123");
        assert!(user.name.is_none());
        assert!(user.picture.is_none());
    }
}
