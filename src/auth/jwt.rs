use std::time::Duration;

use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::config::JwtConfig;

/// Token type used to distinguish Access and Refresh JWTs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

/// JWT payload. Fixed shape; anything that does not deserialize into this
/// struct is rejected at verification as an invalid token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,        // user ID
    pub email: String,   // user email
    pub exp: usize,      // expiration time
    pub iat: usize,      // issued at
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub jti: Uuid,       // unique token id
    pub kind: TokenKind, // access or refresh
}

/// Access/refresh token pair returned on every successful authentication.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signing and verification keys plus token lifetimes.
///
/// Access and refresh tokens are signed with different secrets, so a leaked
/// access-token secret cannot be used to mint refresh tokens.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_days as u64) * 24 * 60 * 60),
        }
    }

    fn sign_with_kind(&self, user_id: i64, email: &str, kind: TokenKind) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let (ttl, key) = match kind {
            TokenKind::Access => (self.access_ttl, &self.access_encoding),
            TokenKind::Refresh => (self.refresh_ttl, &self.refresh_encoding),
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            kind,
        };
        let token =
            encode(&Header::default(), &claims, key).map_err(|e| AuthError::Internal(e.into()))?;
        debug!(user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: i64, email: &str) -> Result<String, AuthError> {
        self.sign_with_kind(user_id, email, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: i64, email: &str) -> Result<String, AuthError> {
        self.sign_with_kind(user_id, email, TokenKind::Refresh)
    }

    /// Issue a fresh access/refresh pair for the user.
    pub fn issue_pair(&self, user_id: i64, email: &str) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.sign_access(user_id, email)?,
            refresh_token: self.sign_refresh(user_id, email)?,
        })
    }

    fn verify_with_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })?;
        if data.claims.kind != kind {
            return Err(AuthError::InvalidToken);
        }
        debug!(user_id = data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_with_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_with_kind(token, TokenKind::Refresh)
    }
}
