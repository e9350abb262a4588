use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::UserRole;
use crate::AppState;

/// JWT claims carried by both access and refresh tokens
///
/// `typ` distinguishes the two so a refresh token can never be used as a
/// bearer credential and vice versa.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: i64,
    pub role: UserRole,
    pub typ: TokenType,
    /// Token ID; the SHA-256 digest of the jti is what refresh_tokens stores
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Access/refresh token pair returned by login, register, and refresh
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::PasswordHash)
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => {
            tracing::error!("Stored password hash is malformed");
            false
        }
    }
}

/// SHA-256 digest (hex) of a token ID, used as the stored refresh token key
pub fn token_digest(jti: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(jti.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a unique token ID
fn new_jti(user_id: i64) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Issue a new access/refresh token pair for a user
///
/// Returns the pair plus the refresh token's jti digest, which the caller
/// persists for rotation and revocation.
pub fn issue_token_pair(
    config: &Config,
    user_id: i64,
    role: UserRole,
) -> Result<(TokenPair, String)> {
    let now = Utc::now().timestamp();
    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());

    let access = Claims {
        sub: user_id,
        role,
        typ: TokenType::Access,
        jti: new_jti(user_id),
        iat: now,
        exp: now + config.access_token_ttl_secs,
    };
    let refresh = Claims {
        sub: user_id,
        role,
        typ: TokenType::Refresh,
        jti: new_jti(user_id),
        iat: now,
        exp: now + config.refresh_token_ttl_secs,
    };

    let refresh_digest = token_digest(&refresh.jti);

    let pair = TokenPair {
        access_token: encode(&Header::default(), &access, &key)?,
        refresh_token: encode(&Header::default(), &refresh, &key)?,
        expires_in: config.access_token_ttl_secs,
    };

    Ok((pair, refresh_digest))
}

/// Decode and validate a token, enforcing the expected type
pub fn decode_token(config: &Config, token: &str, expected: TokenType) -> Result<Claims> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::default())?;

    if data.claims.typ != expected {
        tracing::warn!("Token type mismatch for user {}", data.claims.sub);
        return Err(AppError::Unauthorized);
    }

    Ok(data.claims)
}

/// Authenticated user extracted from the Authorization header
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let claims = decode_token(&state.config, token, TokenType::Access)?;

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

/// Extractor that rejects non-admin callers with 403
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!("Non-admin user {} attempted admin action", user.id);
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            database_path: ":memory:".to_string(),
            backup_dir: "".to_string(),
            allowed_origins: vec![],
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 3600,
            environment: "test".to_string(),
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_token_pair_types() {
        let config = test_config();
        let (pair, _) = issue_token_pair(&config, 42, UserRole::Student).unwrap();

        let access = decode_token(&config, &pair.access_token, TokenType::Access).unwrap();
        assert_eq!(access.sub, 42);
        assert_eq!(access.role, UserRole::Student);

        // A refresh token must not pass as an access token
        assert!(decode_token(&config, &pair.refresh_token, TokenType::Access).is_err());
        assert!(decode_token(&config, &pair.refresh_token, TokenType::Refresh).is_ok());
    }

    #[test]
    fn test_refresh_digest_matches_claims() {
        let config = test_config();
        let (pair, digest) = issue_token_pair(&config, 7, UserRole::Admin).unwrap();
        let claims = decode_token(&config, &pair.refresh_token, TokenType::Refresh).unwrap();
        assert_eq!(token_digest(&claims.jti), digest);
    }
}
