//! Identity and access.
//!
//! Credentials live in the `users` collection keyed by username, passwords
//! only as salted SHA-256 digests. Sessions are HS256 tokens embedding
//! identity, display name and role; admin-only routes go through the
//! [`Admin`] extractor, everything it yields is typed.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::info;

use crate::{
    config::Config,
    database::{DocumentStore, USERS},
    error::AppError,
    state::State,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub sub: u64,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: u64,
    pub name: String,
    pub username: String,
    pub role: Role,
    pub token: String,
}

pub async fn register(
    state: &State,
    name: &str,
    username: &str,
    password: &str,
) -> Result<AuthResponse, AppError> {
    if name.trim().is_empty() || username.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Name, username and password are required".to_string(),
        ));
    }

    let user = User {
        id: state.store.next_id(USERS).await?,
        name: name.trim().to_string(),
        username: username.trim().to_string(),
        password_hash: hash_password(password),
        role: Role::Student,
    };

    let document = serde_json::to_string(&user)?;
    if !state.store.insert(USERS, &user.username, document).await? {
        return Err(AppError::Conflict(
            "User with that ID already exists".to_string(),
        ));
    }

    info!("Registered new student account: {}", user.username);

    auth_response(&state.config, user)
}

pub async fn login(state: &State, username: &str, password: &str) -> Result<AuthResponse, AppError> {
    // One generic failure for unknown user and bad password alike, the
    // response must not reveal whether the username exists.
    const INVALID: AppError = AppError::Unauthorized("Invalid username or password");

    let document = state
        .store
        .get(USERS, username.trim())
        .await?
        .ok_or(INVALID)?;
    let user: User = serde_json::from_str(&document)?;

    if !verify_password(password, &user.password_hash) {
        return Err(INVALID);
    }

    auth_response(&state.config, user)
}

fn auth_response(config: &Config, user: User) -> Result<AuthResponse, AppError> {
    let token = issue_token(config, &user)?;

    Ok(AuthResponse {
        user_id: user.id,
        name: user.name,
        username: user.username,
        role: user.role,
        token,
    })
}

pub fn issue_token(config: &Config, user: &User) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        name: user.name.clone(),
        role: user.role,
        iat: now,
        exp: now + config.token_ttl_secs,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?)
}

fn verify_token(config: &Config, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Not authorized, token failed or expired"))
}

/// Salted SHA-256, stored as `salt$digest` in hex. Plaintext never leaves
/// this function.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);

    format!("{}${}", hex::encode(salt), hex::encode(digest(&salt, password)))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };

    let computed = digest(&salt, password);

    computed.as_slice().ct_eq(expected.as_slice()).into()
}

fn digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());

    hasher.finalize().into()
}

/// Verified identity resolved from the `Authorization: Bearer` header.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl FromRequestParts<Arc<State>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, AppError> {
        const NO_TOKEN: AppError = AppError::Unauthorized("Not authorized, no token provided");

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(NO_TOKEN)?;
        let token = header.strip_prefix("Bearer ").ok_or(NO_TOKEN)?;

        let claims = verify_token(&state.config, token)?;

        Ok(CurrentUser {
            id: claims.sub,
            username: claims.username,
            name: claims.name,
            role: claims.role,
        })
    }
}

/// [`CurrentUser`] narrowed to the admin role.
pub struct Admin(pub CurrentUser);

impl FromRequestParts<Arc<State>> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, AppError> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        if user.role != Role::Admin {
            return Err(AppError::Forbidden);
        }

        Ok(Admin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            port: 0,
            redis_url: String::new(),
            uploads_dir: String::new(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
        }
    }

    fn test_user() -> User {
        User {
            id: 7,
            name: "Test Admin".to_string(),
            username: "admin1".to_string(),
            password_hash: hash_password("hunter2"),
            role: Role::Admin,
        }
    }

    #[test]
    fn password_roundtrip() {
        let stored = hash_password("hunter2");

        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
        assert!(!stored.contains("hunter2"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash_password("hunter2"), hash_password("hunter2"));
    }

    #[test]
    fn garbage_stored_hash_never_verifies() {
        assert!(!verify_password("hunter2", "not-a-hash"));
        assert!(!verify_password("hunter2", "zz$zz"));
    }

    #[test]
    fn token_roundtrip_carries_identity() {
        let config = test_config();
        let token = issue_token(&config, &test_user()).unwrap();

        let claims = verify_token(&config, &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "admin1");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = test_config();
        let mut token = issue_token(&config, &test_user()).unwrap();
        token.push('x');

        assert!(verify_token(&config, &token).is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = test_config();
        let other = Config {
            jwt_secret: "other-secret".to_string(),
            ..test_config()
        };

        let token = issue_token(&other, &test_user()).unwrap();
        assert!(verify_token(&config, &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = test_config();
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: 7,
            username: "admin1".to_string(),
            name: "Test Admin".to_string(),
            role: Role::Admin,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(verify_token(&config, &token).is_err());
    }
}
