use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{error, info};

use mirumir_db::Database;
use mirumir_gateway::Registry;
use mirumir_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use mirumir_types::models::{Timestamp, UserId};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::validate;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub registry: Registry,
}

/// Run a blocking closure (SQLite, argon2) off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate::login(&req.login)?;
    validate::password(&req.password)?;

    let user = blocking(&state, move |s| {
        if s.db.get_user_by_login(&req.login)?.is_some() {
            return Err(ApiError::Conflict("Login already registered".into()));
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
            .to_string();

        // The unique index decides any race with a concurrent registration.
        s.db
            .create_user(&req.login, &password_hash)?
            .ok_or_else(|| ApiError::Conflict("Login already registered".into()))
    })
    .await?;

    info!("Registered user {} ({})", user.login, user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            login: user.login,
            created_at: user.created_at,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blocking(&state, move |s| {
        let user = s
            .db
            .get_user_by_login(&req.login)?
            .ok_or(ApiError::Unauthorized)?;

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("stored hash for user {} unreadable: {}", user.id, e))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized)?;

        let (token, expires_at) = create_token(&s.jwt_secret, user.id, &user.login, s.token_ttl)?;
        Ok(LoginResponse {
            user_id: user.id,
            login: user.login,
            token,
            expires_at,
        })
    })
    .await?;

    Ok(Json(response))
}

pub fn create_token(
    secret: &str,
    user_id: UserId,
    login: &str,
    ttl: Duration,
) -> anyhow::Result<(String, Timestamp)> {
    let expires_at = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| anyhow::anyhow!("token lifetime out of range"))?;
    let claims = Claims {
        sub: user_id,
        login: login.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, expires_at))
}

/// Verify signature and expiry. Any failure is reported as 401.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_carries_identity() {
        let (token, expires_at) = create_token("s3cret", 42, "ada", Duration::minutes(5)).unwrap();
        let claims = decode_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.login, "ada");
        assert_eq!(claims.exp, expires_at.timestamp() as usize);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let (token, _) = create_token("s3cret", 42, "ada", Duration::minutes(5)).unwrap();
        assert!(matches!(decode_token("other", &token), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let (token, _) = create_token("s3cret", 42, "ada", Duration::hours(-2)).unwrap();
        assert!(matches!(decode_token("s3cret", &token), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn unrepresentable_lifetime_is_an_error() {
        assert!(create_token("s3cret", 42, "ada", Duration::MAX).is_err());
    }

    #[test]
    fn garbage_is_unauthorized() {
        assert!(decode_token("s3cret", "not.a.jwt").is_err());
    }
}
