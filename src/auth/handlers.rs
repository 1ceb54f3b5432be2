use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, GoogleAuthRequest, LoginRequest, PublicUser, RegisterRequest},
        error::AuthError,
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        reconcile,
        repo::NewUser,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google", post(google_auth))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let email = payload.email.trim().to_string();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Invalid("Invalid email"));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AuthError::Invalid("Password too short"));
    }

    let password_hash = hash_password(&payload.password)?;

    let user = reconcile::register_user(
        &state.db,
        NewUser {
            name: payload.name,
            email,
            age: payload.age,
            country: payload.country,
            gender: payload.gender,
            password_hash: Some(password_hash),
            role: payload.role.unwrap_or_else(|| "user".to_string()),
            google_id: None,
            is_google_auth: false,
            picture: None,
            email_verified: false,
        },
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.issue(&user)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser::from_user(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(AuthError::Invalid("Email and password are required"));
    }

    let user = reconcile::find_password_user(&state.db, payload.email.trim()).await?;

    // The gate above guarantees a stored hash; an empty fallback still
    // compares as a non-match.
    let stored = user.password_hash.as_deref().unwrap_or_default();
    if !verify_password(&payload.password, stored) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::BadPassword);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.issue(&user)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from_user(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn google_auth(
    State(state): State<AppState>,
    Json(payload): Json<GoogleAuthRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    if payload.credential.is_empty() {
        return Err(AuthError::Invalid("No credential provided"));
    }

    // Verification happens before any store access; a rejected token never
    // creates or mutates a record.
    let identity = state.google.verify(&payload.credential).await?;

    let (user, created) = reconcile::reconcile_external(&state.db, &identity).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.issue(&user)?;

    info!(user_id = %user.id, created, "google sign-in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::with_avatar(&user),
    }))
}

/// The token carries the whole principal, so this is served from verified
/// claims alone; no store lookup.
#[instrument(skip_all)]
pub async fn get_me(AuthUser(claims): AuthUser) -> Json<PublicUser> {
    Json(PublicUser {
        id: claims.sub,
        name: claims.name,
        email: claims.email,
        role: claims.role,
        avatar: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("USER@ex.co"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("user@nodot"));
    }

    #[test]
    fn public_user_omits_missing_avatar() {
        let now = OffsetDateTime::now_utc();
        let user = crate::auth::repo::User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "test@example.com".into(),
            age: None,
            country: None,
            gender: None,
            password_hash: None,
            role: "user".into(),
            google_id: Some("sub".into()),
            is_google_auth: true,
            picture: None,
            email_verified: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&PublicUser::with_avatar(&user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("avatar"));
    }

    #[test]
    fn public_user_includes_avatar_on_the_google_path() {
        let now = OffsetDateTime::now_utc();
        let user = crate::auth::repo::User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "test@example.com".into(),
            age: None,
            country: None,
            gender: None,
            password_hash: None,
            role: "user".into(),
            google_id: Some("sub".into()),
            is_google_auth: true,
            picture: Some("https://lh3.example/p.jpg".into()),
            email_verified: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&PublicUser::with_avatar(&user)).unwrap();
        assert!(json.contains("https://lh3.example/p.jpg"));

        let plain = serde_json::to_string(&PublicUser::from_user(&user)).unwrap();
        assert!(!plain.contains("avatar"));
    }
}
