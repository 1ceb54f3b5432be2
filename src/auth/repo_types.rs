use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
///
/// `password_hash` is absent for accounts created through Google sign-in;
/// `google_id` is absent until an account is created or linked through it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub age: Option<i32>,
    pub country: Option<String>,
    pub gender: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: String,
    pub google_id: Option<String>,
    pub is_google_auth: bool,
    pub picture: Option<String>,
    pub email_verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Field set for inserting a new user, on either registration path.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: Option<i32>,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub password_hash: Option<String>,
    pub role: String,
    pub google_id: Option<String>,
    pub is_google_auth: bool,
    pub picture: Option<String>,
    pub email_verified: bool,
}
