use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload: a snapshot of the user's profile at issuance time.
/// Downstream services read these claims instead of hitting the user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,               // user ID
    pub name: String,
    pub email: String,
    pub role: String,
    pub age: Option<i32>,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub iat: usize,              // issued at (unix timestamp)
    pub exp: usize,              // expires at (unix timestamp)
}
