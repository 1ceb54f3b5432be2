use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod error;
pub mod google;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod reconcile;
pub mod repo;
mod repo_types;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
