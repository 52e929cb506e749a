use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod repo;
pub mod repo_types;
pub mod reset;
mod reset_token;
pub mod services;

/// Public auth endpoints plus the `/api` routes guarded by the bearer check.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .nest("/api", handlers::protected_routes(state))
}
