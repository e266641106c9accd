use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod error;
pub(crate) mod extractors;
mod handlers;
mod identity;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod service;

pub fn router() -> Router<AppState> {
    handlers::router()
}
