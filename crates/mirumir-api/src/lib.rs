pub mod access;
pub mod auth;
pub mod boards;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod sharing;
pub mod stickers;
pub mod validate;
pub mod ws;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;
