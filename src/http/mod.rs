//! HTTP layer: router, handlers, cookies, and shared request state.

pub mod context;
pub mod cookies;
pub mod handler_oauth1;
pub mod handler_oauth2;
pub mod handler_session;
pub mod server;
pub mod utils_session;

pub use context::AppState;
pub use server::build_router;
