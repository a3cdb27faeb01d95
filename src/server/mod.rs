//! HTTP server wiring and shared state.

pub mod routes;
pub mod state;

pub use routes::router;
pub use state::ServerState;
