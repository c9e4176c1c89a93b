//! C9: the HTTP facade. Owns request validation, JSON codec, and
//! error-to-status mapping; deliberately kept outside the core (spec.md §1).

pub mod error;
pub mod request_id;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
