//! HTTP API: label OCR, advice plans, feedback and the dashboard.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
