//! Saved searches: per-user persisted product queries with ownership checks.

pub mod dto;
pub mod handlers;

pub use handlers::router;
