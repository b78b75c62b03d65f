//! Trend product catalog: filtered listing and detail lookup.

pub mod dto;
pub mod handlers;

pub use handlers::router;
