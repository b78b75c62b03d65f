pub mod activity;
pub mod app;
pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod health;
pub mod products;
pub mod rate_limit;
pub mod saved_searches;
pub mod state;
pub mod store;
