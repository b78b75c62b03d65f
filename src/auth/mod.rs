//! Accounts: signup/login, Google sign-in, token refresh and password reset.

pub mod dto;
pub mod google;
pub mod handlers;
pub mod jwt;
pub mod password;

pub use handlers::router;
pub use jwt::{AuthUser, JwtKeys};
