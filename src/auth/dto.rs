use serde::{Deserialize, Serialize};

use crate::store::User;

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for Google sign-in. Both `idToken` and `id_token` are
/// accepted spellings.
#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    #[serde(rename = "idToken", alias = "id_token", default)]
    pub id_token: Option<String>,
}

/// Request body for the forgot-password flow.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Request body for redeeming a reset token.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Response returned after signup, login, google login or refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub user: PublicUser,
}

impl TokenResponse {
    pub fn new(access_token: String, refresh_token: String, user: PublicUser) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer",
            user,
        }
    }
}

/// Public part of the user returned to the client; never carries the hash.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
