//! Authentication types for `/auth/*`.

use serde::{Deserialize, Serialize};

/// Body of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// The authenticated user as returned by `GET /auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
}

/// Response of login/register: the user the cookie now belongs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub user: Option<UserInfo>,
}
