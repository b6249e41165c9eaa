use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Request body for registration.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    /// 3-64 characters: letters, digits, `_`, `-`.
    #[schema(example = "alice")]
    pub username: String,
}

/// Response to a successful registration. The secret is shown exactly once.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    pub id: i32,
    pub username: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Request body for login with an API credential pair.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub key: String,
    pub secret: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub id: i32,
    pub username: String,
    pub role: String,
}

/// Validate a registration request.
pub fn validate_register_request(req: &RegisterRequest) -> Result<(), AppError> {
    let username = req.username.trim();
    let len = username.chars().count();
    if !(3..=64).contains(&len) {
        return Err(AppError::Validation(
            "Username must be 3-64 characters".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::Validation(
            "Username may only contain letters, digits, '_' and '-'".into(),
        ));
    }
    Ok(())
}
