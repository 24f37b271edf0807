use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::Role;

#[derive(Deserialize, Debug, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 60))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl RegisterRequest {
    /// Strip surrounding whitespace so blank names fail length validation.
    pub fn trimmed(mut self) -> Self {
        self.email = self.email.trim().to_string();
        self.username = self.username.trim().to_string();
        self
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ConfirmEmailRequest {
    #[validate(length(min = 1))]
    pub key: String,
}

#[derive(Deserialize, Debug, Validate)]
pub struct PasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Deserialize, Debug, Validate)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(min = 1))]
    pub key: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Deserialize, Debug, Default, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub username: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

impl UpdateProfileRequest {
    pub fn trimmed(mut self) -> Self {
        self.email = self.email.map(|e| e.trim().to_string());
        self.username = self.username.map(|u| u.trim().to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_username_is_rejected_after_trimming() {
        let req = RegisterRequest {
            email: " buyer@example.com ".into(),
            username: "   ".into(),
            password: "long-enough".into(),
            role: Role::Buyer,
        }
        .trimmed();
        assert_eq!(req.email, "buyer@example.com");
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));

        let update = UpdateProfileRequest {
            username: Some("  ".into()),
            ..Default::default()
        }
        .trimmed();
        assert!(update.validate().is_err());
    }
}
