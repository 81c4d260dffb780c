//! Request and response shapes for the auth endpoints.
//!
//! Validation attributes cover shape only (format, lengths, presence);
//! password strength is enforced by the service so its full rule list can
//! be reported at once.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{OrganizationResponse, TeamMembership, UserResponse};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be less than 255 characters")
    )]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: String,
    #[validate(length(
        min = 1,
        max = 100,
        message = "First name must be between 1 and 100 characters"
    ))]
    pub first_name: String,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Last name must be between 1 and 100 characters"
    ))]
    pub last_name: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Organization name must be between 1 and 255 characters"
    ))]
    pub organization_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, message = "Verification token is required"))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UnlockAccountRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Unlock token is required"))]
    pub unlock_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub organization: OrganizationResponse,
    pub access_token: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub last_login_at: Option<chrono::DateTime<chrono::Utc>>,
    pub organization: OrganizationResponse,
    pub teams: Vec<TeamMembership>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_rejects_bad_shapes() {
        let req = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            first_name: String::new(),
            last_name: "Lovelace".to_string(),
            organization_name: "Acme".to_string(),
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("first_name"));
        assert!(!fields.contains_key("last_name"));
    }

    #[test]
    fn camel_case_fields_deserialize() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{
                "email": "a@example.com",
                "password": "V3lvet!Quokka#2024",
                "firstName": "Ada",
                "lastName": "Lovelace",
                "organizationName": "Acme QA"
            }"#,
        )
        .unwrap();
        assert_eq!(req.first_name, "Ada");
        assert_eq!(req.organization_name, "Acme QA");
        assert!(req.validate().is_ok());
    }
}
