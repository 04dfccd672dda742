/// Account management system
///
/// Handles social login, user directory sync, devices, refresh-token sessions
/// and app-token authorization.

mod devices;
mod manager;
mod sessions;
mod users;

pub use devices::DeviceRegistry;
pub use manager::{AuthManager, AuthenticatedUser};
pub use sessions::SessionStore;
pub use users::UserDirectory;

use crate::db::models::{Role, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Social login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SocialLoginRequest {
    #[validate(length(min = 1, message = "provider is required"))]
    pub provider: String,
    /// Provider credential (Google ID token, LINE ID token)
    #[validate(length(min = 1, message = "access_token is required"))]
    pub access_token: String,
    #[validate(custom(function = "validate_device_id"))]
    pub device_id: Option<String>,
    pub device_type: Option<String>,
    pub push_token: Option<String>,
}

impl SocialLoginRequest {
    /// True when the client reported anything about its device
    pub fn has_device_info(&self) -> bool {
        [&self.device_id, &self.device_type, &self.push_token]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.is_empty()))
    }
}

fn validate_device_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || Uuid::parse_str(value).is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("device_id must be a UUID"))
    }
}

/// Token refresh request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

/// Token pair returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// App token lifetime in seconds
    pub expires_in: u64,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: String,
    pub role: Role,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(device_id: Option<&str>) -> SocialLoginRequest {
        SocialLoginRequest {
            provider: "google".into(),
            access_token: "cred".into(),
            device_id: device_id.map(str::to_string),
            device_type: None,
            push_token: None,
        }
    }

    #[test]
    fn test_login_request_validation() {
        assert!(login(None).validate().is_ok());
        assert!(login(Some(&Uuid::new_v4().to_string())).validate().is_ok());
        assert!(login(Some("phone-1")).validate().is_err());

        let mut missing = login(None);
        missing.access_token.clear();
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_has_device_info() {
        assert!(!login(None).has_device_info());
        assert!(!login(Some("")).has_device_info());

        let mut req = login(None);
        req.push_token = Some("push-1".into());
        assert!(req.has_device_info());
    }

    #[test]
    fn test_refresh_request_requires_token() {
        let req = RefreshTokenRequest {
            refresh_token: String::new(),
        };
        assert!(req.validate().is_err());
    }
}
