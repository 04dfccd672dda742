/// Durable store records
use crate::{
    db::{parse_timestamp, parse_uuid},
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// User role, lowest privilege first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Citizen,
    Officer,
    Admin,
}

impl Role {
    /// Role given to users created from a social login
    pub const LOWEST: Role = Role::Citizen;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Officer => "officer",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "citizen" => Ok(Role::Citizen),
            "officer" => Ok(Role::Officer),
            "admin" => Ok(Role::Admin),
            _ => Err(ApiError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub(crate) fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(Self {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            role: row.try_get::<String, _>("role")?.parse()?,
            created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
            updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
        })
    }
}

/// Link between a user and a provider subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_id: String,
    pub created_at: DateTime<Utc>,
}

/// Push delivery channel of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPlatform {
    Fcm,
    Apns,
}

impl PushPlatform {
    /// Android devices receive through FCM, everything else through APNs
    pub fn from_device_type(device_type: &str) -> Self {
        if device_type.eq_ignore_ascii_case("android") {
            PushPlatform::Fcm
        } else {
            PushPlatform::Apns
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PushPlatform::Fcm => "fcm",
            PushPlatform::Apns => "apns",
        }
    }
}

impl FromStr for PushPlatform {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fcm" => Ok(PushPlatform::Fcm),
            "apns" => Ok(PushPlatform::Apns),
            _ => Err(ApiError::Internal(format!("Invalid push platform: {}", s))),
        }
    }
}

/// Device record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub user_id: Uuid,
    pub push_token: Option<String>,
    pub platform: PushPlatform,
    pub device_type: String,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    pub(crate) fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(Self {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            user_id: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
            push_token: row.try_get("push_token")?,
            platform: row.try_get::<String, _>("platform")?.parse()?,
            device_type: row.try_get("device_type")?,
            last_seen: parse_timestamp(&row.try_get::<String, _>("last_seen")?)?,
        })
    }
}

/// Device as reported by a client at login
#[derive(Debug, Clone)]
pub struct DeviceRegistration {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub push_token: Option<String>,
    pub device_type: String,
}

impl DeviceRegistration {
    pub fn platform(&self) -> PushPlatform {
        PushPlatform::from_device_type(&self.device_type)
    }
}

/// Refresh-token session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token: String,
    pub device_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// New session expiring `ttl` from now
    pub fn new(user_id: Uuid, device_id: Option<Uuid>, refresh_token: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            refresh_token,
            device_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub(crate) fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        let device_id: Option<String> = row.try_get("device_id")?;
        Ok(Self {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            user_id: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
            refresh_token: row.try_get("refresh_token")?,
            device_id: device_id.as_deref().map(parse_uuid).transpose()?,
            expires_at: parse_timestamp(&row.try_get::<String, _>("expires_at")?)?,
            created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("citizen".parse::<Role>().unwrap(), Role::Citizen);
        assert_eq!("OFFICER".parse::<Role>().unwrap(), Role::Officer);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_lowest_role_is_citizen() {
        assert_eq!(Role::LOWEST, Role::Citizen);
        assert!(Role::Citizen < Role::Officer && Role::Officer < Role::Admin);
    }

    #[test]
    fn test_platform_from_device_type() {
        assert_eq!(PushPlatform::from_device_type("android"), PushPlatform::Fcm);
        assert_eq!(PushPlatform::from_device_type("ios"), PushPlatform::Apns);
        assert_eq!(PushPlatform::from_device_type("web"), PushPlatform::Apns);
        assert_eq!(PushPlatform::from_device_type(""), PushPlatform::Apns);
    }

    #[test]
    fn test_session_expiry() {
        let session = Session::new(Uuid::new_v4(), None, "r".into(), Duration::days(30));
        let now = Utc::now();
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::days(31)));
        assert!((session.expires_at - session.created_at - Duration::days(30)).num_seconds().abs() < 1);
    }
}
