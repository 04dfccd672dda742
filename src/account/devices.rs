/// Push-notification device registry
use crate::{
    db::{format_timestamp, models::{Device, DeviceRegistration}},
    error::{ApiError, ApiResult},
};
use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

/// Device registry
///
/// Every operation runs on the connection it is given, so callers choose
/// whether it joins a unit of work.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceRegistry;

impl DeviceRegistry {
    /// Upsert a device and return the id the session should bind to
    ///
    /// Matches by id first, then by push token (adopting that row's id),
    /// otherwise inserts a new row.
    pub async fn upsert(&self, conn: &mut SqliteConnection, device: &DeviceRegistration) -> ApiResult<Uuid> {
        let now = format_timestamp(Utc::now());
        let platform = device.platform();
        let push_token = device.push_token.as_deref().filter(|t| !t.is_empty());

        if let Some(id) = device.id {
            let known = sqlx::query("SELECT 1 FROM devices WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await?
                .is_some();

            if known {
                if let Some(token) = push_token {
                    // the token moves to this device
                    sqlx::query("UPDATE devices SET push_token = NULL WHERE push_token = ?1 AND id != ?2")
                        .bind(token)
                        .bind(id.to_string())
                        .execute(&mut *conn)
                        .await?;
                }

                sqlx::query(
                    "UPDATE devices
                     SET user_id = ?1, platform = ?2, device_type = ?3,
                         push_token = COALESCE(?4, push_token), last_seen = ?5
                     WHERE id = ?6",
                )
                .bind(device.user_id.to_string())
                .bind(platform.as_str())
                .bind(&device.device_type)
                .bind(push_token)
                .bind(&now)
                .bind(id.to_string())
                .execute(&mut *conn)
                .await?;

                debug!("Updated device {} for user {}", id, device.user_id);
                return Ok(id);
            }
        }

        if let Some(token) = push_token {
            let existing = sqlx::query("SELECT id FROM devices WHERE push_token = ?1")
                .bind(token)
                .fetch_optional(&mut *conn)
                .await?;

            if let Some(row) = existing {
                let id: String = row.try_get("id")?;
                sqlx::query(
                    "UPDATE devices SET user_id = ?1, platform = ?2, device_type = ?3, last_seen = ?4
                     WHERE id = ?5",
                )
                .bind(device.user_id.to_string())
                .bind(platform.as_str())
                .bind(&device.device_type)
                .bind(&now)
                .bind(&id)
                .execute(&mut *conn)
                .await?;

                debug!("Adopted device {} by push token for user {}", id, device.user_id);
                return crate::db::parse_uuid(&id);
            }
        }

        let id = device.id.unwrap_or_else(Uuid::new_v4);
        sqlx::query(
            "INSERT INTO devices (id, user_id, push_token, platform, device_type, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(id.to_string())
        .bind(device.user_id.to_string())
        .bind(push_token)
        .bind(platform.as_str())
        .bind(&device.device_type)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        debug!("Registered device {} for user {}", id, device.user_id);
        Ok(id)
    }

    pub async fn find_by_id(&self, conn: &mut SqliteConnection, id: Uuid) -> ApiResult<Device> {
        let row = sqlx::query(
            "SELECT id, user_id, push_token, platform, device_type, last_seen FROM devices WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Device {} not found", id)))?;

        Device::from_row(&row)
    }
}
