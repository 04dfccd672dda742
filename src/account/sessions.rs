/// Refresh-token session store
use crate::{
    db::{format_timestamp, models::Session},
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, user_id, refresh_token, device_id, expires_at, created_at";

/// Durable session records
///
/// Operations take an explicit connection; pass the transaction's connection
/// to make them part of a unit of work.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStore;

impl SessionStore {
    /// Insert a session, or rotate the existing row for the same (user, device)
    ///
    /// Returns the stored row, which keeps the existing id on conflict.
    pub async fn create(&self, conn: &mut SqliteConnection, session: &Session) -> ApiResult<Session> {
        let row = sqlx::query(&format!(
            "INSERT INTO sessions (id, user_id, refresh_token, device_id, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (user_id, device_id) WHERE device_id IS NOT NULL
             DO UPDATE SET refresh_token = excluded.refresh_token, expires_at = excluded.expires_at
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(session.id.to_string())
        .bind(session.user_id.to_string())
        .bind(&session.refresh_token)
        .bind(session.device_id.map(|id| id.to_string()))
        .bind(format_timestamp(session.expires_at))
        .bind(format_timestamp(session.created_at))
        .fetch_one(&mut *conn)
        .await?;

        let stored = Session::from_row(&row)?;
        debug!("Stored session {} for user {}", stored.id, stored.user_id);
        Ok(stored)
    }

    pub async fn find_by_refresh_token(
        &self,
        conn: &mut SqliteConnection,
        refresh_token: &str,
    ) -> ApiResult<Option<Session>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sessions WHERE refresh_token = ?1",
            SESSION_COLUMNS
        ))
        .bind(refresh_token)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(Session::from_row).transpose()
    }

    pub async fn find_by_user_and_device(
        &self,
        conn: &mut SqliteConnection,
        user_id: Uuid,
        device_id: Uuid,
    ) -> ApiResult<Option<Session>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sessions WHERE user_id = ?1 AND device_id = ?2",
            SESSION_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(device_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(Session::from_row).transpose()
    }

    /// Persist rotated refresh token, expiry and device binding
    pub async fn update(&self, conn: &mut SqliteConnection, session: &Session) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE sessions SET refresh_token = ?1, expires_at = ?2, device_id = ?3 WHERE id = ?4",
        )
        .bind(&session.refresh_token)
        .bind(format_timestamp(session.expires_at))
        .bind(session.device_id.map(|id| id.to_string()))
        .bind(session.id.to_string())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Session {} not found", session.id)));
        }

        Ok(())
    }

    /// Delete a session; deleting a missing row is not an error
    pub async fn revoke(&self, conn: &mut SqliteConnection, id: Uuid) -> ApiResult<()> {
        self.consume(conn, id).await?;
        Ok(())
    }

    /// Delete a session, reporting whether this call removed it
    pub async fn consume(&self, conn: &mut SqliteConnection, id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every session whose expiry has passed
    pub async fn delete_expired(&self, conn: &mut SqliteConnection, now: DateTime<Utc>) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(format_timestamp(now))
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_for_user(&self, conn: &mut SqliteConnection, user_id: Uuid) -> ApiResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?1")
            .bind(user_id.to_string())
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, models::DeviceRegistration};
    use crate::account::DeviceRegistry;
    use chrono::Duration;
    use sqlx::pool::PoolConnection;
    use sqlx::Sqlite;

    async fn setup() -> (PoolConnection<Sqlite>, Uuid) {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let user_id = Uuid::new_v4();
        let now = format_timestamp(Utc::now());
        sqlx::query("INSERT INTO users (id, role, created_at, updated_at) VALUES (?1, 'citizen', ?2, ?2)")
            .bind(user_id.to_string())
            .bind(&now)
            .execute(&pool)
            .await
            .unwrap();

        (pool.acquire().await.unwrap(), user_id)
    }

    async fn device(conn: &mut SqliteConnection, user_id: Uuid) -> Uuid {
        DeviceRegistry
            .upsert(
                conn,
                &DeviceRegistration {
                    id: None,
                    user_id,
                    push_token: None,
                    device_type: "ios".into(),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (mut conn, user_id) = setup().await;
        let store = SessionStore;

        let session = Session::new(user_id, None, "r1".into(), Duration::days(30));
        let stored = store.create(&mut conn, &session).await.unwrap();
        assert_eq!(stored.id, session.id);

        let found = store.find_by_refresh_token(&mut conn, "r1").await.unwrap().unwrap();
        assert_eq!(found.id, session.id);
        assert_eq!(found.expires_at, stored.expires_at);
        assert!(store.find_by_refresh_token(&mut conn, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_for_same_device_rotates_existing_row() {
        let (mut conn, user_id) = setup().await;
        let store = SessionStore;
        let device_id = device(&mut conn, user_id).await;

        let first = store
            .create(&mut conn, &Session::new(user_id, Some(device_id), "r1".into(), Duration::days(30)))
            .await
            .unwrap();
        let second = store
            .create(&mut conn, &Session::new(user_id, Some(device_id), "r2".into(), Duration::days(30)))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.refresh_token, "r2");
        assert_eq!(store.count_for_user(&mut conn, user_id).await.unwrap(), 1);
        assert!(store.find_by_refresh_token(&mut conn, "r1").await.unwrap().is_none());

        let by_device = store
            .find_by_user_and_device(&mut conn, user_id, device_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_device.refresh_token, "r2");
    }

    #[tokio::test]
    async fn test_unbound_sessions_do_not_collide() {
        let (mut conn, user_id) = setup().await;
        let store = SessionStore;

        for token in ["a", "b"] {
            store
                .create(&mut conn, &Session::new(user_id, None, token.into(), Duration::days(30)))
                .await
                .unwrap();
        }
        assert_eq!(store.count_for_user(&mut conn, user_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_rotates_fields() {
        let (mut conn, user_id) = setup().await;
        let store = SessionStore;

        let mut session = store
            .create(&mut conn, &Session::new(user_id, None, "r1".into(), Duration::days(1)))
            .await
            .unwrap();
        session.refresh_token = "r2".into();
        session.expires_at = Utc::now() + Duration::days(30);
        store.update(&mut conn, &session).await.unwrap();

        let found = store.find_by_refresh_token(&mut conn, "r2").await.unwrap().unwrap();
        assert_eq!(found.id, session.id);
        assert!((found.expires_at - session.expires_at).num_milliseconds().abs() < 1);

        let missing = Session::new(user_id, None, "r3".into(), Duration::days(1));
        assert!(matches!(
            store.update(&mut conn, &missing).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let (mut conn, user_id) = setup().await;
        let store = SessionStore;
        let session = store
            .create(&mut conn, &Session::new(user_id, None, "r1".into(), Duration::days(30)))
            .await
            .unwrap();

        assert!(store.consume(&mut conn, session.id).await.unwrap());
        assert!(!store.consume(&mut conn, session.id).await.unwrap());
        store.revoke(&mut conn, session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_sessions() {
        let (mut conn, user_id) = setup().await;
        let store = SessionStore;

        store
            .create(&mut conn, &Session::new(user_id, None, "old".into(), Duration::days(-1)))
            .await
            .unwrap();
        store
            .create(&mut conn, &Session::new(user_id, None, "live".into(), Duration::days(30)))
            .await
            .unwrap();

        assert_eq!(store.delete_expired(&mut conn, Utc::now()).await.unwrap(), 1);
        assert!(store.find_by_refresh_token(&mut conn, "live").await.unwrap().is_some());
        assert!(store.find_by_refresh_token(&mut conn, "old").await.unwrap().is_none());
    }
}
