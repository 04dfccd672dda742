/// Unit-of-work coordinator over the durable store
use crate::error::{ApiError, ApiResult};
use futures::future::BoxFuture;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, warn};

/// Runs a closure inside one database transaction
///
/// The closure receives the transaction's connection and must route every
/// write of the unit through it. Commit on `Ok`, rollback on `Err`.
#[derive(Clone)]
pub struct TransactionManager {
    db: SqlitePool,
}

impl TransactionManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Execute `work` atomically
    ///
    /// Store errors raised inside the unit become `TransactionFailed`; any
    /// other error is returned as-is after the rollback.
    pub async fn run<T, F>(&self, work: F) -> ApiResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, ApiResult<T>> + Send,
    {
        let mut tx = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ApiError::TransactionFailed(format!("begin: {}", e))
        })?;

        match work(&mut *tx).await {
            Ok(value) => {
                tx.commit().await.map_err(|e| {
                    error!("Failed to commit transaction: {}", e);
                    ApiError::TransactionFailed(format!("commit: {}", e))
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    warn!("Rollback failed: {}", e);
                }
                Err(match err {
                    ApiError::Database(e) => ApiError::TransactionFailed(e.to_string()),
                    other => other,
                })
            }
        }
    }
}
