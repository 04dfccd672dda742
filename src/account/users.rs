/// User directory: find-or-create users from verified social identities
use crate::{
    db::{format_timestamp, models::{Role, SocialAccount, User}, TransactionManager},
    error::{ApiError, ApiResult},
    identity::{IdentityClaims, Provider},
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info, warn};
use uuid::Uuid;

/// User directory service
pub struct UserDirectory {
    db: SqlitePool,
    transactions: TransactionManager,
}

impl UserDirectory {
    pub fn new(db: SqlitePool) -> Self {
        let transactions = TransactionManager::new(db.clone());
        Self { db, transactions }
    }

    /// Look up the user linked to a provider subject
    pub async fn find_by_social(&self, provider: Provider, subject: &str) -> ApiResult<Option<User>> {
        let row = sqlx::query(
            "SELECT u.id, u.email, u.display_name, u.role, u.created_at, u.updated_at
             FROM users u
             JOIN social_accounts s ON s.user_id = u.id
             WHERE s.provider = ?1 AND s.provider_id = ?2",
        )
        .bind(provider.as_str())
        .bind(subject)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(User::from_row).transpose()
    }

    /// Return the user for a social identity, creating it on first login
    ///
    /// An existing user is returned unchanged. A concurrent first login for
    /// the same identity loses on the unique (provider, subject) constraint and
    /// reads the winner's row instead.
    pub async fn sync_from_social(&self, provider: Provider, claims: &IdentityClaims) -> ApiResult<User> {
        if let Some(user) = self.find_by_social(provider, &claims.subject).await? {
            return Ok(user);
        }

        let user = new_user(claims);
        let account = SocialAccount {
            id: Uuid::new_v4(),
            user_id: user.id,
            provider: provider.as_str().to_string(),
            provider_id: claims.subject.clone(),
            created_at: user.created_at,
        };

        let pending = user.clone();
        let created = self
            .transactions
            .run(move |conn| {
                Box::pin(async move {
                    insert_user(conn, &pending).await?;
                    insert_social_account(conn, &account).await?;
                    Ok(pending)
                })
            })
            .await;

        match created {
            Ok(user) => {
                info!("Created user {} from {} login", user.id, provider);
                Ok(user)
            }
            Err(ApiError::Conflict(_)) => {
                warn!("Concurrent first login for {} subject, retrying lookup", provider);
                self.find_by_social(provider, &claims.subject)
                    .await?
                    .ok_or_else(|| {
                        ApiError::UserSyncFailed("social account vanished after conflict".to_string())
                    })
            }
            Err(ApiError::TransactionFailed(msg)) => Err(ApiError::UserSyncFailed(msg)),
            Err(e) => Err(e),
        }
    }

    /// Load a user by id
    pub async fn get_user(&self, user_id: Uuid) -> ApiResult<User> {
        let row = sqlx::query(
            "SELECT id, email, display_name, role, created_at, updated_at FROM users WHERE id = ?1",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", user_id)))?;

        User::from_row(&row)
    }
}

fn new_user(claims: &IdentityClaims) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: claims.email.clone(),
        display_name: claims.display_name.clone().unwrap_or_default(),
        role: Role::LOWEST,
        created_at: now,
        updated_at: now,
    }
}

async fn insert_user(conn: &mut SqliteConnection, user: &User) -> ApiResult<()> {
    sqlx::query(
        "INSERT INTO users (id, email, display_name, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(user.id.to_string())
    .bind(&user.email)
    .bind(&user.display_name)
    .bind(user.role.as_str())
    .bind(format_timestamp(user.created_at))
    .bind(format_timestamp(user.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        error!("Failed to insert user: {}", e);
        ApiError::UserSyncFailed(format!("failed to create user: {}", e))
    })?;

    Ok(())
}

async fn insert_social_account(conn: &mut SqliteConnection, account: &SocialAccount) -> ApiResult<()> {
    sqlx::query(
        "INSERT INTO social_accounts (id, user_id, provider, provider_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(account.id.to_string())
    .bind(account.user_id.to_string())
    .bind(&account.provider)
    .bind(&account.provider_id)
    .bind(format_timestamp(account.created_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        let err = ApiError::Database(e);
        if err.is_unique_violation() {
            ApiError::Conflict(format!("{} account already linked", account.provider))
        } else {
            error!("Failed to insert social account: {}", err);
            ApiError::UserSyncFailed(format!("failed to link social account: {}", err))
        }
    })?;

    Ok(())
}
