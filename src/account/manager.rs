/// Auth orchestrator: login, refresh, logout and request authorization
use crate::{
    account::{
        DeviceRegistry, LoginResponse, RefreshTokenRequest, SessionStore, SocialLoginRequest,
        UserDirectory,
    },
    cache::AppTokenCache,
    db::{
        models::{DeviceRegistration, Role, Session, User},
        TransactionManager,
    },
    error::{ApiError, ApiResult},
    identity::{Provider, ProviderVerifiers},
    jwt::JwtIssuer,
};
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

/// Token type reported to clients
pub const TOKEN_TYPE: &str = "Bearer";

/// Caller identity established by [`AuthManager::authorize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}

/// Auth orchestrator service
pub struct AuthManager {
    db: SqlitePool,
    verifiers: ProviderVerifiers,
    users: UserDirectory,
    jwt: JwtIssuer,
    cache: AppTokenCache,
    transactions: TransactionManager,
    sessions: SessionStore,
    devices: DeviceRegistry,
    session_ttl: Duration,
}

impl AuthManager {
    pub fn new(
        db: SqlitePool,
        verifiers: ProviderVerifiers,
        jwt: JwtIssuer,
        cache: AppTokenCache,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users: UserDirectory::new(db.clone()),
            transactions: TransactionManager::new(db.clone()),
            db,
            verifiers,
            jwt,
            cache,
            sessions: SessionStore,
            devices: DeviceRegistry,
            session_ttl,
        }
    }

    pub fn cache(&self) -> &AppTokenCache {
        &self.cache
    }

    /// Log in with a provider credential
    ///
    /// The device upsert and session write commit together. The app token is
    /// cached before that unit runs and is not withdrawn if it fails.
    pub async fn login_with_social(&self, req: SocialLoginRequest) -> ApiResult<LoginResponse> {
        let provider: Provider = req.provider.parse()?;

        let claims = self
            .verifiers
            .verify(provider, &req.access_token)
            .await
            .map_err(|e| {
                warn!("{} login rejected: {}", provider, e);
                e
            })?;

        let user = self.users.sync_from_social(provider, &claims).await?;

        let access_token = self.jwt.issue(user.id, user.role)?;
        self.cache.set_app_token(user.id, &access_token).await?;

        let device = if req.has_device_info() {
            Some(device_registration(user.id, &req)?)
        } else {
            None
        };

        let user_id = user.id;
        let refresh_token = generate_refresh_token();
        let ttl = self.session_ttl;
        let sessions = self.sessions;
        let devices = self.devices;

        let session = self
            .transactions
            .run(move |conn| {
                Box::pin(async move {
                    let device_id = match &device {
                        Some(device) => Some(devices.upsert(conn, device).await?),
                        None => None,
                    };

                    if let Some(device_id) = device_id {
                        if let Some(mut existing) = sessions
                            .find_by_user_and_device(conn, user_id, device_id)
                            .await?
                        {
                            existing.refresh_token = refresh_token;
                            existing.expires_at = Utc::now() + ttl;
                            sessions.update(conn, &existing).await?;
                            return Ok(existing);
                        }
                    }

                    sessions
                        .create(conn, &Session::new(user_id, device_id, refresh_token, ttl))
                        .await
                })
            })
            .await?;

        info!("User {} logged in with {} (session {})", user_id, provider, session.id);

        Ok(self.token_pair(access_token, session.refresh_token))
    }

    /// Rotate a refresh token into a new token pair
    ///
    /// The old session is consumed and replaced in one unit of work. The
    /// replacement is not bound to a device; the next login from that device
    /// binds a session again. A token that was already consumed, including by
    /// a concurrent refresh, is `InvalidRefreshToken`.
    pub async fn refresh_token(&self, req: RefreshTokenRequest) -> ApiResult<LoginResponse> {
        let mut conn = self.db.acquire().await?;

        let session = self
            .sessions
            .find_by_refresh_token(&mut conn, &req.refresh_token)
            .await?
            .ok_or(ApiError::InvalidRefreshToken)?;

        if session.is_expired(Utc::now()) {
            self.sessions.revoke(&mut conn, session.id).await?;
            info!("Revoked expired session {} for user {}", session.id, session.user_id);
            return Err(ApiError::RefreshTokenExpired);
        }
        drop(conn);

        let user = self.users.get_user(session.user_id).await?;
        let access_token = self.jwt.issue(user.id, user.role)?;

        let old_id = session.id;
        let replacement = Session::new(user.id, None, generate_refresh_token(), self.session_ttl);
        let sessions = self.sessions;

        let stored = self
            .transactions
            .run(move |conn| {
                Box::pin(async move {
                    if !sessions.consume(conn, old_id).await? {
                        return Err(ApiError::InvalidRefreshToken);
                    }
                    sessions.create(conn, &replacement).await
                })
            })
            .await?;

        self.cache.set_app_token(user.id, &access_token).await?;

        info!("Rotated session {} into {} for user {}", old_id, stored.id, user.id);

        Ok(self.token_pair(access_token, stored.refresh_token))
    }

    /// Revoke the user's app token; refresh-token sessions are kept
    pub async fn logout(&self, user_id: Uuid) -> ApiResult<()> {
        self.cache.delete_app_token(user_id).await?;
        info!("User {} logged out", user_id);
        Ok(())
    }

    /// Authorize a bearer token: valid signature and still the cached app token
    pub async fn authorize(&self, token: &str) -> ApiResult<AuthenticatedUser> {
        let details = self.jwt.validate(token)?;

        if !self.cache.is_current(details.user_id, token).await? {
            warn!("Rejected revoked token for user {}", details.user_id);
            return Err(ApiError::Authentication(
                "Token has been revoked or expired".to_string(),
            ));
        }

        Ok(AuthenticatedUser {
            user_id: details.user_id,
            role: details.role,
        })
    }

    pub async fn get_user(&self, user_id: Uuid) -> ApiResult<User> {
        self.users.get_user(user_id).await
    }

    /// Remove expired sessions, returning how many were deleted
    pub async fn cleanup_expired_sessions(&self) -> ApiResult<u64> {
        let mut conn = self.db.acquire().await?;
        self.sessions.delete_expired(&mut conn, Utc::now()).await
    }

    fn token_pair(&self, access_token: String, refresh_token: String) -> LoginResponse {
        LoginResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.jwt.ttl().num_seconds().max(0) as u64,
        }
    }
}

fn device_registration(user_id: Uuid, req: &SocialLoginRequest) -> ApiResult<DeviceRegistration> {
    let id = match req.device_id.as_deref().filter(|id| !id.is_empty()) {
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| ApiError::Validation("device_id must be a UUID".to_string()))?,
        ),
        None => None,
    };

    Ok(DeviceRegistration {
        id,
        user_id,
        push_token: req.push_token.clone().filter(|t| !t.is_empty()),
        device_type: req.device_type.clone().unwrap_or_default(),
    })
}

/// 32 random bytes, hex encoded
fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
