use crate::core::config::SessionConfig;
use crate::core::policy::{authorize, Action};
use crate::core::AppError;
use crate::db::sessions;
use crate::models::users::{AccountStatus, Role};
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String, // user ID
    pub sid: String, // system_sessions row
    pub exp: usize,
}

/// Signs and reads the session cookie. The cookie only proves which session
/// row the caller holds; revocation and freezing are checked against the
/// database on every request.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub cookie_name: String,
    pub secure_cookie: bool,
    pub ttl: chrono::Duration,
}

impl SessionKeys {
    pub fn new(config: &SessionConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            cookie_name: config.cookie_name.clone(),
            secure_cookie: config.secure_cookie,
            ttl: chrono::Duration::hours(config.ttl_hours),
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            exp: expires_at.timestamp() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::internal_error(format!("Failed to sign session: {}", e)))
    }

    pub fn decode(&self, token: &str) -> Result<(Uuid, Uuid), AppError> {
        let claims = decode::<SessionClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| AppError::unauthorized(format!("Invalid session token: {}", e)))?
            .claims;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::unauthorized("Invalid user ID in session"))?;
        let session_id = Uuid::parse_str(&claims.sid)
            .map_err(|_| AppError::unauthorized("Invalid session ID in session"))?;
        Ok((user_id, session_id))
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), token)
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .finish()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(self.cookie_name.clone(), "")
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .finish();
        cookie.make_removal();
        cookie
    }
}

/// The resolved caller of a system endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    #[serde(skip)]
    pub session_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub leader_id: Option<Uuid>,
}

impl SessionUser {
    pub fn require(&self, action: Action) -> Result<(), AppError> {
        if authorize(self.role, action).is_allowed() {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.id,
                role = %self.role,
                ?action,
                "Denied by authorization policy"
            );
            Err(AppError::forbidden())
        }
    }

    pub fn require_student(&self) -> Result<(), AppError> {
        self.require(Action::SubmitAccessRequest)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Leaders act on their own students only; admins are not scoped.
    pub fn leader_scope(&self) -> Option<Uuid> {
        match self.role {
            Role::Leader => Some(self.id),
            _ => None,
        }
    }
}

pub fn ensure_not_frozen(status: AccountStatus) -> Result<(), AppError> {
    match status {
        AccountStatus::Active => Ok(()),
        AccountStatus::Frozen => Err(AppError::frozen()),
    }
}

pub async fn resolve_session(
    pool: &PgPool,
    keys: &SessionKeys,
    token: &str,
) -> Result<SessionUser, AppError> {
    let (user_id, session_id) = keys.decode(token)?;

    let identity = sessions::find_active_identity(pool, session_id, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Session revoked, expired or unknown"))?;

    ensure_not_frozen(identity.status)?;

    Ok(SessionUser {
        id: identity.user_id,
        session_id: identity.session_id,
        email: identity.email,
        display_name: identity.display_name,
        role: identity.role,
        status: identity.status,
        leader_id: identity.leader_id,
    })
}

impl FromRequest for SessionUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let keys = req.app_data::<web::Data<SessionKeys>>().cloned();
        let pool = req.app_data::<web::Data<PgPool>>().cloned();
        let token = keys
            .as_ref()
            .and_then(|keys| req.cookie(&keys.cookie_name))
            .map(|cookie| cookie.value().to_string());

        Box::pin(async move {
            let (keys, pool) = match (keys, pool) {
                (Some(keys), Some(pool)) => (keys, pool),
                _ => return Err(AppError::internal_error("Session state is not configured")),
            };
            let token = token.ok_or_else(|| AppError::unauthorized("No session cookie"))?;
            resolve_session(pool.get_ref(), keys.get_ref(), &token).await
        })
    }
}
