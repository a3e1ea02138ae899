//! Session Authorizer: resolves a bearer token to a user identity.
//!
//! The check is read-only and idempotent; calling it repeatedly for the same
//! valid token yields the same identity without touching the user record.

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::jwt;
use crate::db::models::{self, UserId};
use crate::db::{run_blocking, DbPool};
use crate::error::AuthError;

#[async_trait]
pub trait SessionAuthorizer: Send + Sync {
    async fn authorize(&self, token: &str) -> Result<UserId, AuthError>;
}

/// Verifies the JWT, then requires the user row to hold the token's digest.
pub struct JwtSessionAuthorizer {
    db: DbPool,
    jwt_secret: Arc<[u8]>,
}

impl JwtSessionAuthorizer {
    pub fn new(db: DbPool, jwt_secret: &[u8]) -> Self {
        Self {
            db,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}

#[async_trait]
impl SessionAuthorizer for JwtSessionAuthorizer {
    async fn authorize(&self, token: &str) -> Result<UserId, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = jwt::validate_access_token(&self.jwt_secret, token)?;
        let user_id = claims.sub;

        let user = run_blocking(&self.db, move |conn| models::find_user(conn, user_id))
            .await?
            .ok_or(AuthError::UnknownUser(user_id))?;

        let presented = jwt::hash_session_token(token);
        match user.session_token_hash {
            Some(stored) if stored == presented => Ok(user_id),
            _ => Err(AuthError::SessionMismatch(user_id)),
        }
    }
}
