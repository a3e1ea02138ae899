//! Membership lookups used to resolve fan-out recipients.

use async_trait::async_trait;

use crate::db::models::{self, ChatId, UserId};
use crate::db::{run_blocking, DbPool};
use crate::error::DbError;

#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Users belonging to a chat.
    async fn members_of(&self, chat_id: ChatId) -> Result<Vec<UserId>, DbError>;

    /// Users who should hear about changes to `user_id` (excluding the user).
    async fn contacts_of(&self, user_id: UserId) -> Result<Vec<UserId>, DbError>;
}

/// Directory backed by the `chat_members` table. Contacts are co-members of any chat.
#[derive(Clone)]
pub struct SqliteDirectory {
    db: DbPool,
}

impl SqliteDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MembershipDirectory for SqliteDirectory {
    async fn members_of(&self, chat_id: ChatId) -> Result<Vec<UserId>, DbError> {
        run_blocking(&self.db, move |conn| models::members_of(conn, chat_id)).await
    }

    async fn contacts_of(&self, user_id: UserId) -> Result<Vec<UserId>, DbError> {
        run_blocking(&self.db, move |conn| models::contacts_of(conn, user_id)).await
    }
}
