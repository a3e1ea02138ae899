//! Row types and synchronous queries for the tables in migrations.rs.
//! Call these from inside `db::run_blocking` or under the pool lock.
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// Integer user identity (users.id).
pub type UserId = i64;
/// Integer chat identity (chats.id).
pub type ChatId = i64;

/// User record in the users table
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub session_token_hash: Option<String>,
    pub settings: String,
    pub created_at: String,
}

/// Row counts sampled for the database status feed.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TableCounts {
    pub users: i64,
    pub chats: i64,
    pub memberships: i64,
    pub messages: i64,
}

pub fn create_user(conn: &Connection, name: &str) -> Result<UserId, rusqlite::Error> {
    conn.execute(
        "INSERT INTO users (name, created_at) VALUES (?1, ?2)",
        params![name, Utc::now().to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_user(conn: &Connection, user_id: UserId) -> Result<Option<User>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, name, session_token_hash, settings, created_at FROM users WHERE id = ?1",
        [user_id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                session_token_hash: row.get(2)?,
                settings: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()
}

/// Replace (or clear, with `None`) the stored session digest for a user.
pub fn set_session_token_hash(
    conn: &Connection,
    user_id: UserId,
    token_hash: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE users SET session_token_hash = ?1 WHERE id = ?2",
        params![token_hash, user_id],
    )?;
    Ok(())
}

pub fn create_chat(conn: &Connection, name: &str) -> Result<ChatId, rusqlite::Error> {
    conn.execute(
        "INSERT INTO chats (name, created_at) VALUES (?1, ?2)",
        params![name, Utc::now().to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn add_member(conn: &Connection, chat_id: ChatId, user_id: UserId) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO chat_members (chat_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
        params![chat_id, user_id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn remove_member(conn: &Connection, chat_id: ChatId, user_id: UserId) -> Result<(), rusqlite::Error> {
    conn.execute(
        "DELETE FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
        params![chat_id, user_id],
    )?;
    Ok(())
}

pub fn insert_message(
    conn: &Connection,
    chat_id: ChatId,
    sender_id: UserId,
    body: &str,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO messages (chat_id, sender_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![chat_id, sender_id, body, Utc::now().to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All user ids belonging to a chat, ascending.
pub fn members_of(conn: &Connection, chat_id: ChatId) -> Result<Vec<UserId>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM chat_members WHERE chat_id = ?1 ORDER BY user_id")?;
    let members = stmt
        .query_map([chat_id], |row| row.get(0))?
        .collect::<Result<Vec<UserId>, _>>()?;
    Ok(members)
}

/// Users sharing at least one chat with `user_id`, excluding the user.
pub fn contacts_of(conn: &Connection, user_id: UserId) -> Result<Vec<UserId>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT other.user_id
         FROM chat_members mine
         JOIN chat_members other ON other.chat_id = mine.chat_id
         WHERE mine.user_id = ?1 AND other.user_id != ?1
         ORDER BY other.user_id",
    )?;
    let contacts = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<Result<Vec<UserId>, _>>()?;
    Ok(contacts)
}

pub fn table_counts(conn: &Connection) -> Result<TableCounts, rusqlite::Error> {
    let count = |table: &str| -> Result<i64, rusqlite::Error> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
    };
    Ok(TableCounts {
        users: count("users")?,
        chats: count("chats")?,
        memberships: count("chat_members")?,
        messages: count("messages")?,
    })
}
