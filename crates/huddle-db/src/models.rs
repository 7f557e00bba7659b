//! Row types that have no direct counterpart in `huddle_types::models`.
//! Workspaces, members, channels and conversations map 1:1 and are returned
//! as the shared model types.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use huddle_types::models::{Member, User};

/// User row including the password hash. Never serialized.
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            image: self.image,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub member_id: Uuid,
    pub body: String,
    /// Storage object id of the attached image.
    pub image: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A message joined with its author.
pub struct AuthoredMessage {
    pub message: MessageRow,
    pub member: Member,
    pub user: User,
}

/// Which feed a message listing reads from. `parent_message_id: None`
/// selects thread roots only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedFilter {
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
}

/// Position after the last message of a page (newest-first order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Reply statistics for one thread root.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadSummary {
    pub count: usize,
    pub last_reply_at: DateTime<Utc>,
    pub last_reply_name: String,
    pub last_reply_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReactionRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub message_id: Uuid,
    pub member_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StorageObjectRow {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}
