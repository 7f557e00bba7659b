//! Membership checks shared by the handlers. A member row for
//! (workspace, user) is the unit of authorization; direct messages also
//! require being one of the conversation's two members.

use uuid::Uuid;

use huddle_db::Database;
use huddle_db::models::MessageRow;
use huddle_types::models::{Conversation, Member};

use crate::error::ApiError;

pub fn require_member(
    db: &Database,
    workspace_id: Uuid,
    user_id: Uuid,
) -> Result<Member, ApiError> {
    db.get_member_by_user(workspace_id, user_id)?
        .ok_or(ApiError::Unauthorized)
}

pub fn require_admin(db: &Database, workspace_id: Uuid, user_id: Uuid) -> Result<Member, ApiError> {
    let member = require_member(db, workspace_id, user_id)?;
    if !member.role.is_admin() {
        return Err(ApiError::Unauthorized);
    }
    Ok(member)
}

/// The user ids behind two members, for direct-message event delivery.
pub fn member_user_ids(db: &Database, member_ids: [Uuid; 2]) -> Result<Vec<Uuid>, ApiError> {
    let mut user_ids = Vec::with_capacity(2);
    for member_id in member_ids {
        if let Some(member) = db.get_member(member_id)? {
            user_ids.push(member.user_id);
        }
    }
    Ok(user_ids)
}

/// The conversation, provided `member` is one of its two participants.
pub fn require_participant(
    db: &Database,
    conversation_id: Uuid,
    member: &Member,
) -> Result<Conversation, ApiError> {
    let conversation = db
        .get_conversation(conversation_id)?
        .filter(|c| c.workspace_id == member.workspace_id)
        .ok_or(ApiError::NotFound("Conversation"))?;
    if conversation.member_one_id != member.id && conversation.member_two_id != member.id {
        return Err(ApiError::Unauthorized);
    }
    Ok(conversation)
}

/// The caller's member row if they may read `message`: a member of its
/// workspace and, for direct messages, a participant of the conversation.
pub fn message_reader(
    db: &Database,
    message: &MessageRow,
    user_id: Uuid,
) -> Result<Option<Member>, ApiError> {
    let Some(member) = db.get_member_by_user(message.workspace_id, user_id)? else {
        return Ok(None);
    };
    if let Some(conversation_id) = message.conversation_id {
        match require_participant(db, conversation_id, &member) {
            Ok(_) => {}
            Err(ApiError::Unauthorized | ApiError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        }
    }
    Ok(Some(member))
}

/// Users who receive live events about `message`: `None` means the whole
/// workspace, otherwise the two conversation participants.
pub fn message_audience(
    db: &Database,
    message: &MessageRow,
) -> Result<Option<Vec<Uuid>>, ApiError> {
    let Some(conversation_id) = message.conversation_id else {
        return Ok(None);
    };
    let Some(conversation) = db.get_conversation(conversation_id)? else {
        return Ok(Some(vec![]));
    };
    member_user_ids(db, [conversation.member_one_id, conversation.member_two_id]).map(Some)
}
