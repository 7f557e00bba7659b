use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use huddle_db::Database;
use huddle_db::models::{
    AuthoredMessage, FeedCursor, FeedFilter, MessageRow, ReactionRow, ThreadSummary,
};
use huddle_types::api::{
    Claims, CreateMessageRequest, IdResponse, ListMessagesQuery, MessagePage, MessageResponse,
    ReactionGroup, UpdateMessageRequest,
};
use huddle_types::events::GatewayEvent;
use huddle_types::models::Member;

use crate::access::{message_audience, message_reader, require_member, require_participant};
use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

// -- Cursor --

/// Opaque page cursor: base64url of `"{created_at}|{id}"` of the last
/// message already delivered.
pub fn encode_cursor(cursor: &FeedCursor) -> String {
    let raw = format!("{}|{}", huddle_db::format_ts(&cursor.created_at), cursor.id);
    URL_SAFE_NO_PAD.encode(raw)
}

pub fn decode_cursor(encoded: &str) -> Result<FeedCursor, ApiError> {
    let invalid = || ApiError::bad_request("Invalid cursor");

    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| invalid())?;
    let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
    let (ts, id) = raw.split_once('|').ok_or_else(invalid)?;

    Ok(FeedCursor {
        created_at: ts
            .parse::<DateTime<Utc>>()
            .map_err(|_| invalid())?,
        id: id.parse().map_err(|_| invalid())?,
    })
}

fn page_size(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

// -- Population --

/// Group reactions per emoji, in order of each emoji's first use.
fn group_reactions(rows: &[ReactionRow]) -> HashMap<Uuid, Vec<ReactionGroup>> {
    let mut grouped: HashMap<Uuid, Vec<ReactionGroup>> = HashMap::new();
    for r in rows {
        let groups = grouped.entry(r.message_id).or_default();
        match groups.iter_mut().find(|g| g.emoji == r.emoji) {
            Some(group) => {
                if !group.member_ids.contains(&r.member_id) {
                    group.member_ids.push(r.member_id);
                }
                group.count += 1;
            }
            None => groups.push(ReactionGroup {
                emoji: r.emoji.clone(),
                count: 1,
                member_ids: vec![r.member_id],
            }),
        }
    }
    grouped
}

/// Everything needed to render a set of messages, loaded in one blocking call.
struct Loaded {
    messages: Vec<AuthoredMessage>,
    reactions: Vec<ReactionRow>,
    threads: HashMap<Uuid, ThreadSummary>,
}

impl Loaded {
    fn load(db: &Database, messages: Vec<AuthoredMessage>) -> anyhow::Result<Self> {
        let ids: Vec<Uuid> = messages.iter().map(|m| m.message.id).collect();
        Ok(Self {
            reactions: db.reactions_for_messages(&ids)?,
            threads: db.thread_summaries(&ids)?,
            messages,
        })
    }

    fn populate(self, state: &AppStateInner) -> Vec<MessageResponse> {
        let mut reactions = group_reactions(&self.reactions);
        let mut threads = self.threads;

        self.messages
            .into_iter()
            .map(|AuthoredMessage { message, member, user }| {
                let thread = threads.remove(&message.id);
                MessageResponse {
                    id: message.id,
                    workspace_id: message.workspace_id,
                    member_id: message.member_id,
                    body: message.body,
                    image: message.image.map(|id| state.storage_url(id)),
                    channel_id: message.channel_id,
                    conversation_id: message.conversation_id,
                    parent_message_id: message.parent_message_id,
                    created_at: message.created_at,
                    updated_at: message.updated_at,
                    member,
                    user,
                    reactions: reactions.remove(&message.id).unwrap_or_default(),
                    thread_count: thread.as_ref().map_or(0, |t| t.count),
                    thread_image: thread.as_ref().and_then(|t| t.last_reply_image.clone()),
                    thread_name: thread.as_ref().map(|t| t.last_reply_name.clone()),
                    thread_timestamp: thread.map(|t| t.last_reply_at),
                }
            })
            .collect()
    }
}

pub(crate) fn publish(state: &AppStateInner, event: GatewayEvent, audience: Option<Vec<Uuid>>) {
    match audience {
        Some(user_ids) => state.dispatcher.publish_to_users(event, &user_ids),
        None => state.dispatcher.publish(event),
    }
}

// -- Feed scope --

/// Resolve the requested feed and check the caller may read it.
/// `None` when the feed does not exist or is not visible to the caller.
fn resolve_feed(
    db: &Database,
    query: &ListMessagesQuery,
    user_id: Uuid,
) -> Result<Option<FeedFilter>, ApiError> {
    let mut channel_id = query.channel_id;
    let mut conversation_id = query.conversation_id;

    if channel_id.is_some() && conversation_id.is_some() {
        return Err(ApiError::bad_request(
            "Only one of channel_id and conversation_id may be given",
        ));
    }

    // A thread alone names its feed through the parent
    if channel_id.is_none() && conversation_id.is_none() {
        let parent_id = query.parent_message_id.ok_or_else(|| {
            ApiError::bad_request("channel_id, conversation_id or parent_message_id is required")
        })?;
        let Some(parent) = db.get_message(parent_id)? else {
            return Ok(None);
        };
        channel_id = parent.channel_id;
        conversation_id = parent.conversation_id;
    }

    let workspace_id = match (channel_id, conversation_id) {
        (Some(id), _) => db.get_channel(id)?.map(|c| c.workspace_id),
        (_, Some(id)) => db.get_conversation(id)?.map(|c| c.workspace_id),
        (None, None) => None,
    };
    let Some(workspace_id) = workspace_id else {
        return Ok(None);
    };
    let Some(member) = db.get_member_by_user(workspace_id, user_id)? else {
        return Ok(None);
    };
    if let Some(id) = conversation_id {
        if require_participant(db, id, &member).is_err() {
            return Ok(None);
        }
    }

    Ok(Some(FeedFilter {
        channel_id,
        conversation_id,
        parent_message_id: query.parent_message_id,
    }))
}

/// Where a new message goes: exactly one of channel / conversation, inside
/// the author's workspace, optionally as a reply to a top-level message.
fn resolve_target(
    db: &Database,
    author: &Member,
    req: &CreateMessageRequest,
) -> Result<FeedFilter, ApiError> {
    let mut channel_id = req.channel_id;
    let mut conversation_id = req.conversation_id;

    if let Some(parent_id) = req.parent_message_id {
        let parent = db
            .get_message(parent_id)?
            .filter(|m| m.workspace_id == author.workspace_id)
            .ok_or(ApiError::NotFound("Parent message"))?;
        if parent.parent_message_id.is_some() {
            return Err(ApiError::bad_request("Cannot reply to a reply"));
        }
        if channel_id.is_none() && conversation_id.is_none() {
            channel_id = parent.channel_id;
            conversation_id = parent.conversation_id;
        } else if (channel_id, conversation_id) != (parent.channel_id, parent.conversation_id) {
            return Err(ApiError::bad_request("Reply must be posted where its parent is"));
        }
    }

    match (channel_id, conversation_id) {
        (Some(id), None) => {
            db.get_channel(id)?
                .filter(|c| c.workspace_id == author.workspace_id)
                .ok_or(ApiError::NotFound("Channel"))?;
        }
        (None, Some(id)) => {
            require_participant(db, id, author)?;
        }
        _ => {
            return Err(ApiError::bad_request(
                "Exactly one of channel_id and conversation_id is required",
            ));
        }
    }

    Ok(FeedFilter {
        channel_id,
        conversation_id,
        parent_message_id: req.parent_message_id,
    })
}

fn check_body(body: &str) -> Result<(), ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::bad_request("Message body cannot be empty"));
    }
    Ok(())
}

/// The message, provided the caller wrote it.
fn require_author(db: &Database, message_id: Uuid, user_id: Uuid) -> Result<MessageRow, ApiError> {
    let message = db
        .get_message(message_id)?
        .ok_or(ApiError::NotFound("Message"))?;
    let member = require_member(db, message.workspace_id, user_id)?;
    if message.member_id != member.id {
        return Err(ApiError::Unauthorized);
    }
    Ok(message)
}

// -- Handlers --

/// One page of a channel, conversation or thread feed, newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page_size(query.limit);
    let cursor = query.cursor.as_deref().map(decode_cursor).transpose()?;

    let loaded = state
        .run_db(move |db| {
            let Some(filter) = resolve_feed(db, &query, claims.sub)? else {
                return Ok(None);
            };
            // One extra row tells whether another page exists
            let mut messages = db.list_messages(&filter, cursor, limit + 1)?;
            let is_done = messages.len() <= limit as usize;
            messages.truncate(limit as usize);
            Ok(Some((Loaded::load(db, messages)?, is_done)))
        })
        .await?;

    let Some((loaded, is_done)) = loaded else {
        return Ok(Json(MessagePage {
            page: vec![],
            is_done: true,
            continue_cursor: None,
        }));
    };

    let continue_cursor = match loaded.messages.last() {
        Some(last) if !is_done => Some(encode_cursor(&FeedCursor {
            created_at: last.message.created_at,
            id: last.message.id,
        })),
        _ => None,
    };

    Ok(Json(MessagePage {
        page: loaded.populate(&state),
        is_done,
        continue_cursor,
    }))
}

/// A populated message, or `null` when missing or not visible to the caller.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let loaded = state
        .run_db(move |db| {
            let Some(authored) = db.get_authored_message(message_id)? else {
                return Ok(None);
            };
            if message_reader(db, &authored.message, claims.sub)?.is_none() {
                return Ok(None);
            }
            Ok(Some(Loaded::load(db, vec![authored])?))
        })
        .await?;

    let message = loaded.and_then(|l| l.populate(&state).into_iter().next());
    Ok(Json(message))
}

pub async fn create(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_body(&req.body)?;

    let (message, audience) = state
        .run_db(move |db| {
            let author = require_member(db, workspace_id, claims.sub)?;
            let target = resolve_target(db, &author, &req)?;

            if let Some(image) = req.image {
                // Only the uploader may attach an object
                match db.get_storage_object(image)? {
                    Some(object) if object.uploader_id == claims.sub => {}
                    _ => return Err(ApiError::bad_request("Unknown image")),
                }
            }

            let message = MessageRow {
                id: Uuid::new_v4(),
                workspace_id,
                member_id: author.id,
                body: req.body,
                image: req.image,
                channel_id: target.channel_id,
                conversation_id: target.conversation_id,
                parent_message_id: target.parent_message_id,
                created_at: huddle_db::now(),
                updated_at: None,
            };
            db.insert_message(&message)?;
            let audience = message_audience(db, &message)?;
            Ok((message, audience))
        })
        .await?;

    info!("Message {} posted in {} by {}", message.id, workspace_id, message.member_id);
    publish(
        &state,
        GatewayEvent::MessageCreate {
            workspace_id,
            message_id: message.id,
            member_id: message.member_id,
            channel_id: message.channel_id,
            conversation_id: message.conversation_id,
            parent_message_id: message.parent_message_id,
        },
        audience,
    );

    Ok((StatusCode::CREATED, Json(IdResponse::from(message.id))))
}

/// Edit the body of one's own message.
pub async fn update(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_body(&req.body)?;

    let (message, audience) = state
        .run_db(move |db| {
            let message = require_author(db, message_id, claims.sub)?;
            db.update_message_body(message_id, &req.body, huddle_db::now())?;
            let audience = message_audience(db, &message)?;
            Ok((message, audience))
        })
        .await?;

    publish(
        &state,
        GatewayEvent::MessageUpdate {
            workspace_id: message.workspace_id,
            message_id,
        },
        audience,
    );

    Ok(Json(IdResponse::from(message_id)))
}

/// Delete one's own message along with its thread replies and reactions.
pub async fn delete(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (message, audience) = state
        .run_db(move |db| {
            let message = require_author(db, message_id, claims.sub)?;
            let audience = message_audience(db, &message)?;
            db.delete_message(message_id)?;
            Ok((message, audience))
        })
        .await?;

    info!("Message {} deleted by {}", message_id, claims.sub);
    publish(
        &state,
        GatewayEvent::MessageDelete {
            workspace_id: message.workspace_id,
            message_id,
        },
        audience,
    );

    Ok(Json(IdResponse::from(message_id)))
}
