use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use huddle_types::api::{Claims, CreateChannelRequest, IdResponse, UpdateChannelRequest};
use huddle_types::events::GatewayEvent;
use huddle_types::models::Channel;

use crate::access::require_admin;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::workspaces::validate_name;

/// `"  Product   Launch "` becomes `"product-launch"`.
pub fn normalize_channel_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

fn channel_name(raw: &str) -> Result<String, ApiError> {
    validate_name(&normalize_channel_name(raw), "Channel")
}

/// Channels of a workspace, oldest first. Empty for non-members.
pub async fn list(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let channels = state
        .run_db(move |db| {
            if db.get_member_by_user(workspace_id, claims.sub)?.is_none() {
                return Ok(vec![]);
            }
            Ok(db.list_channels(workspace_id)?)
        })
        .await?;
    Ok(Json(channels))
}

pub async fn create(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = Channel {
        id: Uuid::new_v4(),
        workspace_id,
        name: channel_name(&req.name)?,
        created_at: huddle_db::now(),
    };

    let row = channel.clone();
    state
        .run_db(move |db| {
            require_admin(db, workspace_id, claims.sub)?;
            Ok(db.insert_channel(&row)?)
        })
        .await?;

    info!("Channel #{} ({}) created in {}", channel.name, channel.id, workspace_id);
    let channel_id = channel.id;
    state
        .dispatcher
        .publish(GatewayEvent::ChannelCreate { workspace_id, channel });

    Ok((StatusCode::CREATED, Json(IdResponse::from(channel_id))))
}

/// The channel, or `null` when it is missing or the caller is not a member
/// of its workspace.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = state
        .run_db(move |db| {
            let Some(channel) = db.get_channel(channel_id)? else {
                return Ok(None);
            };
            if db.get_member_by_user(channel.workspace_id, claims.sub)?.is_none() {
                return Ok(None);
            }
            Ok(Some(channel))
        })
        .await?;
    Ok(Json(channel))
}

pub async fn update(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = channel_name(&req.name)?;

    let new_name = name.clone();
    let workspace_id = state
        .run_db(move |db| {
            let channel = db
                .get_channel(channel_id)?
                .ok_or(ApiError::NotFound("Channel"))?;
            require_admin(db, channel.workspace_id, claims.sub)?;
            db.update_channel_name(channel_id, &new_name)?;
            Ok(channel.workspace_id)
        })
        .await?;

    info!("Channel {} renamed to #{}", channel_id, name);
    state.dispatcher.publish(GatewayEvent::ChannelUpdate {
        workspace_id,
        channel_id,
        name,
    });

    Ok(Json(IdResponse::from(channel_id)))
}

/// Deletes the channel with its messages and their reactions.
pub async fn delete(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace_id = state
        .run_db(move |db| {
            let channel = db
                .get_channel(channel_id)?
                .ok_or(ApiError::NotFound("Channel"))?;
            require_admin(db, channel.workspace_id, claims.sub)?;
            db.delete_channel(channel_id)?;
            Ok(channel.workspace_id)
        })
        .await?;

    info!("Channel {} deleted by {}", channel_id, claims.sub);
    state.dispatcher.publish(GatewayEvent::ChannelDelete {
        workspace_id,
        channel_id,
    });

    Ok(Json(IdResponse::from(channel_id)))
}
