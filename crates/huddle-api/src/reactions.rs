use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_types::api::{Claims, ToggleReactionRequest, ToggleReactionResponse};
use huddle_types::events::GatewayEvent;

use crate::access::{message_audience, message_reader};
use crate::auth::AppState;
use crate::error::ApiError;
use crate::messages::publish;

const MAX_EMOJI_LEN: usize = 32;

/// Toggle the caller's reaction on a message: adds it if absent, otherwise
/// removes it.
pub async fn toggle(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let emoji = req.emoji.trim().to_string();
    if emoji.is_empty() || emoji.len() > MAX_EMOJI_LEN {
        return Err(ApiError::bad_request("Invalid emoji"));
    }

    let emoji_db = emoji.clone();
    let (workspace_id, member_id, added, id, audience) = state
        .run_db(move |db| {
            let message = db
                .get_message(message_id)?
                .ok_or(ApiError::NotFound("Message"))?;
            let member = message_reader(db, &message, claims.sub)?.ok_or(ApiError::Unauthorized)?;

            let (added, id) = db.toggle_reaction(
                Uuid::new_v4(),
                message.workspace_id,
                message_id,
                member.id,
                &emoji_db,
            )?;
            let audience = message_audience(db, &message)?;
            Ok((message.workspace_id, member.id, added, id, audience))
        })
        .await?;

    let event = if added {
        GatewayEvent::ReactionAdd {
            workspace_id,
            message_id,
            member_id,
            emoji,
        }
    } else {
        GatewayEvent::ReactionRemove {
            workspace_id,
            message_id,
            member_id,
            emoji,
        }
    };
    publish(&state, event, audience);

    Ok(Json(ToggleReactionResponse { id, added }))
}
