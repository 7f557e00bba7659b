use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use huddle_types::api::{Claims, CreateConversationRequest, IdResponse};

use crate::access::require_member;
use crate::auth::AppState;
use crate::error::ApiError;

/// Returns the direct conversation between the caller and `member_id`,
/// creating it on first use. Talking to yourself is allowed.
pub async fn create_or_get(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let other_id = req.member_id;

    let (conversation, created) = state
        .run_db(move |db| {
            let me = require_member(db, workspace_id, claims.sub)?;
            let other = db
                .get_member(other_id)?
                .filter(|m| m.workspace_id == workspace_id)
                .ok_or(ApiError::NotFound("Member"))?;

            Ok(db.create_or_get_conversation(
                Uuid::new_v4(),
                workspace_id,
                me.id,
                other.id,
                huddle_db::now(),
            )?)
        })
        .await?;

    if created {
        info!(
            "Conversation {} opened in {} between {} and {}",
            conversation.id, workspace_id, conversation.member_one_id, conversation.member_two_id
        );
    }

    Ok(Json(IdResponse::from(conversation.id)))
}
