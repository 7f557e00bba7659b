use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use huddle_types::api::{Claims, IdResponse, MemberWithUser, UpdateMemberRequest};
use huddle_types::events::GatewayEvent;
use huddle_types::models::Member;

use crate::access::{require_admin, require_member};
use crate::auth::AppState;
use crate::error::ApiError;

/// Whether `caller` may remove `target` from their shared workspace.
///
/// Admins are never removable, not even by themselves. Anyone else may leave;
/// removing another member takes an admin.
fn may_remove(caller: &Member, target: &Member) -> Result<(), ApiError> {
    if target.role.is_admin() {
        return Err(ApiError::bad_request("Admin cannot be removed"));
    }
    if caller.id != target.id && !caller.role.is_admin() {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

/// All members of a workspace with their users. Empty for non-members.
pub async fn list(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let members = state
        .run_db(move |db| {
            if db.get_member_by_user(workspace_id, claims.sub)?.is_none() {
                return Ok(vec![]);
            }
            let members = db
                .list_members_with_users(workspace_id)?
                .into_iter()
                .map(|(member, user)| MemberWithUser { member, user })
                .collect::<Vec<_>>();
            Ok(members)
        })
        .await?;
    Ok(Json(members))
}

/// The caller's own membership, or `null`.
pub async fn current(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let member = state
        .run_db(move |db| Ok(db.get_member_by_user(workspace_id, claims.sub)?))
        .await?;
    Ok(Json(member))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let member = state
        .run_db(move |db| {
            let Some((member, user)) = db.get_member_with_user(member_id)? else {
                return Ok(None);
            };
            if db.get_member_by_user(member.workspace_id, claims.sub)?.is_none() {
                return Ok(None);
            }
            Ok(Some(MemberWithUser { member, user }))
        })
        .await?;
    Ok(Json(member))
}

pub async fn update(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = req.role;

    let workspace_id = state
        .run_db(move |db| {
            let member = db.get_member(member_id)?.ok_or(ApiError::NotFound("Member"))?;
            require_admin(db, member.workspace_id, claims.sub)?;
            db.update_member_role(member_id, role)?;
            Ok(member.workspace_id)
        })
        .await?;

    info!("Member {} of {} is now {}", member_id, workspace_id, role);
    state.dispatcher.publish(GatewayEvent::MemberUpdate {
        workspace_id,
        member_id,
        role,
    });

    Ok(Json(IdResponse::from(member_id)))
}

/// Removes a member together with their messages, reactions and direct
/// conversations.
pub async fn remove(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace_id = state
        .run_db(move |db| {
            let target = db.get_member(member_id)?.ok_or(ApiError::NotFound("Member"))?;
            let caller = require_member(db, target.workspace_id, claims.sub)?;
            may_remove(&caller, &target)?;
            db.delete_member(member_id)?;
            Ok(target.workspace_id)
        })
        .await?;

    info!("Member {} removed from {} by {}", member_id, workspace_id, claims.sub);
    state.dispatcher.publish(GatewayEvent::MemberRemove {
        workspace_id,
        member_id,
    });

    Ok(Json(IdResponse::from(member_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::models::Role;

    fn member(role: Role) -> Member {
        Member {
            id: Uuid::new_v4(),
            workspace_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            role,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn removal_rules() {
        let admin = member(Role::Admin);
        let alice = member(Role::Member);
        let bob = member(Role::Member);

        // Leaving
        assert!(may_remove(&alice, &alice).is_ok());
        // Admin removes a member
        assert!(may_remove(&admin, &alice).is_ok());
        // Member removes someone else
        assert!(matches!(may_remove(&alice, &bob), Err(ApiError::Unauthorized)));
        // Admins stay, including when leaving
        assert!(may_remove(&admin, &admin).is_err());
        assert!(may_remove(&alice, &admin).is_err());
    }
}
