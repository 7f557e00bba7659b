use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use huddle_db::is_constraint_violation;
use huddle_types::api::{
    Claims, CreateWorkspaceRequest, IdResponse, JoinWorkspaceRequest, UpdateWorkspaceRequest,
    WorkspaceInfo,
};
use huddle_types::events::GatewayEvent;
use huddle_types::models::{Channel, Member, Role, Workspace};

use crate::access::require_admin;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::join_code;

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 80;

/// Trim and length-check a workspace or channel name.
pub(crate) fn validate_name(raw: &str, what: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(ApiError::bad_request(format!(
            "{what} name must be {MIN_NAME_LEN}-{MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Creates the workspace, its admin membership for the caller and a
/// `general` channel.
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate_name(&req.name, "Workspace")?;
    let created_at = huddle_db::now();

    let workspace = Workspace {
        id: Uuid::new_v4(),
        name,
        user_id: claims.sub,
        join_code: join_code::generate(),
        created_at,
    };
    let admin = Member {
        id: Uuid::new_v4(),
        workspace_id: workspace.id,
        user_id: claims.sub,
        role: Role::Admin,
        created_at,
    };
    let general = Channel {
        id: Uuid::new_v4(),
        workspace_id: workspace.id,
        name: "general".into(),
        created_at,
    };

    let workspace_id = workspace.id;
    let ws_name = workspace.name.clone();
    state
        .run_db(move |db| Ok(db.create_workspace(&workspace, &admin, &general)?))
        .await?;

    info!("Workspace '{}' ({}) created by {}", ws_name, workspace_id, claims.sub);
    Ok((StatusCode::CREATED, Json(IdResponse::from(workspace_id))))
}

/// Workspaces the caller is a member of.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let workspaces = state
        .run_db(move |db| Ok(db.list_workspaces_for_user(claims.sub)?))
        .await?;
    Ok(Json(workspaces))
}

/// The workspace, or `null` when it is missing or the caller is not a member.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace = state
        .run_db(move |db| {
            if db.get_member_by_user(workspace_id, claims.sub)?.is_none() {
                return Ok(None);
            }
            Ok(db.get_workspace(workspace_id)?)
        })
        .await?;
    Ok(Json(workspace))
}

/// Name and membership flag for the join page. Visible to any signed-in user.
pub async fn info(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state
        .run_db(move |db| {
            let Some(workspace) = db.get_workspace(workspace_id)? else {
                return Ok(None);
            };
            let is_member = db.get_member_by_user(workspace_id, claims.sub)?.is_some();
            Ok(Some(WorkspaceInfo {
                name: workspace.name,
                is_member,
            }))
        })
        .await?;
    Ok(Json(info))
}

pub async fn update(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateWorkspaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate_name(&req.name, "Workspace")?;

    let new_name = name.clone();
    state
        .run_db(move |db| {
            require_admin(db, workspace_id, claims.sub)?;
            if !db.update_workspace_name(workspace_id, &new_name)? {
                return Err(ApiError::NotFound("Workspace"));
            }
            Ok(())
        })
        .await?;

    info!("Workspace {} renamed to '{}'", workspace_id, name);
    state
        .dispatcher
        .publish(GatewayEvent::WorkspaceUpdate { workspace_id, name });

    Ok(Json(IdResponse::from(workspace_id)))
}

/// Deletes the workspace and everything in it.
pub async fn delete(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .run_db(move |db| {
            require_admin(db, workspace_id, claims.sub)?;
            if !db.delete_workspace(workspace_id)? {
                return Err(ApiError::NotFound("Workspace"));
            }
            Ok(())
        })
        .await?;

    info!("Workspace {} deleted by {}", workspace_id, claims.sub);
    state
        .dispatcher
        .publish(GatewayEvent::WorkspaceDelete { workspace_id });

    Ok(Json(IdResponse::from(workspace_id)))
}

pub async fn reset_join_code(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let code = join_code::generate();

    state
        .run_db(move |db| {
            require_admin(db, workspace_id, claims.sub)?;
            if !db.set_join_code(workspace_id, &code)? {
                return Err(ApiError::NotFound("Workspace"));
            }
            Ok(())
        })
        .await?;

    info!("Join code of workspace {} reset", workspace_id);
    Ok(Json(IdResponse::from(workspace_id)))
}

pub async fn join(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinWorkspaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let member = Member {
        id: Uuid::new_v4(),
        workspace_id,
        user_id: claims.sub,
        role: Role::Member,
        created_at: huddle_db::now(),
    };
    let member_id = member.id;

    state
        .run_db(move |db| {
            let workspace = db
                .get_workspace(workspace_id)?
                .ok_or(ApiError::NotFound("Workspace"))?;
            if !join_code::matches(&workspace.join_code, &req.join_code) {
                return Err(ApiError::bad_request("Invalid join code"));
            }
            if db.get_member_by_user(workspace_id, claims.sub)?.is_some() {
                return Err(ApiError::Conflict("Already a member of this workspace".into()));
            }
            db.insert_member(&member).map_err(|e| {
                if is_constraint_violation(&e) {
                    ApiError::Conflict("Already a member of this workspace".into())
                } else {
                    ApiError::Internal(e)
                }
            })
        })
        .await?;

    info!("User {} joined workspace {}", claims.sub, workspace_id);
    state.dispatcher.publish(GatewayEvent::MemberJoin {
        workspace_id,
        member_id,
        user_id: claims.sub,
    });

    Ok(Json(IdResponse::from(workspace_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(validate_name("  Acme  ", "Workspace").unwrap(), "Acme");
        assert!(validate_name("ab", "Workspace").is_err());
        assert!(validate_name("   ab   ", "Workspace").is_err());
        assert!(validate_name(&"x".repeat(80), "Workspace").is_ok());
        assert!(validate_name(&"x".repeat(81), "Workspace").is_err());
    }
}
