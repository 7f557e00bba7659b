use axum::{Extension, Json, extract::State, response::IntoResponse};

use huddle_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// The signed-in user. `null` if the account behind a still-valid token is gone.
pub async fn current(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .run_db(move |db| Ok(db.get_user(claims.sub)?))
        .await?;

    Ok(Json(user))
}
