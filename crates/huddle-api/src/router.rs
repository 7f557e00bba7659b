use axum::{
    Router,
    extract::{DefaultBodyLimit, Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use huddle_gateway::connection;

use crate::auth::{self, AppState};
use crate::error::ApiError;
use crate::middleware::{decode_session_token, require_auth};
use crate::upload::MAX_UPLOAD_BYTES;
use crate::{
    channels, conversations, members, messages, reactions, upload, users, workspaces,
};

/// Every HTTP and WebSocket route of the server. Layers that depend on
/// deployment (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route(
            "/upload/{token}",
            post(upload::receive_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/storage/{id}", get(upload::serve))
        .route("/gateway", get(ws_upgrade));

    let protected_routes = Router::new()
        .route("/users/me", get(users::current))
        .route("/workspaces", get(workspaces::list).post(workspaces::create))
        .route(
            "/workspaces/{id}",
            get(workspaces::get_by_id)
                .patch(workspaces::update)
                .delete(workspaces::delete),
        )
        .route("/workspaces/{id}/info", get(workspaces::info))
        .route("/workspaces/{id}/join-code", post(workspaces::reset_join_code))
        .route("/workspaces/{id}/join", post(workspaces::join))
        .route(
            "/workspaces/{id}/channels",
            get(channels::list).post(channels::create),
        )
        .route("/workspaces/{id}/members", get(members::list))
        .route("/workspaces/{id}/members/me", get(members::current))
        .route(
            "/workspaces/{id}/conversations",
            post(conversations::create_or_get),
        )
        .route("/workspaces/{id}/messages", post(messages::create))
        .route(
            "/channels/{id}",
            get(channels::get_by_id)
                .patch(channels::update)
                .delete(channels::delete),
        )
        .route(
            "/members/{id}",
            get(members::get_by_id)
                .patch(members::update)
                .delete(members::remove),
        )
        .route("/messages", get(messages::list))
        .route(
            "/messages/{id}",
            get(messages::get_by_id)
                .patch(messages::update)
                .delete(messages::delete),
        )
        .route("/messages/{id}/reactions", post(reactions::toggle))
        .route("/upload/url", post(upload::generate_upload_url))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: String,
}

/// Browsers cannot set headers on a WebSocket handshake, so the session
/// token travels in the query string and is checked before upgrading.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = decode_session_token(&state.jwt_secret, &query.token)?;

    let dispatcher = state.dispatcher.clone();
    let db = state.db.clone();
    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, dispatcher, db, claims.sub, claims.name)
    }))
}
