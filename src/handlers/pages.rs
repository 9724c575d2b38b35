//! Lobby page handlers
//!
//! Thin HTTP glue over the coordination core: create, join, and view plus
//! the index context. User-visible lobby errors become redirect-with-message
//! outcomes; only `NonceSpaceExhausted` surfaces as a hard failure.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::Form;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::lobby::{JoinIntent, LobbyError};
use crate::state::AppState;

/// Stand-in for the cookie-session auth that lives outside this service:
/// the username arrives as a query parameter.
#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IndexParams {
    pub user: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinForm {
    pub room: String,
    pub join: JoinIntent,
}

#[derive(Debug, Serialize)]
pub struct IndexContext {
    pub logged_in: bool,
    pub username: String,
    /// Rooms of this user whose game is in progress.
    pub gamerooms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Homepage context: the caller's in-progress rooms plus any flash message.
pub async fn index_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IndexParams>,
) -> Json<IndexContext> {
    let username = params.user.unwrap_or_default();
    let gamerooms = if username.is_empty() {
        Vec::new()
    } else {
        state.lobby.active_rooms_for(&username).await
    };

    Json(IndexContext {
        logged_in: !username.is_empty(),
        username,
        gamerooms,
        message: params.message,
    })
}

/// Create a new room and send its creator to the room view.
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserParams>,
) -> Response {
    let name = match require_user(&params) {
        Ok(name) => name,
        Err(response) => return response,
    };

    match state.lobby.create_room(&name).await {
        Ok(code) => redirect_to_room(&code, &name).into_response(),
        Err(err) => lobby_error_response(err),
    }
}

/// Join an existing room as player or spectator.
pub async fn join_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserParams>,
    Form(form): Form<JoinForm>,
) -> Response {
    let name = match require_user(&params) {
        Ok(name) => name,
        Err(response) => return response,
    };

    match state.lobby.join_room(&name, &form.room, form.join).await {
        Ok(_role) => redirect_to_room(&form.room, &name).into_response(),
        Err(err) => lobby_error_response(err),
    }
}

/// Show a room: resolve the caller's role and count the connection.
pub async fn view_handler(
    State(state): State<Arc<AppState>>,
    Path(nonce): Path<String>,
    Query(params): Query<UserParams>,
) -> Response {
    let name = match require_user(&params) {
        Ok(name) => name,
        Err(response) => return response,
    };

    match state.lobby.view_room(&name, &nonce).await {
        Ok(context) => Json(context).into_response(),
        Err(err) => lobby_error_response(err),
    }
}

fn require_user(params: &UserParams) -> Result<String, Response> {
    match params.user.as_deref() {
        Some(user) if !user.is_empty() => Ok(user.to_string()),
        _ => Err(redirect_with_message("Please log in first.").into_response()),
    }
}

fn redirect_to_room(room: &str, name: &str) -> Redirect {
    Redirect::to(&format!("/game/{room}?user={}", query_encode(name)))
}

/// Redirect-with-message outcome for user-visible failures.
fn redirect_with_message(message: &str) -> Redirect {
    Redirect::to(&format!("/?message={}", query_encode(message)))
}

fn lobby_error_response(err: LobbyError) -> Response {
    if err.is_user_visible() {
        redirect_with_message(&err.to_string()).into_response()
    } else {
        tracing::error!(error = %err, "lobby operation failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
    }
}

/// Percent-encode a query-string value.
fn query_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
