use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use huddle_db::models::ChannelRow;
use huddle_types::api::{Claims, CreateChannelRequest};
use huddle_types::models::{Channel, UserProfile};

use crate::auth::AppState;
use crate::error::ApiError;

/// Create a named channel; the creator becomes its first member. Others
/// join by being in the channel when it matters, which for now means only
/// the general channel grows implicitly.
pub async fn create_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    if name.is_empty() || name.len() > 64 {
        return Err(ApiError::BadRequest("name must be 1-64 characters".into()));
    }

    let channel_id = Uuid::new_v4().to_string();
    let row = state.db.create_channel(&channel_id, name, &claims.sub)?;

    Ok((StatusCode::CREATED, Json(channel_from_row(row))))
}

/// Named channels the caller belongs to. Touching the listing also upserts
/// the general channel, so a fresh account always sees at least that.
pub async fn list_channels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    state.db.ensure_general_channel(&claims.sub)?;

    let channels = state
        .db
        .list_channels(&claims.sub)?
        .into_iter()
        .map(channel_from_row)
        .collect();

    Ok(Json(channels))
}

/// Directory of every other user, the navigation source for starting DMs.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let users = state
        .db
        .list_users_except(&claims.sub)?
        .into_iter()
        .map(|row| UserProfile {
            id: row.id,
            name: row.name,
            username: row.username,
            email: row.email,
            avatar: row.avatar,
        })
        .collect();

    Ok(Json(users))
}

fn channel_from_row(row: ChannelRow) -> Channel {
    let created_at = row.created_at.parse().unwrap_or_else(|e| {
        warn!("Corrupt created_at '{}' on channel '{}': {}", row.created_at, row.id, e);
        chrono::DateTime::default()
    });
    Channel {
        id: row.id,
        name: row.name,
        is_direct: row.is_direct,
        created_at,
    }
}
