use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use huddle_types::api::{Claims, SearchHit};
use huddle_types::models::ReactionMap;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::messages::message_from_row;

const SEARCH_LIMIT: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Substring search across every conversation the caller belongs to,
/// newest first. Hits are navigation targets, so reaction state is not
/// loaded for them.
pub async fn search_messages(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<SearchHit>>, ApiError> {
    let needle = query.q.trim().to_string();
    if needle.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let st = state.clone();
    let user_id = claims.sub.clone();
    let hits = tokio::task::spawn_blocking(move || {
        let rows = st.db.search_messages(&user_id, &needle, SEARCH_LIMIT)?;
        let hits = rows
            .into_iter()
            .map(|row| SearchHit {
                message: message_from_row(row.message, ReactionMap::new()),
                channel_name: row.channel_name,
                is_direct: row.is_direct,
                dm_user_id: row.dm_user_id,
            })
            .collect();
        Ok::<_, ApiError>(hits)
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

    Ok(Json(hits))
}
