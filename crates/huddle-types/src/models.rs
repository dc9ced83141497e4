use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public identity fields of a user, as attached to messages and search
/// results. The password hash never leaves huddle-db.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    /// None for direct-message channels.
    pub name: Option<String>,
    pub is_direct: bool,
    pub created_at: DateTime<Utc>,
}

/// A message as served to clients: sender identity and the current
/// reaction aggregation are always attached. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sender: UserProfile,
    #[serde(default)]
    pub reactions: ReactionMap,
}

/// Grouped reactions for one message: emoji -> {count, userIds}.
/// Clients never see raw reaction rows. BTreeMap keeps the wire
/// representation deterministic.
pub type ReactionMap = BTreeMap<String, ReactionGroup>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionGroup {
    pub count: usize,
    pub user_ids: Vec<String>,
}
