/// Database row types, mapping directly to SQLite rows.
/// Distinct from huddle-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct ChannelRow {
    pub id: String,
    pub name: Option<String>,
    pub is_direct: bool,
    pub direct_hash: Option<String>,
    pub created_at: String,
}

/// A message joined with its sender's identity fields.
pub struct MessageRow {
    pub id: String,
    pub channel_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
    pub sender_name: String,
    pub sender_username: String,
    pub sender_email: String,
    pub sender_avatar: Option<String>,
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
}

/// A search hit: the message row plus routing context for navigation.
pub struct SearchRow {
    pub message: MessageRow,
    pub channel_name: Option<String>,
    pub is_direct: bool,
    pub dm_user_id: Option<String>,
}
