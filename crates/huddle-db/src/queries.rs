use crate::models::{ChannelRow, MessageRow, ReactionRow, SearchRow, UserRow};
use crate::{Database, EPOCH_TIMESTAMP, format_timestamp};
use anyhow::Result;
use chrono::Utc;
use huddle_types::{GENERAL_CHANNEL_ID, direct_hash};
use rusqlite::{Connection, OptionalExtension, params};

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        username: &str,
        email: &str,
        avatar: Option<&str>,
        password_hash: &str,
    ) -> Result<()> {
        let now = format_timestamp(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, username, email, avatar, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, name, username, email, avatar, password_hash, now],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Channels & membership --

    pub fn get_channel(&self, id: &str) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, is_direct, direct_hash, created_at
                     FROM channels WHERE id = ?1",
                    [id],
                    map_channel,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Upsert the distinguished general channel and admit every known user.
    /// Idempotent; called on every touch of the channel.
    pub fn ensure_general_channel(&self, creator_id: &str) -> Result<ChannelRow> {
        let now = format_timestamp(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO channels (id, name, is_direct, creator_id, created_at)
                 VALUES (?1, 'general', 0, ?2, ?3)",
                params![GENERAL_CHANNEL_ID, creator_id, now],
            )?;
            conn.execute(
                "INSERT OR IGNORE INTO channel_members (channel_id, user_id)
                 SELECT ?1, id FROM users",
                [GENERAL_CHANNEL_ID],
            )?;
            conn.query_row(
                "SELECT id, name, is_direct, direct_hash, created_at
                 FROM channels WHERE id = ?1",
                [GENERAL_CHANNEL_ID],
                map_channel,
            )
            .map_err(Into::into)
        })
    }

    /// Find or create the single DM channel for an unordered user pair.
    ///
    /// Creation races resolve through the unique `direct_hash` constraint:
    /// the losing insert is ignored and both callers converge on the same
    /// row, then idempotently upsert the two memberships.
    pub fn ensure_direct_channel(&self, user_a: &str, user_b: &str) -> Result<ChannelRow> {
        let hash = direct_hash(user_a, user_b);
        let candidate_id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO channels (id, name, is_direct, direct_hash, creator_id, created_at)
                 VALUES (?1, NULL, 1, ?2, ?3, ?4)",
                params![candidate_id, hash, user_a, now],
            )?;

            let channel = conn.query_row(
                "SELECT id, name, is_direct, direct_hash, created_at
                 FROM channels WHERE direct_hash = ?1",
                [&hash],
                map_channel,
            )?;

            for user in [user_a, user_b] {
                conn.execute(
                    "INSERT OR IGNORE INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
                    params![channel.id, user],
                )?;
            }

            Ok(channel)
        })
    }

    /// Create a named channel with the creator as its first member.
    pub fn create_channel(&self, id: &str, name: &str, creator_id: &str) -> Result<ChannelRow> {
        let now = format_timestamp(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (id, name, is_direct, creator_id, created_at)
                 VALUES (?1, ?2, 0, ?3, ?4)",
                params![id, name, creator_id, now],
            )?;
            conn.execute(
                "INSERT INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
                params![id, creator_id],
            )?;
            conn.query_row(
                "SELECT id, name, is_direct, direct_hash, created_at
                 FROM channels WHERE id = ?1",
                [id],
                map_channel,
            )
            .map_err(Into::into)
        })
    }

    /// Named (non-direct) channels the user belongs to, oldest first.
    pub fn list_channels(&self, user_id: &str) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.is_direct, c.direct_hash, c.created_at
                 FROM channels c
                 JOIN channel_members cm ON cm.channel_id = c.id
                 WHERE cm.user_id = ?1 AND c.is_direct = 0
                 ORDER BY c.created_at, c.rowid",
            )?;

            let rows = stmt
                .query_map([user_id], map_channel)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Every user except the caller, for the DM directory.
    pub fn list_users_except(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, username, email, avatar, password, created_at
                 FROM users WHERE id != ?1 ORDER BY name, id",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        username: row.get(2)?,
                        email: row.get(3)?,
                        avatar: row.get(4)?,
                        password: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn is_member(&self, channel_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
                    params![channel_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Messages --

    /// Persist a message. `created_at` is assigned here so the store stays
    /// the ordering authority; ties fall back to insertion (rowid) order.
    pub fn insert_message(
        &self,
        id: &str,
        channel_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<String> {
        let now = format_timestamp(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, channel_id, sender_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, channel_id, sender_id, content, now],
            )?;
            Ok(now.clone())
        })
    }

    /// The most recent `limit` messages of a channel, oldest first, with
    /// sender identity joined in.
    pub fn recent_messages(&self, channel_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.channel_id, m.sender_id, m.content, m.created_at,
                        u.name, u.username, u.email, u.avatar
                 FROM messages m
                 JOIN users u ON u.id = m.sender_id
                 WHERE m.channel_id = ?1
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?2",
            )?;

            let mut rows = stmt
                .query_map(params![channel_id, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.reverse();
            Ok(rows)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT m.id, m.channel_id, m.sender_id, m.content, m.created_at,
                            u.name, u.username, u.email, u.avatar
                     FROM messages m
                     JOIN users u ON u.id = m.sender_id
                     WHERE m.id = ?1",
                    [id],
                    map_message,
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Reactions --

    /// Toggle a reaction: removes if present, inserts if not. Returns true
    /// when the reaction was added. Double-toggle races serialize on the
    /// unique (message_id, user_id, emoji) constraint.
    pub fn toggle_reaction(
        &self,
        id: &str,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<bool> {
        let now = format_timestamp(Utc::now());
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                params![message_id, user_id, emoji],
            )?;

            if removed > 0 {
                return Ok(false);
            }

            conn.execute(
                "INSERT OR IGNORE INTO reactions (id, message_id, user_id, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, message_id, user_id, emoji, now],
            )?;
            Ok(true)
        })
    }

    pub fn reactions_for_message(&self, message_id: &str) -> Result<Vec<ReactionRow>> {
        self.reactions_for_messages(std::slice::from_ref(&message_id.to_string()))
    }

    /// Batch-fetch reactions for a set of message ids.
    pub fn reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id, user_id, emoji FROM reactions
                 WHERE message_id IN ({})
                 ORDER BY rowid",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let bindings: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(bindings.as_slice(), |row| {
                    Ok(ReactionRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        emoji: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Read markers --

    pub fn mark_read(&self, channel_id: &str, user_id: &str) -> Result<()> {
        let now = format_timestamp(Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channel_reads (channel_id, user_id, last_read)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(channel_id, user_id) DO UPDATE SET last_read = excluded.last_read",
                params![channel_id, user_id, now],
            )?;
            Ok(())
        })
    }

    /// Channels unread for a user: any membership channel holding a message
    /// from someone else newer than the last-read marker (absent marker
    /// counts as epoch).
    pub fn unread_channel_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT m.channel_id
                 FROM messages m
                 JOIN channel_members cm
                   ON cm.channel_id = m.channel_id AND cm.user_id = ?1
                 LEFT JOIN channel_reads r
                   ON r.channel_id = m.channel_id AND r.user_id = ?1
                 WHERE m.sender_id != ?1
                   AND m.created_at > COALESCE(r.last_read, ?2)
                 ORDER BY m.channel_id",
            )?;

            let ids = stmt
                .query_map(params![user_id, EPOCH_TIMESTAMP], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(ids)
        })
    }

    // -- Search --

    /// Case-insensitive substring search over channels the user belongs to,
    /// newest first. DM hits carry the partner's user id for navigation.
    pub fn search_messages(
        &self,
        user_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<SearchRow>> {
        let pattern = format!("%{}%", escape_like(query));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.channel_id, m.sender_id, m.content, m.created_at,
                        u.name, u.username, u.email, u.avatar,
                        c.name, c.is_direct,
                        CASE WHEN c.is_direct THEN (
                            SELECT cm2.user_id FROM channel_members cm2
                            WHERE cm2.channel_id = c.id AND cm2.user_id != ?1
                            LIMIT 1
                        ) END
                 FROM messages m
                 JOIN users u ON u.id = m.sender_id
                 JOIN channels c ON c.id = m.channel_id
                 JOIN channel_members cm
                   ON cm.channel_id = m.channel_id AND cm.user_id = ?1
                 WHERE m.content LIKE ?2 ESCAPE '\\'
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?3",
            )?;

            let rows = stmt
                .query_map(params![user_id, pattern, limit], |row| {
                    Ok(SearchRow {
                        message: map_message(row)?,
                        channel_name: row.get(9)?,
                        is_direct: row.get(10)?,
                        dm_user_id: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always a literal from this crate, never user input.
    let sql = format!(
        "SELECT id, name, username, email, avatar, password, created_at
         FROM users WHERE {} = ?1",
        column
    );

    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                username: row.get(2)?,
                email: row.get(3)?,
                avatar: row.get(4)?,
                password: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        is_direct: row.get(2)?,
        direct_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        sender_name: row.get(5)?,
        sender_username: row.get(6)?,
        sender_email: row.get(7)?,
        sender_avatar: row.get(8)?,
    })
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
