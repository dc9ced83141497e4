use huddle_db::Database;
use huddle_db::models::ChannelRow;
use huddle_types::GENERAL_CHANNEL_ID;
use huddle_types::api::ChatKind;

use crate::error::ApiError;

/// Resolve a logical conversation reference to a concrete channel for the
/// acting user.
///
/// Channel kind requires prior membership (Forbidden otherwise), except the
/// distinguished general channel which is upserted and auto-admits every
/// known user on first touch. DM kind finds-or-creates the pair channel and
/// idempotently ensures both memberships, so concurrent first contact from
/// both sides converges on a single channel.
pub fn resolve_conversation(
    db: &Database,
    user_id: &str,
    kind: ChatKind,
    id: &str,
) -> Result<ChannelRow, ApiError> {
    match kind {
        ChatKind::Channel => {
            if id == GENERAL_CHANNEL_ID {
                return Ok(db.ensure_general_channel(user_id)?);
            }

            let channel = db.get_channel(id)?.ok_or(ApiError::NotFound)?;
            if !db.is_member(&channel.id, user_id)? {
                return Err(ApiError::Forbidden);
            }
            Ok(channel)
        }
        ChatKind::Dm => {
            // `id` is the other participant; a DM with an unknown user is a
            // genuine NotFound.
            if db.get_user_by_id(id)?.is_none() {
                return Err(ApiError::NotFound);
            }
            Ok(db.ensure_direct_channel(user_id, id)?)
        }
    }
}

/// Listing variant: a missing channel is an empty conversation, not an
/// error. Forbidden still applies.
pub fn resolve_for_listing(
    db: &Database,
    user_id: &str,
    kind: ChatKind,
    id: &str,
) -> Result<Option<ChannelRow>, ApiError> {
    match resolve_conversation(db, user_id, kind, id) {
        Ok(channel) => Ok(Some(channel)),
        Err(ApiError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users(users: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for id in users {
            db.create_user(id, id, id, &format!("{id}@example.com"), None, "hash")
                .unwrap();
        }
        db
    }

    #[test]
    fn unknown_channel_is_not_found() {
        let db = db_with_users(&["a"]);
        let err = resolve_conversation(&db, "a", ChatKind::Channel, "nope").unwrap_err();
        assert!(matches!(err, ApiError::NotFound));

        // But listing treats it as an empty conversation.
        assert!(
            resolve_for_listing(&db, "a", ChatKind::Channel, "nope")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn non_member_is_forbidden() {
        let db = db_with_users(&["a", "b", "c"]);
        // A channel "a" is not part of: b and c's DM channel.
        let private = db.ensure_direct_channel("b", "c").unwrap();

        let err =
            resolve_conversation(&db, "a", ChatKind::Channel, &private.id).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[test]
    fn created_channels_resolve_for_members_only() {
        let db = db_with_users(&["a", "b"]);
        let ch = db.create_channel("c1", "engineering", "a").unwrap();

        let resolved = resolve_conversation(&db, "a", ChatKind::Channel, &ch.id).unwrap();
        assert_eq!(resolved.id, "c1");

        let err = resolve_conversation(&db, "b", ChatKind::Channel, &ch.id).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[test]
    fn general_auto_admits_on_first_touch() {
        let db = db_with_users(&["a", "b"]);
        let ch = resolve_conversation(&db, "a", ChatKind::Channel, "general").unwrap();
        assert_eq!(ch.id, "general");
        assert!(db.is_member("general", "a").unwrap());
        assert!(db.is_member("general", "b").unwrap());
    }

    #[test]
    fn dm_resolution_is_idempotent_and_symmetric() {
        let db = db_with_users(&["a", "b"]);
        let first = resolve_conversation(&db, "a", ChatKind::Dm, "b").unwrap();
        let second = resolve_conversation(&db, "b", ChatKind::Dm, "a").unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.is_direct);
    }

    #[test]
    fn dm_with_unknown_user_is_not_found() {
        let db = db_with_users(&["a"]);
        let err = resolve_conversation(&db, "a", ChatKind::Dm, "ghost").unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
