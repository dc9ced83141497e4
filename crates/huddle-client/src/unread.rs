use std::collections::HashSet;

use huddle_types::events::MessageEvent;

use crate::conversation::ConversationView;

/// What the currently open conversation resolves to, for deciding whether
/// an incoming message is "on screen".
#[derive(Debug, Clone, Default)]
pub struct Viewing {
    pub channel_id: Option<String>,
    /// Set while viewing a DM whose channel id is not yet known.
    pub dm_partner: Option<String>,
}

impl Viewing {
    pub fn of(view: &ConversationView) -> Self {
        let channel_id = view.channel_id().map(str::to_string);
        let dm_partner = if channel_id.is_none() {
            Some(view.context().id.clone())
        } else {
            None
        };
        Self {
            channel_id,
            dm_partner,
        }
    }

    fn covers(&self, ev: &MessageEvent) -> bool {
        if self.channel_id.as_deref() == Some(ev.message.channel_id.as_str()) {
            return true;
        }
        // Empty DM view: the channel id is unknown, but a direct message
        // from the partner is exactly what is on screen.
        ev.is_direct && self.dm_partner.as_deref() == Some(ev.message.sender_id.as_str())
    }
}

/// What an observed message frame did to badge state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnreadAction {
    /// Self-authored or otherwise not badge-worthy.
    Ignored,
    /// The channel (and partner, for DMs) was marked unread.
    MarkedUnread { channel_id: String },
    /// The message landed in the viewed conversation: local state stays
    /// read, and the caller must confirm with a mark-read call so the
    /// server-side derivation matches what is on screen.
    AutoMarkRead { channel_id: String },
}

/// Cross-conversation unread badges for one user.
///
/// Two sources are merged: the server-derived unread list, taken as
/// authoritative (overwrite, never merge) on every refetch, and live
/// message frames adjusting the set in between. Per-channel transitions:
/// read -> unread only on a qualifying non-self message while not viewing;
/// unread -> read on mark-read, on navigating in, or by auto-mark while
/// viewing.
pub struct UnreadTracker {
    viewer_id: String,
    channels: HashSet<String>,
    /// Partner ids with unread DMs, maintained from live frames only (the
    /// server list speaks in channel ids).
    partners: HashSet<String>,
}

impl UnreadTracker {
    pub fn new(viewer_id: impl Into<String>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            channels: HashSet::new(),
            partners: HashSet::new(),
        }
    }

    /// Replace local channel state with the server derivation.
    pub fn sync_from_server(&mut self, unread_channel_ids: Vec<String>) {
        self.channels = unread_channel_ids.into_iter().collect();
    }

    /// Feed one live message frame through the badge state machine.
    pub fn observe(&mut self, ev: &MessageEvent, viewing: Option<&Viewing>) -> UnreadAction {
        if ev.message.sender_id == self.viewer_id {
            return UnreadAction::Ignored;
        }

        let channel_id = ev.message.channel_id.clone();

        if viewing.is_some_and(|v| v.covers(ev)) {
            // On screen: never badge, and re-assert read state upstream.
            self.channels.remove(&channel_id);
            if ev.is_direct {
                self.partners.remove(&ev.message.sender_id);
            }
            return UnreadAction::AutoMarkRead { channel_id };
        }

        self.channels.insert(channel_id.clone());
        if ev.is_direct {
            self.partners.insert(ev.message.sender_id.clone());
        }
        UnreadAction::MarkedUnread { channel_id }
    }

    /// Optimistic local clear; the caller confirms with the server and
    /// then re-syncs from the authoritative list.
    pub fn mark_read(&mut self, channel_id: &str) {
        self.channels.remove(channel_id);
    }

    pub fn clear_partner(&mut self, partner_id: &str) {
        self.partners.remove(partner_id);
    }

    pub fn is_unread(&self, channel_id: &str) -> bool {
        self.channels.contains(channel_id)
    }

    pub fn is_partner_unread(&self, partner_id: &str) -> bool {
        self.partners.contains(partner_id)
    }

    pub fn unread_channels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use huddle_types::models::{Message, ReactionMap, UserProfile};

    fn event(channel: &str, sender: &str, is_direct: bool) -> MessageEvent {
        MessageEvent {
            message: Message {
                id: format!("m-{channel}-{sender}"),
                channel_id: channel.into(),
                sender_id: sender.into(),
                content: "hi".into(),
                created_at: Utc::now(),
                sender: UserProfile {
                    id: sender.into(),
                    name: sender.into(),
                    username: sender.into(),
                    email: format!("{sender}@example.com"),
                    avatar: None,
                },
                reactions: ReactionMap::new(),
            },
            is_direct,
        }
    }

    fn viewing_channel(id: &str) -> Viewing {
        Viewing {
            channel_id: Some(id.into()),
            dm_partner: None,
        }
    }

    #[test]
    fn non_self_message_while_away_marks_unread() {
        let mut tracker = UnreadTracker::new("me");

        let action = tracker.observe(&event("general", "a", false), Some(&viewing_channel("random")));
        assert_eq!(action, UnreadAction::MarkedUnread { channel_id: "general".into() });
        assert!(tracker.is_unread("general"));
    }

    #[test]
    fn own_messages_never_badge() {
        let mut tracker = UnreadTracker::new("me");
        assert_eq!(tracker.observe(&event("general", "me", false), None), UnreadAction::Ignored);
        assert!(!tracker.is_unread("general"));
    }

    #[test]
    fn message_for_the_viewed_channel_auto_marks_read() {
        let mut tracker = UnreadTracker::new("me");

        let action = tracker.observe(&event("general", "a", false), Some(&viewing_channel("general")));
        assert_eq!(action, UnreadAction::AutoMarkRead { channel_id: "general".into() });
        assert!(!tracker.is_unread("general"));
    }

    #[test]
    fn viewed_empty_dm_is_covered_by_partner_sender() {
        let mut tracker = UnreadTracker::new("me");
        let viewing = Viewing {
            channel_id: None,
            dm_partner: Some("partner".into()),
        };

        let action = tracker.observe(&event("dm-chan", "partner", true), Some(&viewing));
        assert_eq!(action, UnreadAction::AutoMarkRead { channel_id: "dm-chan".into() });
        assert!(!tracker.is_partner_unread("partner"));
    }

    #[test]
    fn direct_messages_badge_the_partner_too() {
        let mut tracker = UnreadTracker::new("me");

        tracker.observe(&event("dm-chan", "partner", true), None);
        assert!(tracker.is_unread("dm-chan"));
        assert!(tracker.is_partner_unread("partner"));

        tracker.mark_read("dm-chan");
        tracker.clear_partner("partner");
        assert!(!tracker.is_unread("dm-chan"));
        assert!(!tracker.is_partner_unread("partner"));
    }

    #[test]
    fn server_list_overwrites_local_channel_state() {
        let mut tracker = UnreadTracker::new("me");
        tracker.observe(&event("stale", "a", false), None);

        tracker.sync_from_server(vec!["fresh".into()]);
        assert!(tracker.is_unread("fresh"));
        assert!(!tracker.is_unread("stale"));
    }

    #[test]
    fn mark_read_then_new_message_reinstates() {
        let mut tracker = UnreadTracker::new("me");

        tracker.observe(&event("general", "a", false), None);
        tracker.mark_read("general");
        assert!(!tracker.is_unread("general"));

        tracker.observe(&event("general", "a", false), None);
        assert!(tracker.is_unread("general"));
    }
}
