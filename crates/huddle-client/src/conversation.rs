use std::time::{Duration, Instant};

use huddle_types::api::{ChatKind, ChatRef};
use huddle_types::events::{PushFrame, Signal};
use huddle_types::models::{Message, ReactionMap};

/// How long a typing indicator stays lit after the last relevant signal.
pub const TYPING_TTL: Duration = Duration::from_secs(3);

/// Minimum gap between outgoing typing signals per conversation.
pub const TYPING_THROTTLE: Duration = Duration::from_secs(2);

/// What applying a push frame did to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A new message entered the cached list.
    Appended,
    /// An existing message's reaction aggregation was overwritten.
    ReactionUpdated,
    /// The typing indicator was set or refreshed.
    TypingUpdated,
    /// The frame was not relevant to this conversation (or a duplicate).
    Ignored,
}

struct TypingState {
    user_id: String,
    name: String,
    expires_at: Instant,
}

/// Cache of the active conversation's message list plus typing state.
///
/// Seeded by a paginated read and kept current by push frames. Both paths
/// insert-if-absent by message id, so a frame racing the seeding read is
/// applied exactly once regardless of arrival order. Relevance tests never
/// let an event from an unrelated conversation touch this cache.
pub struct ConversationView {
    context: ChatRef,
    viewer_id: String,
    /// Resolved channel id. Unknown for a DM until the first message is
    /// seen, which is why message relevance has a bootstrap path.
    channel_id: Option<String>,
    messages: Vec<Message>,
    typing: Option<TypingState>,
}

impl ConversationView {
    pub fn new(context: ChatRef, viewer_id: impl Into<String>) -> Self {
        let channel_id = match context.kind {
            // A channel reference names its channel directly.
            ChatKind::Channel => Some(context.id.clone()),
            ChatKind::Dm => None,
        };
        Self {
            context,
            viewer_id: viewer_id.into(),
            channel_id,
            messages: Vec::new(),
            typing: None,
        }
    }

    pub fn context(&self) -> &ChatRef {
        &self.context
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Merge a server read into the cache. Server state is authoritative:
    /// messages already present (e.g. delivered by push first) are
    /// overwritten in place, new ones are inserted in timestamp order.
    pub fn seed(&mut self, batch: Vec<Message>) {
        for message in batch {
            self.learn_channel(&message.channel_id);
            if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
                *existing = message;
            } else {
                self.insert_ordered(message);
            }
        }
    }

    /// Merge one push frame, deciding relevance first.
    pub fn apply(&mut self, frame: &PushFrame, now: Instant) -> Applied {
        match frame {
            PushFrame::Message(ev) => {
                if !self.message_is_relevant(&ev.message.channel_id, &ev.message.sender_id, ev.is_direct) {
                    return Applied::Ignored;
                }

                self.learn_channel(&ev.message.channel_id);
                if self.messages.iter().any(|m| m.id == ev.message.id) {
                    // Already present from the seed or an earlier frame.
                    return Applied::Ignored;
                }
                self.insert_ordered(ev.message.clone());
                Applied::Appended
            }

            PushFrame::Signal(Signal::Typing { user_id, name, kind, id }) => {
                if !self.typing_is_relevant(user_id, *kind, id) {
                    return Applied::Ignored;
                }
                self.typing = Some(TypingState {
                    user_id: user_id.clone(),
                    name: name.clone(),
                    expires_at: now + TYPING_TTL,
                });
                Applied::TypingUpdated
            }

            PushFrame::Signal(Signal::Reaction { channel_id, message_id, reactions }) => {
                if self.channel_id.as_deref() != Some(channel_id.as_str()) {
                    return Applied::Ignored;
                }
                if self.set_reactions(message_id, reactions.clone()) {
                    Applied::ReactionUpdated
                } else {
                    Applied::Ignored
                }
            }
        }
    }

    /// Authoritative overwrite of one message's reaction aggregation, used
    /// both for push frames and for the response of the caller's own
    /// toggle. Returns false if the message is not in the cache.
    pub fn set_reactions(&mut self, message_id: &str, reactions: ReactionMap) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.reactions = reactions;
                true
            }
            None => false,
        }
    }

    /// Who is typing, if the indicator has not expired. Each relevant
    /// typing frame resets the expiry.
    pub fn typing_user(&mut self, now: Instant) -> Option<&str> {
        if let Some(state) = &self.typing {
            if state.expires_at <= now {
                self.typing = None;
            }
        }
        self.typing.as_ref().map(|s| s.name.as_str())
    }

    fn message_is_relevant(&self, channel_id: &str, sender_id: &str, is_direct: bool) -> bool {
        match self.context.kind {
            ChatKind::Channel => channel_id == self.context.id,
            ChatKind::Dm => match &self.channel_id {
                Some(known) => channel_id == known,
                // Bootstrap: the DM channel id is unknown until something
                // has been seen. Accept the first *direct* message whose
                // sender is the viewer or the partner; the frame then
                // teaches us the channel id.
                None => {
                    is_direct
                        && self.messages.is_empty()
                        && (sender_id == self.viewer_id || sender_id == self.context.id)
                }
            },
        }
    }

    fn typing_is_relevant(&self, user_id: &str, kind: ChatKind, id: &str) -> bool {
        if user_id == self.viewer_id {
            return false;
        }
        match (self.context.kind, kind) {
            (ChatKind::Channel, ChatKind::Channel) => id == self.context.id,
            // For DMs the typist must be the partner *and* their reference
            // must name us; the partner typing into some other DM is not
            // this conversation.
            (ChatKind::Dm, ChatKind::Dm) => user_id == self.context.id && id == self.viewer_id,
            _ => false,
        }
    }

    fn learn_channel(&mut self, channel_id: &str) {
        if self.channel_id.is_none() {
            self.channel_id = Some(channel_id.to_string());
        }
    }

    fn insert_ordered(&mut self, message: Message) {
        let position = self
            .messages
            .iter()
            .position(|m| (m.created_at, m.id.as_str()) > (message.created_at, message.id.as_str()))
            .unwrap_or(self.messages.len());
        self.messages.insert(position, message);
    }
}

/// Client-side rate limit for outgoing typing signals: at most one every
/// two seconds per conversation. Advisory; the server does not enforce it.
#[derive(Default)]
pub struct TypingThrottle {
    last_sent: Option<Instant>,
}

impl TypingThrottle {
    pub fn should_send(&mut self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) if now.duration_since(last) < TYPING_THROTTLE => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use huddle_types::events::MessageEvent;
    use huddle_types::models::{ReactionGroup, UserProfile};

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.into(),
            name: format!("User {id}"),
            username: id.into(),
            email: format!("{id}@example.com"),
            avatar: None,
        }
    }

    fn message(id: &str, channel: &str, sender: &str, minute: i64) -> Message {
        Message {
            id: id.into(),
            channel_id: channel.into(),
            sender_id: sender.into(),
            content: format!("message {id}"),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
                + ChronoDuration::minutes(minute),
            sender: profile(sender),
            reactions: ReactionMap::new(),
        }
    }

    fn frame(id: &str, channel: &str, sender: &str, minute: i64, is_direct: bool) -> PushFrame {
        PushFrame::Message(MessageEvent {
            message: message(id, channel, sender, minute),
            is_direct,
        })
    }

    #[test]
    fn channel_view_appends_only_its_own_channel() {
        let mut view = ConversationView::new(ChatRef::channel("general"), "me");
        let now = Instant::now();

        assert_eq!(view.apply(&frame("m1", "general", "a", 0, false), now), Applied::Appended);
        assert_eq!(view.apply(&frame("m2", "random", "a", 1, false), now), Applied::Ignored);

        assert_eq!(view.messages().len(), 1);
        assert_eq!(view.messages()[0].id, "m1");
    }

    #[test]
    fn push_before_seed_is_not_duplicated() {
        let mut view = ConversationView::new(ChatRef::channel("general"), "me");
        let now = Instant::now();

        // Push frame lands while the seeding read is still in flight.
        view.apply(&frame("m2", "general", "a", 1, false), now);

        // The read completes, overlapping the pushed message.
        view.seed(vec![
            message("m1", "general", "a", 0),
            message("m2", "general", "a", 1),
        ]);

        let ids: Vec<&str> = view.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);

        // Replayed frame after the seed is also a no-op.
        assert_eq!(view.apply(&frame("m2", "general", "a", 1, false), now), Applied::Ignored);
        assert_eq!(view.messages().len(), 2);
    }

    #[test]
    fn messages_stay_ordered_by_timestamp() {
        let mut view = ConversationView::new(ChatRef::channel("general"), "me");
        let now = Instant::now();

        view.apply(&frame("m3", "general", "a", 3, false), now);
        view.apply(&frame("m1", "general", "a", 1, false), now);
        view.apply(&frame("m2", "general", "a", 2, false), now);

        let ids: Vec<&str> = view.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn dm_bootstrap_accepts_partner_then_locks_to_channel() {
        let mut view = ConversationView::new(ChatRef::dm("partner"), "me");
        let now = Instant::now();
        assert_eq!(view.channel_id(), None);

        // First direct frame from the partner teaches us the channel id.
        assert_eq!(view.apply(&frame("m1", "dm-chan", "partner", 0, true), now), Applied::Appended);
        assert_eq!(view.channel_id(), Some("dm-chan"));

        // From now on only that channel is relevant, sender regardless.
        assert_eq!(view.apply(&frame("m2", "other-chan", "partner", 1, true), now), Applied::Ignored);
        assert_eq!(view.apply(&frame("m3", "dm-chan", "me", 2, true), now), Applied::Appended);
    }

    #[test]
    fn dm_bootstrap_rejects_unrelated_senders_and_channel_traffic() {
        let mut view = ConversationView::new(ChatRef::dm("partner"), "me");
        let now = Instant::now();

        // Someone else's message never bootstraps the view.
        assert_eq!(view.apply(&frame("m1", "dm-chan", "stranger", 0, true), now), Applied::Ignored);
        // Nor does the partner posting in a public channel.
        assert_eq!(view.apply(&frame("m2", "general", "partner", 1, false), now), Applied::Ignored);
        assert!(view.messages().is_empty());
    }

    #[test]
    fn typing_indicator_sets_resets_and_expires() {
        let mut view = ConversationView::new(ChatRef::channel("general"), "me");
        let start = Instant::now();

        let typing = PushFrame::typing("a", "Ada", ChatKind::Channel, "general");
        assert_eq!(view.apply(&typing, start), Applied::TypingUpdated);
        assert_eq!(view.typing_user(start + Duration::from_secs(2)), Some("Ada"));

        // A fresh signal resets the 3s window.
        view.apply(&typing, start + Duration::from_secs(2));
        assert_eq!(view.typing_user(start + Duration::from_secs(4)), Some("Ada"));

        // Silence past the TTL clears it.
        assert_eq!(view.typing_user(start + Duration::from_secs(6)), None);
    }

    #[test]
    fn typing_ignores_self_and_other_conversations() {
        let mut view = ConversationView::new(ChatRef::channel("general"), "me");
        let now = Instant::now();

        assert_eq!(
            view.apply(&PushFrame::typing("me", "Me", ChatKind::Channel, "general"), now),
            Applied::Ignored
        );
        assert_eq!(
            view.apply(&PushFrame::typing("a", "Ada", ChatKind::Channel, "random"), now),
            Applied::Ignored
        );
    }

    #[test]
    fn dm_typing_matches_on_the_typist() {
        let mut view = ConversationView::new(ChatRef::dm("partner"), "me");
        let now = Instant::now();

        // The partner's typing reference names *us*; relevance keys on who
        // is typing, not on the reference id.
        let typing = PushFrame::typing("partner", "Pat", ChatKind::Dm, "me");
        assert_eq!(view.apply(&typing, now), Applied::TypingUpdated);

        let unrelated = PushFrame::typing("stranger", "Sam", ChatKind::Dm, "me");
        assert_eq!(view.apply(&unrelated, now), Applied::Ignored);
    }

    #[test]
    fn dm_typing_in_the_partners_other_conversations_is_ignored() {
        let mut view = ConversationView::new(ChatRef::dm("partner"), "me");
        let now = Instant::now();

        // The partner typing into a DM with a third user must not light the
        // indicator here.
        let elsewhere = PushFrame::typing("partner", "Pat", ChatKind::Dm, "carol");
        assert_eq!(view.apply(&elsewhere, now), Applied::Ignored);
        assert_eq!(view.typing_user(now), None);

        // The same typist addressing us does.
        let here = PushFrame::typing("partner", "Pat", ChatKind::Dm, "me");
        assert_eq!(view.apply(&here, now), Applied::TypingUpdated);
    }

    #[test]
    fn reaction_frames_overwrite_matching_message_only() {
        let mut view = ConversationView::new(ChatRef::channel("general"), "me");
        let now = Instant::now();
        view.seed(vec![message("m1", "general", "a", 0)]);

        let mut reactions = ReactionMap::new();
        reactions.insert("👍".into(), ReactionGroup { count: 2, user_ids: vec!["a".into(), "b".into()] });

        let hit = PushFrame::reaction("general", "m1", reactions.clone());
        assert_eq!(view.apply(&hit, now), Applied::ReactionUpdated);
        assert_eq!(view.messages()[0].reactions["👍"].count, 2);

        // Authoritative overwrite: an empty aggregation clears, not merges.
        let cleared = PushFrame::reaction("general", "m1", ReactionMap::new());
        view.apply(&cleared, now);
        assert!(view.messages()[0].reactions.is_empty());

        // Other channels and unknown messages are ignored.
        assert_eq!(view.apply(&PushFrame::reaction("random", "m1", ReactionMap::new()), now), Applied::Ignored);
        assert_eq!(view.apply(&PushFrame::reaction("general", "zz", ReactionMap::new()), now), Applied::Ignored);
    }

    #[test]
    fn typing_throttle_allows_one_signal_per_window() {
        let mut throttle = TypingThrottle::default();
        let start = Instant::now();

        assert!(throttle.should_send(start));
        assert!(!throttle.should_send(start + Duration::from_millis(500)));
        assert!(!throttle.should_send(start + Duration::from_millis(1900)));
        assert!(throttle.should_send(start + Duration::from_secs(2)));
    }
}
