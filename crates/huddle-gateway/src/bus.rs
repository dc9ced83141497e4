use tokio::sync::broadcast;

use huddle_types::events::PushFrame;

/// Process-wide publish/subscribe channel for push frames.
///
/// Constructed once at startup and handed to every handler by injection,
/// never looked up through a global. Delivery is fire-and-forget and
/// at-most-once per currently connected subscriber: there is no replay, so
/// a subscriber that connects after a publish never sees that frame.
///
/// This is the in-process implementation only; fanning out across server
/// processes needs a networked broker behind this same interface.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PushFrame>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish a frame to all current subscribers. Errors only mean nobody
    /// is listening, which is not a failure.
    pub fn publish(&self, frame: PushFrame) {
        let _ = self.tx.send(frame);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushFrame> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::api::ChatKind;

    #[tokio::test]
    async fn frames_reach_every_current_subscriber() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PushFrame::typing("u1", "Ada", ChatKind::Channel, "general"));

        assert!(matches!(rx1.recv().await, Ok(PushFrame::Signal(_))));
        assert!(matches!(rx2.recv().await, Ok(PushFrame::Signal(_))));
    }

    #[tokio::test]
    async fn late_subscribers_never_see_earlier_frames() {
        let bus = EventBus::new();
        let mut keep_alive = bus.subscribe();

        bus.publish(PushFrame::typing("u1", "Ada", ChatKind::Channel, "general"));
        let mut late = bus.subscribe();

        bus.publish(PushFrame::typing("u2", "Grace", ChatKind::Channel, "general"));

        // The late subscriber only receives the frame published after it joined.
        match late.recv().await.unwrap() {
            PushFrame::Signal(huddle_types::events::Signal::Typing { user_id, .. }) => {
                assert_eq!(user_id, "u2")
            }
            other => panic!("unexpected frame {other:?}"),
        }
        keep_alive.recv().await.unwrap();
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        bus.publish(PushFrame::typing("u1", "Ada", ChatKind::Dm, "u2"));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
