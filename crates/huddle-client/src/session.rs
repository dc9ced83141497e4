use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use huddle_types::api::{ChatKind, ChatRef};
use huddle_types::events::PushFrame;
use huddle_types::models::Message;

use crate::conversation::{ConversationView, TypingThrottle};
use crate::error::ClientError;
use crate::http::ChatApi;
use crate::unread::{UnreadAction, UnreadTracker, Viewing};

const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_CAP: Duration = Duration::from_secs(30);

/// One client's end of the push channel.
pub struct PushConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PushConnection {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _) = connect_async(url).await?;
        Ok(Self { stream })
    }

    /// Next decoded push frame, answering server heartbeats along the way.
    /// `None` means the server closed the connection. Undecodable payloads
    /// are logged and skipped, never fatal.
    pub async fn next_frame(&mut self) -> Result<Option<PushFrame>, ClientError> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                WsMessage::Text(text) => match serde_json::from_str::<PushFrame>(text.as_str()) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(e) => warn!("bad push payload: {}", e),
                },
                WsMessage::Ping(payload) => {
                    self.stream.send(WsMessage::Pong(payload)).await?;
                }
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}

/// Ties the reconciliation engines to their IO: seeds views over HTTP,
/// routes push frames into [`ConversationView`] and [`UnreadTracker`], and
/// owns the reconnect policy. There is no missed-event recovery on the
/// push channel, so every (re)connect re-fetches authoritative state
/// before any further frame is trusted.
pub struct ChatSession {
    api: ChatApi,
    user_id: String,
    pub unread: UnreadTracker,
    view: Option<ConversationView>,
    typing_throttle: TypingThrottle,
}

impl ChatSession {
    pub fn new(api: ChatApi, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            api,
            unread: UnreadTracker::new(user_id.clone()),
            user_id,
            view: None,
            typing_throttle: TypingThrottle::default(),
        }
    }

    pub fn view(&self) -> Option<&ConversationView> {
        self.view.as_ref()
    }

    /// Open a conversation: seed its cache from the server and clear its
    /// unread badge (navigating in is an unread -> read transition).
    pub async fn open(&mut self, context: ChatRef) -> Result<(), ClientError> {
        let mut view = ConversationView::new(context.clone(), self.user_id.clone());
        let seed = self.api.list_messages(&context).await?;
        view.seed(seed);

        if let Some(channel_id) = view.channel_id().map(str::to_string) {
            self.unread.mark_read(&channel_id);
            match self.api.mark_read(&channel_id).await {
                Ok(()) => {
                    let ids = self.api.unread_channel_ids().await?;
                    self.unread.sync_from_server(ids);
                }
                // A channel-kind reference may point at a channel that does
                // not exist yet; listing treated it as empty, so do we.
                Err(ClientError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        if context.kind == ChatKind::Dm {
            self.unread.clear_partner(&context.id);
        }

        self.view = Some(view);
        self.typing_throttle = TypingThrottle::default();
        Ok(())
    }

    pub fn close(&mut self) {
        self.view = None;
    }

    /// Post into the open conversation. The returned message is merged
    /// into the cache immediately; the push echo of the same message
    /// deduplicates by id.
    pub async fn send_message(&mut self, text: &str) -> Result<Message, ClientError> {
        let context = self.context()?;
        let message = self.api.post_message(&context, text).await?;
        if let Some(view) = self.view.as_mut() {
            view.seed(vec![message.clone()]);
        }
        Ok(message)
    }

    /// Toggle a reaction; the server's recomputed aggregation overwrites
    /// the cached one (authoritative, not merged).
    pub async fn toggle_reaction(
        &mut self,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ClientError> {
        let reactions = self.api.toggle_reaction(message_id, emoji).await?;
        if let Some(view) = self.view.as_mut() {
            view.set_reactions(message_id, reactions);
        }
        Ok(())
    }

    /// Signal typing in the open conversation, throttled to one signal per
    /// window.
    pub async fn send_typing(&mut self) -> Result<(), ClientError> {
        let context = self.context()?;
        if self.typing_throttle.should_send(Instant::now()) {
            self.api.send_typing(&context).await?;
        }
        Ok(())
    }

    /// Explicit mark-read: optimistic local clear, then server confirm and
    /// authoritative re-sync.
    pub async fn mark_read(&mut self, channel_id: &str) -> Result<(), ClientError> {
        self.unread.mark_read(channel_id);
        self.api.mark_read(channel_id).await?;
        let ids = self.api.unread_channel_ids().await?;
        self.unread.sync_from_server(ids);
        Ok(())
    }

    /// Connect the push channel, then re-fetch the open view and unread
    /// list. Ordering matters: subscribing first means the refetch and the
    /// event stream overlap instead of leaving a gap, and overlapping
    /// messages deduplicate by id.
    pub async fn connect(&mut self) -> Result<PushConnection, ClientError> {
        let connection = PushConnection::connect(&self.api.gateway_url()).await?;

        if let Some(context) = self.view.as_ref().map(|v| v.context().clone()) {
            let seed = self.api.list_messages(&context).await?;
            if let Some(view) = self.view.as_mut() {
                view.seed(seed);
            }
        }
        let ids = self.api.unread_channel_ids().await?;
        self.unread.sync_from_server(ids);

        Ok(connection)
    }

    /// Route one push frame through both engines. The conversation view
    /// decides relevance for the message list; the unread tracker decides
    /// badge state and may demand an auto-mark-read round trip.
    pub async fn handle_frame(&mut self, frame: PushFrame) -> Result<(), ClientError> {
        if let Some(view) = self.view.as_mut() {
            view.apply(&frame, Instant::now());
        }

        if let PushFrame::Message(ev) = &frame {
            let viewing = self.view.as_ref().map(Viewing::of);
            if let UnreadAction::AutoMarkRead { channel_id } =
                self.unread.observe(ev, viewing.as_ref())
            {
                // Keep the server derivation consistent with the screen.
                self.api.mark_read(&channel_id).await?;
                let ids = self.api.unread_channel_ids().await?;
                self.unread.sync_from_server(ids);
            }
        }

        Ok(())
    }

    /// Pump the push channel forever, reconnecting with capped backoff.
    /// Returns only on `Unauthorized`; every other failure is survivable:
    /// the engines just stop receiving until the next connect re-syncs.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        let mut backoff = RECONNECT_BASE;

        loop {
            let mut connection = match self.connect().await {
                Ok(connection) => {
                    info!("push channel connected");
                    backoff = RECONNECT_BASE;
                    connection
                }
                Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
                Err(e) => {
                    warn!("push connect failed: {}; retrying in {:?}", e, backoff);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(RECONNECT_CAP);
                    continue;
                }
            };

            loop {
                match connection.next_frame().await {
                    Ok(Some(frame)) => match self.handle_frame(frame).await {
                        Ok(()) => {}
                        Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
                        Err(e) => warn!("frame handling failed: {}", e),
                    },
                    Ok(None) => {
                        info!("push channel closed by server");
                        break;
                    }
                    Err(e) => {
                        warn!("push channel error: {}", e);
                        break;
                    }
                }
            }

            debug!("reconnecting push channel in {:?}", backoff);
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(RECONNECT_CAP);
        }
    }

    fn context(&self) -> Result<ChatRef, ClientError> {
        self.view
            .as_ref()
            .map(|v| v.context().clone())
            .ok_or(ClientError::NoConversation)
    }
}
