//! Client-side reconciliation for the huddle chat engine.
//!
//! The server exposes two consistency mechanisms: request/response reads
//! and an out-of-band push channel. This crate merges the two without
//! duplicating or losing updates: [`ConversationView`] keeps the active
//! conversation's message list consistent (insert-if-absent by message id,
//! so push frames may arrive before or after the seeding read),
//! [`UnreadTracker`] keeps cross-conversation unread badges consistent,
//! and [`ChatSession`] drives both over a reconnecting push connection,
//! re-fetching authoritative state before trusting pushes again.

pub mod conversation;
pub mod error;
pub mod http;
pub mod session;
pub mod unread;

pub use conversation::{Applied, ConversationView, TypingThrottle};
pub use error::ClientError;
pub use http::ChatApi;
pub use session::{ChatSession, PushConnection};
pub use unread::{UnreadAction, UnreadTracker, Viewing};
