pub mod auth;
pub mod channels;
pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod reads;
pub mod search;
pub mod typing;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
