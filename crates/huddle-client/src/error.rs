use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No valid session. Surfaced as a login prompt, never retried.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated but not a member of the channel. Dismissible, never
    /// retried.
    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    /// A conversation-scoped call was made with no conversation open.
    #[error("no active conversation")]
    NoConversation,

    /// Any other non-success response.
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("push connection error: {0}")]
    Push(#[from] tokio_tungstenite::tungstenite::Error),
}

impl ClientError {
    /// Whether a *read* may be retried. Forbidden and the other 4xx
    /// outcomes stop immediately; only transport failures and server-side
    /// errors are considered transient.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Rejected { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }
}
