use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("request failed: {0:#}")]
    Transport(anyhow::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("session was rejected by the API")]
    Unauthorized,
    #[error("response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("cookie could not be persisted: {0:#}")]
    Persist(anyhow::Error),
}

impl SessionError {
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(Self::Unauthorized),
            other => Some(Self::Status(other)),
        }
    }
}
