use crate::collector::EndReason;

/// Core error type for the SDK.
///
/// Lets callers tell a misconfigured collector from one that ended with a
/// rejected reason.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("cannot construct collector: {0}")]
    Construction(String),

    #[error("collector ended: {reason}")]
    CollectorEnded { reason: EndReason },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
