use thiserror::Error;

/// Failure to decode one of the wire/storage enums from its string form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown chat type: {0}")]
    ChatKind(String),

    #[error("Unknown message type: {0}")]
    MessageKind(String),

    #[error("Unknown message status: {0}")]
    MessageStatus(String),

    #[error("Unknown status type: {0}")]
    StatusKind(String),
}
