use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShuffleError {
    #[error("Decode error at byte 0x{offset:X}: {message}")]
    Decode { offset: u64, message: String },
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Missing game file: {0}")]
    MissingGameFile(PathBuf),
    #[error("Room {0} is not present in the loaded archives")]
    UnknownRoom(u16),
    #[error("{0}")]
    Custom(String),
    #[error("Additional context for error: {0}, {1}")]
    Shuffle(String, #[source] Box<ShuffleError>),
    #[error("I/O error: {0}, {1}")]
    Io(String, #[source] std::io::Error),
    #[error("binrw error: {0}, {1}")]
    BinRW(String, #[source] binrw::Error),
}

impl ShuffleError {
    pub fn add_context(self, message: impl Into<String>) -> Self {
        Self::Shuffle(message.into(), Box::new(self))
    }

    pub fn decode_at(offset: u64, message: impl Into<String>) -> Self {
        Self::Decode {
            offset,
            message: message.into(),
        }
    }
}
