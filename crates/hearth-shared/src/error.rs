use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum IdError {
    #[error("Identifier is empty")]
    Empty,

    #[error("Invalid media key: expected {expected} hex chars, got {got}")]
    MediaKeyLength { expected: usize, got: usize },

    #[error("Invalid media key: {0}")]
    MediaKeyHex(#[from] hex::FromHexError),
}
