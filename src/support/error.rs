use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("invalid bit-vector {bits:?}: expected {expected} bits of '0' or '1'")]
    InvalidBitVector { bits: String, expected: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
