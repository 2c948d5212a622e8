use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("empty proposal")]
    EmptyProposal,
    #[error("a different value was already proposed for instance {0}")]
    DuplicatedProposal(crate::InstanceId),
}

pub type Result<T> = std::result::Result<T, Error>;
