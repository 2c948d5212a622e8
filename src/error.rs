use crate::{abba, mvba, support, transport, vcbc, NodeId};
use core::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("vcbc error {0}")]
    Vcbc(#[from] vcbc::error::Error),
    #[error("support error {0}")]
    Support(#[from] support::error::Error),
    #[error("abba error {0}")]
    Abba(#[from] abba::error::Error),
    #[error("mvba error {0}")]
    Mvba(#[from] mvba::error::Error),
    #[error("transport error {0}")]
    Transport(#[from] transport::Error),
    #[error("{0} is not a member of the cluster")]
    NotMember(NodeId),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("We experienced an IO error")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode with bincode")]
    Encoding(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
