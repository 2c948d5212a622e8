use crate::NodeId;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("no proposer in the permutation has support bit {0}")]
    NoMatchingProposer(bool),
    #[error("no certified proposal from the selected proposer {0}")]
    MissingCertifiedProposal(NodeId),
    #[error("pivot {0} has no bit in the support set")]
    InvalidPivot(NodeId),
}

pub type Result<T> = std::result::Result<T, Error>;
