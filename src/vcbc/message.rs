use crate::{InstanceId, Proposal, Step};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Echo {
    pub instance: InstanceId,
    pub step: Step,
    pub value: Proposal,
    /// Seconds since the unix epoch when the echo was created. Informational.
    pub timestamp: u64,
}

/// A proposal together with the quorum certificate its proposer collected.
/// The proposer is the initiator of the bundle carrying it.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CertProposal {
    pub instance: InstanceId,
    pub value: Proposal,
    pub proof: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum Message {
    Echo(Echo),
    CertProposal(CertProposal),
}

impl Message {
    pub fn instance(&self) -> InstanceId {
        match self {
            Message::Echo(echo) => echo.instance,
            Message::CertProposal(cert) => cert.instance,
        }
    }

    pub fn action_str(&self) -> &str {
        match self {
            Message::Echo(_) => "echo",
            Message::CertProposal(_) => "cert-proposal",
        }
    }
}
