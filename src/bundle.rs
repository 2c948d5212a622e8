use crate::{abba, support, vcbc, InstanceId, NodeId};
use serde::{Deserialize, Serialize};

/// Bundle is a wrapper around the actual message
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Bundle {
    /// The node that created this bundle.
    pub initiator: NodeId,
    /// This is the actual message
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum Message {
    Vcbc(vcbc::message::Message),
    Support(support::message::Message),
    Abba(abba::message::Message),
}

impl Message {
    pub fn instance(&self) -> InstanceId {
        match self {
            Message::Vcbc(msg) => msg.instance(),
            Message::Support(msg) => msg.instance,
            Message::Abba(msg) => msg.instance,
        }
    }

    pub fn module(&self) -> &'static str {
        match self {
            Message::Vcbc(_) => vcbc::MODULE_NAME,
            Message::Support(_) => support::MODULE_NAME,
            Message::Abba(_) => abba::MODULE_NAME,
        }
    }
}

/// Outgoing messages definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Deliver to every other member. The initiator has already handled it.
    Gossip(Bundle),
}
