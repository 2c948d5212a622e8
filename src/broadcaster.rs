use crate::bundle::{Bundle, Message, Outgoing};
use crate::NodeId;

// Broadcaster collects the messages a node wants to send while it handles
// one input. The caller drains them with `take_outgoings` and does the I/O.
#[derive(Debug)]
pub struct Broadcaster {
    self_id: NodeId,
    outgoings: Vec<Outgoing>,
}

impl Broadcaster {
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            outgoings: Vec::new(),
        }
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    pub fn broadcast(&mut self, message: Message) {
        let bdl = Bundle {
            initiator: self.self_id,
            message,
        };
        self.outgoings.push(Outgoing::Gossip(bdl));
    }

    pub fn take_outgoings(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outgoings)
    }

    #[cfg(test)]
    pub fn has_gossip_message(&self, msg: &Message) -> bool {
        self.gossip_count(msg) > 0
    }

    #[cfg(test)]
    pub fn gossip_count(&self, msg: &Message) -> usize {
        self.outgoings
            .iter()
            .filter(|Outgoing::Gossip(bdl)| &bdl.message == msg)
            .count()
    }

    #[cfg(test)]
    pub fn gossips(&self) -> Vec<&Message> {
        self.outgoings
            .iter()
            .map(|Outgoing::Gossip(bdl)| &bdl.message)
            .collect()
    }
}
