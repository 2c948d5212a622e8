mod bitvec;
pub mod error;
pub mod message;

pub use self::bitvec::BitVec;

use self::error::{Error, Result};
use self::message::Message;
use crate::broadcaster::Broadcaster;
use crate::cluster::Cluster;
use crate::{bundle, InstanceId, NodeId};
use std::collections::BTreeMap;

pub(crate) const MODULE_NAME: &str = "support";

// Support-set aggregation for one instance.
//
// A node broadcasts its own bit-vector once it holds a quorum of certified
// proposals. The OR of the first quorum of vectors received is the support
// set, and it never changes afterwards.
pub(crate) struct Support {
    instance: InstanceId,
    i: NodeId,
    cluster: Cluster,
    own: Option<BitVec>,
    vectors: BTreeMap<NodeId, BitVec>,
    support: Option<BitVec>,
}

impl Support {
    pub fn new(instance: InstanceId, i: NodeId, cluster: Cluster) -> Self {
        Self {
            instance,
            i,
            cluster,
            own: None,
            vectors: BTreeMap::new(),
            support: None,
        }
    }

    /// Broadcasts our bit-vector if we have not yet and `proposers` holds a
    /// quorum of certified proposers.
    pub fn maybe_broadcast_own<'a>(
        &mut self,
        proposers: impl Iterator<Item = &'a NodeId>,
        broadcaster: &mut Broadcaster,
    ) -> Result<()> {
        if self.own.is_some() {
            return Ok(());
        }

        let proposers: Vec<NodeId> = proposers.copied().collect();
        if proposers.len() < self.cluster.quorum() {
            return Ok(());
        }

        let mut bits = BitVec::zeros(self.cluster.size());
        for proposer in proposers {
            match self.cluster.index_of(proposer) {
                Some(index) => bits.set(index),
                None => log::warn!(
                    "[{} {}] certified proposer {} is not a member",
                    self.i,
                    self.instance,
                    proposer
                ),
            }
        }

        log::info!(
            "[{} {}] broadcasting bit-vector {}",
            self.i,
            self.instance,
            bits
        );
        let msg = Message {
            instance: self.instance,
            bits: bits.encode(),
        };
        self.own = Some(bits);
        broadcaster.broadcast(bundle::Message::Support(msg.clone()));
        self.receive_message(self.i, msg)
    }

    pub fn receive_message(&mut self, sender: NodeId, msg: Message) -> Result<()> {
        log::debug!(
            "[{} {}] received bit-vector {} from {}",
            self.i,
            self.instance,
            msg.bits,
            sender
        );

        if msg.instance != self.instance {
            return Err(Error::InvalidMessage(format!(
                "invalid instance. expected: {}, got {}",
                self.instance, msg.instance
            )));
        }
        if !self.cluster.contains(sender) {
            return Err(Error::InvalidMessage(format!("unknown sender {sender}")));
        }

        let bits = BitVec::decode(&msg.bits, self.cluster.size())?;
        if self.vectors.contains_key(&sender) {
            log::trace!("[{} {}] duplicated bit-vector from {}", self.i, self.instance, sender);
            return Ok(());
        }
        self.vectors.insert(sender, bits);

        if self.support.is_none() && self.vectors.len() >= self.cluster.quorum() {
            let mut support = BitVec::zeros(self.cluster.size());
            for bits in self.vectors.values() {
                support.or_assign(bits);
            }
            log::info!(
                "[{} {}] support set ready: {}",
                self.i,
                self.instance,
                support
            );
            self.support = Some(support);
        }
        Ok(())
    }

    pub fn own_vector(&self) -> Option<&BitVec> {
        self.own.as_ref()
    }

    /// The frozen support set, once a quorum of bit-vectors was received.
    pub fn support_set(&self) -> Option<&BitVec> {
        self.support.as_ref()
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }
}
