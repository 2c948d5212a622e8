use crate::bundle::Outgoing;
use crate::consensus::Consensus;
use crate::error::Result;
use crate::mvba::Decision;
use crate::transport::{Frame, Transport};
use crate::{InstanceId, NodeId, Proposal};
use futures::future::join_all;
use parking_lot::Mutex;

/// A [`Consensus`] that can be shared between tasks.
///
/// Frames are processed under the lock and the resulting bundles are sent
/// after releasing it, so the lock is never held across an await.
pub struct Node<T: Transport> {
    id: NodeId,
    peers: Vec<NodeId>,
    consensus: Mutex<Consensus>,
    transport: T,
}

impl<T: Transport> Node<T> {
    pub fn new(consensus: Consensus, transport: T) -> Self {
        let id = consensus.self_id();
        let peers = consensus
            .cluster()
            .members()
            .iter()
            .copied()
            .filter(|member| *member != id)
            .collect();
        Self {
            id,
            peers,
            consensus: Mutex::new(consensus),
            transport,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Processes `frame` and sends the resulting bundles to every peer.
    pub async fn handle(&self, frame: Frame) -> Result<()> {
        let outgoings = self.process(frame)?;
        self.dispatch(outgoings).await;
        Ok(())
    }

    pub async fn propose(&self, instance: InstanceId, value: Proposal) -> Result<()> {
        self.handle(Frame::Propose { instance, value }).await
    }

    /// Runs `frame` through the protocol without sending anything.
    pub fn process(&self, frame: Frame) -> Result<Vec<Outgoing>> {
        let mut consensus = self.consensus.lock();
        match frame {
            Frame::Propose { instance, value } => consensus.propose(instance, value),
            Frame::Bundle(bundle) => consensus.process_bundle(&bundle),
        }
    }

    pub fn decision(&self, instance: InstanceId) -> Option<Decision> {
        self.consensus.lock().decision(instance).cloned()
    }

    pub fn abba_decision(&self, instance: InstanceId) -> Option<bool> {
        self.consensus.lock().abba_decision(instance)
    }

    /// Runs `f` on the protocol state, under the lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&Consensus) -> R) -> R {
        f(&self.consensus.lock())
    }

    /// Sends every bundle to all peers at once, in order. Failures are per
    /// peer and never abort the rest of the broadcast.
    pub async fn dispatch(&self, outgoings: Vec<Outgoing>) {
        for Outgoing::Gossip(bundle) in outgoings {
            let bundle = &bundle;
            let sends = self.peers.iter().map(|peer| async move {
                if let Err(err) = self.transport.send(*peer, bundle).await {
                    log::warn!(
                        "[{} {}] failed to send {} message to {}: {}",
                        self.id,
                        bundle.message.instance(),
                        bundle.message.module(),
                        peer,
                        err
                    );
                }
            });
            join_all(sends).await;
        }
    }
}
