use crate::abba::Abba;
use crate::broadcaster::Broadcaster;
use crate::bundle::{Bundle, Message, Outgoing};
use crate::cluster::Cluster;
use crate::coin::{CoinScheme, HashCoin};
use crate::error::{Error, Result};
use crate::mvba::{self, Decision, Mvba};
use crate::support::{BitVec, Support};
use crate::vcbc::{CertifiedProposal, Vcbc};
use crate::{InstanceId, NodeId, Proposal};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The protocol state of one node across all instances.
///
/// `Consensus` does no I/O. Every input returns the bundles to gossip to the
/// other members; the node already handled them itself.
pub struct Consensus {
    self_id: NodeId,
    cluster: Cluster,
    coin: Arc<dyn CoinScheme>,
    instances: BTreeMap<InstanceId, Instance>,
    broadcaster: Broadcaster,
}

// The per-instance state of every sub-protocol. Created on the first message
// or proposal that names the instance.
struct Instance {
    vcbc: Vcbc,
    support: Support,
    abba: Abba,
    mvba: Mvba,
}

impl Consensus {
    pub fn new(self_id: NodeId, cluster: Cluster) -> Result<Self> {
        Self::with_coin(self_id, cluster, Arc::new(HashCoin))
    }

    pub fn with_coin(
        self_id: NodeId,
        cluster: Cluster,
        coin: Arc<dyn CoinScheme>,
    ) -> Result<Self> {
        if !cluster.contains(self_id) {
            return Err(Error::NotMember(self_id));
        }
        Ok(Self {
            self_id,
            cluster,
            coin,
            instances: BTreeMap::new(),
            broadcaster: Broadcaster::new(self_id),
        })
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// Handles a client proposal for `instance`.
    ///
    /// Invalid proposals are returned as errors. The server answers them with
    /// [`Reply::Rejected`](crate::transport::Reply::Rejected).
    pub fn propose(&mut self, instance: InstanceId, value: Proposal) -> Result<Vec<Outgoing>> {
        let (inst, broadcaster) = self.instance_mut(instance);
        if let Err(err) = inst.vcbc.propose(value, broadcaster) {
            // a rejected proposal broadcasts nothing
            self.broadcaster.take_outgoings();
            return Err(err.into());
        }
        self.reevaluate(instance);
        Ok(self.broadcaster.take_outgoings())
    }

    /// Handles a bundle gossiped by a peer.
    ///
    /// Malformed messages are logged and dropped. They never fail the call.
    pub fn process_bundle(&mut self, bundle: &Bundle) -> Result<Vec<Outgoing>> {
        let sender = bundle.initiator;
        let instance = bundle.message.instance();

        if !self.cluster.contains(sender) {
            log::warn!(
                "[{} {}] dropping {} message from unknown sender {}",
                self.self_id,
                instance,
                bundle.message.module(),
                sender
            );
            return Ok(vec![]);
        }

        let (inst, broadcaster) = self.instance_mut(instance);
        let result = match bundle.message.clone() {
            Message::Vcbc(msg) => inst
                .vcbc
                .receive_message(sender, msg, broadcaster)
                .map_err(Error::from),
            Message::Support(msg) => inst.support.receive_message(sender, msg).map_err(Error::from),
            Message::Abba(msg) => inst
                .abba
                .receive_message(sender, msg, broadcaster)
                .map_err(Error::from),
        };
        if let Err(err) = result {
            log::warn!(
                "[{} {}] dropping {} message from {}: {}",
                self.self_id,
                instance,
                bundle.message.module(),
                sender,
                err
            );
        }

        self.reevaluate(instance);
        Ok(self.broadcaster.take_outgoings())
    }

    /// The output of `instance`, once decided.
    pub fn decision(&self, instance: InstanceId) -> Option<&Decision> {
        self.instances.get(&instance)?.mvba.decision()
    }

    /// The bit ABBA agreed on for `instance`.
    pub fn abba_decision(&self, instance: InstanceId) -> Option<bool> {
        self.instances.get(&instance)?.abba.decided_value()
    }

    pub fn support_set(&self, instance: InstanceId) -> Option<&BitVec> {
        self.instances.get(&instance)?.support.support_set()
    }

    pub fn certified_proposals(
        &self,
        instance: InstanceId,
    ) -> Option<&BTreeMap<NodeId, CertifiedProposal>> {
        self.instances.get(&instance).map(|inst| inst.vcbc.certified())
    }

    pub fn pivot(&self, instance: InstanceId) -> Option<NodeId> {
        self.instances.get(&instance)?.mvba.pivot()
    }

    pub fn instances(&self) -> impl Iterator<Item = &InstanceId> {
        self.instances.keys()
    }

    fn instance_mut(&mut self, instance: InstanceId) -> (&mut Instance, &mut Broadcaster) {
        let Self {
            self_id,
            cluster,
            coin,
            instances,
            broadcaster,
        } = self;
        let inst = instances
            .entry(instance)
            .or_insert_with(|| Instance::new(instance, *self_id, cluster, coin.clone()));
        (inst, broadcaster)
    }

    fn reevaluate(&mut self, instance: InstanceId) {
        let Some(inst) = self.instances.get_mut(&instance) else {
            return;
        };
        match inst.reevaluate(&mut self.broadcaster) {
            Ok(()) => {}
            // the certificate may still be in flight
            Err(Error::Mvba(mvba::error::Error::MissingCertifiedProposal(proposer))) => {
                log::debug!(
                    "[{} {}] waiting for the certified proposal of {}",
                    self.self_id,
                    instance,
                    proposer
                );
            }
            Err(err) => log::warn!("[{} {}] {}", self.self_id, instance, err),
        }
    }
}

impl Instance {
    fn new(id: InstanceId, self_id: NodeId, cluster: &Cluster, coin: Arc<dyn CoinScheme>) -> Self {
        log::debug!("[{} {}] new instance", self_id, id);
        Self {
            vcbc: Vcbc::new(id, self_id, cluster.quorum()),
            support: Support::new(id, self_id, cluster.clone()),
            abba: Abba::new(id, self_id, cluster.quorum(), coin),
            mvba: Mvba::new(id, self_id, cluster.clone()),
        }
    }

    // Moves the pipeline forward as far as the current state allows:
    // certified proposals feed our bit-vector, the support set starts ABBA,
    // and the ABBA decision selects the output.
    fn reevaluate(&mut self, broadcaster: &mut Broadcaster) -> Result<()> {
        self.support
            .maybe_broadcast_own(self.vcbc.certified().keys(), broadcaster)?;

        let support = match self.support.support_set() {
            Some(support) => support.clone(),
            None => return Ok(()),
        };

        if let Some((pivot, bit)) = self.mvba.try_start(&support)? {
            self.abba
                .start(bit, format!("pivot={pivot}"), broadcaster)?;
        }

        if let Some(bit) = self.abba.decided_value() {
            self.mvba.finalize(bit, &support, self.vcbc.certified())?;
        }
        Ok(())
    }
}
