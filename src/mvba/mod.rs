pub mod error;

use self::error::{Error, Result};
use crate::cluster::Cluster;
use crate::hash::Hash32;
use crate::support::BitVec;
use crate::vcbc::CertifiedProposal;
use crate::{InstanceId, NodeId, Proposal};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PERMUTATION_SALT: &str = "mvba-perm";

/// The output of an MVBA instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub proposer: NodeId,
    pub value: Proposal,
    pub proof: String,
}

/// Computes the proposer order of `instance`. Every node derives the same
/// order from the instance and the sorted member ids.
pub fn compute_permutation(instance: InstanceId, cluster: &Cluster) -> Vec<NodeId> {
    let mut ids = cluster.members().to_vec();
    ids.sort_unstable();

    let nodes: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    let seed = Hash32::calculate(
        format!(
            "{}|inst={}|nodes={}",
            PERMUTATION_SALT,
            instance,
            nodes.join(",")
        )
        .as_bytes(),
    );

    let mut rng = ChaCha20Rng::from_seed(*seed.as_fixed_bytes());
    ids.shuffle(&mut rng);
    ids
}

pub(crate) struct Mvba {
    instance: InstanceId,
    i: NodeId,
    cluster: Cluster,
    permutation: Vec<NodeId>,
    pivot: Option<NodeId>,
    decision: Option<Decision>,
    // set once no proposer matched the decided bit; the support set is
    // frozen, so retrying cannot help
    unmatched: bool,
}

impl Mvba {
    pub fn new(instance: InstanceId, i: NodeId, cluster: Cluster) -> Self {
        let permutation = compute_permutation(instance, &cluster);
        log::debug!("[{} {}] permutation {:?}", i, instance, permutation);
        Self {
            instance,
            i,
            cluster,
            permutation,
            pivot: None,
            decision: None,
            unmatched: false,
        }
    }

    /// Picks the pivot and returns it with the ABBA input bit, the support bit
    /// of the pivot. Returns `None` if we already started.
    pub fn try_start(&mut self, support: &BitVec) -> Result<Option<(NodeId, bool)>> {
        if self.pivot.is_some() {
            return Ok(None);
        }
        let pivot = match self.permutation.first() {
            Some(pivot) => *pivot,
            None => return Ok(None),
        };
        let bit = self
            .cluster
            .index_of(pivot)
            .and_then(|index| support.get(index))
            .ok_or(Error::InvalidPivot(pivot))?;

        log::info!(
            "[{} {}] pivot {} has support bit {}",
            self.i,
            self.instance,
            pivot,
            u8::from(bit)
        );
        self.pivot = Some(pivot);
        Ok(Some((pivot, bit)))
    }

    /// Selects the output once ABBA decided `bit`. The first proposer in the
    /// permutation whose support bit equals `bit` wins, and its certified
    /// proposal is the decision.
    ///
    /// A missing certificate leaves the instance undecided, so it can be
    /// retried when more certified proposals arrive. `NoMatchingProposer` is
    /// reported once, later calls return `Ok(None)`.
    pub fn finalize(
        &mut self,
        bit: bool,
        support: &BitVec,
        certified: &BTreeMap<NodeId, CertifiedProposal>,
    ) -> Result<Option<&Decision>> {
        if self.decision.is_some() || self.unmatched {
            return Ok(None);
        }

        let proposer = match self.select_proposer(bit, support) {
            Some(proposer) => proposer,
            None => {
                self.unmatched = true;
                return Err(Error::NoMatchingProposer(bit));
            }
        };
        let cert = certified
            .get(&proposer)
            .ok_or(Error::MissingCertifiedProposal(proposer))?;

        log::info!(
            "[{} {}] decided proposal of {}: {}",
            self.i,
            self.instance,
            proposer,
            cert.proof
        );
        self.decision = Some(Decision {
            proposer,
            value: cert.value.clone(),
            proof: cert.proof.clone(),
        });
        Ok(self.decision.as_ref())
    }

    pub fn select_proposer(&self, bit: bool, support: &BitVec) -> Option<NodeId> {
        self.permutation.iter().copied().find(|id| {
            self.cluster
                .index_of(*id)
                .and_then(|index| support.get(index))
                == Some(bit)
        })
    }

    pub fn permutation(&self) -> &[NodeId] {
        &self.permutation
    }

    pub fn pivot(&self) -> Option<NodeId> {
        self.pivot
    }

    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }
}

#[cfg(test)]
#[path = "./tests.rs"]
mod tests;
