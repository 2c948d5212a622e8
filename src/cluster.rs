use crate::error::{Error, Result};
use crate::NodeId;
use std::collections::BTreeMap;

/// The fixed membership every node agrees on before any instance runs.
///
/// There are $n$ parties, $f$ of which may be corrupted, and the protocol
/// is reliable for $n > 3f$. The quorum $q = 2f + 1$ is derived once here
/// and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    members: Vec<NodeId>,
    indices: BTreeMap<NodeId, usize>,
    faulty: usize,
}

impl Cluster {
    /// `members` is the ordered id list shared by every node. Position in
    /// this list is the bit-vector index of the member.
    ///
    /// `max_faulty` is capped at $\lfloor (n-1)/3 \rfloor$.
    pub fn new(members: Vec<NodeId>, max_faulty: usize) -> Result<Self> {
        if members.is_empty() {
            return Err(Error::Config("cluster has no members".to_string()));
        }

        let mut indices = BTreeMap::new();
        for (index, id) in members.iter().enumerate() {
            if indices.insert(*id, index).is_some() {
                return Err(Error::Config(format!("duplicated member id {id}")));
            }
        }

        let faulty = max_faulty.min((members.len() - 1) / 3);
        Ok(Self {
            members,
            indices,
            faulty,
        })
    }

    /// Members `1..=n` tolerating the largest possible $f$.
    pub fn with_size(n: usize) -> Result<Self> {
        Self::new((1..=n).collect(), usize::MAX)
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn faulty(&self) -> usize {
        self.faulty
    }

    pub fn quorum(&self) -> usize {
        2 * self.faulty + 1
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.indices.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.indices.contains_key(&id)
    }
}
