//! Multi-valued Byzantine agreement for asynchronous networks.
//!
//! One instance runs the whole pipeline:
//!
//! 1. every node c-broadcasts its client value with [`vcbc`] and collects a
//!    quorum certificate for it,
//! 2. once a node holds $2f+1$ certified proposals it broadcasts a bit-vector
//!    of the proposers it knows about, and ORs $2f+1$ such vectors into a
//!    support set ([`support`]),
//! 3. the support bit of a pivot proposer seeds binary agreement ([`abba`]),
//! 4. the agreed bit selects, through a common permutation, the certified
//!    proposal every node outputs ([`mvba`]).
//!
//! [`consensus::Consensus`] is the sans-IO state of one node. [`node::Node`]
//! wraps it for concurrent use over a [`transport::Transport`].

pub mod abba;
pub mod broadcaster;
pub mod bundle;
pub mod cluster;
pub mod coin;
pub mod config;
pub mod consensus;
pub mod error;
pub mod hash;
pub mod mvba;
pub mod node;
pub mod quorum;
pub mod support;
pub mod transport;
pub mod vcbc;

pub use crate::bundle::{Bundle, Message, Outgoing};
pub use crate::cluster::Cluster;
pub use crate::consensus::Consensus;
pub use crate::error::{Error, Result};
pub use crate::node::Node;

pub type NodeId = usize;

/// Identifies one run of the pipeline, usually one client proposal.
pub type InstanceId = u64;

/// ABBA rounds start at one.
pub type Round = usize;

pub type Step = u32;

/// A proposed value, as submitted by a client.
pub type Proposal = Vec<u8>;
