use super::message::{Action, MainVoteValue};
use crate::quorum::QuorumStore;
use crate::{NodeId, Round};
use std::collections::BTreeMap;

/// The votes of every round, at most one per sender and kind.
/// Coin shares are kept by the coin service instead.
#[derive(Debug)]
pub(super) struct VoteTable {
    pub pre_process: QuorumStore<Round, bool>,
    pub pre_vote: QuorumStore<Round, bool>,
    pub main_vote: QuorumStore<Round, MainVoteValue>,
    pub decision: QuorumStore<Round, bool>,
}

impl VoteTable {
    pub fn new(threshold: usize) -> Self {
        Self {
            pre_process: QuorumStore::new(threshold),
            pre_vote: QuorumStore::new(threshold),
            main_vote: QuorumStore::new(threshold),
            decision: QuorumStore::new(threshold),
        }
    }

    /// Records the vote of `sender`. Returns false for duplicates and coin
    /// shares.
    pub fn add(&mut self, round: Round, sender: NodeId, action: &Action) -> bool {
        let added = match action {
            Action::PreProcess(v) => self.pre_process.add(round, sender, *v),
            Action::PreVote(v) => self.pre_vote.add(round, sender, *v),
            Action::MainVote(v) => self.main_vote.add(round, sender, *v),
            Action::Decision(v) => self.decision.add(round, sender, *v),
            Action::Coin(_) => return false,
        };
        added.is_new()
    }
}

/// The votes of `round` in `store`, once a quorum of senders voted.
pub(super) fn quorum_votes<V>(
    store: &QuorumStore<Round, V>,
    round: Round,
) -> Option<&BTreeMap<NodeId, V>> {
    if store.has_quorum(&round) {
        store.votes(&round)
    } else {
        None
    }
}

/// Counts the `true` and `false` values of `votes`.
pub(super) fn count_bits<'a>(votes: impl Iterator<Item = &'a bool>) -> (usize, usize) {
    votes.fold((0, 0), |(ones, zeros), v| {
        if *v {
            (ones + 1, zeros)
        } else {
            (ones, zeros + 1)
        }
    })
}
