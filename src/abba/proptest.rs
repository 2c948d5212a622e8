use super::message::{Action, MainVoteValue, Message as AbbaMessage};
use super::Abba;
use crate::broadcaster::Broadcaster;
use crate::bundle::{Bundle, Message, Outgoing};
use crate::cluster::Cluster;
use crate::coin::{CoinScheme, HashCoin};
use crate::NodeId;
use quickcheck_macros::quickcheck;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const INSTANCE: u64 = 11;
const MAX_DELIVERIES: usize = 200_000;

struct Net {
    nodes: BTreeMap<NodeId, (Abba, Broadcaster)>,
    silent: BTreeSet<NodeId>,
    queue: Vec<(NodeId, Bundle)>,
    rng: StdRng,
}

impl Net {
    fn new(n: usize, silent: usize, seed: u64) -> Self {
        let cluster = Cluster::with_size(n).unwrap();
        let coin = Arc::new(HashCoin);
        let nodes = BTreeMap::from_iter(cluster.members().iter().map(|id| {
            let abba = Abba::new(INSTANCE, *id, cluster.quorum(), coin.clone());
            (*id, (abba, Broadcaster::new(*id)))
        }));
        // the last `silent` members neither send nor receive
        let silent = cluster.members().iter().rev().take(silent).copied().collect();

        Net {
            nodes,
            silent,
            queue: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn honest(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|id| !self.silent.contains(id))
            .copied()
            .collect()
    }

    fn node_mut(&mut self, id: NodeId) -> &mut (Abba, Broadcaster) {
        self.nodes.get_mut(&id).unwrap()
    }

    fn enqueue_bundles_from(&mut self, id: NodeId) {
        let outgoings = self.node_mut(id).1.take_outgoings();
        for Outgoing::Gossip(bundle) in outgoings {
            for recipient in self.honest() {
                if recipient != bundle.initiator {
                    self.queue.push((recipient, bundle.clone()));
                }
            }
        }
    }

    // Delivers queued bundles in random order until the queue is empty.
    fn drain_queue(&mut self) {
        let mut deliveries = 0;
        while !self.queue.is_empty() && deliveries < MAX_DELIVERIES {
            let index = self.rng.gen_range(0, self.queue.len());
            let (recipient, bundle) = self.queue.swap_remove(index);
            let (abba, broadcaster) = self.node_mut(recipient);
            let msg = match bundle.message {
                Message::Abba(msg) => msg,
                other => panic!("unexpected message {other:?}"),
            };
            abba.receive_message(bundle.initiator, msg, broadcaster)
                .unwrap();
            self.enqueue_bundles_from(recipient);
            deliveries += 1;
        }
    }
}

fn run(n: usize, silent: usize, inputs: &[bool], seed: u64) -> Net {
    let mut net = Net::new(n, silent, seed);
    for id in net.honest() {
        let input = inputs.get(id - 1).copied().unwrap_or(true);
        let (abba, broadcaster) = net.node_mut(id);
        abba.start(input, String::new(), broadcaster).unwrap();
        net.enqueue_bundles_from(id);
    }
    net.drain_queue();
    net
}

#[quickcheck]
fn prop_honest_nodes_agree(n: u8, crash: bool, inputs: Vec<bool>, seed: u64) -> bool {
    let n = (n % 7) as usize + 1;
    let silent = if crash { (n - 1) / 3 } else { 0 };
    let net = run(n, silent, &inputs, seed);

    let decisions: BTreeSet<Option<bool>> = net
        .honest()
        .iter()
        .map(|id| net.nodes[id].0.decided_value())
        .collect();

    decisions.len() == 1 && !decisions.contains(&None)
}

#[quickcheck]
fn prop_unanimous_input_is_decided(n: u8, input: bool, seed: u64) -> bool {
    let n = (n % 7) as usize + 1;
    let net = run(n, 0, &vec![input; n], seed);

    net.honest()
        .iter()
        .all(|id| net.nodes[id].0.decided_value() == Some(input))
}

#[test]
fn test_split_inputs_decide_with_one_silent_node() {
    for seed in 0..20 {
        let net = run(4, 1, &[true, false, true, false], seed);
        let first = net.nodes[&1].0.decided_value();
        assert!(first.is_some());
        for id in net.honest() {
            assert_eq!(net.nodes[&id].0.decided_value(), first);
        }
    }
}

// Round one pre-votes split two against two, so no value reaches the quorum,
// every main-vote abstains and round two follows the common coin.
#[quickcheck]
fn prop_all_abstain_round_follows_common_coin(seed: u64) -> bool {
    let mut net = Net::new(4, 0, seed);
    let split = [(1, true), (2, true), (3, false), (4, false)];
    for id in net.honest() {
        let (abba, broadcaster) = net.node_mut(id);
        for (voter, vote) in split {
            let msg = AbbaMessage {
                instance: INSTANCE,
                round: 1,
                action: Action::PreVote(vote),
                justification: String::new(),
            };
            abba.receive_message(voter, msg, broadcaster).unwrap();
        }
        net.enqueue_bundles_from(id);
    }
    net.drain_queue();

    let coin = HashCoin.make_share(1, INSTANCE, 1);
    net.honest().iter().all(|id| {
        let abba = &net.nodes[id].0;
        let all_abstain = abba
            .main_votes(1)
            .map(|votes| votes.values().all(|m| *m == MainVoteValue::Abstain))
            .unwrap_or(false);
        // a node that adopted a peer's decision may never pre-vote in round two
        let round_two_follows_coin = abba
            .pre_votes(2)
            .map(|votes| votes.values().all(|v| *v == coin))
            .unwrap_or(true);
        all_abstain && round_two_follows_coin && abba.decided_value() == Some(coin)
    })
}
