//! Common coin used by ABBA when main-votes do not agree.
//!
//! A [`CoinScheme`] must give every correct node the same coin for a round,
//! whichever quorum of shares it combines. [`HashCoin`] gets there by handing
//! every member the same share, a hash of the instance and round, so the XOR
//! of any odd quorum is that share. Anybody can predict it. It stands in for a
//! threshold-signature coin: swap in another [`CoinScheme`] to get an
//! unbiased one without touching ABBA.

use crate::hash::Hash32;
use crate::quorum::QuorumStore;
use crate::{InstanceId, NodeId, Round};
use std::collections::BTreeMap;

pub trait CoinScheme: Send + Sync {
    /// The share contributed by `node` for the coin of `(instance, round)`.
    fn make_share(&self, node: NodeId, instance: InstanceId, round: Round) -> bool;

    /// Checks the share `node` sent for `(instance, round)`.
    fn verify_share(
        &self,
        node: NodeId,
        instance: InstanceId,
        round: Round,
        share: bool,
    ) -> bool {
        self.make_share(node, instance, round) == share
    }

    /// Combines a quorum of shares into the coin value.
    fn combine(&self, shares: &[bool]) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HashCoin;

impl CoinScheme for HashCoin {
    fn make_share(&self, _node: NodeId, instance: InstanceId, round: Round) -> bool {
        Hash32::calculate(format!("coin|{instance}|{round}").as_bytes()).low_bit()
    }

    fn combine(&self, shares: &[bool]) -> bool {
        shares.iter().fold(false, |acc, s| acc ^ s)
    }
}

/// Per-instance collection of coin shares.
#[derive(Debug)]
pub struct CoinService {
    shares: QuorumStore<Round, bool>,
    coins: BTreeMap<Round, bool>,
}

impl CoinService {
    pub fn new(threshold: usize) -> Self {
        Self {
            shares: QuorumStore::new(threshold),
            coins: BTreeMap::new(),
        }
    }

    /// Stores the share of `sender` for `round`. Returns the combined coin on
    /// the call that completes the quorum, and `None` on every other call.
    pub fn on_share(
        &mut self,
        scheme: &dyn CoinScheme,
        round: Round,
        sender: NodeId,
        share: bool,
    ) -> Option<bool> {
        if !self.shares.add(round, sender, share).crossed() {
            return None;
        }
        let values: Vec<bool> = self.shares.votes(&round)?.values().copied().collect();
        let coin = scheme.combine(&values);
        self.coins.insert(round, coin);
        Some(coin)
    }

    /// The cached coin of `round`, once a quorum of shares was combined.
    pub fn coin(&self, round: Round) -> Option<bool> {
        self.coins.get(&round).copied()
    }

    pub fn share_count(&self, round: Round) -> usize {
        self.shares.count(&round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeSet;

    #[test]
    fn test_share_is_common_to_all_members() {
        let coin = HashCoin;
        let share = coin.make_share(1, 7, 2);
        for node in 1..8 {
            assert_eq!(coin.make_share(node, 7, 2), share);
            assert!(coin.verify_share(node, 7, 2, share));
            assert!(!coin.verify_share(node, 7, 2, !share));
        }
        let digest = Hash32::calculate(b"coin|7|2");
        assert_eq!(share, digest.low_bit());
    }

    #[quickcheck]
    fn prop_every_quorum_yields_the_same_coin(instance: u64, round: u8, faulty: u8) -> bool {
        let faulty = faulty as usize % 4;
        let (n, q) = (3 * faulty + 1, 2 * faulty + 1);
        let round = round as Round + 1;
        let shares: Vec<bool> = (1..=n)
            .map(|node| HashCoin.make_share(node, instance, round))
            .collect();

        // every window of q consecutive members is a possible first quorum
        let coins: BTreeSet<bool> = (0..=n - q)
            .map(|start| HashCoin.combine(&shares[start..start + q]))
            .collect();
        coins.len() == 1 && coins.contains(&shares[0])
    }

    #[test]
    fn test_combine_once_quorum_reached() {
        let mut service = CoinService::new(3);
        assert_eq!(service.on_share(&HashCoin, 1, 1, true), None);
        assert_eq!(service.on_share(&HashCoin, 1, 2, true), None);
        assert_eq!(service.coin(1), None);
        assert_eq!(service.on_share(&HashCoin, 1, 3, true), Some(true));
        assert_eq!(service.coin(1), Some(true));

        // later shares neither re-combine nor change the cached coin
        assert_eq!(service.on_share(&HashCoin, 1, 4, true), None);
        assert_eq!(service.coin(1), Some(true));
        assert_eq!(service.share_count(1), 4);
    }

    #[test]
    fn test_duplicated_share_is_ignored() {
        let mut service = CoinService::new(2);
        assert_eq!(service.on_share(&HashCoin, 3, 1, true), None);
        assert_eq!(service.on_share(&HashCoin, 3, 1, false), None);
        assert_eq!(service.share_count(3), 1);
        assert_eq!(service.on_share(&HashCoin, 3, 2, false), Some(true));
    }

    #[quickcheck]
    fn prop_combined_coin_is_xor_of_quorum(shares: Vec<bool>) -> bool {
        if shares.is_empty() {
            return true;
        }
        let mut service = CoinService::new(shares.len());
        let mut result = None;
        for (sender, share) in shares.iter().enumerate() {
            if let Some(coin) = service.on_share(&HashCoin, 1, sender, *share) {
                result = Some(coin);
            }
        }
        let expected = shares.iter().filter(|s| **s).count() % 2 == 1;
        result == Some(expected) && service.coin(1) == Some(expected)
    }
}
