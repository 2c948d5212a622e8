use super::error::Error;
use super::{compute_permutation, Decision, Mvba};
use crate::cluster::Cluster;
use crate::support::BitVec;
use crate::vcbc::CertifiedProposal;
use crate::NodeId;
use quickcheck_macros::quickcheck;
use std::collections::BTreeMap;

fn certified(proposers: &[NodeId]) -> BTreeMap<NodeId, CertifiedProposal> {
    proposers
        .iter()
        .map(|p| {
            (
                *p,
                CertifiedProposal {
                    value: format!("value-{p}").into_bytes(),
                    proof: format!("QC|proposer={p}"),
                },
            )
        })
        .collect()
}

// A support set where exactly `ids` are set
fn support_for(cluster: &Cluster, ids: &[NodeId]) -> BitVec {
    let mut bits = BitVec::zeros(cluster.size());
    for id in ids {
        bits.set(cluster.index_of(*id).unwrap());
    }
    bits
}

#[test]
fn test_permutation_is_shared_by_all_nodes() {
    let cluster = Cluster::with_size(7).unwrap();
    let a = Mvba::new(9, 1, cluster.clone());
    let b = Mvba::new(9, 5, cluster.clone());
    assert_eq!(a.permutation(), b.permutation());
    assert_eq!(a.permutation(), compute_permutation(9, &cluster).as_slice());
}

#[test]
fn test_permutation_depends_on_instance() {
    let cluster = Cluster::with_size(7).unwrap();
    let first = compute_permutation(0, &cluster);
    assert!((1..10).any(|instance| compute_permutation(instance, &cluster) != first));
}

#[quickcheck]
fn prop_permutation_is_a_permutation(n: u8, instance: u64) -> bool {
    let n = (n % 20) as usize + 1;
    let cluster = Cluster::with_size(n).unwrap();
    let mut perm = compute_permutation(instance, &cluster);
    perm.sort_unstable();
    perm == cluster.members()
}

#[test]
fn test_start_once_with_pivot_bit() {
    let cluster = Cluster::with_size(4).unwrap();
    let mut mvba = Mvba::new(1, 1, cluster.clone());
    let pivot = mvba.permutation()[0];

    let support = support_for(&cluster, &[pivot]);
    assert_eq!(mvba.try_start(&support), Ok(Some((pivot, true))));
    assert_eq!(mvba.pivot(), Some(pivot));
    assert_eq!(mvba.try_start(&support), Ok(None));

    let mut other = Mvba::new(1, 2, cluster.clone());
    assert_eq!(
        other.try_start(&BitVec::zeros(cluster.size())),
        Ok(Some((pivot, false)))
    );
}

#[test]
fn test_finalize_picks_first_matching_proposer() {
    let cluster = Cluster::with_size(4).unwrap();
    let mut mvba = Mvba::new(3, 1, cluster.clone());
    let perm = mvba.permutation().to_vec();

    // the pivot is not supported, the second and third proposers are
    let support = support_for(&cluster, &[perm[1], perm[2]]);
    let decision = mvba
        .finalize(true, &support, &certified(&perm))
        .unwrap()
        .cloned();
    assert_eq!(
        decision,
        Some(Decision {
            proposer: perm[1],
            value: format!("value-{}", perm[1]).into_bytes(),
            proof: format!("QC|proposer={}", perm[1]),
        })
    );

    // zero selects the first unsupported proposer
    let mvba = Mvba::new(3, 2, cluster);
    assert_eq!(mvba.select_proposer(false, &support), Some(perm[0]));
}

#[test]
fn test_finalize_retries_after_missing_certificate() {
    let cluster = Cluster::with_size(4).unwrap();
    let mut mvba = Mvba::new(5, 1, cluster.clone());
    let perm = mvba.permutation().to_vec();
    let support = support_for(&cluster, &[perm[0]]);

    assert_eq!(
        mvba.finalize(true, &support, &certified(&[perm[1]])),
        Err(Error::MissingCertifiedProposal(perm[0]))
    );
    assert!(mvba.decision().is_none());

    let decided = mvba
        .finalize(true, &support, &certified(&[perm[0], perm[1]]))
        .unwrap()
        .map(|d| d.proposer);
    assert_eq!(decided, Some(perm[0]));

    // at most once
    assert_eq!(mvba.finalize(true, &support, &certified(&perm)), Ok(None));
    assert_eq!(mvba.decision().map(|d| d.proposer), Some(perm[0]));
}

#[test]
fn test_finalize_without_matching_proposer() {
    let cluster = Cluster::with_size(4).unwrap();
    let mut mvba = Mvba::new(5, 1, cluster.clone());
    let support = BitVec::zeros(cluster.size());

    assert_eq!(
        mvba.finalize(true, &support, &certified(&[1, 2, 3, 4])),
        Err(Error::NoMatchingProposer(true))
    );

    // reported once, then the instance stays quietly undecided
    for _ in 0..3 {
        assert_eq!(
            mvba.finalize(true, &support, &certified(&[1, 2, 3, 4])),
            Ok(None)
        );
    }
    assert!(mvba.decision().is_none());
}
