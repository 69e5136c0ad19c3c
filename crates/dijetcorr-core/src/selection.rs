//! Greedy, conflict-free selection of back-to-back jet pairs.
//!
//! All admissible pairs are ranked by how close they are to perfectly
//! back-to-back, then accepted in that order as long as neither jet has been
//! claimed by an earlier pair. This is a cheap deterministic approximation,
//! not an optimal matching. Pairs with equal closeness keep their discovery
//! order, so the result is only as deterministic as the order of the input
//! jets.

use std::f64::consts::PI;

use serde::Serialize;

use crate::event::JetCandidate;
use crate::kinematics::delta_phi;

/// Default back-to-back requirement on |Δφ|.
pub const DEFAULT_MIN_DPHI: f64 = 0.75 * PI;

/// One selected dijet. `lead` and `sub` index the jet slice given to
/// [`select_dijets`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DijetPair {
    pub lead: usize,
    pub sub: usize,
    /// |Δφ| between the two jets, in [0, π].
    pub dphi: f64,
    /// π − dphi. Zero means perfectly back-to-back.
    pub closeness: f64,
}

/// Every unordered pair with `|Δφ| >= min_dphi`, in discovery order.
pub fn candidate_pairs(jets: &[JetCandidate], min_dphi: f64) -> Vec<DijetPair> {
    let mut pairs = Vec::new();
    for i in 0..jets.len() {
        for j in (i + 1)..jets.len() {
            let dphi = delta_phi(jets[i].phi, jets[j].phi).abs();
            if dphi < min_dphi {
                continue;
            }
            let (lead, sub) = if jets[j].pt > jets[i].pt {
                (j, i)
            } else {
                (i, j)
            };
            pairs.push(DijetPair {
                lead,
                sub,
                dphi,
                closeness: PI - dphi,
            });
        }
    }
    pairs
}

/// Select a pairwise-disjoint set of back-to-back dijets for one event.
pub fn select_dijets(jets: &[JetCandidate], min_dphi: f64) -> Vec<DijetPair> {
    if jets.len() < 2 {
        return Vec::new();
    }

    let mut pairs = candidate_pairs(jets, min_dphi);
    // sort_by is stable: equal closeness keeps discovery order.
    pairs.sort_by(|a, b| a.closeness.total_cmp(&b.closeness));

    let mut claimed = vec![false; jets.len()];
    let mut chosen = Vec::with_capacity(pairs.len().min(jets.len() / 2));
    for pair in pairs {
        if claimed[pair.lead] || claimed[pair.sub] {
            continue;
        }
        claimed[pair.lead] = true;
        claimed[pair.sub] = true;
        chosen.push(pair);
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jet(pt: f64, phi: f64) -> JetCandidate {
        JetCandidate {
            pt,
            eta: 0.0,
            phi,
            constituents: Vec::new(),
        }
    }

    fn assert_disjoint(pairs: &[DijetPair]) {
        let mut seen = std::collections::HashSet::new();
        for p in pairs {
            assert!(seen.insert(p.lead), "jet {} used twice", p.lead);
            assert!(seen.insert(p.sub), "jet {} used twice", p.sub);
        }
    }

    #[test]
    fn fewer_than_two_jets_yield_nothing() {
        assert!(select_dijets(&[], DEFAULT_MIN_DPHI).is_empty());
        assert!(select_dijets(&[jet(10.0, 0.0)], DEFAULT_MIN_DPHI).is_empty());
    }

    #[test]
    fn single_back_to_back_pair() {
        let jets = vec![jet(5.0, 0.1), jet(8.0, 0.1 + PI - 0.2)];
        let pairs = select_dijets(&jets, DEFAULT_MIN_DPHI);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].lead, 1);
        assert_eq!(pairs[0].sub, 0);
        assert!((pairs[0].closeness - 0.2).abs() < 1e-12);
    }

    #[test]
    fn pair_below_threshold_is_dropped() {
        let jets = vec![jet(5.0, 0.0), jet(5.0, PI / 2.0)];
        assert!(select_dijets(&jets, DEFAULT_MIN_DPHI).is_empty());
    }

    #[test]
    fn three_mutually_back_to_back_jets_give_one_pair() {
        // Threshold low enough that every pair qualifies.
        let jets = vec![
            jet(10.0, 0.0),
            jet(9.0, 2.0 * PI / 3.0),
            jet(8.0, -2.0 * PI / 3.0 + 0.01),
        ];
        let pairs = select_dijets(&jets, PI / 2.0);
        assert_eq!(pairs.len(), 1);
        assert_disjoint(&pairs);
    }

    #[test]
    fn closest_pair_wins_conflict() {
        // Jet 0 is back-to-back with both 1 and 2; 0-2 is closer.
        let jets = vec![jet(20.0, 0.0), jet(15.0, PI - 0.3), jet(12.0, -PI + 0.05)];
        let pairs = select_dijets(&jets, DEFAULT_MIN_DPHI);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].lead, pairs[0].sub), (0, 2));
    }

    #[test]
    fn two_independent_dijets_in_one_event() {
        let jets = vec![
            jet(30.0, 0.0),
            jet(25.0, PI - 0.05),
            jet(10.0, 1.0),
            jet(9.0, 1.0 - PI + 0.1),
        ];
        let pairs = select_dijets(&jets, DEFAULT_MIN_DPHI);
        assert_eq!(pairs.len(), 2);
        assert_disjoint(&pairs);
        assert_eq!((pairs[0].lead, pairs[0].sub), (0, 1));
        assert_eq!((pairs[1].lead, pairs[1].sub), (2, 3));
    }

    #[test]
    fn equal_closeness_keeps_discovery_order() {
        // (0,1) and (0,2) both exactly back-to-back; (0,1) is found first.
        let jets = vec![jet(10.0, 0.0), jet(5.0, PI), jet(6.0, PI)];
        let pairs = select_dijets(&jets, DEFAULT_MIN_DPHI);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].lead, pairs[0].sub), (0, 1));
    }

    #[test]
    fn lead_has_higher_pt_and_closeness_in_range() {
        let jets: Vec<JetCandidate> = (0..12)
            .map(|i| jet(3.0 + (i * 7 % 11) as f64, i as f64 * 0.9))
            .collect();
        let pairs = select_dijets(&jets, DEFAULT_MIN_DPHI);
        assert!(!pairs.is_empty());
        assert_disjoint(&pairs);
        for p in &pairs {
            assert!(jets[p.lead].pt >= jets[p.sub].pt);
            assert!((0.0..=PI).contains(&p.closeness));
            assert!((0.0..=PI).contains(&p.dphi));
        }
    }

    #[test]
    fn candidate_pairs_respects_threshold() {
        let jets = vec![jet(5.0, 0.0), jet(4.0, PI), jet(3.0, 0.1)];
        let pairs = candidate_pairs(&jets, DEFAULT_MIN_DPHI);
        // (0,1) and (1,2) qualify; (0,2) does not.
        assert_eq!(pairs.len(), 2);
    }
}
