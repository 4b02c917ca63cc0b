//! Weighted tally and hammer-threshold arithmetic.
//!
//! Pure functions over a snapshot of the vote map, weight overrides, and
//! love/hate offsets. Nothing here touches the session or the platform.
//!
//! The hammer threshold is `vote_cap + offset` in signed arithmetic: a loved
//! target (+) needs a higher weighted total, a hated target (-) a lower one.
//! A sufficiently hated target can have a threshold of zero or below, in
//! which case the next cast hammers regardless of weight.

use gallows_types::MemberId;
use std::collections::HashMap;

/// Map of votes cast, keyed by target.
pub type VoteMap = HashMap<MemberId, Vec<MemberId>>;

/// Per-voter weight overrides; absent means weight 1.
pub type WeightMap = HashMap<MemberId, u32>;

/// Per-target love/hate offsets; absent means 0.
pub type OffsetMap = HashMap<MemberId, i32>;

/// One target's standing in the tally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TallyLine {
    /// The target (possibly the no-lynch pseudo-target)
    pub target: MemberId,
    /// Voters on this target, in cast order
    pub voters: Vec<MemberId>,
    /// Sum of the voters' weights
    pub weighted_total: i64,
    /// Weighted total required to hammer this target
    pub threshold: i64,
}

/// Sum of vote weights currently on `target`.
pub fn weighted_total(votes: &VoteMap, weights: &WeightMap, target: &MemberId) -> i64 {
    votes
        .get(target)
        .map(|voters| {
            voters
                .iter()
                .map(|v| i64::from(weights.get(v).copied().unwrap_or(1)))
                .sum()
        })
        .unwrap_or(0)
}

/// Weighted total required to hammer a target with the given offset.
pub fn hammer_threshold(vote_cap: u32, offset: i32) -> i64 {
    i64::from(vote_cap) + i64::from(offset)
}

/// Whether `target` has reached its hammer threshold.
pub fn is_at_hammer(
    votes: &VoteMap,
    weights: &WeightMap,
    vote_cap: u32,
    offsets: &OffsetMap,
    target: &MemberId,
) -> bool {
    let offset = offsets.get(target).copied().unwrap_or(0);
    weighted_total(votes, weights, target) >= hammer_threshold(vote_cap, offset)
}

/// Strict-majority vote cap for `n` qualified members.
///
/// Odd `n` needs `(n+1)/2`, even `n` needs `n/2 + 1`; both strictly exceed
/// half of `n`, so two opposing blocs can never both reach the cap.
pub fn majority(qualified: usize) -> u32 {
    let n = qualified as u64;
    let cap = if n % 2 == 1 { (n + 1) / 2 } else { n / 2 + 1 };
    cap.min(u64::from(u32::MAX)) as u32
}

/// Full standings: one line per voted target plus the no-lynch line, sorted
/// by weighted total descending. Ties order the no-lynch line last, then by
/// target id for determinism.
pub fn standings(
    votes: &VoteMap,
    weights: &WeightMap,
    offsets: &OffsetMap,
    vote_cap: u32,
) -> Vec<TallyLine> {
    let mut lines: Vec<TallyLine> = votes
        .iter()
        .map(|(target, voters)| TallyLine {
            target: target.clone(),
            voters: voters.clone(),
            weighted_total: weighted_total(votes, weights, target),
            threshold: hammer_threshold(vote_cap, offsets.get(target).copied().unwrap_or(0)),
        })
        .collect();

    let no_lynch = MemberId::no_lynch();
    if !votes.contains_key(&no_lynch) {
        lines.push(TallyLine {
            target: no_lynch.clone(),
            voters: Vec::new(),
            weighted_total: 0,
            threshold: hammer_threshold(vote_cap, offsets.get(&no_lynch).copied().unwrap_or(0)),
        });
    }

    lines.sort_by(|a, b| {
        b.weighted_total
            .cmp(&a.weighted_total)
            .then_with(|| a.target.is_no_lynch().cmp(&b.target.is_no_lynch()))
            .then_with(|| a.target.0.cmp(&b.target.0))
    });
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallows_types::LynchSession;
    use proptest::prelude::*;

    fn m(id: &str) -> MemberId {
        MemberId::new(id)
    }

    fn votes_for(target: &str, voters: &[&str]) -> VoteMap {
        let mut votes = VoteMap::new();
        votes.insert(m(target), voters.iter().map(|v| m(v)).collect());
        votes
    }

    #[test]
    fn majority_table() {
        assert_eq!(majority(0), 1);
        assert_eq!(majority(1), 1);
        assert_eq!(majority(2), 2);
        assert_eq!(majority(3), 2);
        assert_eq!(majority(4), 3);
        assert_eq!(majority(5), 3);
        assert_eq!(majority(6), 4);
        assert_eq!(majority(11), 6);
        assert_eq!(majority(12), 7);
    }

    #[test]
    fn weighted_total_defaults_to_unit_weight() {
        let votes = votes_for("t", &["a", "b", "c"]);
        assert_eq!(weighted_total(&votes, &WeightMap::new(), &m("t")), 3);
        assert_eq!(weighted_total(&votes, &WeightMap::new(), &m("u")), 0);
    }

    #[test]
    fn weighted_total_sums_overrides() {
        let votes = votes_for("t", &["a", "b"]);
        let mut weights = WeightMap::new();
        weights.insert(m("a"), 3);
        assert_eq!(weighted_total(&votes, &weights, &m("t")), 4);
    }

    #[test]
    fn loved_and_hated_offsets_shift_the_threshold() {
        // cap 5: loved +2 needs 7, hated -2 needs 3
        assert_eq!(hammer_threshold(5, 2), 7);
        assert_eq!(hammer_threshold(5, -2), 3);
        assert_eq!(hammer_threshold(5, 0), 5);

        let votes = votes_for("t", &["a", "b", "c"]);
        let mut offsets = OffsetMap::new();
        offsets.insert(m("t"), -2);
        assert!(is_at_hammer(&votes, &WeightMap::new(), 5, &offsets, &m("t")));

        offsets.insert(m("t"), 2);
        assert!(!is_at_hammer(&votes, &WeightMap::new(), 5, &offsets, &m("t")));
    }

    #[test]
    fn single_weighted_vote_can_hammer_alone() {
        let votes = votes_for("t", &["a"]);
        let mut weights = WeightMap::new();
        weights.insert(m("a"), 3);
        assert!(is_at_hammer(&votes, &weights, 3, &OffsetMap::new(), &m("t")));
    }

    #[test]
    fn deep_hate_drops_threshold_to_nothing() {
        // cap 3, offset -3: threshold 0, even an empty tally is "at hammer"
        assert_eq!(hammer_threshold(3, -3), 0);
        let votes = VoteMap::new();
        let mut offsets = OffsetMap::new();
        offsets.insert(m("t"), -3);
        assert!(is_at_hammer(&votes, &WeightMap::new(), 3, &offsets, &m("t")));
    }

    #[test]
    fn standings_sorted_with_no_lynch_line_present() {
        let mut votes = votes_for("t1", &["a"]);
        votes.insert(m("t2"), vec![m("b"), m("c")]);

        let lines = standings(&votes, &WeightMap::new(), &OffsetMap::new(), 3);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].target, m("t2"));
        assert_eq!(lines[0].weighted_total, 2);
        assert_eq!(lines[1].target, m("t1"));
        // Synthesized no-lynch line trails with zero votes
        assert!(lines[2].target.is_no_lynch());
        assert_eq!(lines[2].weighted_total, 0);
    }

    #[test]
    fn standings_respects_a_no_lynch_offset() {
        let votes = votes_for("0", &["a"]);
        let mut offsets = OffsetMap::new();
        offsets.insert(MemberId::no_lynch(), 1);

        let lines = standings(&votes, &WeightMap::new(), &offsets, 3);
        let no_lynch = lines.iter().find(|l| l.target.is_no_lynch()).unwrap();
        assert_eq!(no_lynch.threshold, 4);
        assert_eq!(no_lynch.weighted_total, 1);
    }

    proptest! {
        /// majority(n) strictly exceeds n/2 while majority(n) - 1 does not.
        #[test]
        fn majority_is_the_least_strict_majority(n in 0usize..100_000) {
            let cap = u64::from(majority(n));
            prop_assert!(cap * 2 > n as u64);
            prop_assert!((cap - 1) * 2 <= n as u64);
        }

        /// Any interleaving of casts and retractions leaves each voter with
        /// at most one live vote.
        #[test]
        fn one_live_vote_per_voter(
            ops in proptest::collection::vec((0u8..2, 0usize..6, 0usize..6), 0..64)
        ) {
            let voters: Vec<MemberId> = (0..6).map(|i| MemberId::new(format!("v{i}"))).collect();
            let targets: Vec<MemberId> = (0..6).map(|i| MemberId::new(format!("t{i}"))).collect();

            let mut session = LynchSession::new();
            session.open(3);
            for (op, voter, target) in ops {
                let voter = &voters[voter];
                match op {
                    // cast: retract-then-record, as the controller does
                    0 => {
                        session.retract_vote(voter);
                        session.record_vote(targets[target].clone(), voter.clone());
                    }
                    _ => {
                        session.retract_vote(voter);
                    }
                }
                for v in &voters {
                    let live = session
                        .votes
                        .values()
                        .filter(|list| list.contains(v))
                        .count();
                    prop_assert!(live <= 1, "voter {v} appears in {live} lists");
                }
            }
        }
    }
}
