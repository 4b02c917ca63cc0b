//! The lynch session: the mutable, per-game record of the current vote.
//!
//! This is state plus non-validating primitives. Eligibility checks, hammer
//! evaluation, and side effects all belong to the session controller; the
//! primitives here only keep one invariant: a voter appears in at most one
//! target's list at any time.

use crate::MemberId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-game record of the running (or idle) lynch vote.
///
/// Idle sessions carry no vote cap and no votes; both fields are cleared on
/// every teardown path so nothing survives a resolution or cancellation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LynchSession {
    /// Whether a vote is currently running
    pub running: bool,
    /// Weighted votes required to hammer; present iff running
    pub vote_cap: Option<u32>,
    /// Votes cast, keyed by target; each list is in cast order
    pub votes: HashMap<MemberId, Vec<MemberId>>,
}

impl LynchSession {
    /// Create a new idle session
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the session with the given vote cap
    pub fn open(&mut self, vote_cap: u32) {
        self.running = true;
        self.vote_cap = Some(vote_cap);
    }

    /// Close the session, clearing the running flag and the vote cap
    pub fn close(&mut self) {
        self.running = false;
        self.vote_cap = None;
    }

    /// Append a vote for `target`, creating its list if absent.
    ///
    /// Callers must retract any prior vote by `voter` first; this primitive
    /// records blindly.
    pub fn record_vote(&mut self, target: MemberId, voter: MemberId) {
        self.votes.entry(target).or_default().push(voter);
    }

    /// Remove `voter` from whichever target list contains it.
    ///
    /// Returns the target the vote was retracted from, or `None` if the
    /// member was not voting. Target lists left empty are dropped.
    pub fn retract_vote(&mut self, voter: &MemberId) -> Option<MemberId> {
        let target = self
            .votes
            .iter()
            .find(|(_, voters)| voters.contains(voter))
            .map(|(target, _)| target.clone())?;

        let voters = self.votes.get_mut(&target)?;
        voters.retain(|v| v != voter);
        if voters.is_empty() {
            self.votes.remove(&target);
        }
        Some(target)
    }

    /// Remove every vote cast for `target`, returning how many were dropped
    pub fn clear_target(&mut self, target: &MemberId) -> usize {
        self.votes.remove(target).map(|v| v.len()).unwrap_or(0)
    }

    /// Empty the vote map
    pub fn clear_votes(&mut self) {
        self.votes.clear();
    }

    /// The target `voter` is currently voting for, if any
    pub fn current_vote_of(&self, voter: &MemberId) -> Option<&MemberId> {
        self.votes
            .iter()
            .find(|(_, voters)| voters.contains(voter))
            .map(|(target, _)| target)
    }

    /// Voters currently on `target`, in cast order
    pub fn voters_for(&self, target: &MemberId) -> &[MemberId] {
        self.votes.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `voter` has a live vote on any target
    pub fn is_voting(&self, voter: &MemberId) -> bool {
        self.current_vote_of(voter).is_some()
    }

    /// Total ballots currently cast (unweighted)
    pub fn total_ballots(&self) -> usize {
        self.votes.values().map(Vec::len).sum()
    }
}
