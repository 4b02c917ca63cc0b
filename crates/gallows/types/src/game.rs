//! The per-game record: who may vote, where, and under what modifiers.
//!
//! This is the canonical persisted aggregate. It stores membership of the
//! engine's own sets (voter roles, exceptions, channels, weights, love/hate
//! offsets) plus the embedded lynch session. It does NOT resolve live role
//! membership; that is the roster resolver's job against the platform.

use crate::{
    ChannelId, GallowsError, GallowsResult, GameId, LynchSession, MemberId, VoterRole,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Which of the three channel sets a binding belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Channels voting is restricted to (empty set = vote anywhere)
    Voting,
    /// Destinations for public vote-progress announcements
    Update,
    /// Destinations for the post-resolution host breakdown
    Host,
}

/// Everything the engine persists for one game
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRecord {
    /// The game this record belongs to
    pub id: GameId,
    /// Role groups whose members may vote and be voted for
    pub voter_roles: Vec<VoterRole>,
    /// Members who may not cast votes despite role membership
    pub voting_exceptions: HashSet<MemberId>,
    /// Members who may not be targeted despite role membership
    pub voteable_exceptions: HashSet<MemberId>,
    /// Channels voting is restricted to; empty means any channel
    pub voting_channels: HashSet<ChannelId>,
    /// Channels receiving public announcements
    pub update_channels: HashSet<ChannelId>,
    /// Channels receiving the final host report
    pub host_channels: HashSet<ChannelId>,
    /// Per-voter weight overrides; absent means weight 1
    pub vote_weights: HashMap<MemberId, u32>,
    /// Per-target loved/hated offsets; absent means 0, never stored at 0
    pub love_hate: HashMap<MemberId, i32>,
    /// The current vote, created idle at game creation
    pub session: LynchSession,
    /// When the game record was created
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl GameRecord {
    /// Create an empty record with an idle session
    pub fn new(id: GameId) -> Self {
        let now = Utc::now();
        Self {
            id,
            voter_roles: Vec::new(),
            voting_exceptions: HashSet::new(),
            voteable_exceptions: HashSet::new(),
            voting_channels: HashSet::new(),
            update_channels: HashSet::new(),
            host_channels: HashSet::new(),
            vote_weights: HashMap::new(),
            love_hate: HashMap::new(),
            session: LynchSession::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // --- Voter roles ---

    /// Bind a voter role; duplicates are rejected
    pub fn add_voter_role(&mut self, role: VoterRole) -> GallowsResult<()> {
        if self.voter_roles.contains(&role) {
            return Err(GallowsError::DuplicateVoterRole(role));
        }
        self.voter_roles.push(role);
        self.touch();
        Ok(())
    }

    /// Unbind a voter role
    pub fn remove_voter_role(&mut self, role: &VoterRole) -> GallowsResult<()> {
        if !self.voter_roles.contains(role) {
            return Err(GallowsError::VoterRoleNotBound(role.clone()));
        }
        self.voter_roles.retain(|r| r != role);
        self.touch();
        Ok(())
    }

    // --- Channel sets ---

    fn channel_set_mut(&mut self, kind: ChannelKind) -> &mut HashSet<ChannelId> {
        match kind {
            ChannelKind::Voting => &mut self.voting_channels,
            ChannelKind::Update => &mut self.update_channels,
            ChannelKind::Host => &mut self.host_channels,
        }
    }

    /// The channel set for `kind`
    pub fn channel_set(&self, kind: ChannelKind) -> &HashSet<ChannelId> {
        match kind {
            ChannelKind::Voting => &self.voting_channels,
            ChannelKind::Update => &self.update_channels,
            ChannelKind::Host => &self.host_channels,
        }
    }

    /// Bind a channel into one of the three sets; duplicates are rejected
    pub fn bind_channel(&mut self, kind: ChannelKind, channel: ChannelId) -> GallowsResult<()> {
        if !self.channel_set_mut(kind).insert(channel.clone()) {
            return Err(GallowsError::DuplicateChannel(channel));
        }
        self.touch();
        Ok(())
    }

    /// Unbind a channel from one of the three sets
    pub fn unbind_channel(&mut self, kind: ChannelKind, channel: &ChannelId) -> GallowsResult<()> {
        if !self.channel_set_mut(kind).remove(channel) {
            return Err(GallowsError::ChannelNotBound(channel.clone()));
        }
        self.touch();
        Ok(())
    }

    /// Whether `channel` may carry votes. An empty voting set means voting
    /// is allowed anywhere.
    pub fn may_vote_in(&self, channel: &ChannelId) -> bool {
        self.voting_channels.is_empty() || self.voting_channels.contains(channel)
    }

    // --- Exception lists ---

    /// Bar a member from casting votes. Retroactive retraction of a live
    /// vote is the controller's responsibility.
    pub fn add_voting_exception(&mut self, member: MemberId) -> GallowsResult<()> {
        if member.is_no_lynch() {
            return Err(GallowsError::ReservedMemberId(member));
        }
        if !self.voting_exceptions.insert(member.clone()) {
            return Err(GallowsError::DuplicateException(member));
        }
        self.touch();
        Ok(())
    }

    pub fn remove_voting_exception(&mut self, member: &MemberId) -> GallowsResult<()> {
        if !self.voting_exceptions.remove(member) {
            return Err(GallowsError::ExceptionNotFound(member.clone()));
        }
        self.touch();
        Ok(())
    }

    /// Bar a member from being targeted. Retroactive clearing of votes cast
    /// for the member is the controller's responsibility.
    pub fn add_voteable_exception(&mut self, member: MemberId) -> GallowsResult<()> {
        if member.is_no_lynch() {
            return Err(GallowsError::ReservedMemberId(member));
        }
        if !self.voteable_exceptions.insert(member.clone()) {
            return Err(GallowsError::DuplicateException(member));
        }
        self.touch();
        Ok(())
    }

    pub fn remove_voteable_exception(&mut self, member: &MemberId) -> GallowsResult<()> {
        if !self.voteable_exceptions.remove(member) {
            return Err(GallowsError::ExceptionNotFound(member.clone()));
        }
        self.touch();
        Ok(())
    }

    // --- Vote weights ---

    /// Weight of a voter's ballot; 1 unless overridden
    pub fn weight_of(&self, member: &MemberId) -> u32 {
        self.vote_weights.get(member).copied().unwrap_or(1)
    }

    /// Set a weight override, replacing any existing one. Zero is rejected;
    /// clear the override instead.
    pub fn set_vote_weight(&mut self, member: MemberId, weight: u32) -> GallowsResult<()> {
        if member.is_no_lynch() {
            return Err(GallowsError::ReservedMemberId(member));
        }
        if weight == 0 {
            return Err(GallowsError::InvalidWeight(weight));
        }
        self.vote_weights.insert(member, weight);
        self.touch();
        Ok(())
    }

    /// Return a voter to the default weight; no-op if not overridden
    pub fn clear_vote_weight(&mut self, member: &MemberId) {
        if self.vote_weights.remove(member).is_some() {
            self.touch();
        }
    }

    // --- Love/hate offsets ---

    /// Signed hammer-threshold offset for a target; 0 unless modified
    pub fn love_hate_of(&self, target: &MemberId) -> i32 {
        self.love_hate.get(target).copied().unwrap_or(0)
    }

    /// Add one loved point (+1), accumulating onto any existing offset.
    /// The no-lynch pseudo-target may carry an offset of its own.
    pub fn add_love(&mut self, target: MemberId) {
        self.shift_love_hate(target, 1);
    }

    /// Add one hated point (-1)
    pub fn add_hate(&mut self, target: MemberId) {
        self.shift_love_hate(target, -1);
    }

    fn shift_love_hate(&mut self, target: MemberId, delta: i32) {
        let offset = self.love_hate.entry(target.clone()).or_insert(0);
        *offset += delta;
        // An offset back at 0 is deleted, not stored
        if *offset == 0 {
            self.love_hate.remove(&target);
        }
        self.touch();
    }

    /// Drop a target's offset entirely; no-op if absent
    pub fn clear_love_hate(&mut self, target: &MemberId) {
        if self.love_hate.remove(target).is_some() {
            self.touch();
        }
    }
}
