//! Roster resolution: who may vote, who may be voted for, how many count.
//!
//! Role membership is resolved live against the platform on every check
//! rather than cached; stale bindings (deleted roles, channels, members) are
//! reconciled lazily by [`RosterResolver::prune`] on the controller's read
//! paths, so no per-game event listeners are needed.

use crate::gateway::{reference_is_dead, ChannelGateway, GatewayError, RoleMembership};
use gallows_types::{ChannelKind, GameRecord, MemberId, VoterRole};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves eligibility against live role membership and the game's
/// exception lists.
pub struct RosterResolver {
    membership: Arc<dyn RoleMembership>,
}

impl RosterResolver {
    pub fn new(membership: Arc<dyn RoleMembership>) -> Self {
        Self { membership }
    }

    /// Whether `member` may cast votes: holds at least one bound voter role
    /// and is not voting-excepted.
    pub async fn is_eligible_voter(&self, record: &GameRecord, member: &MemberId) -> bool {
        if record.voting_exceptions.contains(member) {
            return false;
        }
        self.holds_any_role(record, member).await
    }

    /// Whether `member` may be targeted: holds at least one bound voter role
    /// and is not voteable-excepted.
    pub async fn is_eligible_target(&self, record: &GameRecord, member: &MemberId) -> bool {
        if record.voteable_exceptions.contains(member) {
            return false;
        }
        self.holds_any_role(record, member).await
    }

    /// Whether any member at all currently holds a bound voter role.
    ///
    /// Exception lists are deliberately NOT consulted: a game whose every
    /// role member is voting-excepted still counts as having members. This
    /// mirrors the start-vote precondition exactly.
    pub async fn any_role_member_exists(&self, record: &GameRecord) -> bool {
        for role in &record.voter_roles {
            if !self.members_or_empty(role).await.is_empty() {
                return true;
            }
        }
        false
    }

    /// Deduplicated count of members across all bound voter roles, ignoring
    /// exception lists. Used only to size the majority cap; a counted member
    /// may still be unable to vote.
    pub async fn qualified_member_count(&self, record: &GameRecord) -> usize {
        let mut seen: HashSet<MemberId> = HashSet::new();
        for role in &record.voter_roles {
            seen.extend(self.members_or_empty(role).await);
        }
        seen.len()
    }

    async fn holds_any_role(&self, record: &GameRecord, member: &MemberId) -> bool {
        for role in &record.voter_roles {
            if self.members_or_empty(role).await.contains(member) {
                return true;
            }
        }
        false
    }

    /// Membership of one role, treating any collaborator failure as an
    /// empty roster for this check. Reads must never block on the platform.
    async fn members_or_empty(&self, role: &VoterRole) -> Vec<MemberId> {
        match self.membership.members_of(role).await {
            Ok(members) => members,
            Err(GatewayError::NotFound(_)) => Vec::new(),
            Err(err) => {
                warn!(role = %role, error = %err, "role membership lookup failed");
                Vec::new()
            }
        }
    }

    /// Drop bindings whose referent no longer exists: voter roles, channels
    /// in all three sets, and exception/weight/offset entries for deleted
    /// members. Idempotent; lookup failures leave the entry in place.
    ///
    /// Returns whether the record was modified.
    pub async fn prune(&self, record: &mut GameRecord, channels: &dyn ChannelGateway) -> bool {
        let mut changed = false;

        let roles = record.voter_roles.clone();
        for role in roles {
            if reference_is_dead(self.membership.role_exists(&role).await) {
                debug!(game = %record.id, role = %role, "pruning deleted voter role");
                record.voter_roles.retain(|r| *r != role);
                changed = true;
            }
        }

        for kind in [ChannelKind::Voting, ChannelKind::Update, ChannelKind::Host] {
            let bound: Vec<_> = record.channel_set(kind).iter().cloned().collect();
            for channel in bound {
                if reference_is_dead(channels.channel_exists(&channel).await) {
                    debug!(game = %record.id, channel = %channel, "pruning deleted channel");
                    let _ = record.unbind_channel(kind, &channel);
                    changed = true;
                }
            }
        }

        let mut members: HashSet<MemberId> = HashSet::new();
        members.extend(record.voting_exceptions.iter().cloned());
        members.extend(record.voteable_exceptions.iter().cloned());
        members.extend(record.vote_weights.keys().cloned());
        members.extend(record.love_hate.keys().cloned());
        for member in members {
            // The no-lynch pseudo-target is not a platform member
            if member.is_no_lynch() {
                continue;
            }
            if reference_is_dead(self.membership.member_exists(&member).await) {
                debug!(game = %record.id, member = %member, "pruning deleted member");
                record.voting_exceptions.remove(&member);
                record.voteable_exceptions.remove(&member);
                record.vote_weights.remove(&member);
                record.love_hate.remove(&member);
                changed = true;
            }
        }

        changed
    }
}
