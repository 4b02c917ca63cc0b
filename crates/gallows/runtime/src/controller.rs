//! Session controller — the lynch state machine.
//!
//! Two states per game: Idle and Running. Every mutating operation
//! serializes on a per-game lock, loads the record, validates against the
//! life cycle and the roster, mutates, and commits with a single store
//! write. Platform side effects (permission toggles, announcements, the
//! host report) are best-effort: a dead reference is pruned, any other
//! failure is logged, and the transition completes either way.

use crate::gateway::{
    reference_is_dead, ChannelGateway, GatewayError, NameResolver, Notifier, RoleMembership,
};
use crate::roster::RosterResolver;
use crate::tally::TallyLine;
use crate::{report, tally};
use gallows_storage::GameStore;
use gallows_types::{
    ChannelId, ChannelKind, GallowsError, GallowsResult, GameId, GameRecord, MemberId, VoterRole,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of an accepted vote.
#[derive(Clone, Debug)]
pub enum VoteOutcome {
    /// Vote recorded; the target has not reached its threshold
    Recorded {
        /// Weighted total now on the target
        weighted_total: i64,
        /// Weighted total the target's hammer requires
        threshold: i64,
    },
    /// The vote hammered its target; the session resolved and is now idle
    Hammered {
        /// The eliminated member
        target: MemberId,
    },
    /// The vote hammered the no-lynch pseudo-target; the session resolved
    /// with no elimination
    NoLynch,
}

#[derive(Clone, Copy)]
enum PermissionChange {
    Grant,
    Revoke,
}

/// The lynch-vote state machine, one instance per process.
///
/// Games are independent: operations on different games run concurrently,
/// operations on one game are serialized by its lock.
pub struct LynchController {
    store: Arc<dyn GameStore>,
    membership: Arc<dyn RoleMembership>,
    channels: Arc<dyn ChannelGateway>,
    notifier: Arc<dyn Notifier>,
    names: Arc<dyn NameResolver>,
    roster: RosterResolver,
    locks: Mutex<HashMap<GameId, Arc<Mutex<()>>>>,
}

impl LynchController {
    pub fn new(
        store: Arc<dyn GameStore>,
        membership: Arc<dyn RoleMembership>,
        channels: Arc<dyn ChannelGateway>,
        notifier: Arc<dyn Notifier>,
        names: Arc<dyn NameResolver>,
    ) -> Self {
        let roster = RosterResolver::new(membership.clone());
        Self {
            store,
            membership,
            channels,
            notifier,
            names,
            roster,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn game_lock(&self, game: &GameId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(game.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_game(&self, game: &GameId) -> GallowsResult<GameRecord> {
        self.store
            .load(game)
            .await?
            .ok_or_else(|| GallowsError::GameNotFound(game.clone()))
    }

    /// Serialize on the game's lock, load, mutate, and commit in one write.
    async fn with_game<F>(&self, game: &GameId, mutate: F) -> GallowsResult<()>
    where
        F: FnOnce(&mut GameRecord) -> GallowsResult<()>,
    {
        let lock = self.game_lock(game).await;
        let _guard = lock.lock().await;
        let mut record = self.load_game(game).await?;
        mutate(&mut record)?;
        self.store.save(&record).await?;
        Ok(())
    }

    // =========================================================================
    // GAME LIFECYCLE
    // =========================================================================

    /// Register a game with an empty, idle record.
    pub async fn create_game(&self, game: GameId) -> GallowsResult<()> {
        let lock = self.game_lock(&game).await;
        let _guard = lock.lock().await;
        if self.store.load(&game).await?.is_some() {
            return Err(GallowsError::GameExists(game));
        }
        self.store.save(&GameRecord::new(game.clone())).await?;
        info!(game = %game, "game created");
        Ok(())
    }

    /// Drop a game and everything scoped to it.
    pub async fn remove_game(&self, game: &GameId) -> GallowsResult<()> {
        let lock = self.game_lock(game).await;
        let _guard = lock.lock().await;
        if !self.store.delete(game).await? {
            return Err(GallowsError::GameNotFound(game.clone()));
        }
        self.locks.lock().await.remove(game);
        info!(game = %game, "game removed");
        Ok(())
    }

    // =========================================================================
    // ROSTER & CHANNEL BOOKKEEPING
    // =========================================================================

    pub async fn add_voter_role(&self, game: &GameId, role: VoterRole) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.add_voter_role(role.clone())?;
            debug!(game = %record.id, role = %role, "voter role bound");
            Ok(())
        })
        .await
    }

    pub async fn remove_voter_role(&self, game: &GameId, role: &VoterRole) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.remove_voter_role(role)?;
            debug!(game = %record.id, role = %role, "voter role unbound");
            Ok(())
        })
        .await
    }

    pub async fn bind_channel(
        &self,
        game: &GameId,
        kind: ChannelKind,
        channel: ChannelId,
    ) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.bind_channel(kind, channel.clone())?;
            debug!(game = %record.id, channel = %channel, ?kind, "channel bound");
            Ok(())
        })
        .await
    }

    pub async fn unbind_channel(
        &self,
        game: &GameId,
        kind: ChannelKind,
        channel: &ChannelId,
    ) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.unbind_channel(kind, channel)?;
            debug!(game = %record.id, channel = %channel, ?kind, "channel unbound");
            Ok(())
        })
        .await
    }

    /// Bar a member from casting votes. Any live vote by the member is
    /// retracted in the same transaction.
    pub async fn add_voting_exception(&self, game: &GameId, member: MemberId) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.add_voting_exception(member.clone())?;
            if let Some(target) = record.session.retract_vote(&member) {
                debug!(
                    game = %record.id, voter = %member, target = %target,
                    "live vote retracted by new voting exception"
                );
            }
            Ok(())
        })
        .await
    }

    pub async fn remove_voting_exception(
        &self,
        game: &GameId,
        member: &MemberId,
    ) -> GallowsResult<()> {
        self.with_game(game, |record| record.remove_voting_exception(member))
            .await
    }

    /// Bar a member from being targeted. All live votes for the member are
    /// cleared in the same transaction.
    pub async fn add_voteable_exception(
        &self,
        game: &GameId,
        member: MemberId,
    ) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.add_voteable_exception(member.clone())?;
            let dropped = record.session.clear_target(&member);
            if dropped > 0 {
                debug!(
                    game = %record.id, target = %member, dropped,
                    "live votes cleared by new voteable exception"
                );
            }
            Ok(())
        })
        .await
    }

    pub async fn remove_voteable_exception(
        &self,
        game: &GameId,
        member: &MemberId,
    ) -> GallowsResult<()> {
        self.with_game(game, |record| record.remove_voteable_exception(member))
            .await
    }

    pub async fn set_vote_weight(
        &self,
        game: &GameId,
        member: MemberId,
        weight: u32,
    ) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.set_vote_weight(member.clone(), weight)?;
            debug!(game = %record.id, member = %member, weight, "vote weight set");
            Ok(())
        })
        .await
    }

    pub async fn clear_vote_weight(&self, game: &GameId, member: &MemberId) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.clear_vote_weight(member);
            Ok(())
        })
        .await
    }

    pub async fn add_love(&self, game: &GameId, target: MemberId) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.add_love(target.clone());
            debug!(game = %record.id, target = %target, offset = record.love_hate_of(&target), "loved point added");
            Ok(())
        })
        .await
    }

    pub async fn add_hate(&self, game: &GameId, target: MemberId) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.add_hate(target.clone());
            debug!(game = %record.id, target = %target, offset = record.love_hate_of(&target), "hated point added");
            Ok(())
        })
        .await
    }

    pub async fn clear_love_hate(&self, game: &GameId, target: &MemberId) -> GallowsResult<()> {
        self.with_game(game, |record| {
            record.clear_love_hate(target);
            Ok(())
        })
        .await
    }

    // =========================================================================
    // STATE MACHINE
    // =========================================================================

    /// Open a lynch vote. Preconditions, first failure wins: not already
    /// running; an update channel bound; a voter role bound; some member
    /// holds a bound role.
    ///
    /// The member-existence check deliberately ignores `voting_exceptions`:
    /// a game whose every role member is voting-excepted still starts.
    ///
    /// Returns the vote cap in force.
    pub async fn start_lynch(
        &self,
        game: &GameId,
        requested_cap: Option<u32>,
    ) -> GallowsResult<u32> {
        let lock = self.game_lock(game).await;
        let _guard = lock.lock().await;
        let mut record = self.load_game(game).await?;

        if record.session.running {
            return Err(GallowsError::AlreadyRunning(game.clone()));
        }

        // Reconcile stale bindings before the preconditions look at the sets
        self.roster.prune(&mut record, self.channels.as_ref()).await;

        if record.update_channels.is_empty() {
            return Err(GallowsError::NoUpdateChannel(game.clone()));
        }
        if record.voter_roles.is_empty() {
            return Err(GallowsError::NoVoterRole(game.clone()));
        }
        if !self.roster.any_role_member_exists(&record).await {
            return Err(GallowsError::NoQualifiedMembers(game.clone()));
        }

        let vote_cap = match requested_cap {
            Some(cap) if cap > 0 => cap,
            _ => tally::majority(self.roster.qualified_member_count(&record).await),
        };

        record.session.open(vote_cap);

        self.apply_channel_permissions(&mut record, PermissionChange::Grant)
            .await;
        self.announce(
            &mut record,
            &format!("Voting has begun. {vote_cap} weighted votes are required to hammer."),
        )
        .await;

        self.store.save(&record).await?;
        info!(game = %game, cap = vote_cap, "lynch voting started");
        Ok(vote_cap)
    }

    /// Cast (or move) a vote. Reaching the target's hammer threshold
    /// resolves the session in the same call.
    pub async fn lynch(
        &self,
        game: &GameId,
        target: &MemberId,
        voter: &MemberId,
    ) -> GallowsResult<VoteOutcome> {
        let lock = self.game_lock(game).await;
        let _guard = lock.lock().await;
        let mut record = self.load_game(game).await?;

        let Some(vote_cap) = record.session.vote_cap.filter(|_| record.session.running) else {
            return Err(GallowsError::NotRunning(game.clone()));
        };

        if !self.roster.is_eligible_voter(&record, voter).await {
            return Err(GallowsError::NotEligibleVoter(voter.clone()));
        }
        if !target.is_no_lynch() && !self.roster.is_eligible_target(&record, target).await {
            return Err(GallowsError::NotEligibleTarget(target.clone()));
        }

        record.session.retract_vote(voter);
        record.session.record_vote(target.clone(), voter.clone());

        let weighted_total =
            tally::weighted_total(&record.session.votes, &record.vote_weights, target);
        let threshold = tally::hammer_threshold(vote_cap, record.love_hate_of(target));
        debug!(
            game = %game, voter = %voter, target = %target,
            total = weighted_total, threshold, "vote recorded"
        );

        if weighted_total >= threshold {
            self.resolve(&mut record, target).await?;
            return Ok(if target.is_no_lynch() {
                VoteOutcome::NoLynch
            } else {
                VoteOutcome::Hammered {
                    target: target.clone(),
                }
            });
        }

        self.store.save(&record).await?;
        Ok(VoteOutcome::Recorded {
            weighted_total,
            threshold,
        })
    }

    /// Vote for eliminating no one. Hammering the no-lynch pseudo-target
    /// resolves the session without an elimination.
    pub async fn no_lynch(&self, game: &GameId, voter: &MemberId) -> GallowsResult<VoteOutcome> {
        self.lynch(game, &MemberId::no_lynch(), voter).await
    }

    /// Retract the voter's live vote. Returns whether one existed.
    pub async fn unlynch(&self, game: &GameId, voter: &MemberId) -> GallowsResult<bool> {
        let lock = self.game_lock(game).await;
        let _guard = lock.lock().await;
        let mut record = self.load_game(game).await?;

        if !record.session.running {
            return Err(GallowsError::NotRunning(game.clone()));
        }

        let retracted = record.session.retract_vote(voter);
        self.store.save(&record).await?;
        if let Some(target) = &retracted {
            debug!(game = %game, voter = %voter, target = %target, "vote retracted");
        }
        Ok(retracted.is_some())
    }

    /// Clear every vote but keep the session running under the same cap.
    pub async fn reset_lynch(&self, game: &GameId) -> GallowsResult<()> {
        let lock = self.game_lock(game).await;
        let _guard = lock.lock().await;
        let mut record = self.load_game(game).await?;

        if !record.session.running {
            return Err(GallowsError::NotRunning(game.clone()));
        }

        self.announce(
            &mut record,
            "The lynch vote has been reset; all votes are cleared.",
        )
        .await;
        record.session.clear_votes();
        self.store.save(&record).await?;
        info!(game = %game, "lynch vote reset");
        Ok(())
    }

    /// Abandon the vote without a result. No host report is produced.
    pub async fn cancel_lynch(&self, game: &GameId) -> GallowsResult<()> {
        let lock = self.game_lock(game).await;
        let _guard = lock.lock().await;
        let mut record = self.load_game(game).await?;

        if !record.session.running {
            return Err(GallowsError::NotRunning(game.clone()));
        }

        self.announce(&mut record, "The lynch vote has been cancelled.")
            .await;
        self.apply_channel_permissions(&mut record, PermissionChange::Revoke)
            .await;
        record.session.clear_votes();
        record.session.close();
        self.store.save(&record).await?;
        info!(game = %game, "lynch vote cancelled");
        Ok(())
    }

    /// Resolve the running vote as "no lynch" regardless of the tally.
    pub async fn end_without_lynch(&self, game: &GameId) -> GallowsResult<()> {
        let lock = self.game_lock(game).await;
        let _guard = lock.lock().await;
        let mut record = self.load_game(game).await?;

        if !record.session.running {
            return Err(GallowsError::NotRunning(game.clone()));
        }

        let no_lynch = MemberId::no_lynch();
        self.resolve(&mut record, &no_lynch).await
    }

    /// Host override: resolve immediately with an explicit target. The
    /// tally is deliberately not consulted.
    pub async fn hammer(&self, game: &GameId, target: &MemberId) -> GallowsResult<()> {
        let lock = self.game_lock(game).await;
        let _guard = lock.lock().await;
        let mut record = self.load_game(game).await?;

        if !record.session.running {
            return Err(GallowsError::NotRunning(game.clone()));
        }
        if !target.is_no_lynch() && !self.roster.is_eligible_target(&record, target).await {
            return Err(GallowsError::NotEligibleTarget(target.clone()));
        }

        info!(game = %game, target = %target, "manual hammer");
        self.resolve(&mut record, target).await
    }

    /// Shared resolution sequence: end announcement, permission revocation,
    /// host report, idle teardown. The teardown commits even when every
    /// delivery fails.
    async fn resolve(&self, record: &mut GameRecord, outcome: &MemberId) -> GallowsResult<()> {
        let vote_cap = record.session.vote_cap.unwrap_or_default();

        self.announce(record, "Voting has ended.").await;
        self.apply_channel_permissions(record, PermissionChange::Revoke)
            .await;

        let lines = tally::standings(
            &record.session.votes,
            &record.vote_weights,
            &record.love_hate,
            vote_cap,
        );
        let rendered = report::render_host_report(self.names.as_ref(), &lines, outcome).await;
        self.deliver_host_report(record, &rendered).await;

        record.session.clear_votes();
        record.session.close();
        self.store.save(record).await?;

        info!(game = %record.id, outcome = %outcome, "lynch session resolved");
        Ok(())
    }

    // =========================================================================
    // SIDE EFFECTS (best-effort)
    // =========================================================================

    /// Grant or revoke posting on every voting channel for every voter
    /// role, pruning references the platform reports dead.
    async fn apply_channel_permissions(&self, record: &mut GameRecord, change: PermissionChange) {
        let bound: Vec<ChannelId> = record.voting_channels.iter().cloned().collect();
        let roles = record.voter_roles.clone();
        for channel in &bound {
            for role in &roles {
                let result = match change {
                    PermissionChange::Grant => self.channels.grant_posting(channel, role).await,
                    PermissionChange::Revoke => self.channels.revoke_posting(channel, role).await,
                };
                match result {
                    Ok(()) => {}
                    Err(GatewayError::NotFound(_)) => {
                        self.prune_permission_ref(record, channel, role).await;
                    }
                    Err(err) => {
                        warn!(
                            game = %record.id, channel = %channel, role = %role, error = %err,
                            "permission update failed"
                        );
                    }
                }
            }
        }
    }

    /// A grant/revoke came back NotFound without saying which side is dead;
    /// re-check both and prune whichever is gone.
    async fn prune_permission_ref(
        &self,
        record: &mut GameRecord,
        channel: &ChannelId,
        role: &VoterRole,
    ) {
        if reference_is_dead(self.channels.channel_exists(channel).await) {
            warn!(game = %record.id, channel = %channel, "voting channel vanished; pruning");
            let _ = record.unbind_channel(ChannelKind::Voting, channel);
        } else if reference_is_dead(self.membership.role_exists(role).await) {
            warn!(game = %record.id, role = %role, "voter role vanished; pruning");
            let _ = record.remove_voter_role(role);
        }
    }

    /// Deliver a public announcement to every update channel, pruning dead
    /// ones as they surface.
    async fn announce(&self, record: &mut GameRecord, message: &str) {
        let bound: Vec<ChannelId> = record.update_channels.iter().cloned().collect();
        for channel in bound {
            match self.notifier.send_channel(&channel, message).await {
                Ok(()) => {}
                Err(GatewayError::NotFound(_)) => {
                    warn!(game = %record.id, channel = %channel, "update channel vanished; pruning");
                    let _ = record.unbind_channel(ChannelKind::Update, &channel);
                }
                Err(err) => {
                    warn!(game = %record.id, channel = %channel, error = %err, "announcement failed");
                }
            }
        }
    }

    /// Host channels first; if none are bound or none took the report,
    /// administrators get it privately.
    async fn deliver_host_report(&self, record: &mut GameRecord, rendered: &str) {
        let bound: Vec<ChannelId> = record.host_channels.iter().cloned().collect();
        let mut delivered = false;
        for channel in bound {
            match self.notifier.send_channel(&channel, rendered).await {
                Ok(()) => delivered = true,
                Err(GatewayError::NotFound(_)) => {
                    warn!(game = %record.id, channel = %channel, "host channel vanished; pruning");
                    let _ = record.unbind_channel(ChannelKind::Host, &channel);
                }
                Err(err) => {
                    warn!(game = %record.id, channel = %channel, error = %err, "host report delivery failed");
                }
            }
        }
        if delivered {
            return;
        }

        match self.membership.admins_of(&record.id).await {
            Ok(admins) => {
                for admin in admins {
                    if let Err(err) = self.notifier.send_direct(&admin, rendered).await {
                        warn!(game = %record.id, admin = %admin, error = %err, "host report DM failed");
                    }
                }
            }
            Err(err) => {
                warn!(game = %record.id, error = %err, "could not resolve administrators for host report");
            }
        }
    }

    // =========================================================================
    // QUERIES (lock-free)
    // =========================================================================

    /// Whether a lynch vote is currently running.
    pub async fn is_running(&self, game: &GameId) -> GallowsResult<bool> {
        Ok(self.load_game(game).await?.session.running)
    }

    /// The vote cap in force, if a vote is running.
    pub async fn vote_cap(&self, game: &GameId) -> GallowsResult<Option<u32>> {
        Ok(self.load_game(game).await?.session.vote_cap)
    }

    /// Current standings of the running vote.
    pub async fn standings(&self, game: &GameId) -> GallowsResult<Vec<TallyLine>> {
        let record = self.load_game(game).await?;
        let Some(vote_cap) = record.session.vote_cap.filter(|_| record.session.running) else {
            return Err(GallowsError::NotRunning(game.clone()));
        };
        Ok(tally::standings(
            &record.session.votes,
            &record.vote_weights,
            &record.love_hate,
            vote_cap,
        ))
    }

    /// Whether votes may be cast from `channel` for this game.
    pub async fn may_vote_in(&self, game: &GameId, channel: &ChannelId) -> GallowsResult<bool> {
        Ok(self.load_game(game).await?.may_vote_in(channel))
    }

    pub async fn voter_roles(&self, game: &GameId) -> GallowsResult<Vec<VoterRole>> {
        Ok(self.load_game(game).await?.voter_roles)
    }

    pub async fn bound_channels(
        &self,
        game: &GameId,
        kind: ChannelKind,
    ) -> GallowsResult<Vec<ChannelId>> {
        let record = self.load_game(game).await?;
        let mut channels: Vec<ChannelId> = record.channel_set(kind).iter().cloned().collect();
        channels.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(channels)
    }

    pub async fn voting_exceptions(&self, game: &GameId) -> GallowsResult<Vec<MemberId>> {
        let record = self.load_game(game).await?;
        let mut members: Vec<MemberId> = record.voting_exceptions.into_iter().collect();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(members)
    }

    pub async fn voteable_exceptions(&self, game: &GameId) -> GallowsResult<Vec<MemberId>> {
        let record = self.load_game(game).await?;
        let mut members: Vec<MemberId> = record.voteable_exceptions.into_iter().collect();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(members)
    }

    pub async fn vote_weights(&self, game: &GameId) -> GallowsResult<HashMap<MemberId, u32>> {
        Ok(self.load_game(game).await?.vote_weights)
    }

    pub async fn love_hate(&self, game: &GameId) -> GallowsResult<HashMap<MemberId, i32>> {
        Ok(self.load_game(game).await?.love_hate)
    }

    /// Ids of every registered game.
    pub async fn game_ids(&self) -> GallowsResult<Vec<GameId>> {
        let mut ids = self.store.list_ids().await?;
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ids)
    }
}
