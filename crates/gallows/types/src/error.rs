//! Error taxonomy for the lynch-vote engine.
//!
//! Every rejected operation is a typed variant the command layer can render
//! as a user-facing message. Nothing in this subsystem is fatal: a failed
//! operation leaves the game in the state it was found in.

use crate::{ChannelId, GameId, MemberId, VoterRole};
use thiserror::Error;

/// Result type for engine operations.
pub type GallowsResult<T> = Result<T, GallowsError>;

/// Errors from the lynch-vote engine.
#[derive(Debug, Error)]
pub enum GallowsError {
    // --- Life-cycle state ---
    #[error("a lynch vote is already running for game {0}")]
    AlreadyRunning(GameId),

    #[error("no lynch vote is running for game {0}")]
    NotRunning(GameId),

    // --- Eligibility ---
    #[error("member {0} is not an eligible voter")]
    NotEligibleVoter(MemberId),

    #[error("member {0} is not an eligible target")]
    NotEligibleTarget(MemberId),

    // --- Start preconditions ---
    #[error("game {0} has no update channel bound")]
    NoUpdateChannel(GameId),

    #[error("game {0} has no voter role bound")]
    NoVoterRole(GameId),

    #[error("no member currently holds a voter role in game {0}")]
    NoQualifiedMembers(GameId),

    // --- Bookkeeping ---
    #[error("game already exists: {0}")]
    GameExists(GameId),

    #[error("game not found: {0}")]
    GameNotFound(GameId),

    #[error("voter role already bound: {0}")]
    DuplicateVoterRole(VoterRole),

    #[error("voter role not bound: {0}")]
    VoterRoleNotBound(VoterRole),

    #[error("channel already bound: {0}")]
    DuplicateChannel(ChannelId),

    #[error("channel not bound: {0}")]
    ChannelNotBound(ChannelId),

    #[error("member {0} is already excepted")]
    DuplicateException(MemberId),

    #[error("member {0} is not excepted")]
    ExceptionNotFound(MemberId),

    #[error("vote weight must be a positive integer, got {0}")]
    InvalidWeight(u32),

    #[error("member id {0} is reserved for the no-lynch pseudo-target")]
    ReservedMemberId(MemberId),

    // --- Persistence ---
    #[error("storage error: {0}")]
    Storage(String),
}
