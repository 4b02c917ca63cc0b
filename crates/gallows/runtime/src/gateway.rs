//! Collaborator boundary: the engine's only view of the chat platform.
//!
//! The engine never speaks the platform's wire protocol. It resolves live
//! role membership, toggles posting permission, and delivers messages
//! through these traits; the bot's transport layer implements them.
//!
//! Failures here are recoverable by contract: a dead reference is pruned
//! from the owning set, anything else is logged, and the state-machine
//! transition that triggered the call still completes.

use async_trait::async_trait;
use gallows_types::{ChannelId, GameId, MemberId, VoterRole};
use thiserror::Error;

/// Result type for collaborator calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by platform collaborators.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The referenced channel, role, or member no longer exists. The engine
    /// prunes the stale reference and continues.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient platform failure. The engine logs and continues.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Whether an existence lookup definitively reported the referent gone.
/// Transient failures keep the reference alive for a later retry.
pub(crate) fn reference_is_dead(lookup: GatewayResult<bool>) -> bool {
    match lookup {
        Ok(exists) => !exists,
        Err(GatewayError::NotFound(_)) => true,
        Err(_) => false,
    }
}

/// Live role-membership source.
#[async_trait]
pub trait RoleMembership: Send + Sync {
    /// Current members of a bound voter role.
    async fn members_of(&self, role: &VoterRole) -> GatewayResult<Vec<MemberId>>;

    /// Whether the community role still exists.
    async fn role_exists(&self, role: &VoterRole) -> GatewayResult<bool>;

    /// Whether the member still exists on the platform.
    async fn member_exists(&self, member: &MemberId) -> GatewayResult<bool>;

    /// Administrators to notify when no host channel can take the final
    /// report.
    async fn admins_of(&self, game: &GameId) -> GatewayResult<Vec<MemberId>>;
}

/// Posting-permission control for voting channels.
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    /// Permit members of `role` to post in `channel`.
    async fn grant_posting(&self, channel: &ChannelId, role: &VoterRole) -> GatewayResult<()>;

    /// Restrict members of `role` from posting in `channel`.
    async fn revoke_posting(&self, channel: &ChannelId, role: &VoterRole) -> GatewayResult<()>;

    /// Whether the channel still exists.
    async fn channel_exists(&self, channel: &ChannelId) -> GatewayResult<bool>;
}

/// Message delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a message to a channel.
    async fn send_channel(&self, channel: &ChannelId, message: &str) -> GatewayResult<()>;

    /// Send a private message to a member.
    async fn send_direct(&self, member: &MemberId, message: &str) -> GatewayResult<()>;
}

/// Presentation names for report rendering.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Display name for a member; implementations fall back to the raw id.
    async fn display_name(&self, member: &MemberId) -> String;
}
