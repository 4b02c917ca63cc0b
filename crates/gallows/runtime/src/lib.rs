//! Runtime of the gallows lynch-vote engine.
//!
//! The [`LynchController`] is the entry point: it owns the per-game state
//! machine and serializes mutating operations per game. Roster resolution,
//! the weighted tally, and report rendering back it; the collaborator traits
//! in [`gateway`] are the engine's only view of the chat platform.

pub mod gateway;
pub mod report;
pub mod tally;

mod controller;
mod roster;

#[cfg(test)]
pub(crate) mod testutil;

pub use controller::{LynchController, VoteOutcome};
pub use gateway::{
    ChannelGateway, GatewayError, GatewayResult, NameResolver, Notifier, RoleMembership,
};
pub use roster::RosterResolver;
pub use tally::{majority, TallyLine};
