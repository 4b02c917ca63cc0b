//! Domain types for the gallows lynch-vote engine.
//!
//! A game binds voter roles, channels, exceptions, and modifiers; its
//! embedded session records the running vote. The types here carry state and
//! primitive mutations only; orchestration lives in `gallows-runtime`,
//! persistence in `gallows-storage`.

mod error;
mod game;
mod ids;
mod session;

pub use error::{GallowsError, GallowsResult};
pub use game::{ChannelKind, GameRecord};
pub use ids::{ChannelId, CommunityId, GameId, MemberId, RoleId, VoterRole, NO_LYNCH_ID};
pub use session::LynchSession;
