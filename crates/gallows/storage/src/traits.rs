use crate::StorageResult;
use async_trait::async_trait;
use gallows_types::{GameId, GameRecord};

/// Storage interface for per-game records.
///
/// One record per game, written whole on every mutating engine call. The
/// record must durably survive process restart; after an idle teardown the
/// persisted session carries no vote cap and no votes.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Load one game record by id.
    async fn load(&self, game: &GameId) -> StorageResult<Option<GameRecord>>;

    /// Persist a record, replacing any existing one for the same game.
    async fn save(&self, record: &GameRecord) -> StorageResult<()>;

    /// Remove a game's record. Returns whether anything was deleted.
    async fn delete(&self, game: &GameId) -> StorageResult<bool>;

    /// Ids of every stored game.
    async fn list_ids(&self) -> StorageResult<Vec<GameId>>;
}
