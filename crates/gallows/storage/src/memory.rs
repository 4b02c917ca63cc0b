//! In-memory storage implementation.
//!
//! Deterministic and test-friendly. Deployments that must survive restarts
//! should use the JSON-directory adapter instead.

use crate::traits::GameStore;
use crate::StorageResult;
use async_trait::async_trait;
use gallows_types::{GameId, GameRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory game store for development and testing
#[derive(Debug, Default)]
pub struct InMemoryGameStore {
    games: RwLock<HashMap<GameId, GameRecord>>,
}

impl InMemoryGameStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn load(&self, game: &GameId) -> StorageResult<Option<GameRecord>> {
        let games = self.games.read().await;
        Ok(games.get(game).cloned())
    }

    async fn save(&self, record: &GameRecord) -> StorageResult<()> {
        let mut games = self.games.write().await;
        games.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, game: &GameId) -> StorageResult<bool> {
        let mut games = self.games.write().await;
        Ok(games.remove(game).is_some())
    }

    async fn list_ids(&self) -> StorageResult<Vec<GameId>> {
        let games = self.games.read().await;
        Ok(games.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_delete_round_trip() {
        let store = InMemoryGameStore::new();
        let id = GameId::new("g1");

        assert!(store.load(&id).await.unwrap().is_none());

        store.save(&GameRecord::new(id.clone())).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_some());
        assert_eq!(store.list_ids().await.unwrap(), vec![id.clone()]);

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(store.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_existing_record() {
        let store = InMemoryGameStore::new();
        let id = GameId::new("g1");

        let mut record = GameRecord::new(id.clone());
        store.save(&record).await.unwrap();

        record.session.open(4);
        store.save(&record).await.unwrap();

        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.session.vote_cap, Some(4));
    }
}
