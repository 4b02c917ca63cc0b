//! JSON-directory game store.
//!
//! One pretty-printed JSON file per game under a data directory. Writes are
//! atomic (write to `.tmp`, then rename) so an interrupted write never
//! corrupts a record. This is the structured replacement for delimited-text
//! record storage: every mutating engine call is one whole-record write.

use crate::traits::GameStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use gallows_types::{GameId, GameRecord};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Game store writing one JSON file per game
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Create a store rooted at `dir`. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, game: &GameId) -> StorageResult<PathBuf> {
        // Game ids are platform snowflakes; anything that could escape the
        // data directory is refused rather than escaped.
        if game.0.is_empty()
            || !game
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StorageError::Backend(format!(
                "game id {} is not usable as a file name",
                game
            )));
        }
        Ok(self.dir.join(format!("{}.json", game.0)))
    }
}

#[async_trait]
impl GameStore for JsonDirStore {
    async fn load(&self, game: &GameId) -> StorageResult<Option<GameRecord>> {
        let path = self.record_path(game)?;
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: GameRecord = serde_json::from_str(&contents)?;
        Ok(Some(record))
    }

    async fn save(&self, record: &GameRecord) -> StorageResult<()> {
        let path = self.record_path(&record.id)?;
        let json = serde_json::to_string_pretty(record)?;

        tokio::fs::create_dir_all(&self.dir).await?;

        // Atomic write: write to .tmp then rename
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!(game = %record.id, path = %path.display(), "game record written");
        Ok(())
    }

    async fn delete(&self, game: &GameId) -> StorageResult<bool> {
        let path = self.record_path(game)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_ids(&self) -> StorageResult<Vec<GameId>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".json") {
                ids.push(GameId::new(stem));
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallows_types::MemberId;

    fn store() -> (tempfile::TempDir, JsonDirStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn records_survive_a_new_store_instance() {
        let (dir, store) = store();
        let id = GameId::new("g1");

        let mut record = GameRecord::new(id.clone());
        record.session.open(3);
        record
            .session
            .record_vote(MemberId::new("t"), MemberId::new("a"));
        store.save(&record).await.unwrap();

        // Same directory, fresh adapter: simulates a process restart
        let reopened = JsonDirStore::new(dir.path());
        let loaded = reopened.load(&id).await.unwrap().unwrap();
        assert!(loaded.session.running);
        assert_eq!(loaded.session.vote_cap, Some(3));
        assert_eq!(loaded.session.total_ballots(), 1);
    }

    #[tokio::test]
    async fn teardown_leaves_no_vote_state_on_disk() {
        let (dir, store) = store();
        let id = GameId::new("g1");

        let mut record = GameRecord::new(id.clone());
        record.session.open(3);
        record
            .session
            .record_vote(MemberId::new("t"), MemberId::new("a"));
        store.save(&record).await.unwrap();

        record.session.clear_votes();
        record.session.close();
        store.save(&record).await.unwrap();

        let reopened = JsonDirStore::new(dir.path());
        let loaded = reopened.load(&id).await.unwrap().unwrap();
        assert!(!loaded.session.running);
        assert_eq!(loaded.session.vote_cap, None);
        assert!(loaded.session.votes.is_empty());
    }

    #[tokio::test]
    async fn save_is_atomic_and_leaves_no_tmp_file() {
        let (dir, store) = store();
        let record = GameRecord::new(GameId::new("g1"));

        store.save(&record).await.unwrap();
        store.save(&record).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["g1.json".to_string()]);
    }

    #[tokio::test]
    async fn delete_and_list() {
        let (_dir, store) = store();

        assert!(store.list_ids().await.unwrap().is_empty());

        store.save(&GameRecord::new(GameId::new("g1"))).await.unwrap();
        store.save(&GameRecord::new(GameId::new("g2"))).await.unwrap();

        let mut ids = store.list_ids().await.unwrap();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(ids, vec![GameId::new("g1"), GameId::new("g2")]);

        assert!(store.delete(&GameId::new("g1")).await.unwrap());
        assert!(!store.delete(&GameId::new("g1")).await.unwrap());
    }

    #[tokio::test]
    async fn hostile_game_id_is_refused() {
        let (_dir, store) = store();
        let err = store.load(&GameId::new("../escape")).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }
}
