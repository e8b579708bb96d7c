use std::collections::HashMap;
use std::sync::RwLock;

use super::domain::{EntryKey, JobId};
use super::entry::PipelineEntry;
use super::repository::{PipelineRepository, RepositoryError};
use super::stage::Stage;

#[derive(Debug, Default)]
struct Arena {
    entries: Vec<PipelineEntry>,
    index: HashMap<EntryKey, usize>,
}

/// Process-local repository: entries live in an arena and are addressed through a
/// composite-key index. Nothing is ever removed; terminal entries stay for audit.
#[derive(Debug, Default)]
pub struct InMemoryPipelineStore {
    arena: RwLock<Arena>,
}

impl InMemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arena
            .read()
            .map(|arena| arena.entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable("store lock poisoned".to_string())
}

impl PipelineRepository for InMemoryPipelineStore {
    fn insert(&self, mut entry: PipelineEntry) -> Result<PipelineEntry, RepositoryError> {
        let mut arena = self.arena.write().map_err(poisoned)?;
        if arena.index.contains_key(&entry.key) {
            return Err(RepositoryError::Conflict);
        }
        entry.version = 1;
        let slot = arena.entries.len();
        arena.index.insert(entry.key.clone(), slot);
        arena.entries.push(entry.clone());
        Ok(entry)
    }

    fn fetch(&self, key: &EntryKey) -> Result<Option<PipelineEntry>, RepositoryError> {
        let arena = self.arena.read().map_err(poisoned)?;
        Ok(arena
            .index
            .get(key)
            .map(|slot| arena.entries[*slot].clone()))
    }

    fn update(
        &self,
        mut entry: PipelineEntry,
        expected_version: u64,
    ) -> Result<PipelineEntry, RepositoryError> {
        let mut arena = self.arena.write().map_err(poisoned)?;
        let slot = *arena
            .index
            .get(&entry.key)
            .ok_or(RepositoryError::NotFound)?;
        let stored = &mut arena.entries[slot];
        if stored.version != expected_version {
            return Err(RepositoryError::StaleVersion {
                expected: expected_version,
                actual: stored.version,
            });
        }
        entry.version = expected_version + 1;
        *stored = entry.clone();
        Ok(entry)
    }

    fn in_stage(&self, stage: Stage, limit: usize) -> Result<Vec<PipelineEntry>, RepositoryError> {
        let arena = self.arena.read().map_err(poisoned)?;
        Ok(arena
            .entries
            .iter()
            .filter(|entry| entry.stage == stage)
            .take(limit)
            .cloned()
            .collect())
    }

    fn for_job(&self, job_id: &JobId) -> Result<Vec<PipelineEntry>, RepositoryError> {
        let arena = self.arena.read().map_err(poisoned)?;
        Ok(arena
            .entries
            .iter()
            .filter(|entry| &entry.key.job_id == job_id)
            .cloned()
            .collect())
    }
}
