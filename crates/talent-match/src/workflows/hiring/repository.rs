use super::domain::{AnonId, CandidateIdentity, EntryKey, JobId};
use super::entry::PipelineEntry;
use super::stage::Stage;

/// Durable storage for pipeline entries, one record per `(candidate_anon_id, job_id)`.
///
/// Writes are optimistic: `update` only succeeds when `expected_version` matches the stored
/// record, and returns the entry with its bumped version.
pub trait PipelineRepository: Send + Sync {
    fn insert(&self, entry: PipelineEntry) -> Result<PipelineEntry, RepositoryError>;
    fn fetch(&self, key: &EntryKey) -> Result<Option<PipelineEntry>, RepositoryError>;
    fn update(
        &self,
        entry: PipelineEntry,
        expected_version: u64,
    ) -> Result<PipelineEntry, RepositoryError>;
    fn in_stage(&self, stage: Stage, limit: usize) -> Result<Vec<PipelineEntry>, RepositoryError>;
    fn for_job(&self, job_id: &JobId) -> Result<Vec<PipelineEntry>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, found {actual}")]
    StaleVersion { expected: u64, actual: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Resolves anonymized candidates to their personal data.
pub trait IdentityDirectory: Send + Sync {
    fn identity(&self, anon_id: &AnonId) -> Result<Option<CandidateIdentity>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("identity directory unavailable: {0}")]
    Unavailable(String),
}
