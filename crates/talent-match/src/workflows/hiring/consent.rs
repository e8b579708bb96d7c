use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{CompanyId, EntryKey};

/// Candidate's timestamped authorization releasing PII for one company and one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub entry: EntryKey,
    pub company_id: CompanyId,
    pub granted: bool,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConsentRecord {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.granted && self.expires_at.map(|expiry| now < expiry).unwrap_or(true)
    }

    pub fn grant(entry: &EntryKey, company_id: &CompanyId, granted_at: DateTime<Utc>) -> Self {
        Self {
            entry: entry.clone(),
            company_id: company_id.clone(),
            granted: true,
            granted_at,
            expires_at: None,
        }
    }
}

/// Durable, append-only log and single source of truth for disclosure consent.
///
/// Implementations never overwrite or remove a record; the latest record for an entry wins.
pub trait ConsentStore: Send + Sync {
    fn append(&self, record: ConsentRecord) -> Result<(), ConsentStoreError>;
    fn history(&self, entry: &EntryKey) -> Result<Vec<ConsentRecord>, ConsentStoreError>;

    fn latest(&self, entry: &EntryKey) -> Result<Option<ConsentRecord>, ConsentStoreError> {
        Ok(self.history(entry)?.pop())
    }

    /// Whether `company_id` currently holds consent for exactly this entry.
    fn is_granted(
        &self,
        entry: &EntryKey,
        company_id: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<bool, ConsentStoreError> {
        Ok(self
            .latest(entry)?
            .filter(|record| &record.company_id == company_id)
            .map(|record| record.is_active(now))
            .unwrap_or(false))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConsentStoreError {
    #[error("consent store unavailable: {0}")]
    Unavailable(String),
}

/// In-process `ConsentStore`; share one `Arc` between every machine over the same entries.
#[derive(Debug, Default)]
pub struct ConsentLedger {
    records: RwLock<Vec<ConsentRecord>>,
}

impl ConsentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConsentStore for ConsentLedger {
    fn append(&self, record: ConsentRecord) -> Result<(), ConsentStoreError> {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
        Ok(())
    }

    fn history(&self, entry: &EntryKey) -> Result<Vec<ConsentRecord>, ConsentStoreError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|record| &record.entry == entry)
            .cloned()
            .collect())
    }
}
