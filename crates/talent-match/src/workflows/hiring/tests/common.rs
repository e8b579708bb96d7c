use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::hiring::domain::{
    AnonId, CandidateIdentity, CandidateProfile, CompanyId, EntryKey, ExperienceRange, JobId,
    JobOpening, Money, SkillLevel, TestResults,
};
use crate::workflows::hiring::entry::PipelineEntry;
use crate::workflows::hiring::repository::{
    DirectoryError, IdentityDirectory, PipelineRepository, RepositoryError,
};
use crate::workflows::hiring::stage::Stage;
use crate::workflows::hiring::{
    ConsentLedger, ConsentRecord, ConsentStore, ConsentStoreError, InMemoryPipelineStore,
    ManualClock, PipelineSettings, PipelineStateMachine,
};

pub(super) type Machine = PipelineStateMachine<InMemoryPipelineStore, MemoryDirectory>;

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

pub(super) fn skills(pairs: &[(&str, SkillLevel)]) -> BTreeMap<String, SkillLevel> {
    pairs
        .iter()
        .map(|(name, level)| (name.to_string(), *level))
        .collect()
}

pub(super) fn candidate(anon_id: &str) -> CandidateProfile {
    CandidateProfile {
        anon_id: AnonId(anon_id.to_string()),
        skills: skills(&[
            ("React", SkillLevel::Advanced),
            ("Node.js", SkillLevel::Intermediate),
        ]),
        years_experience: 4,
        location: Some("Sao Paulo, SP".to_string()),
    }
}

pub(super) fn job(job_id: &str) -> JobOpening {
    JobOpening {
        job_id: JobId(job_id.to_string()),
        company_id: CompanyId("acme".to_string()),
        title: "Frontend Engineer".to_string(),
        required_skills: skills(&[
            ("React", SkillLevel::Intermediate),
            ("Node", SkillLevel::Intermediate),
        ]),
        experience: Some(ExperienceRange {
            min_years: 3,
            max_years: Some(6),
        }),
        location: Some("Sao Paulo".to_string()),
        annual_salary: Some(Money(18_000_000)),
    }
}

pub(super) fn acme() -> CompanyId {
    CompanyId("acme".to_string())
}

pub(super) fn key(anon_id: &str, job_id: &str) -> EntryKey {
    EntryKey::new(anon_id, job_id)
}

pub(super) fn test_results(level: SkillLevel) -> TestResults {
    TestResults {
        overall_level: level,
        skill_levels: skills(&[("React", level)]),
    }
}

pub(super) fn identity() -> CandidateIdentity {
    CandidateIdentity {
        full_name: "Ana Souza".to_string(),
        email: "ana@example.com".to_string(),
        phone: "+55 11 99999-0000".to_string(),
        national_id: "123.456.789-09".to_string(),
        street_address: "Rua Augusta, 100".to_string(),
        city: "Sao Paulo".to_string(),
        state: "SP".to_string(),
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    identities: Mutex<HashMap<AnonId, CandidateIdentity>>,
}

impl MemoryDirectory {
    pub(super) fn with(anon_id: &str, identity: CandidateIdentity) -> Self {
        let directory = Self::default();
        directory
            .identities
            .lock()
            .expect("directory mutex poisoned")
            .insert(AnonId(anon_id.to_string()), identity);
        directory
    }
}

impl IdentityDirectory for MemoryDirectory {
    fn identity(&self, anon_id: &AnonId) -> Result<Option<CandidateIdentity>, DirectoryError> {
        Ok(self
            .identities
            .lock()
            .expect("directory mutex poisoned")
            .get(anon_id)
            .cloned())
    }
}

pub(super) fn build_machine() -> (Arc<Machine>, Arc<InMemoryPipelineStore>, Arc<ManualClock>) {
    let store = Arc::new(InMemoryPipelineStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let machine = machine_over(store.clone(), Arc::new(ConsentLedger::new()), clock.clone());
    (machine, store, clock)
}

/// Machine over existing stores, as a restarted process or a second replica would build it.
pub(super) fn machine_over(
    store: Arc<InMemoryPipelineStore>,
    consents: Arc<dyn ConsentStore>,
    clock: Arc<ManualClock>,
) -> Arc<Machine> {
    Arc::new(PipelineStateMachine::new(
        store,
        consents,
        Arc::new(MemoryDirectory::with("anon-1", identity())),
        clock,
        PipelineSettings::default(),
    ))
}

/// Consent store whose next append fails once `failing` is set.
#[derive(Default)]
pub(super) struct FlakyConsentStore {
    pub(super) inner: ConsentLedger,
    pub(super) failing: AtomicBool,
}

impl ConsentStore for FlakyConsentStore {
    fn append(&self, record: ConsentRecord) -> Result<(), ConsentStoreError> {
        if self.failing.swap(false, Ordering::SeqCst) {
            return Err(ConsentStoreError::Unavailable("audit log offline".to_string()));
        }
        self.inner.append(record)
    }

    fn history(&self, entry: &EntryKey) -> Result<Vec<ConsentRecord>, ConsentStoreError> {
        self.inner.history(entry)
    }
}

/// Entry opened for `anon-1` on `job-1` and moved to `awaiting_candidate_response`.
pub(super) fn awaiting_entry(machine: &Machine) -> PipelineEntry {
    machine
        .open_entry(candidate("anon-1"), job("job-1"), false)
        .expect("entry opens");
    machine
        .express_interest(&key("anon-1", "job-1"), BTreeSet::new(), false)
        .expect("interest expressed")
}

/// Entry driven all the way to `hired`.
pub(super) fn hired_entry(machine: &Machine) -> PipelineEntry {
    awaiting_entry(machine);
    let key = key("anon-1", "job-1");
    machine.candidate_respond(&key, true).expect("accepts");
    machine.mark_selected(&key).expect("selected");
    machine.confirm_hire(&key).expect("hired")
}

/// Lets one competing write land between another caller's read and its write.
pub(super) struct RacingRepository {
    pub(super) inner: InMemoryPipelineStore,
    pub(super) armed: AtomicBool,
}

impl RacingRepository {
    pub(super) fn new(inner: InMemoryPipelineStore) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
        }
    }
}

impl PipelineRepository for RacingRepository {
    fn insert(&self, entry: PipelineEntry) -> Result<PipelineEntry, RepositoryError> {
        self.inner.insert(entry)
    }

    fn fetch(&self, key: &EntryKey) -> Result<Option<PipelineEntry>, RepositoryError> {
        self.inner.fetch(key)
    }

    fn update(
        &self,
        entry: PipelineEntry,
        expected_version: u64,
    ) -> Result<PipelineEntry, RepositoryError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let competitor = self
                .inner
                .fetch(&entry.key)?
                .ok_or(RepositoryError::NotFound)?;
            let version = competitor.version;
            self.inner.update(competitor, version)?;
        }
        self.inner.update(entry, expected_version)
    }

    fn in_stage(&self, stage: Stage, limit: usize) -> Result<Vec<PipelineEntry>, RepositoryError> {
        self.inner.in_stage(stage, limit)
    }

    fn for_job(&self, job_id: &JobId) -> Result<Vec<PipelineEntry>, RepositoryError> {
        self.inner.for_job(job_id)
    }
}

pub(super) struct UnavailableRepository;

impl PipelineRepository for UnavailableRepository {
    fn insert(&self, _entry: PipelineEntry) -> Result<PipelineEntry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _key: &EntryKey) -> Result<Option<PipelineEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _entry: PipelineEntry,
        _expected_version: u64,
    ) -> Result<PipelineEntry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn in_stage(&self, _stage: Stage, _limit: usize) -> Result<Vec<PipelineEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_job(&self, _job_id: &JobId) -> Result<Vec<PipelineEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
