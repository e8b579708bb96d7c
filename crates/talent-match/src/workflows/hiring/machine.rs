use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::clock::Clock;
use super::consent::{ConsentRecord, ConsentStore, ConsentStoreError};
use super::disclosure::{CandidateView, DisclosureGate, FieldSet};
use super::domain::{
    AddOnOrder, AddOnService, CandidateProfile, CompanyId, EntryKey, JobId, JobOpening,
    PaymentReceipt, SkillLevel, TestResults,
};
use super::entry::{PipelineEntry, PipelineStatusView};
use super::guarantee::GuaranteeTracker;
use super::invitation::InvitationWindow;
use super::repository::{DirectoryError, IdentityDirectory, PipelineRepository, RepositoryError};
use super::scoring::ScoringEngine;
use super::stage::Stage;

pub const DEFAULT_MATCH_THRESHOLD: u8 = 60;

/// Tunables the state machine is built from.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub match_threshold: u8,
    pub invitation_window: InvitationWindow,
    pub guarantee: GuaranteeTracker,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            invitation_window: InvitationWindow::default(),
            guarantee: GuaranteeTracker::default(),
        }
    }
}

/// Result of a batch deadline sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub advanced: Vec<EntryKey>,
    pub conflicts: usize,
}

/// Orchestrates every mutation of a `PipelineEntry`.
///
/// Each operation loads the entry, validates its stage, applies one transition and writes it
/// back with the version it was loaded at, so two racing callers cannot both succeed.
pub struct PipelineStateMachine<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    consents: Arc<dyn ConsentStore>,
    gate: DisclosureGate,
    scoring: ScoringEngine,
    window: InvitationWindow,
    guarantee: GuaranteeTracker,
    match_threshold: u8,
}

impl<R, D> PipelineStateMachine<R, D>
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    /// Every machine over the same repository must share the same `ConsentStore`.
    pub fn new(
        repository: Arc<R>,
        consents: Arc<dyn ConsentStore>,
        directory: Arc<D>,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            repository,
            directory,
            clock,
            gate: DisclosureGate::new(consents.clone()),
            consents,
            scoring: ScoringEngine::new(),
            window: settings.invitation_window,
            guarantee: settings.guarantee,
            match_threshold: settings.match_threshold.min(100),
        }
    }

    pub fn consents(&self) -> &Arc<dyn ConsentStore> {
        &self.consents
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn match_threshold(&self) -> u8 {
        self.match_threshold
    }

    /// Create the `matched` entry for a candidate and job opening.
    pub fn open_entry(
        &self,
        candidate: CandidateProfile,
        job: JobOpening,
        explicit_selection: bool,
    ) -> Result<PipelineEntry, PipelineError> {
        let score = self.scoring.compute_fit_score(&candidate, &job);
        if !explicit_selection && score < self.match_threshold {
            return Err(PipelineError::BelowMatchThreshold {
                score,
                threshold: self.match_threshold,
            });
        }

        let entry = PipelineEntry::new(candidate, job, score, self.clock.now());
        let stored = self.repository.insert(entry)?;
        info!(
            candidate = %stored.key.candidate_anon_id.0,
            job = %stored.key.job_id.0,
            fit_score = stored.fit_score,
            explicit_selection,
            "pipeline entry opened"
        );
        Ok(stored)
    }

    /// Open entries for every candidate at or above the threshold, best score first.
    /// Candidates already in the pipeline for this job are left untouched.
    pub fn match_candidates(
        &self,
        job: &JobOpening,
        candidates: Vec<CandidateProfile>,
    ) -> Result<Vec<PipelineEntry>, PipelineError> {
        let mut opened = Vec::new();
        for candidate in candidates {
            match self.open_entry(candidate, job.clone(), false) {
                Ok(entry) => opened.push(entry),
                Err(PipelineError::BelowMatchThreshold { .. })
                | Err(PipelineError::Repository(RepositoryError::Conflict)) => {}
                Err(other) => return Err(other),
            }
        }
        opened.sort_by(|a, b| b.fit_score.cmp(&a.fit_score));
        Ok(opened)
    }

    /// Authoritative read; lapsed deadlines are applied before the entry is returned.
    pub fn entry(&self, key: &EntryKey) -> Result<PipelineEntry, PipelineError> {
        let entry = self.load(key)?;
        self.refresh(entry, self.clock.now())
    }

    /// Entries for one job opening grouped by their current stage.
    pub fn board(
        &self,
        job_id: &JobId,
    ) -> Result<BTreeMap<Stage, Vec<PipelineStatusView>>, PipelineError> {
        let now = self.clock.now();
        let mut board: BTreeMap<Stage, Vec<PipelineStatusView>> = BTreeMap::new();
        for entry in self.repository.for_job(job_id)? {
            let fallback = entry.clone();
            let entry = match self.refresh(entry, now) {
                Ok(refreshed) => refreshed,
                Err(PipelineError::ConcurrentModification { .. }) => fallback,
                Err(other) => return Err(other),
            };
            board
                .entry(entry.stage)
                .or_default()
                .push(entry.status_view());
        }
        for column in board.values_mut() {
            column.sort_by(|a, b| b.fit_score.cmp(&a.fit_score));
        }
        Ok(board)
    }

    pub fn record_self_assessment(
        &self,
        key: &EntryKey,
        skills: BTreeMap<String, SkillLevel>,
    ) -> Result<PipelineEntry, PipelineError> {
        self.mutate(key, |entry, now| {
            entry.require_stage(&[Stage::Matched], Stage::SelfAssessed)?;
            entry.candidate.skills = skills;
            entry.advance(Stage::SelfAssessed, now)
        })
    }

    pub fn record_test_results(
        &self,
        key: &EntryKey,
        results: TestResults,
    ) -> Result<PipelineEntry, PipelineError> {
        let scoring = self.scoring;
        self.mutate(key, |entry, now| {
            entry.require_stage(&[Stage::SelfAssessed], Stage::Tested)?;
            entry.test_results = Some(results);
            entry.fit_score = scoring.compute_fit_score(&entry.effective_profile(), &entry.job);
            entry.advance(Stage::Tested, now)
        })
    }

    /// Company-side interest; opens the candidate's response window.
    pub fn express_interest(
        &self,
        key: &EntryKey,
        add_ons: BTreeSet<AddOnService>,
        exclusivity_requested: bool,
    ) -> Result<PipelineEntry, PipelineError> {
        let window = self.window;
        let schedule = self.guarantee.schedule();
        self.mutate(key, |entry, now| {
            entry.require_stage(&[Stage::Matched, Stage::Tested], Stage::CompanyInterested)?;
            if entry.consent_granted {
                return Err(PipelineError::InvalidStateTransition {
                    from: entry.stage,
                    attempted: Stage::CompanyInterested,
                });
            }

            entry.interest_expressed_at = Some(now);
            entry.interest_response_deadline = Some(window.deadline_from(now));
            entry.exclusivity_requested = exclusivity_requested;
            entry.add_ons = add_ons
                .into_iter()
                .map(|service| {
                    let order = AddOnOrder {
                        price: schedule.add_on_price(service),
                        addon_payment_confirmed: false,
                    };
                    (service, order)
                })
                .collect();

            entry.advance(Stage::CompanyInterested, now)?;
            entry.advance(Stage::AwaitingCandidateResponse, now)
        })
    }

    /// Candidate-side answer. Accepting is the only path that writes to the consent store.
    ///
    /// When an earlier acceptance committed but its consent record was never appended,
    /// accepting again appends the missing record instead of failing.
    pub fn candidate_respond(
        &self,
        key: &EntryKey,
        accepted: bool,
    ) -> Result<PipelineEntry, PipelineError> {
        if accepted {
            let current = self.load(key)?;
            if let Some(granted_at) = self.unrecorded_grant(&current)? {
                self.append_grant(&current, granted_at)?;
                info!(entry = %current.key, "missing consent record restored");
                return Ok(current);
            }
        }

        let attempted = if accepted {
            Stage::InterviewAccepted
        } else {
            Stage::Declined
        };

        let saved = self.mutate(key, |entry, now| {
            if entry.stage == Stage::InterestExpired {
                return Err(PipelineError::WindowExpired {
                    deadline: entry.interest_response_deadline.unwrap_or(now),
                });
            }
            entry.require_stage(&[Stage::AwaitingCandidateResponse], attempted)?;
            if InvitationWindow::is_expired(entry, now) {
                return Err(PipelineError::WindowExpired {
                    deadline: entry.interest_response_deadline.unwrap_or(now),
                });
            }

            if accepted {
                entry.consent_granted = true;
                entry.consent_timestamp = Some(now);
            }
            entry.advance(attempted, now)
        })?;

        if let (true, Some(granted_at)) = (accepted, saved.consent_timestamp) {
            self.append_grant(&saved, granted_at)?;
        }
        Ok(saved)
    }

    /// Grant time of an acceptance that committed without a matching consent record.
    fn unrecorded_grant(
        &self,
        entry: &PipelineEntry,
    ) -> Result<Option<DateTime<Utc>>, PipelineError> {
        let Some(granted_at) = entry.consent_timestamp.filter(|_| entry.consent_granted) else {
            return Ok(None);
        };
        let accepted_then = entry
            .history
            .iter()
            .any(|step| step.to == Stage::InterviewAccepted && step.at == granted_at);
        if !accepted_then || self.consents.latest(&entry.key)?.is_some() {
            return Ok(None);
        }
        Ok(Some(granted_at))
    }

    fn append_grant(
        &self,
        entry: &PipelineEntry,
        granted_at: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let record = ConsentRecord::grant(&entry.key, &entry.company_id, granted_at);
        self.consents.append(record).map_err(|failure| {
            error!(entry = %entry.key, error = %failure, "consent record not appended");
            PipelineError::from(failure)
        })
    }

    /// Moves every lapsed invitation to `interest_expired`.
    pub fn expire_stale_invitations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, PipelineError> {
        let candidates = self
            .repository
            .in_stage(Stage::AwaitingCandidateResponse, usize::MAX)?;
        self.sweep(candidates, now, |entry, now| {
            if InvitationWindow::is_expired(entry, now) {
                Some(Stage::InterestExpired)
            } else {
                None
            }
        })
    }

    pub fn mark_selected(&self, key: &EntryKey) -> Result<PipelineEntry, PipelineError> {
        self.mutate(key, |entry, now| {
            entry.require_stage(&[Stage::InterviewAccepted], Stage::Selected)?;
            entry.advance(Stage::Selected, now)
        })
    }

    /// Records the hire and the fee owed; the guarantee waits for payment.
    pub fn confirm_hire(&self, key: &EntryKey) -> Result<PipelineEntry, PipelineError> {
        let guarantee = &self.guarantee;
        self.mutate(key, |entry, now| {
            entry.require_stage(&[Stage::Selected], Stage::Hired)?;
            let fee = guarantee.success_fee(entry.assessed_level(), entry.job.annual_salary);
            entry.success_fee = Some(fee);
            entry.hired_at = Some(now);
            entry.advance(Stage::Hired, now)
        })
    }

    /// Billing-side confirmation that starts the guarantee period.
    pub fn confirm_payment(
        &self,
        key: &EntryKey,
        receipt: PaymentReceipt,
    ) -> Result<PipelineEntry, PipelineError> {
        let guarantee = &self.guarantee;
        self.mutate(key, |entry, now| {
            entry.require_stage(&[Stage::Hired], Stage::InGuarantee)?;
            if receipt.reference.trim().is_empty() {
                return Err(PipelineError::PaymentRejected {
                    reason: "missing payment reference".to_string(),
                });
            }
            let owed = entry.success_fee.unwrap_or_default();
            if receipt.amount < owed {
                return Err(PipelineError::PaymentRejected {
                    reason: format!("paid {} but {} is owed", receipt.amount, owed),
                });
            }

            entry.payment_confirmed = true;
            entry.payment_reference = Some(receipt.reference);
            entry.guarantee_deadline = Some(guarantee.deadline_from(now));
            entry.advance(Stage::InGuarantee, now)
        })
    }

    /// Settles one requested add-on. Archived entries no longer take payments.
    pub fn confirm_addon_payment(
        &self,
        key: &EntryKey,
        service: AddOnService,
    ) -> Result<PipelineEntry, PipelineError> {
        self.entry(key)?;
        self.mutate(key, |entry, _| {
            if entry.stage.is_terminal() {
                return Err(PipelineError::EntryArchived {
                    key: entry.key.clone(),
                    stage: entry.stage,
                });
            }
            let order = entry
                .add_ons
                .get_mut(&service)
                .ok_or(PipelineError::AddOnNotRequested(service))?;
            order.addon_payment_confirmed = true;
            Ok(())
        })
    }

    /// Closes the guarantee once its deadline has passed. Unpaid hires and completed
    /// guarantees are left as they are.
    pub fn evaluate_guarantee(
        &self,
        key: &EntryKey,
        now: DateTime<Utc>,
    ) -> Result<PipelineEntry, PipelineError> {
        let mut entry = self.load(key)?;
        match entry.stage {
            Stage::Hired | Stage::GuaranteeCompleted => Ok(entry),
            Stage::InGuarantee if !GuaranteeTracker::is_complete(&entry, now) => Ok(entry),
            Stage::InGuarantee => {
                let expected = entry.version;
                let from = entry.stage;
                entry.advance(Stage::GuaranteeCompleted, now)?;
                self.persist(entry, expected, from)
            }
            other => Err(PipelineError::InvalidStateTransition {
                from: other,
                attempted: Stage::GuaranteeCompleted,
            }),
        }
    }

    pub fn evaluate_guarantees(&self, now: DateTime<Utc>) -> Result<SweepReport, PipelineError> {
        let candidates = self.repository.in_stage(Stage::InGuarantee, usize::MAX)?;
        self.sweep(candidates, now, |entry, now| {
            if GuaranteeTracker::is_complete(entry, now) {
                Some(Stage::GuaranteeCompleted)
            } else {
                None
            }
        })
    }

    pub fn guarantee_days_remaining(&self, key: &EntryKey) -> Result<i64, PipelineError> {
        let entry = self.load(key)?;
        Ok(GuaranteeTracker::days_remaining(&entry, self.clock.now()))
    }

    pub fn visible_fields(
        &self,
        key: &EntryKey,
        requester: &CompanyId,
    ) -> Result<FieldSet, PipelineError> {
        let entry = self.load(key)?;
        Ok(self.gate.visible_fields(&entry, requester, self.clock.now())?)
    }

    /// Candidate as the requesting company may see it; restricted until consent.
    pub fn candidate_view(
        &self,
        key: &EntryKey,
        requester: &CompanyId,
    ) -> Result<CandidateView, PipelineError> {
        let entry = self.load(key)?;
        let fields = self.gate.visible_fields(&entry, requester, self.clock.now())?;
        self.project(&fields, &entry)
    }

    /// Fails with `ConsentNotGranted` instead of degrading to the restricted view.
    pub fn full_candidate_view(
        &self,
        key: &EntryKey,
        requester: &CompanyId,
    ) -> Result<CandidateView, PipelineError> {
        let entry = self.load(key)?;
        let fields = self
            .gate
            .require_full_disclosure(&entry, requester, self.clock.now())?;
        self.project(&fields, &entry)
    }

    fn project(
        &self,
        fields: &FieldSet,
        entry: &PipelineEntry,
    ) -> Result<CandidateView, PipelineError> {
        let identity = self.directory.identity(&entry.key.candidate_anon_id)?;
        Ok(DisclosureGate::project(fields, entry, identity.as_ref()))
    }

    fn load(&self, key: &EntryKey) -> Result<PipelineEntry, PipelineError> {
        self.repository
            .fetch(key)?
            .ok_or_else(|| PipelineError::EntryNotFound(key.clone()))
    }

    fn refresh(
        &self,
        mut entry: PipelineEntry,
        now: DateTime<Utc>,
    ) -> Result<PipelineEntry, PipelineError> {
        let next = match entry.stage {
            Stage::AwaitingCandidateResponse if InvitationWindow::is_expired(&entry, now) => {
                Stage::InterestExpired
            }
            Stage::InGuarantee if GuaranteeTracker::is_complete(&entry, now) => {
                Stage::GuaranteeCompleted
            }
            _ => return Ok(entry),
        };
        let expected = entry.version;
        let from = entry.stage;
        entry.advance(next, now)?;
        self.persist(entry, expected, from)
    }

    fn mutate<F>(&self, key: &EntryKey, apply: F) -> Result<PipelineEntry, PipelineError>
    where
        F: FnOnce(&mut PipelineEntry, DateTime<Utc>) -> Result<(), PipelineError>,
    {
        let now = self.clock.now();
        let original = self.load(key)?;
        let mut entry = original.clone();
        apply(&mut entry, now)?;
        if entry == original {
            return Ok(original);
        }
        self.persist(entry, original.version, original.stage)
    }

    fn persist(
        &self,
        entry: PipelineEntry,
        expected_version: u64,
        from: Stage,
    ) -> Result<PipelineEntry, PipelineError> {
        let key = entry.key.clone();
        let saved = self
            .repository
            .update(entry, expected_version)
            .map_err(|error| match error {
                RepositoryError::StaleVersion { expected, actual } => {
                    warn!(entry = %key, expected, actual, "lost concurrent update");
                    PipelineError::ConcurrentModification { key: key.clone() }
                }
                RepositoryError::NotFound => PipelineError::EntryNotFound(key.clone()),
                other => PipelineError::Repository(other),
            })?;

        if saved.stage != from {
            info!(
                candidate = %saved.key.candidate_anon_id.0,
                job = %saved.key.job_id.0,
                from = %from,
                to = %saved.stage,
                version = saved.version,
                "pipeline entry advanced"
            );
        }
        Ok(saved)
    }

    fn sweep<F>(
        &self,
        candidates: Vec<PipelineEntry>,
        now: DateTime<Utc>,
        due: F,
    ) -> Result<SweepReport, PipelineError>
    where
        F: Fn(&PipelineEntry, DateTime<Utc>) -> Option<Stage>,
    {
        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for mut entry in candidates {
            let Some(next) = due(&entry, now) else {
                continue;
            };
            let expected = entry.version;
            let from = entry.stage;
            entry.advance(next, now)?;
            match self.persist(entry, expected, from) {
                Ok(saved) => report.advanced.push(saved.key),
                Err(PipelineError::ConcurrentModification { .. }) => report.conflicts += 1,
                Err(other) => return Err(other),
            }
        }

        if !report.advanced.is_empty() || report.conflicts > 0 {
            info!(
                examined = report.examined,
                advanced = report.advanced.len(),
                conflicts = report.conflicts,
                "pipeline sweep finished"
            );
        }
        Ok(report)
    }
}

/// Error raised by the pipeline state machine.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cannot move entry from {from} to {attempted}")]
    InvalidStateTransition { from: Stage, attempted: Stage },
    #[error("response window closed at {deadline}")]
    WindowExpired { deadline: DateTime<Utc> },
    #[error("entry {key} was modified concurrently; reload and retry")]
    ConcurrentModification { key: EntryKey },
    #[error("candidate has not granted disclosure consent for {key}")]
    ConsentNotGranted { key: EntryKey },
    #[error("pipeline entry {0} not found")]
    EntryNotFound(EntryKey),
    #[error("fit score {score} is below the match threshold {threshold}")]
    BelowMatchThreshold { score: u8, threshold: u8 },
    #[error("add-on {} was not requested for this entry", .0.label())]
    AddOnNotRequested(AddOnService),
    #[error("payment rejected: {reason}")]
    PaymentRejected { reason: String },
    #[error("entry {key} is archived as {stage}")]
    EntryArchived { key: EntryKey, stage: Stage },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Consent(#[from] ConsentStoreError),
}

impl PipelineError {
    /// Stable machine-readable code for API payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidStateTransition { .. } => "invalid_state_transition",
            PipelineError::WindowExpired { .. } => "window_expired",
            PipelineError::ConcurrentModification { .. } => "concurrent_modification",
            PipelineError::ConsentNotGranted { .. } => "consent_not_granted",
            PipelineError::EntryNotFound(_) => "entry_not_found",
            PipelineError::BelowMatchThreshold { .. } => "below_match_threshold",
            PipelineError::AddOnNotRequested(_) => "add_on_not_requested",
            PipelineError::PaymentRejected { .. } => "payment_rejected",
            PipelineError::EntryArchived { .. } => "entry_archived",
            PipelineError::Repository(RepositoryError::Conflict) => "entry_exists",
            PipelineError::Repository(_)
            | PipelineError::Directory(_)
            | PipelineError::Consent(_) => "unavailable",
        }
    }
}
