use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    AddOnOrder, AddOnService, CandidateProfile, CompanyId, EntryKey, JobOpening, Money,
    SkillLevel, TestResults,
};
use super::machine::PipelineError;
use super::stage::Stage;

/// Audit line appended on every stage change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: Stage,
    pub to: Stage,
    pub at: DateTime<Utc>,
}

/// Central aggregate tracking one candidate against one job opening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEntry {
    pub key: EntryKey,
    pub company_id: CompanyId,
    pub candidate: CandidateProfile,
    pub job: JobOpening,
    pub stage: Stage,
    pub fit_score: u8,
    pub test_results: Option<TestResults>,
    pub consent_granted: bool,
    pub consent_timestamp: Option<DateTime<Utc>>,
    pub interest_expressed_at: Option<DateTime<Utc>>,
    pub interest_response_deadline: Option<DateTime<Utc>>,
    pub exclusivity_requested: bool,
    pub add_ons: BTreeMap<AddOnService, AddOnOrder>,
    pub success_fee: Option<Money>,
    pub hired_at: Option<DateTime<Utc>>,
    pub payment_confirmed: bool,
    pub payment_reference: Option<String>,
    pub guarantee_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub history: Vec<StageTransition>,
    /// Optimistic concurrency token, bumped by the repository on every write.
    pub version: u64,
}

impl PipelineEntry {
    pub fn new(
        candidate: CandidateProfile,
        job: JobOpening,
        fit_score: u8,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: EntryKey {
                candidate_anon_id: candidate.anon_id.clone(),
                job_id: job.job_id.clone(),
            },
            company_id: job.company_id.clone(),
            candidate,
            job,
            stage: Stage::Matched,
            fit_score,
            test_results: None,
            consent_granted: false,
            consent_timestamp: None,
            interest_expressed_at: None,
            interest_response_deadline: None,
            exclusivity_requested: false,
            add_ons: BTreeMap::new(),
            success_fee: None,
            hired_at: None,
            payment_confirmed: false,
            payment_reference: None,
            guarantee_deadline: None,
            created_at,
            archived_at: None,
            history: Vec::new(),
            version: 0,
        }
    }

    /// Fails unless the entry currently sits in one of `allowed`.
    pub(crate) fn require_stage(
        &self,
        allowed: &[Stage],
        attempted: Stage,
    ) -> Result<(), PipelineError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(PipelineError::InvalidStateTransition {
                from: self.stage,
                attempted,
            })
        }
    }

    /// Moves the entry to `next`, recording the transition.
    pub(crate) fn advance(&mut self, next: Stage, at: DateTime<Utc>) -> Result<(), PipelineError> {
        let backward = next.rank() <= self.stage.rank();
        if !self.stage.can_transition_to(next) || (self.consent_granted && backward) {
            return Err(PipelineError::InvalidStateTransition {
                from: self.stage,
                attempted: next,
            });
        }

        self.history.push(StageTransition {
            from: self.stage,
            to: next,
            at,
        });
        self.stage = next;
        if next.is_terminal() {
            self.archived_at = Some(at);
        }
        Ok(())
    }

    /// Level the success fee is keyed on: the tested level when present.
    pub fn assessed_level(&self) -> SkillLevel {
        self.test_results
            .as_ref()
            .map(|results| results.overall_level)
            .unwrap_or_else(|| self.candidate.declared_level())
    }

    /// Declared skills with tested levels layered on top.
    pub fn effective_profile(&self) -> CandidateProfile {
        let mut profile = self.candidate.clone();
        if let Some(results) = &self.test_results {
            for (skill, level) in &results.skill_levels {
                profile.skills.insert(skill.clone(), *level);
            }
        }
        profile
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn status_view(&self) -> PipelineStatusView {
        PipelineStatusView {
            candidate_anon_id: self.key.candidate_anon_id.0.clone(),
            job_id: self.key.job_id.0.clone(),
            stage: self.stage.label(),
            fit_score: self.fit_score,
            consent_granted: self.consent_granted,
            interest_response_deadline: self.interest_response_deadline,
            success_fee: self.success_fee,
            payment_confirmed: self.payment_confirmed,
            guarantee_deadline: self.guarantee_deadline,
            archived: self.is_archived(),
            version: self.version,
        }
    }
}

/// Identity-free summary returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatusView {
    pub candidate_anon_id: String,
    pub job_id: String,
    pub stage: &'static str,
    pub fit_score: u8,
    pub consent_granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_response_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_fee: Option<Money>,
    pub payment_confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guarantee_deadline: Option<DateTime<Utc>>,
    pub archived: bool,
    pub version: u64,
}
