use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::consent::{ConsentStore, ConsentStoreError};
use super::domain::{CandidateIdentity, CompanyId, SkillLevel};
use super::entry::PipelineEntry;
use super::machine::PipelineError;

/// Individual candidate attribute a company may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateField {
    AnonId,
    DeclaredSkills,
    ExperienceBand,
    CityState,
    FitScore,
    FullName,
    Email,
    Phone,
    NationalId,
    StreetAddress,
}

impl CandidateField {
    pub const fn is_identifying(self) -> bool {
        matches!(
            self,
            CandidateField::FullName
                | CandidateField::Email
                | CandidateField::Phone
                | CandidateField::NationalId
                | CandidateField::StreetAddress
        )
    }
}

const RESTRICTED_FIELDS: [CandidateField; 5] = [
    CandidateField::AnonId,
    CandidateField::DeclaredSkills,
    CandidateField::ExperienceBand,
    CandidateField::CityState,
    CandidateField::FitScore,
];

const IDENTIFYING_FIELDS: [CandidateField; 5] = [
    CandidateField::FullName,
    CandidateField::Email,
    CandidateField::Phone,
    CandidateField::NationalId,
    CandidateField::StreetAddress,
];

/// Set of fields visible to one requester for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet(BTreeSet<CandidateField>);

impl FieldSet {
    /// Aggregate, non-identifying view.
    pub fn restricted() -> Self {
        Self(RESTRICTED_FIELDS.into_iter().collect())
    }

    pub fn full() -> Self {
        Self(
            RESTRICTED_FIELDS
                .into_iter()
                .chain(IDENTIFYING_FIELDS)
                .collect(),
        )
    }

    pub fn contains(&self, field: CandidateField) -> bool {
        self.0.contains(&field)
    }

    pub fn discloses_identity(&self) -> bool {
        self.0.iter().any(|field| field.is_identifying())
    }

    pub fn iter(&self) -> impl Iterator<Item = CandidateField> + '_ {
        self.0.iter().copied()
    }
}

/// Candidate projection filtered through a `FieldSet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateView {
    pub anon_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<BTreeMap<String, SkillLevel>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_band: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
}

/// Decides what a company may see, re-evaluated on every access.
#[derive(Clone)]
pub struct DisclosureGate {
    consents: Arc<dyn ConsentStore>,
}

impl DisclosureGate {
    pub fn new(consents: Arc<dyn ConsentStore>) -> Self {
        Self { consents }
    }

    /// Full PII only when the entry carries consent, the requester is the company that owns
    /// this job, and the ledger holds an active grant for this exact entry.
    pub fn visible_fields(
        &self,
        entry: &PipelineEntry,
        requester: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<FieldSet, ConsentStoreError> {
        let granted = entry.consent_granted
            && &entry.company_id == requester
            && self.consents.is_granted(&entry.key, requester, now)?;
        Ok(if granted {
            FieldSet::full()
        } else {
            FieldSet::restricted()
        })
    }

    /// Strict variant for code paths that must never fall back to partial data.
    pub fn require_full_disclosure(
        &self,
        entry: &PipelineEntry,
        requester: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<FieldSet, PipelineError> {
        let fields = self.visible_fields(entry, requester, now)?;
        if fields.discloses_identity() {
            Ok(fields)
        } else {
            Err(PipelineError::ConsentNotGranted {
                key: entry.key.clone(),
            })
        }
    }

    pub fn project(
        fields: &FieldSet,
        entry: &PipelineEntry,
        identity: Option<&CandidateIdentity>,
    ) -> CandidateView {
        let candidate = &entry.candidate;
        let shown = |field: CandidateField| identity.filter(|_| fields.contains(field));

        CandidateView {
            anon_id: candidate.anon_id.0.clone(),
            skills: fields
                .contains(CandidateField::DeclaredSkills)
                .then(|| candidate.skills.clone()),
            experience_band: fields
                .contains(CandidateField::ExperienceBand)
                .then(|| candidate.experience_band().label()),
            city_state: identity
                .filter(|_| fields.contains(CandidateField::CityState))
                .and_then(CandidateIdentity::city_state),
            fit_score: fields
                .contains(CandidateField::FitScore)
                .then_some(entry.fit_score),
            full_name: shown(CandidateField::FullName).map(|identity| identity.full_name.clone()),
            email: shown(CandidateField::Email).map(|identity| identity.email.clone()),
            phone: shown(CandidateField::Phone).map(|identity| identity.phone.clone()),
            national_id: shown(CandidateField::NationalId)
                .map(|identity| identity.national_id.clone()),
            street_address: shown(CandidateField::StreetAddress)
                .map(|identity| identity.street_address.clone()),
        }
    }
}
