use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier addressing a candidate until consent is granted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnonId(pub String);

/// Identifier of a job opening published by a company.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

/// Identifier of the hiring company.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub String);

/// Composite key addressing a single pipeline entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub candidate_anon_id: AnonId,
    pub job_id: JobId,
}

impl EntryKey {
    pub fn new(candidate_anon_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            candidate_anon_id: AnonId(candidate_anon_id.into()),
            job_id: JobId(job_id.into()),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.candidate_anon_id.0, self.job_id.0)
    }
}

/// Amount of money in minor currency units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Applies a rate expressed in basis points (1/100 of a percent), rounding down.
    pub fn basis_points(self, bps: u32) -> Money {
        let scaled = (self.0 as u128) * (bps as u128) / 10_000;
        Money(scaled.min(u64::MAX as u128) as u64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Self-declared or assessed proficiency, constrained to the 1-4 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SkillLevel {
    Basic = 1,
    Intermediate = 2,
    Advanced = 3,
    Expert = 4,
}

impl SkillLevel {
    pub const ALL: [SkillLevel; 4] = [
        SkillLevel::Basic,
        SkillLevel::Intermediate,
        SkillLevel::Advanced,
        SkillLevel::Expert,
    ];

    pub const fn value(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            SkillLevel::Basic => "basic",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
            SkillLevel::Expert => "expert",
        }
    }
}

impl TryFrom<u8> for SkillLevel {
    type Error = InvalidSkillLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SkillLevel::Basic),
            2 => Ok(SkillLevel::Intermediate),
            3 => Ok(SkillLevel::Advanced),
            4 => Ok(SkillLevel::Expert),
            other => Err(InvalidSkillLevel(other)),
        }
    }
}

impl From<SkillLevel> for u8 {
    fn from(level: SkillLevel) -> Self {
        level.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("skill level must be between 1 and 4, found {0}")]
pub struct InvalidSkillLevel(pub u8);

/// Anonymized candidate snapshot the pipeline operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub anon_id: AnonId,
    #[serde(default)]
    pub skills: BTreeMap<String, SkillLevel>,
    #[serde(default)]
    pub years_experience: u32,
    #[serde(default)]
    pub location: Option<String>,
}

impl CandidateProfile {
    /// Rounded mean of the declared levels, `Basic` when nothing is declared.
    pub fn declared_level(&self) -> SkillLevel {
        if self.skills.is_empty() {
            return SkillLevel::Basic;
        }
        let total: u32 = self.skills.values().map(|level| level.value() as u32).sum();
        let mean = (total as f64 / self.skills.len() as f64).round() as u8;
        SkillLevel::try_from(mean.clamp(1, 4)).unwrap_or(SkillLevel::Basic)
    }

    pub fn experience_band(&self) -> ExperienceBand {
        ExperienceBand::from_years(self.years_experience)
    }
}

/// Years-of-experience bucket shown to companies before consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceBand {
    UpToTwo,
    ThreeToFive,
    SixToTen,
    OverTen,
}

impl ExperienceBand {
    pub fn from_years(years: u32) -> Self {
        match years {
            0..=2 => ExperienceBand::UpToTwo,
            3..=5 => ExperienceBand::ThreeToFive,
            6..=10 => ExperienceBand::SixToTen,
            _ => ExperienceBand::OverTen,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ExperienceBand::UpToTwo => "0-2 years",
            ExperienceBand::ThreeToFive => "3-5 years",
            ExperienceBand::SixToTen => "6-10 years",
            ExperienceBand::OverTen => "10+ years",
        }
    }
}

/// Optional bounds on the years of experience a job opening asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceRange {
    pub min_years: u32,
    #[serde(default)]
    pub max_years: Option<u32>,
}

/// Job opening as published by a company; read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOpening {
    pub job_id: JobId,
    pub company_id: CompanyId,
    pub title: String,
    #[serde(default)]
    pub required_skills: BTreeMap<String, SkillLevel>,
    #[serde(default)]
    pub experience: Option<ExperienceRange>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub annual_salary: Option<Money>,
}

/// Outcome of the platform's skill tests for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResults {
    pub overall_level: SkillLevel,
    #[serde(default)]
    pub skill_levels: BTreeMap<String, SkillLevel>,
}

/// Paid extras a company can attach when expressing interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOnService {
    SoftSkillsTest,
    TechnicalInterview,
    BackgroundCheck,
}

impl AddOnService {
    pub const fn label(self) -> &'static str {
        match self {
            AddOnService::SoftSkillsTest => "soft_skills_test",
            AddOnService::TechnicalInterview => "technical_interview",
            AddOnService::BackgroundCheck => "background_check",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "soft_skills_test" => Some(AddOnService::SoftSkillsTest),
            "technical_interview" => Some(AddOnService::TechnicalInterview),
            "background_check" => Some(AddOnService::BackgroundCheck),
            _ => None,
        }
    }
}

/// A requested add-on and its independent payment obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnOrder {
    pub price: Money,
    pub addon_payment_confirmed: bool,
}

/// Evidence from the billing collaborator that the success fee was paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: String,
    pub amount: Money,
}

/// Candidate's personal data. Only `city` and `state` may be shown before consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub national_id: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
}

impl CandidateIdentity {
    /// `"City, ST"`, or whichever half is present.
    pub fn city_state(&self) -> Option<String> {
        match (self.city.trim(), self.state.trim()) {
            ("", "") => None,
            (city, "") => Some(city.to_string()),
            ("", state) => Some(state.to_string()),
            (city, state) => Some(format!("{city}, {state}")),
        }
    }
}
