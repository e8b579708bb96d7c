use serde::{Deserialize, Serialize};

use super::domain::{CandidateProfile, JobOpening};

const SKILLS_WEIGHT: f64 = 40.0;
const EXPERIENCE_WEIGHT: f64 = 30.0;
const OVERQUALIFIED_CREDIT: f64 = 20.0;
const LOCATION_WEIGHT: f64 = 30.0;
const REMOTE_CREDIT: f64 = 20.0;
const DEFAULT_EXPERIENCE_SPAN: u32 = 10;

/// Criterion contributing to a fit score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitCriterion {
    Skills,
    Experience,
    Location,
}

/// Discrete contribution to a fit score so displayed values can be explained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub criterion: FitCriterion,
    pub earned: f64,
    pub possible: f64,
    pub notes: String,
}

/// Normalized 0-100 fit score plus the components it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitScore {
    pub score: u8,
    pub components: Vec<ScoreComponent>,
}

impl FitScore {
    pub fn raw_total(&self) -> f64 {
        self.components.iter().map(|component| component.earned).sum()
    }

    pub fn max_possible(&self) -> f64 {
        self.components.iter().map(|component| component.possible).sum()
    }
}

/// Stateless scorer comparing an anonymized candidate to a job opening.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn compute_fit_score(&self, candidate: &CandidateProfile, job: &JobOpening) -> u8 {
        self.evaluate(candidate, job).score
    }

    pub fn evaluate(&self, candidate: &CandidateProfile, job: &JobOpening) -> FitScore {
        let mut components = Vec::new();

        if let Some(component) = skills_component(candidate, job) {
            components.push(component);
        }
        if let Some(component) = experience_component(candidate, job) {
            components.push(component);
        }
        if let Some(component) = location_component(candidate, job) {
            components.push(component);
        }

        let score: f64 = components.iter().map(|component| component.earned).sum();
        let max_possible: f64 = components.iter().map(|component| component.possible).sum();

        let normalized = if max_possible == 0.0 {
            0
        } else {
            (100.0 * score / max_possible).round().clamp(0.0, 100.0) as u8
        };

        FitScore {
            score: normalized,
            components,
        }
    }
}

fn skills_component(candidate: &CandidateProfile, job: &JobOpening) -> Option<ScoreComponent> {
    if job.required_skills.is_empty() {
        return None;
    }

    let declared: Vec<String> = candidate
        .skills
        .keys()
        .map(|name| name.to_lowercase())
        .collect();

    let required_count = job.required_skills.len();
    let matched_count = job
        .required_skills
        .keys()
        .map(|required| required.to_lowercase())
        .filter(|required| declared.iter().any(|name| name.contains(required.as_str())))
        .count();

    let earned = SKILLS_WEIGHT * matched_count as f64 / required_count as f64;
    Some(ScoreComponent {
        criterion: FitCriterion::Skills,
        earned,
        possible: SKILLS_WEIGHT,
        notes: format!("{matched_count} of {required_count} required skills declared"),
    })
}

fn experience_component(candidate: &CandidateProfile, job: &JobOpening) -> Option<ScoreComponent> {
    let range = job.experience?;
    let years = candidate.years_experience;
    let min = range.min_years;
    let max = range
        .max_years
        .unwrap_or_else(|| min.saturating_add(DEFAULT_EXPERIENCE_SPAN));

    let (earned, notes) = if years >= min {
        if years <= max {
            (
                EXPERIENCE_WEIGHT,
                format!("{years} years within {min}-{max}"),
            )
        } else {
            (
                OVERQUALIFIED_CREDIT,
                format!("{years} years exceeds {max} (overqualified)"),
            )
        }
    } else {
        (
            EXPERIENCE_WEIGHT * years as f64 / min as f64,
            format!("{years} years below minimum {min}"),
        )
    };

    Some(ScoreComponent {
        criterion: FitCriterion::Experience,
        earned,
        possible: EXPERIENCE_WEIGHT,
        notes,
    })
}

fn location_component(candidate: &CandidateProfile, job: &JobOpening) -> Option<ScoreComponent> {
    let job_location = normalized_location(job.location.as_deref())?;
    let candidate_location = normalized_location(candidate.location.as_deref())?;

    let (earned, notes) = if job_location.contains(candidate_location.as_str())
        || candidate_location.contains(job_location.as_str())
    {
        (LOCATION_WEIGHT, "location matches".to_string())
    } else if job_location.contains("remote") || candidate_location.contains("remote") {
        (REMOTE_CREDIT, "remote arrangement possible".to_string())
    } else {
        (0.0, "location mismatch".to_string())
    };

    Some(ScoreComponent {
        criterion: FitCriterion::Location,
        earned,
        possible: LOCATION_WEIGHT,
        notes,
    })
}

fn normalized_location(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}
