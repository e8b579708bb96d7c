//! Candidate pipeline and disclosure workflow.
//!
//! A `PipelineEntry` tracks one anonymized candidate against one job opening, from the
//! initial match through consent-gated disclosure, hire, and the paid guarantee period.
//! `PipelineStateMachine` is the only mutation path; everything else here is a guard it
//! composes.

pub mod clock;
pub mod consent;
pub mod disclosure;
pub mod domain;
pub mod entry;
pub mod guarantee;
pub mod invitation;
pub mod machine;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod stage;
pub mod store;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use consent::{ConsentLedger, ConsentRecord, ConsentStore, ConsentStoreError};
pub use disclosure::{CandidateField, CandidateView, DisclosureGate, FieldSet};
pub use domain::{
    AddOnOrder, AddOnService, AnonId, CandidateIdentity, CandidateProfile, CompanyId,
    EntryKey, ExperienceBand, ExperienceRange, JobId, JobOpening, Money, PaymentReceipt,
    SkillLevel, TestResults,
};
pub use entry::{PipelineEntry, PipelineStatusView, StageTransition};
pub use guarantee::{FeeRule, FeeSchedule, GuaranteeTracker};
pub use invitation::InvitationWindow;
pub use machine::{PipelineError, PipelineSettings, PipelineStateMachine, SweepReport};
pub use repository::{DirectoryError, IdentityDirectory, PipelineRepository, RepositoryError};
pub use router::pipeline_router;
pub use scoring::{FitCriterion, FitScore, ScoreComponent, ScoringEngine};
pub use stage::Stage;
pub use store::InMemoryPipelineStore;
pub use sweep::{run_sweep, spawn_sweeper};
