use crate::infra::InMemoryIdentityDirectory;
use chrono::{Duration, TimeZone, Utc};
use clap::{Args, ValueEnum};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use talent_match::error::AppError;
use talent_match::workflows::hiring::{
    run_sweep, AddOnService, AnonId, CandidateIdentity, CandidateProfile, CandidateView,
    CompanyId, ConsentLedger, ConsentStore, EntryKey, ExperienceRange, InMemoryPipelineStore, JobId, JobOpening, ManualClock,
    Money, PaymentReceipt, PipelineEntry, PipelineError, PipelineSettings, PipelineStateMachine,
    ScoringEngine, SkillLevel, TestResults,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum DemoOutcome {
    /// Candidate accepts, is hired, pays, and clears the guarantee
    #[default]
    Accept,
    /// Candidate declines the interview request
    Decline,
    /// Candidate never answers and the invitation lapses
    Expire,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// How the candidate answers the company's interest
    #[arg(long, value_enum, default_value_t = DemoOutcome::Accept)]
    pub(crate) outcome: DemoOutcome,
    /// Annual salary of the demo opening, in cents
    #[arg(long, default_value_t = 18_000_000)]
    pub(crate) salary_cents: u64,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON file holding an anonymized candidate profile
    #[arg(long)]
    pub(crate) candidate: PathBuf,
    /// JSON file holding a job opening
    #[arg(long)]
    pub(crate) job: PathBuf,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let candidate: CandidateProfile = read_json(&args.candidate)?;
    let job: JobOpening = read_json(&args.job)?;

    let fit = ScoringEngine::new().evaluate(&candidate, &job);
    println!(
        "Fit of {} for {} ({}): {}/100",
        candidate.anon_id.0, job.title, job.job_id.0, fit.score
    );
    for component in &fit.components {
        println!(
            "- {:?}: {:.1} of {:.0} ({})",
            component.criterion, component.earned, component.possible, component.notes
        );
    }
    if fit.components.is_empty() {
        println!("- opening lists no criteria; score defaults to 0");
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| AppError::invalid_input(path, source))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        outcome,
        salary_cents,
    } = args;

    let start = Utc
        .with_ymd_and_hms(2025, 3, 3, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let clock = Arc::new(ManualClock::new(start));
    let directory = InMemoryIdentityDirectory::default();
    directory
        .register(AnonId("cand-0193".to_string()), demo_identity())?;
    let machine = PipelineStateMachine::new(
        Arc::new(InMemoryPipelineStore::new()),
        Arc::new(ConsentLedger::new()),
        Arc::new(directory),
        clock.clone(),
        PipelineSettings::default(),
    );

    let company = CompanyId("northwind".to_string());
    let key = EntryKey::new("cand-0193", "job-frontend-01");

    println!("Candidate pipeline demo ({outcome:?})");
    let entry = machine.open_entry(demo_candidate(), demo_job(salary_cents), false)?;
    print_stage(&entry);

    let entry = machine.record_self_assessment(
        &key,
        BTreeMap::from([
            ("React".to_string(), SkillLevel::Expert),
            ("TypeScript".to_string(), SkillLevel::Advanced),
        ]),
    )?;
    print_stage(&entry);

    let entry = machine.record_test_results(
        &key,
        TestResults {
            overall_level: SkillLevel::Advanced,
            skill_levels: BTreeMap::from([
                ("React".to_string(), SkillLevel::Advanced),
                ("Node".to_string(), SkillLevel::Intermediate),
            ]),
        },
    )?;
    print_stage(&entry);

    let entry = machine.express_interest(
        &key,
        BTreeSet::from([AddOnService::TechnicalInterview]),
        true,
    )?;
    print_stage(&entry);
    if let Some(deadline) = entry.interest_response_deadline {
        println!("  response window closes {deadline}");
    }
    print_view("  company sees", &machine.candidate_view(&key, &company)?);

    match outcome {
        DemoOutcome::Decline => {
            clock.advance(Duration::hours(6));
            let entry = machine.candidate_respond(&key, false)?;
            print_stage(&entry);
            print_view("  company still sees", &machine.candidate_view(&key, &company)?);
        }
        DemoOutcome::Expire => {
            clock.advance(Duration::hours(49));
            let report = machine.expire_stale_invitations(machine.now())?;
            println!("  sweep expired {} invitation(s)", report.advanced.len());
            print_stage(&machine.entry(&key)?);
            match machine.candidate_respond(&key, true) {
                Err(err @ PipelineError::WindowExpired { .. }) => {
                    println!("  late acceptance refused: {err}")
                }
                Err(other) => return Err(other.into()),
                Ok(entry) => print_stage(&entry),
            }
        }
        DemoOutcome::Accept => {
            clock.advance(Duration::hours(6));
            print_stage(&machine.candidate_respond(&key, true)?);
            print_view("  company now sees", &machine.full_candidate_view(&key, &company)?);
            machine.confirm_addon_payment(&key, AddOnService::TechnicalInterview)?;
            println!("  technical interview add-on paid");

            clock.advance(Duration::days(7));
            print_stage(&machine.mark_selected(&key)?);
            let hired = machine.confirm_hire(&key)?;
            print_stage(&hired);
            let fee = hired.success_fee.unwrap_or(Money::ZERO);
            println!("  success fee owed: {fee}");

            clock.advance(Duration::days(2));
            let paid = machine.confirm_payment(
                &key,
                PaymentReceipt {
                    reference: "inv-2025-0042".to_string(),
                    amount: fee,
                },
            )?;
            print_stage(&paid);
            println!(
                "  guarantee: {} days remaining",
                machine.guarantee_days_remaining(&key)?
            );

            clock.advance(Duration::days(90) + Duration::seconds(1));
            run_sweep(&machine);
            print_stage(&machine.entry(&key)?);
        }
    }

    let entry = machine.entry(&key)?;
    println!("\nHistory ({} transitions)", entry.history.len());
    for transition in &entry.history {
        println!(
            "- {} | {} -> {}",
            transition.at.format("%Y-%m-%d %H:%M"),
            transition.from,
            transition.to
        );
    }
    let records = machine.consents().history(&key)?;
    println!("Consent records for {key}: {}", records.len());
    Ok(())
}

fn print_stage(entry: &PipelineEntry) {
    println!(
        "[{}] {} (fit {}, v{})",
        entry.key, entry.stage, entry.fit_score, entry.version
    );
}

fn print_view(label: &str, view: &CandidateView) {
    let name = view.full_name.as_deref().unwrap_or("<withheld>");
    let email = view.email.as_deref().unwrap_or("<withheld>");
    println!(
        "{label}: {} | {} | {} | name {name} | email {email}",
        view.anon_id,
        view.experience_band.unwrap_or("-"),
        view.city_state.as_deref().unwrap_or("-"),
    );
}

fn demo_candidate() -> CandidateProfile {
    CandidateProfile {
        anon_id: AnonId("cand-0193".to_string()),
        skills: BTreeMap::from([
            ("React".to_string(), SkillLevel::Advanced),
            ("Node.js".to_string(), SkillLevel::Intermediate),
        ]),
        years_experience: 5,
        location: Some("Belo Horizonte, MG".to_string()),
    }
}

fn demo_job(salary_cents: u64) -> JobOpening {
    JobOpening {
        job_id: JobId("job-frontend-01".to_string()),
        company_id: CompanyId("northwind".to_string()),
        title: "Senior Frontend Engineer".to_string(),
        required_skills: BTreeMap::from([
            ("React".to_string(), SkillLevel::Advanced),
            ("Node".to_string(), SkillLevel::Intermediate),
        ]),
        experience: Some(ExperienceRange {
            min_years: 4,
            max_years: Some(8),
        }),
        location: Some("Remote".to_string()),
        annual_salary: Some(Money(salary_cents)),
    }
}

fn demo_identity() -> CandidateIdentity {
    CandidateIdentity {
        full_name: "Carla Mendes".to_string(),
        email: "carla.mendes@example.com".to_string(),
        phone: "+55 31 97777-2222".to_string(),
        national_id: "321.654.987-11".to_string(),
        street_address: "Rua da Bahia, 1200".to_string(),
        city: "Belo Horizonte".to_string(),
        state: "MG".to_string(),
    }
}
