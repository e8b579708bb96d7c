use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AddOnService, Money, SkillLevel};
use super::entry::PipelineEntry;

pub const DEFAULT_GUARANTEE_DAYS: i64 = 90;

/// How the success fee for one level is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeRule {
    Flat { amount: Money },
    PercentOfSalary { basis_points: u32, minimum: Money },
}

impl FeeRule {
    pub fn amount(&self, annual_salary: Option<Money>) -> Money {
        match *self {
            FeeRule::Flat { amount } => amount,
            FeeRule::PercentOfSalary {
                basis_points,
                minimum,
            } => annual_salary
                .map(|salary| salary.basis_points(basis_points))
                .unwrap_or(Money::ZERO)
                .max(minimum),
        }
    }
}

/// Business-configured pricing: success fees by assessed level and add-on prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub success_fees: BTreeMap<SkillLevel, FeeRule>,
    #[serde(default)]
    pub add_on_prices: BTreeMap<AddOnService, Money>,
}

impl FeeSchedule {
    pub fn add_on_price(&self, service: AddOnService) -> Money {
        self.add_on_prices
            .get(&service)
            .copied()
            .unwrap_or(Money::ZERO)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        let success_fees = BTreeMap::from([
            (
                SkillLevel::Basic,
                FeeRule::Flat {
                    amount: Money(150_000),
                },
            ),
            (
                SkillLevel::Intermediate,
                FeeRule::Flat {
                    amount: Money(250_000),
                },
            ),
            (
                SkillLevel::Advanced,
                FeeRule::PercentOfSalary {
                    basis_points: 1_200,
                    minimum: Money(400_000),
                },
            ),
            (
                SkillLevel::Expert,
                FeeRule::PercentOfSalary {
                    basis_points: 1_500,
                    minimum: Money(600_000),
                },
            ),
        ]);
        let add_on_prices = BTreeMap::from([
            (AddOnService::SoftSkillsTest, Money(19_900)),
            (AddOnService::TechnicalInterview, Money(49_900)),
            (AddOnService::BackgroundCheck, Money(29_900)),
        ]);
        Self {
            success_fees,
            add_on_prices,
        }
    }
}

/// Post-hire warranty period, active only once the success fee is paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuaranteeTracker {
    period: Duration,
    schedule: FeeSchedule,
}

impl GuaranteeTracker {
    pub fn new(period: Duration, schedule: FeeSchedule) -> Self {
        Self { period, schedule }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    /// Fee owed for a hire at `level`; levels missing from the schedule owe nothing.
    pub fn success_fee(&self, level: SkillLevel, annual_salary: Option<Money>) -> Money {
        self.schedule
            .success_fees
            .get(&level)
            .map(|rule| rule.amount(annual_salary))
            .unwrap_or(Money::ZERO)
    }

    pub fn deadline_from(&self, paid_at: DateTime<Utc>) -> DateTime<Utc> {
        paid_at + self.period
    }

    pub fn is_complete(entry: &PipelineEntry, now: DateTime<Utc>) -> bool {
        entry
            .guarantee_deadline
            .map(|deadline| now >= deadline)
            .unwrap_or(false)
    }

    /// Whole days left in the guarantee, clamped at zero; zero when not yet active.
    pub fn days_remaining(entry: &PipelineEntry, now: DateTime<Utc>) -> i64 {
        entry
            .guarantee_deadline
            .map(|deadline| (deadline - now).num_days().max(0))
            .unwrap_or(0)
    }
}

impl Default for GuaranteeTracker {
    fn default() -> Self {
        Self::new(Duration::days(DEFAULT_GUARANTEE_DAYS), FeeSchedule::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rule_respects_minimum() {
        let rule = FeeRule::PercentOfSalary {
            basis_points: 1_000,
            minimum: Money(500_000),
        };
        assert_eq!(rule.amount(None), Money(500_000));
        assert_eq!(rule.amount(Some(Money(1_000_000))), Money(500_000));
        assert_eq!(rule.amount(Some(Money(12_000_000))), Money(1_200_000));
    }

    #[test]
    fn schedule_deserializes_from_json() {
        let raw = r#"{
            "success_fees": {
                "1": { "kind": "flat", "amount": 100000 },
                "4": { "kind": "percent_of_salary", "basis_points": 2000, "minimum": 900000 }
            }
        }"#;
        let schedule: FeeSchedule = serde_json::from_str(raw).expect("schedule parses");
        let tracker = GuaranteeTracker::new(Duration::days(90), schedule);
        assert_eq!(tracker.success_fee(SkillLevel::Basic, None), Money(100_000));
        assert_eq!(tracker.success_fee(SkillLevel::Intermediate, None), Money::ZERO);
        assert_eq!(
            tracker.success_fee(SkillLevel::Expert, Some(Money(10_000_000))),
            Money(2_000_000)
        );
    }
}
