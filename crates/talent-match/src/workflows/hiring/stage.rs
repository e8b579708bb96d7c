use std::fmt;

use serde::{Deserialize, Serialize};

/// Named point in a candidate's lifecycle for a given job opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Matched,
    SelfAssessed,
    Tested,
    CompanyInterested,
    AwaitingCandidateResponse,
    InterviewAccepted,
    Selected,
    Hired,
    InGuarantee,
    GuaranteeCompleted,
    Declined,
    InterestExpired,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::Matched,
        Stage::SelfAssessed,
        Stage::Tested,
        Stage::CompanyInterested,
        Stage::AwaitingCandidateResponse,
        Stage::InterviewAccepted,
        Stage::Selected,
        Stage::Hired,
        Stage::InGuarantee,
        Stage::GuaranteeCompleted,
        Stage::Declined,
        Stage::InterestExpired,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Stage::Matched => "matched",
            Stage::SelfAssessed => "self_assessed",
            Stage::Tested => "tested",
            Stage::CompanyInterested => "company_interested",
            Stage::AwaitingCandidateResponse => "awaiting_candidate_response",
            Stage::InterviewAccepted => "interview_accepted",
            Stage::Selected => "selected",
            Stage::Hired => "hired",
            Stage::InGuarantee => "in_guarantee",
            Stage::GuaranteeCompleted => "guarantee_completed",
            Stage::Declined => "declined",
            Stage::InterestExpired => "interest_expired",
        }
    }

    /// Position in the forward total order. The side branches sit right after the
    /// stage they leave from, so leaving for them is still a forward move.
    pub const fn rank(self) -> u8 {
        match self {
            Stage::Matched => 0,
            Stage::SelfAssessed => 1,
            Stage::Tested => 2,
            Stage::CompanyInterested => 3,
            Stage::AwaitingCandidateResponse => 4,
            Stage::Declined | Stage::InterestExpired => 5,
            Stage::InterviewAccepted => 6,
            Stage::Selected => 7,
            Stage::Hired => 8,
            Stage::InGuarantee => 9,
            Stage::GuaranteeCompleted => 10,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::GuaranteeCompleted | Stage::Declined | Stage::InterestExpired
        )
    }

    /// The only edges the state machine may take.
    pub fn can_transition_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Matched, Stage::SelfAssessed)
                | (Stage::SelfAssessed, Stage::Tested)
                | (Stage::Matched, Stage::CompanyInterested)
                | (Stage::Tested, Stage::CompanyInterested)
                | (Stage::CompanyInterested, Stage::AwaitingCandidateResponse)
                | (Stage::AwaitingCandidateResponse, Stage::InterviewAccepted)
                | (Stage::AwaitingCandidateResponse, Stage::Declined)
                | (Stage::AwaitingCandidateResponse, Stage::InterestExpired)
                | (Stage::InterviewAccepted, Stage::Selected)
                | (Stage::Selected, Stage::Hired)
                | (Stage::Hired, Stage::InGuarantee)
                | (Stage::InGuarantee, Stage::GuaranteeCompleted)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_allowed_edge_moves_forward() {
        for from in Stage::ALL {
            for to in Stage::ALL {
                if from.can_transition_to(to) {
                    assert!(to.rank() > from.rank(), "{from} -> {to} is not forward");
                }
            }
        }
    }

    #[test]
    fn terminal_stages_have_no_exits() {
        for from in Stage::ALL.into_iter().filter(|stage| stage.is_terminal()) {
            assert!(Stage::ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn labels_match_serde_names() {
        for stage in Stage::ALL {
            let encoded = serde_json::to_value(stage).expect("serializes");
            assert_eq!(encoded, serde_json::Value::String(stage.label().to_string()));
        }
    }
}
