//! Response payload. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::candidate::{
    Candidate, CorrelatedSkillPair, ScoreBreakdown, ScoredCandidate, SimilarityComponents,
    UtilityBreakdown,
};
use super::constraint::{DerivedConstraint, TestableConstraint};
use super::criteria::{AppliedFilter, AppliedPreference, FilterField};
use super::critique::Critique;
use super::request::StartTimeline;

// ============================================================================
// Matches
// ============================================================================

/// Mode-dependent breakdown on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchBreakdown {
    Utility(UtilityBreakdown),
    Similarity(SimilarityComponents),
}

/// One returned engineer. Utility mode carries `score` + component list;
/// similarity mode carries `similarityScore`, the four-part breakdown, and
/// the shared/correlated transparency lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineerMatch {
    #[serde(flatten)]
    pub candidate: Candidate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    pub score_breakdown: MatchBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlated_skills: Option<Vec<CorrelatedSkillPair>>,
}

impl From<ScoredCandidate> for EngineerMatch {
    fn from(scored: ScoredCandidate) -> Self {
        match scored.score_breakdown {
            ScoreBreakdown::Utility(breakdown) => Self {
                candidate: scored.candidate,
                score: Some(scored.score),
                similarity_score: None,
                score_breakdown: MatchBreakdown::Utility(breakdown),
                shared_skills: None,
                correlated_skills: None,
            },
            ScoreBreakdown::Similarity(breakdown) => Self {
                candidate: scored.candidate,
                score: None,
                similarity_score: Some(scored.score),
                score_breakdown: MatchBreakdown::Similarity(breakdown.components),
                shared_skills: Some(breakdown.shared_skills),
                correlated_skills: Some(breakdown.correlated_skills),
            },
        }
    }
}

// ============================================================================
// Advisor reports
// ============================================================================

/// Histogram bucket for the years-of-experience distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearsBucket {
    pub label: String,
    pub min_years: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_years: Option<f64>,
    pub count: u64,
}

/// Type-specific statistics for one constraint in a conflict set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintStats {
    Skill {
        count_matching: u64,
        /// How many engineers hold the skills at each proficiency floor.
        count_by_proficiency: BTreeMap<String, u64>,
    },
    Salary {
        count_matching: u64,
        db_min: Option<u64>,
        db_max: Option<u64>,
        requested_max: u64,
    },
    Years {
        count_matching: u64,
        distribution: Vec<YearsBucket>,
        db_min: Option<f64>,
        db_max: Option<f64>,
    },
    Timezone {
        count_matching: u64,
        count_by_zone: BTreeMap<String, u64>,
    },
    Timeline {
        count_matching: u64,
        count_by_timeline: BTreeMap<String, u64>,
    },
    Fallback {
        count_matching: u64,
    },
}

impl ConstraintStats {
    pub fn count_matching(&self) -> u64 {
        match self {
            Self::Skill { count_matching, .. }
            | Self::Salary { count_matching, .. }
            | Self::Years { count_matching, .. }
            | Self::Timezone { count_matching, .. }
            | Self::Timeline { count_matching, .. }
            | Self::Fallback { count_matching } => *count_matching,
        }
    }
}

/// Statistics keyed by constraint id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintStatsEntry {
    pub constraint_id: String,
    #[serde(flatten)]
    pub stats: ConstraintStats,
}

/// One minimal conflict set with its explanation statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSet {
    pub constraints: Vec<TestableConstraint>,
    pub stats: Vec<ConstraintStatsEntry>,
    /// Count over the full user constraint set (the baseline).
    pub count_matching_all: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// How a relaxation changes the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RelaxationAction {
    WidenSalary { new_ceiling: u64 },
    LowerYears { new_min: f64 },
    SlowerTimeline { new_timeline: StartTimeline },
    DropSkill { skill_ids: Vec<String> },
    DropRule { rule_id: String },
    DropConstraint,
}

/// One relaxation proposal with its projected result count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaxationSuggestion {
    pub constraint_id: String,
    #[serde(flatten)]
    pub action: RelaxationAction,
    pub description: String,
    /// Count obtained by re-issuing the count query with this suggestion
    /// applied.
    pub new_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictAnalysis {
    pub conflict_sets: Vec<ConflictSet>,
    /// True when the MCS search hit the request deadline and returned a
    /// partial enumeration.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Relaxation report, present when results are sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaxationReport {
    pub conflict_analysis: ConflictAnalysis,
    pub suggestions: Vec<RelaxationSuggestion>,
}

/// One tightening proposal mined from the current result page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TighteningSuggestion {
    pub field: FilterField,
    pub value: Value,
    pub description: String,
    /// Fraction of the mined page that would still pass.
    pub support: f64,
}

/// Tightening report, present when results are plentiful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TighteningReport {
    pub suggestions: Vec<TighteningSuggestion>,
}

/// One mined critique, single or compound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicCritiqueSuggestion {
    pub critiques: Vec<Critique>,
    pub description: String,
    /// Fraction of the current result page that satisfies the critique.
    pub support: f64,
}

// ============================================================================
// Metadata and the response envelope
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates_before_diversity: Option<usize>,
    pub defaults_applied: Vec<String>,
    /// Degradations are never silent: inference cap hits, LLM downgrades,
    /// advisor truncation all land here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub trace_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub matches: Vec<EngineerMatch>,
    pub total_count: u64,
    pub applied_filters: Vec<AppliedFilter>,
    pub applied_preferences: Vec<AppliedPreference>,
    pub derived_constraints: Vec<DerivedConstraint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relaxation: Option<RelaxationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tightening: Option<TighteningReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_critiques: Option<Vec<DynamicCritiqueSuggestion>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_skills: Vec<String>,
    pub query_metadata: QueryMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::{ScoreComponent, SimilarityBreakdown};
    use crate::models::request::{StartTimeline, UsTimezone};

    fn component(name: &str, weight: f64, raw: f64) -> ScoreComponent {
        ScoreComponent { component: name.into(), weight, raw, weighted: weight * raw }
    }

    fn bare_candidate() -> Candidate {
        Candidate {
            id: "e1".into(),
            name: "Engineer One".into(),
            headline: "Platform engineer".into(),
            salary: 160_000,
            years_experience: 8.0,
            start_timeline: StartTimeline::TwoWeeks,
            timezone: UsTimezone::Central,
            skills: vec![],
            business_domains: vec![],
            technical_domains: vec![],
        }
    }

    #[test]
    fn similarity_match_hoists_transparency_lists() {
        let scored = ScoredCandidate {
            candidate: bare_candidate(),
            score: 0.82,
            score_breakdown: ScoreBreakdown::Similarity(SimilarityBreakdown {
                components: SimilarityComponents {
                    skills: component("skills", 0.45, 0.9),
                    years_experience: component("yearsExperience", 0.27, 0.8),
                    domain: component("domain", 0.22, 0.7),
                    timezone: component("timezone", 0.06, 1.0),
                },
                shared_skills: vec!["skill_rust".into()],
                correlated_skills: vec![],
            }),
        };
        let wire = serde_json::to_value(EngineerMatch::from(scored)).unwrap();
        assert_eq!(wire["similarityScore"], 0.82);
        assert!(wire.get("score").is_none());
        assert_eq!(wire["sharedSkills"][0], "skill_rust");
        assert!(wire["scoreBreakdown"].get("skills").is_some());
        assert!(wire["scoreBreakdown"].get("sharedSkills").is_none());
    }

    #[test]
    fn utility_match_carries_score_only() {
        let scored = ScoredCandidate {
            candidate: bare_candidate(),
            score: 0.5,
            score_breakdown: ScoreBreakdown::Utility(UtilityBreakdown {
                components: vec![component("skillMatch", 0.28, 0.7)],
                matched_skills: vec!["skill_rust".into()],
                matched_domains: vec![],
            }),
        };
        let wire = serde_json::to_value(EngineerMatch::from(scored)).unwrap();
        assert_eq!(wire["score"], 0.5);
        assert!(wire.get("similarityScore").is_none());
        assert!(wire.get("sharedSkills").is_none());
    }

    #[test]
    fn constraint_stats_are_type_tagged() {
        let stats = ConstraintStats::Salary {
            count_matching: 12,
            db_min: Some(85_000),
            db_max: Some(260_000),
            requested_max: 120_000,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["type"], "salary");
        assert_eq!(json["count_matching"], 12);
    }
}
