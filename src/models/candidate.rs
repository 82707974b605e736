//! Candidate rows returned by the planner and their scored forms.

use serde::{Deserialize, Serialize};

use super::request::{Proficiency, StartTimeline, UsTimezone};

/// How a candidate skill relates to what the request asked for.
///
/// `Correlated` is assigned only by the similarity scorer; in utility mode
/// any non-direct match is `Descendant` (or `None`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Direct,
    Descendant,
    Correlated,
    #[default]
    None,
}

/// One skill on a candidate profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSkill {
    pub skill_id: String,
    pub name: String,
    pub proficiency: Proficiency,
    /// Extraction confidence in [0,1]; feeds ranking, never filtering.
    pub confidence: f64,
    pub years_used: f64,
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meets_proficiency: Option<bool>,
}

/// Domain experience on a candidate profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDomain {
    pub domain_id: String,
    pub name: String,
    pub years: f64,
}

/// One engineer row as assembled from the planner's detail step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub headline: String,
    pub salary: u64,
    pub years_experience: f64,
    pub start_timeline: StartTimeline,
    pub timezone: UsTimezone,
    pub skills: Vec<CandidateSkill>,
    #[serde(default)]
    pub business_domains: Vec<CandidateDomain>,
    #[serde(default)]
    pub technical_domains: Vec<CandidateDomain>,
}

impl Candidate {
    pub fn skill(&self, skill_id: &str) -> Option<&CandidateSkill> {
        self.skills.iter().find(|s| s.skill_id == skill_id)
    }

    pub fn skill_ids(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.skill_id.as_str()).collect()
    }
}

// ============================================================================
// Scored candidates
// ============================================================================

/// One term of a utility score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponent {
    pub component: String,
    pub weight: f64,
    pub raw: f64,
    pub weighted: f64,
}

/// A correlated (non-exact) skill pair found by the similarity scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatedSkillPair {
    pub reference_skill_id: String,
    pub candidate_skill_id: String,
    pub strength: f64,
}

/// Utility-mode breakdown: one entry per non-zero component, plus the
/// matched skills/domains used for explanation text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityBreakdown {
    pub components: Vec<ScoreComponent>,
    pub matched_skills: Vec<String>,
    pub matched_domains: Vec<String>,
}

/// The fixed four similarity components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityComponents {
    pub skills: ScoreComponent,
    pub years_experience: ScoreComponent,
    pub domain: ScoreComponent,
    pub timezone: ScoreComponent,
}

/// Similarity-mode breakdown plus the transparency lists the wire hoists
/// to match level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityBreakdown {
    #[serde(flatten)]
    pub components: SimilarityComponents,
    pub shared_skills: Vec<String>,
    pub correlated_skills: Vec<CorrelatedSkillPair>,
}

/// Mode-tagged score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoreBreakdown {
    Utility(UtilityBreakdown),
    Similarity(SimilarityBreakdown),
}

/// Candidate plus its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
}
