//! Search request payload and its closed vocabularies.
//!
//! Field names match the wire payload one-for-one (snake_case). Semantic
//! validation lives here so the hosting process only has to deserialize
//! and forward; violations surface as `ValidationError` with the
//! offending path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::utils::{EngineError, EngineResult};

/// Upper bound accepted for `limit`.
pub const MAX_LIMIT: u32 = 100;
/// Page size applied when the request omits `limit`.
pub const DEFAULT_LIMIT: u32 = 10;

// ============================================================================
// Closed vocabularies
// ============================================================================

/// Seniority ladder, ordered junior → principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityLevel {
    Junior,
    Mid,
    Senior,
    Staff,
    Principal,
}

impl SeniorityLevel {
    pub const ORDER: [SeniorityLevel; 5] =
        [Self::Junior, Self::Mid, Self::Senior, Self::Staff, Self::Principal];

    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|l| *l == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Self {
        Self::ORDER[index.min(Self::ORDER.len() - 1)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Junior => "junior",
            Self::Mid => "mid",
            Self::Senior => "senior",
            Self::Staff => "staff",
            Self::Principal => "principal",
        }
    }
}

/// Availability, ordered fastest → slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartTimeline {
    Immediate,
    TwoWeeks,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl StartTimeline {
    pub const ORDER: [StartTimeline; 6] = [
        Self::Immediate,
        Self::TwoWeeks,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
    ];

    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Self {
        Self::ORDER[index.min(Self::ORDER.len() - 1)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::TwoWeeks => "two_weeks",
            Self::OneMonth => "one_month",
            Self::ThreeMonths => "three_months",
            Self::SixMonths => "six_months",
            Self::OneYear => "one_year",
        }
    }
}

/// Continental-US timezone bands, ordered east → west. Adjacency for the
/// critique interpreter's narrower/wider handling follows this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsTimezone {
    #[serde(alias = "Eastern")]
    Eastern,
    #[serde(alias = "Central")]
    Central,
    #[serde(alias = "Mountain")]
    Mountain,
    #[serde(alias = "Pacific")]
    Pacific,
}

impl UsTimezone {
    pub const ORDER: [UsTimezone; 4] =
        [Self::Eastern, Self::Central, Self::Mountain, Self::Pacific];

    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|z| *z == self).unwrap_or(0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eastern => "eastern",
            Self::Central => "central",
            Self::Mountain => "mountain",
            Self::Pacific => "pacific",
        }
    }
}

/// Skill proficiency, ordered learning → expert. Stricter compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proficiency {
    Learning,
    Proficient,
    Expert,
}

impl Proficiency {
    pub const ORDER: [Proficiency; 3] = [Self::Learning, Self::Proficient, Self::Expert];

    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|p| *p == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Self {
        Self::ORDER[index.min(Self::ORDER.len() - 1)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::Proficient => "proficient",
            Self::Expert => "expert",
        }
    }
}

/// What the hiring team is staffing for; drives the inference rule chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamFocus {
    Greenfield,
    Migration,
    Maintenance,
    Scaling,
}

impl TeamFocus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greenfield => "greenfield",
            Self::Migration => "migration",
            Self::Maintenance => "maintenance",
            Self::Scaling => "scaling",
        }
    }
}

// ============================================================================
// Requirement shapes
// ============================================================================

/// A skill the request asks for, by free-text identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRequirement {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_proficiency: Option<Proficiency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_min_proficiency: Option<Proficiency>,
}

impl SkillRequirement {
    pub fn named(identifier: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), min_proficiency: None, preferred_min_proficiency: None }
    }
}

/// A business or technical domain the request asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRequirement {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_years: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_min_years: Option<f64>,
}

impl DomainRequirement {
    pub fn named(identifier: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), min_years: None, preferred_min_years: None }
    }
}

// ============================================================================
// Request payload
// ============================================================================

/// The raw search request, exactly as received from the hosting process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub required_skills: Vec<SkillRequirement>,
    pub preferred_skills: Vec<SkillRequirement>,

    pub required_seniority_level: Option<SeniorityLevel>,
    pub preferred_seniority_level: Option<SeniorityLevel>,

    pub required_max_start_time: Option<StartTimeline>,
    pub preferred_max_start_time: Option<StartTimeline>,

    pub required_timezone: Vec<UsTimezone>,
    pub preferred_timezone: Vec<UsTimezone>,

    pub max_budget: Option<u64>,
    pub stretch_budget: Option<u64>,

    pub required_business_domains: Vec<DomainRequirement>,
    pub preferred_business_domains: Vec<DomainRequirement>,
    pub required_technical_domains: Vec<DomainRequirement>,
    pub preferred_technical_domains: Vec<DomainRequirement>,

    pub team_focus: Option<TeamFocus>,

    /// Rule ids the user has suppressed; matching derived constraints are
    /// fully overridden.
    pub overridden_rule_ids: BTreeSet<String>,

    /// Switches the pipeline into similarity mode when present.
    pub reference_engineer_id: Option<String>,

    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SearchRequest {
    /// Effective page size after defaulting.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    /// Effective offset after defaulting.
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Whether this request runs the similarity pipeline.
    pub fn is_similarity_mode(&self) -> bool {
        self.reference_engineer_id.is_some()
    }

    /// Semantic pre-checks from the interface contract. Enum-literal and
    /// type errors are caught by deserialization before this runs.
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(stretch) = self.stretch_budget {
            match self.max_budget {
                None => {
                    return Err(EngineError::validation(
                        "stretch_budget",
                        "stretch_budget requires max_budget",
                    ));
                }
                Some(max) if stretch < max => {
                    return Err(EngineError::validation(
                        "stretch_budget",
                        format!("stretch_budget {stretch} is below max_budget {max}"),
                    ));
                }
                Some(_) => {}
            }
        }
        if self.max_budget == Some(0) {
            return Err(EngineError::validation("max_budget", "max_budget must be positive"));
        }
        if let (Some(required), Some(preferred)) =
            (self.required_max_start_time, self.preferred_max_start_time)
            && preferred.index() > required.index()
        {
            return Err(EngineError::validation(
                "preferred_max_start_time",
                format!(
                    "preferred start `{}` is slower than required `{}`",
                    preferred.as_str(),
                    required.as_str()
                ),
            ));
        }
        if let Some(limit) = self.limit
            && !(1..=MAX_LIMIT).contains(&limit)
        {
            return Err(EngineError::validation(
                "limit",
                format!("limit must be in [1, {MAX_LIMIT}], got {limit}"),
            ));
        }
        for (path, domains) in [
            ("required_business_domains", &self.required_business_domains),
            ("preferred_business_domains", &self.preferred_business_domains),
            ("required_technical_domains", &self.required_technical_domains),
            ("preferred_technical_domains", &self.preferred_technical_domains),
        ] {
            for (i, domain) in domains.iter().enumerate() {
                if domain.min_years.is_some_and(|y| y < 0.0) {
                    return Err(EngineError::validation(
                        format!("{path}[{i}].min_years"),
                        "min_years must not be negative",
                    ));
                }
                if domain.identifier.trim().is_empty() {
                    return Err(EngineError::validation(
                        format!("{path}[{i}].identifier"),
                        "identifier must not be empty",
                    ));
                }
            }
        }
        for (path, skills) in
            [("required_skills", &self.required_skills), ("preferred_skills", &self.preferred_skills)]
        {
            for (i, skill) in skills.iter().enumerate() {
                if skill.identifier.trim().is_empty() {
                    return Err(EngineError::validation(
                        format!("{path}[{i}].identifier"),
                        "identifier must not be empty",
                    ));
                }
            }
        }
        Ok(())
    }
}
