//! Expanded request criteria: the expander's output and the audit trail
//! (`applied_filters` / `applied_preferences`) carried through to the
//! response unmodified.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::request::{Proficiency, SeniorityLevel, StartTimeline, UsTimezone};

// ============================================================================
// Audit records
// ============================================================================

/// Where a constraint or preference came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintSource {
    User,
    /// Derived by a deterministic expansion rule (seniority → years).
    Derived,
    /// Derived by a named inference rule.
    DerivedRule(String),
}

impl ConstraintSource {
    pub fn as_wire(&self) -> String {
        match self {
            Self::User => "user".to_string(),
            Self::Derived => "derived".to_string(),
            Self::DerivedRule(id) => format!("derived-rule:{id}"),
        }
    }

    pub fn rule_id(&self) -> Option<&str> {
        match self {
            Self::DerivedRule(id) => Some(id),
            _ => None,
        }
    }
}

impl Serialize for ConstraintSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_wire())
    }
}

impl<'de> Deserialize<'de> for ConstraintSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "user" => Self::User,
            "derived" => Self::Derived,
            other => match other.strip_prefix("derived-rule:") {
                Some(id) => Self::DerivedRule(id.to_string()),
                None => return Err(serde::de::Error::custom(format!("unknown source `{raw}`"))),
            },
        })
    }
}

/// Field a property filter binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Skills,
    YearsExperience,
    Salary,
    Timezone,
    StartTimeline,
    Seniority,
    BusinessDomain,
    TechnicalDomain,
    /// Preference-only: extraction confidence never filters.
    Confidence,
}

impl FilterField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skills => "skills",
            Self::YearsExperience => "years_experience",
            Self::Salary => "salary",
            Self::Timezone => "timezone",
            Self::StartTimeline => "start_timeline",
            Self::Seniority => "seniority",
            Self::BusinessDomain => "business_domain",
            Self::TechnicalDomain => "technical_domain",
            Self::Confidence => "confidence",
        }
    }
}

/// Comparison operator of a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOp {
    In,
    Gte,
    Lte,
    StartsWith,
    Eq,
}

/// One hard filter in the audit list. Built by the expander (and appended
/// to by the orchestrator for inference-derived filters) and carried
/// bit-exact into the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilter {
    /// Stable id, unique within a request (`filter:salary`, `filter:skill:skill_python`).
    pub id: String,
    pub field: FilterField,
    pub operator: FilterOp,
    pub value: Value,
    /// Human-readable label ("Salary ≤ $220,000").
    pub display: String,
    pub source: ConstraintSource,
}

/// One soft preference in the audit list; feeds ranking only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPreference {
    pub id: String,
    pub field: FilterField,
    pub value: Value,
    pub display: String,
    pub source: ConstraintSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
}

// ============================================================================
// Resolution results
// ============================================================================

/// How an identifier was resolved to a canonical id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Synonym,
    Fuzzy,
    Unresolved,
}

/// A user skill requirement after taxonomy resolution and hierarchy
/// expansion. `expanded_ids` holds the leaf ids (self included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSkill {
    pub requested_identifier: String,
    pub canonical_id: String,
    pub name: String,
    pub expanded_ids: Vec<String>,
    pub min_proficiency: Proficiency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_min_proficiency: Option<Proficiency>,
    pub resolution: ResolutionMethod,
    pub confidence: f64,
}

/// A domain requirement after resolution and hierarchy expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDomain {
    pub requested_identifier: String,
    pub canonical_id: String,
    pub name: String,
    pub expanded_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_years: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_min_years: Option<f64>,
}

// ============================================================================
// Proficiency buckets
// ============================================================================

/// Skill ids grouped by required minimum proficiency. A skill id lives in
/// exactly one bucket; on multi-parent collisions the stricter bucket wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProficiencyBuckets {
    pub learning: Vec<String>,
    pub proficient: Vec<String>,
    pub expert: Vec<String>,
}

impl ProficiencyBuckets {
    /// Insert a skill id at the given minimum. If the id is already present
    /// in a weaker bucket it is promoted; a stricter placement is kept.
    pub fn insert(&mut self, skill_id: &str, min: Proficiency) {
        let current = self.bucket_of(skill_id);
        match current {
            Some(existing) if existing >= min => return,
            Some(_) => self.remove(skill_id),
            None => {}
        }
        let bucket = match min {
            Proficiency::Learning => &mut self.learning,
            Proficiency::Proficient => &mut self.proficient,
            Proficiency::Expert => &mut self.expert,
        };
        bucket.push(skill_id.to_string());
    }

    pub fn bucket_of(&self, skill_id: &str) -> Option<Proficiency> {
        if self.expert.iter().any(|id| id == skill_id) {
            Some(Proficiency::Expert)
        } else if self.proficient.iter().any(|id| id == skill_id) {
            Some(Proficiency::Proficient)
        } else if self.learning.iter().any(|id| id == skill_id) {
            Some(Proficiency::Learning)
        } else {
            None
        }
    }

    fn remove(&mut self, skill_id: &str) {
        self.learning.retain(|id| id != skill_id);
        self.proficient.retain(|id| id != skill_id);
        self.expert.retain(|id| id != skill_id);
    }

    /// Union of the three buckets, learning-first.
    pub fn all_ids(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(self.learning.len() + self.proficient.len() + self.expert.len());
        ids.extend(self.learning.iter().cloned());
        ids.extend(self.proficient.iter().cloned());
        ids.extend(self.expert.iter().cloned());
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.learning.is_empty() && self.proficient.is_empty() && self.expert.is_empty()
    }

    /// Does an engineer-held proficiency qualify for this skill's bucket?
    pub fn qualifies(&self, skill_id: &str, held: Proficiency) -> bool {
        match self.bucket_of(skill_id) {
            Some(minimum) => held >= minimum,
            None => false,
        }
    }
}

// ============================================================================
// Expanded criteria
// ============================================================================

/// Output of the constraint expander; input to inference and planning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpandedCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_years_experience: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_years_experience: Option<f64>,

    pub timezone_zones: Vec<UsTimezone>,
    /// Every timeline at or faster than `required_max_start_time`.
    pub start_timeline_set: Vec<StartTimeline>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stretch_budget: Option<u64>,

    pub skill_proficiency_buckets: ProficiencyBuckets,

    pub resolved_required_skills: Vec<ResolvedSkill>,
    pub resolved_preferred_skills: Vec<ResolvedSkill>,
    pub resolved_business_domains: Vec<ResolvedDomain>,
    pub resolved_preferred_business_domains: Vec<ResolvedDomain>,
    pub resolved_technical_domains: Vec<ResolvedDomain>,
    pub resolved_preferred_technical_domains: Vec<ResolvedDomain>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_seniority_level: Option<SeniorityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_seniority_level: Option<SeniorityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_max_start_time: Option<StartTimeline>,
    pub preferred_timezone: Vec<UsTimezone>,

    /// Ordered, human-labelled audit list; bit-exact in the response.
    pub applied_filters: Vec<AppliedFilter>,
    pub applied_preferences: Vec<AppliedPreference>,

    /// Identifiers the resolver declined; reported, never fatal.
    pub unresolved_skills: Vec<String>,
    /// Defaults the expander applied, for `queryMetadata.defaultsApplied`.
    pub defaults_applied: Vec<String>,
}

impl ExpandedCriteria {
    /// Salary ceiling for the hard filter: stretch budget when present,
    /// otherwise max budget.
    pub fn salary_ceiling(&self) -> Option<u64> {
        self.stretch_budget.or(self.max_budget)
    }

    /// Map of expanded leaf id → the resolved required skill that produced
    /// it, for match-type classification. First writer wins so direct
    /// requirements take precedence over broader categories listed later.
    pub fn required_leaf_origins(&self) -> BTreeMap<&str, &ResolvedSkill> {
        let mut map: BTreeMap<&str, &ResolvedSkill> = BTreeMap::new();
        for skill in &self.resolved_required_skills {
            for leaf in &skill.expanded_ids {
                map.entry(leaf.as_str()).or_insert(skill);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_keep_the_stricter_placement() {
        let mut buckets = ProficiencyBuckets::default();
        buckets.insert("skill_rust", Proficiency::Learning);
        buckets.insert("skill_rust", Proficiency::Expert);
        buckets.insert("skill_rust", Proficiency::Proficient);
        assert_eq!(buckets.bucket_of("skill_rust"), Some(Proficiency::Expert));
        assert_eq!(buckets.all_ids(), vec!["skill_rust".to_string()]);
    }

    #[test]
    fn qualification_respects_bucket_minimum() {
        let mut buckets = ProficiencyBuckets::default();
        buckets.insert("skill_go", Proficiency::Proficient);
        assert!(!buckets.qualifies("skill_go", Proficiency::Learning));
        assert!(buckets.qualifies("skill_go", Proficiency::Proficient));
        assert!(buckets.qualifies("skill_go", Proficiency::Expert));
        assert!(!buckets.qualifies("skill_absent", Proficiency::Expert));
    }

    #[test]
    fn constraint_source_round_trips() {
        for source in [
            ConstraintSource::User,
            ConstraintSource::Derived,
            ConstraintSource::DerivedRule("greenfield-prefers-senior".into()),
        ] {
            let json = serde_json::to_value(&source).unwrap();
            let back: ConstraintSource = serde_json::from_value(json).unwrap();
            assert_eq!(back, source);
        }
        assert_eq!(
            ConstraintSource::DerivedRule("r1".into()).as_wire(),
            "derived-rule:r1"
        );
    }
}
