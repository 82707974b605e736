//! Dynamic critique miner.
//!
//! Mines the current result page for critiques worth suggesting. Support
//! is computed against the returned page, not the full result count, so
//! suggestions are biased toward early-ranked engineers; documented
//! behaviour, not a bug. Single-property suggestions come from seven
//! shipped property configurations; compound suggestions from three
//! configured pairs. Results are filtered by minimum support and ranked
//! ascending so non-obvious critiques surface first.

use serde_json::json;
use std::collections::BTreeSet;

use crate::config::AdvisorConfig;
use crate::models::*;
use crate::utils::{count_by, percentile, top_n_by_count};

use super::super::expander::seniority_years;

const TOP_VALUES_PER_PROPERTY: usize = 5;

/// One mined candidate: the critique, its display text, and the predicate
/// deciding whether an engineer passes it.
struct MinedCandidate {
    property: CritiqueProperty,
    critique: Critique,
    description: String,
    passes: Box<dyn Fn(&Candidate) -> bool>,
}

pub struct DynamicCritiqueMiner {
    min_support: f64,
    max_suggestions: usize,
}

impl DynamicCritiqueMiner {
    pub fn new(config: &AdvisorConfig) -> Self {
        Self {
            min_support: config.min_support_threshold,
            max_suggestions: config.max_suggestions,
        }
    }

    pub fn mine(
        &self,
        request: &SearchRequest,
        criteria: &ExpandedCriteria,
        candidates: &[Candidate],
    ) -> Vec<DynamicCritiqueSuggestion> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let mined = self.candidate_values(request, criteria, candidates);

        let mut suggestions: Vec<DynamicCritiqueSuggestion> = Vec::new();
        for candidate in &mined {
            let support = support(candidates, &*candidate.passes);
            if support >= self.min_support {
                suggestions.push(DynamicCritiqueSuggestion {
                    critiques: vec![candidate.critique.clone()],
                    description: candidate.description.clone(),
                    support,
                });
            }
        }

        // Compound suggestions for the three configured pairs: a pair's
        // support is the fraction passing both members.
        let pairs = [
            (CritiqueProperty::Timezone, CritiqueProperty::Seniority),
            (CritiqueProperty::Skills, CritiqueProperty::Timezone),
            (CritiqueProperty::Skills, CritiqueProperty::Seniority),
        ];
        for (left_property, right_property) in pairs {
            let left = best_of(&mined, left_property, candidates);
            let right = best_of(&mined, right_property, candidates);
            if let (Some(left), Some(right)) = (left, right) {
                let joint = candidates
                    .iter()
                    .filter(|c| (left.passes)(c) && (right.passes)(c))
                    .count() as f64
                    / candidates.len() as f64;
                if joint >= self.min_support {
                    suggestions.push(DynamicCritiqueSuggestion {
                        critiques: vec![left.critique.clone(), right.critique.clone()],
                        description: format!("{} and {}", left.description, right.description),
                        support: joint,
                    });
                }
            }
        }

        suggestions.sort_by(|a, b| {
            a.support
                .partial_cmp(&b.support)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.description.cmp(&b.description))
        });
        suggestions.truncate(self.max_suggestions);
        suggestions
    }

    /// Candidate values per property config, excluding anything already
    /// required by the request.
    fn candidate_values(
        &self,
        request: &SearchRequest,
        criteria: &ExpandedCriteria,
        candidates: &[Candidate],
    ) -> Vec<MinedCandidate> {
        let mut out: Vec<MinedCandidate> = Vec::new();

        // Timezone.
        let required_zones: BTreeSet<UsTimezone> =
            request.required_timezone.iter().copied().collect();
        for zone in UsTimezone::ORDER {
            if required_zones.contains(&zone) {
                continue;
            }
            if candidates.iter().any(|c| c.timezone == zone) {
                out.push(MinedCandidate {
                    property: CritiqueProperty::Timezone,
                    critique: Critique::add(CritiqueProperty::Timezone, json!(zone.as_str())),
                    description: format!("require the {} timezone", zone.as_str()),
                    passes: Box::new(move |c| c.timezone == zone),
                });
            }
        }

        // Seniority, strictly above the current requirement.
        let current_index = request
            .required_seniority_level
            .map(|l| l.index() as i64)
            .unwrap_or(-1);
        for level in SeniorityLevel::ORDER {
            if (level.index() as i64) <= current_index {
                continue;
            }
            let (min_years, _) = seniority_years(level);
            if candidates.iter().any(|c| c.years_experience >= min_years) {
                out.push(MinedCandidate {
                    property: CritiqueProperty::Seniority,
                    critique: Critique::set(CritiqueProperty::Seniority, json!(level.as_str())),
                    description: format!("require {} seniority", level.as_str()),
                    passes: Box::new(move |c| c.years_experience >= min_years),
                });
            }
        }

        // Timeline, strictly faster than the current requirement.
        let current_timeline_index = request
            .required_max_start_time
            .map(|t| t.index())
            .unwrap_or(StartTimeline::ORDER.len());
        for timeline in StartTimeline::ORDER {
            if timeline.index() >= current_timeline_index {
                continue;
            }
            if candidates.iter().any(|c| c.start_timeline.index() <= timeline.index()) {
                out.push(MinedCandidate {
                    property: CritiqueProperty::Timeline,
                    critique: Critique::set(CritiqueProperty::Timeline, json!(timeline.as_str())),
                    description: format!("require a start within {}", timeline.as_str()),
                    passes: Box::new(move |c| c.start_timeline.index() <= timeline.index()),
                });
            }
        }

        // Skills not already covered by the request.
        let covered: BTreeSet<String> = criteria
            .required_leaf_origins()
            .keys()
            .map(|s| s.to_string())
            .collect();
        let skill_counts = count_by(
            candidates
                .iter()
                .flat_map(|c| c.skills.iter())
                .filter(|s| !covered.contains(&s.skill_id))
                .map(|s| (s.skill_id.clone(), s.name.clone())),
            |pair| pair.clone(),
        );
        for ((skill_id, name), _) in top_n_by_count(&skill_counts, TOP_VALUES_PER_PROPERTY) {
            let id_for_predicate = skill_id.clone();
            out.push(MinedCandidate {
                property: CritiqueProperty::Skills,
                critique: Critique::add(CritiqueProperty::Skills, json!(name.clone())),
                description: format!("add the skill '{name}'"),
                passes: Box::new(move |c| c.skill(&id_for_predicate).is_some()),
            });
        }

        // Budget percentiles below the current ceiling.
        let ceiling = criteria.salary_ceiling().unwrap_or(u64::MAX);
        let salaries: Vec<u64> = candidates.iter().map(|c| c.salary).collect();
        for pct in [25.0, 50.0, 75.0] {
            let Some(cut) = percentile(&salaries, pct) else {
                continue;
            };
            if cut >= ceiling {
                continue;
            }
            out.push(MinedCandidate {
                property: CritiqueProperty::Budget,
                critique: Critique::set(CritiqueProperty::Budget, json!(cut)),
                description: format!("cap the budget at ${cut}"),
                passes: Box::new(move |c| c.salary <= cut),
            });
        }

        // Business and technical domains not already required.
        let required_domains: BTreeSet<String> = criteria
            .resolved_business_domains
            .iter()
            .chain(criteria.resolved_technical_domains.iter())
            .flat_map(|d| d.expanded_ids.iter().cloned())
            .collect();
        for (property, extract) in [
            (
                CritiqueProperty::BusinessDomains,
                (|c: &Candidate| c.business_domains.clone()) as fn(&Candidate) -> Vec<CandidateDomain>,
            ),
            (
                CritiqueProperty::TechnicalDomains,
                (|c: &Candidate| c.technical_domains.clone()) as fn(&Candidate) -> Vec<CandidateDomain>,
            ),
        ] {
            let counts = count_by(
                candidates
                    .iter()
                    .flat_map(|c| extract(c))
                    .filter(|d| !required_domains.contains(&d.domain_id))
                    .map(|d| (d.domain_id.clone(), d.name.clone())),
                |pair| pair.clone(),
            );
            for ((domain_id, name), _) in top_n_by_count(&counts, TOP_VALUES_PER_PROPERTY) {
                let id_for_predicate = domain_id.clone();
                out.push(MinedCandidate {
                    property,
                    critique: Critique::add(property, json!(name.clone())),
                    description: format!("add the domain '{name}'"),
                    passes: Box::new(move |c| {
                        extract(c).iter().any(|d| d.domain_id == id_for_predicate)
                    }),
                });
            }
        }

        out
    }
}

/// Fraction of the page passing a predicate.
fn support(candidates: &[Candidate], passes: &dyn Fn(&Candidate) -> bool) -> f64 {
    candidates.iter().filter(|c| passes(c)).count() as f64 / candidates.len() as f64
}

/// Best-supported mined candidate for a property.
fn best_of<'a>(
    mined: &'a [MinedCandidate],
    property: CritiqueProperty,
    candidates: &[Candidate],
) -> Option<&'a MinedCandidate> {
    mined
        .iter()
        .filter(|m| m.property == property)
        .max_by(|a, b| {
            support(candidates, &*a.passes)
                .partial_cmp(&support(candidates, &*b.passes))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, timezone: UsTimezone, years: f64, skills: &[&str]) -> Candidate {
        Candidate {
            id: id.into(),
            name: id.into(),
            headline: String::new(),
            salary: 140_000,
            years_experience: years,
            start_timeline: StartTimeline::TwoWeeks,
            timezone,
            skills: skills
                .iter()
                .map(|s| CandidateSkill {
                    skill_id: s.to_string(),
                    name: s.to_string(),
                    proficiency: Proficiency::Proficient,
                    confidence: 0.9,
                    years_used: 2.0,
                    match_type: MatchType::None,
                    meets_proficiency: None,
                })
                .collect(),
            business_domains: vec![],
            technical_domains: vec![],
        }
    }

    fn page() -> Vec<Candidate> {
        vec![
            candidate("e1", UsTimezone::Eastern, 8.0, &["skill_rust"]),
            candidate("e2", UsTimezone::Eastern, 11.0, &["skill_rust", "skill_go"]),
            candidate("e3", UsTimezone::Mountain, 7.0, &["skill_rust"]),
            candidate("e4", UsTimezone::Eastern, 12.0, &["skill_go"]),
        ]
    }

    fn miner() -> DynamicCritiqueMiner {
        DynamicCritiqueMiner::new(&AdvisorConfig::default())
    }

    #[test]
    fn suggestions_rank_ascending_and_respect_the_cap() {
        let suggestions =
            miner().mine(&SearchRequest::default(), &ExpandedCriteria::default(), &page());
        assert!(!suggestions.is_empty());
        assert!(suggestions.len() <= AdvisorConfig::default().max_suggestions);
        for window in suggestions.windows(2) {
            assert!(window[0].support <= window[1].support);
        }
        for suggestion in &suggestions {
            assert!(suggestion.support >= 0.15);
        }
    }

    #[test]
    fn already_required_values_are_excluded() {
        let request = SearchRequest {
            required_timezone: vec![UsTimezone::Eastern],
            ..Default::default()
        };
        let suggestions = miner().mine(&request, &ExpandedCriteria::default(), &page());
        for suggestion in &suggestions {
            for critique in &suggestion.critiques {
                if critique.property == CritiqueProperty::Timezone {
                    if let CritiqueOp::Add { value } = &critique.op {
                        assert_ne!(value, &json!("eastern"));
                    }
                }
            }
        }
    }

    #[test]
    fn compound_pairs_are_produced_with_joint_support() {
        let mut config = AdvisorConfig::default();
        config.max_suggestions = 50;
        config.min_support_threshold = 0.0;
        let suggestions = DynamicCritiqueMiner::new(&config).mine(
            &SearchRequest::default(),
            &ExpandedCriteria::default(),
            &page(),
        );
        let compound: Vec<_> =
            suggestions.iter().filter(|s| s.critiques.len() == 2).collect();
        assert!(!compound.is_empty());
        for suggestion in compound {
            assert!(suggestion.support <= 1.0);
        }
    }

    #[test]
    fn empty_page_mines_nothing() {
        let suggestions =
            miner().mine(&SearchRequest::default(), &ExpandedCriteria::default(), &[]);
        assert!(suggestions.is_empty());
    }
}
