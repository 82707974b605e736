//! Tightening pattern miner, active when results are plentiful.
//!
//! Mines the returned page (page-biased by design) for additions the user
//! could make: timezones, stricter seniorities, uncovered skills and
//! domains, and salary percentiles below the current ceiling. Suggestions
//! are ranked by ascending support so non-obvious patterns come first.

use serde_json::json;
use std::collections::BTreeSet;

use crate::models::*;
use crate::utils::{count_by, percentile, top_n_by_count};

use super::super::expander::seniority_years;

const TOP_PATTERNS: usize = 5;
const SALARY_PERCENTILES: [f64; 3] = [25.0, 50.0, 75.0];

pub struct TighteningMiner {
    min_support: f64,
    max_suggestions: usize,
}

impl TighteningMiner {
    pub fn new(min_support: f64, max_suggestions: usize) -> Self {
        Self { min_support, max_suggestions }
    }

    pub fn mine(
        &self,
        criteria: &ExpandedCriteria,
        candidates: &[Candidate],
    ) -> Vec<TighteningSuggestion> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let total = candidates.len() as f64;
        let mut suggestions = Vec::new();
        let mut push = |field: FilterField, value: serde_json::Value, description: String, hits: usize| {
            let support = hits as f64 / total;
            if support >= self.min_support {
                suggestions.push(TighteningSuggestion { field, value, description, support });
            }
        };

        // Timezone zones not already required.
        let required_zones: BTreeSet<UsTimezone> =
            criteria.timezone_zones.iter().copied().collect();
        for zone in UsTimezone::ORDER {
            if required_zones.contains(&zone) {
                continue;
            }
            let hits = candidates.iter().filter(|c| c.timezone == zone).count();
            if hits > 0 {
                push(
                    FilterField::Timezone,
                    json!(zone.as_str()),
                    format!("Require the {} timezone", zone.as_str()),
                    hits,
                );
            }
        }

        // Seniority levels stricter than the current floor.
        let current_floor = criteria.min_years_experience.unwrap_or(-1.0);
        for level in SeniorityLevel::ORDER {
            let (min_years, _) = seniority_years(level);
            if min_years <= current_floor {
                continue;
            }
            let hits = candidates
                .iter()
                .filter(|c| c.years_experience >= min_years)
                .count();
            if hits > 0 {
                push(
                    FilterField::Seniority,
                    json!(level.as_str()),
                    format!("Require {} seniority", level.as_str()),
                    hits,
                );
            }
        }

        // Top uncovered skills by occurrence.
        let covered: BTreeSet<&str> = criteria
            .required_leaf_origins()
            .keys()
            .copied()
            .collect();
        let skill_counts = count_by(
            candidates
                .iter()
                .flat_map(|c| c.skills.iter())
                .filter(|s| !covered.contains(s.skill_id.as_str()))
                .map(|s| (s.skill_id.clone(), s.name.clone())),
            |pair| pair.clone(),
        );
        for ((skill_id, name), hits) in top_n_by_count(&skill_counts, TOP_PATTERNS) {
            push(
                FilterField::Skills,
                json!(skill_id),
                format!("Require the skill '{name}'"),
                hits,
            );
        }

        // Top uncovered domains.
        let covered_domains: BTreeSet<&str> = criteria
            .resolved_business_domains
            .iter()
            .chain(criteria.resolved_technical_domains.iter())
            .flat_map(|d| d.expanded_ids.iter().map(String::as_str))
            .collect();
        let domain_counts = count_by(
            candidates
                .iter()
                .flat_map(|c| {
                    c.business_domains
                        .iter()
                        .map(|d| (FilterField::BusinessDomain, d))
                        .chain(
                            c.technical_domains
                                .iter()
                                .map(|d| (FilterField::TechnicalDomain, d)),
                        )
                })
                .filter(|(_, d)| !covered_domains.contains(d.domain_id.as_str()))
                .map(|(field, d)| (field.as_str(), d.domain_id.clone(), d.name.clone())),
            |entry| entry.clone(),
        );
        for ((field_label, domain_id, name), hits) in
            top_n_by_count(&domain_counts, TOP_PATTERNS)
        {
            let field = if field_label == FilterField::BusinessDomain.as_str() {
                FilterField::BusinessDomain
            } else {
                FilterField::TechnicalDomain
            };
            push(
                field,
                json!(domain_id),
                format!("Require domain experience in '{name}'"),
                hits,
            );
        }

        // Salary percentiles below the current ceiling.
        let salaries: Vec<u64> = candidates.iter().map(|c| c.salary).collect();
        let ceiling = criteria.salary_ceiling().unwrap_or(u64::MAX);
        for pct in SALARY_PERCENTILES {
            let Some(cut) = percentile(&salaries, pct) else {
                continue;
            };
            if cut >= ceiling {
                continue;
            }
            let hits = candidates.iter().filter(|c| c.salary <= cut).count();
            push(
                FilterField::Salary,
                json!(cut),
                format!("Cap salary at ${cut} (p{pct:.0} of this page)"),
                hits,
            );
        }

        // Non-obvious patterns first: ascending support, stable tie-break.
        suggestions.sort_by(|a, b| {
            a.support
                .partial_cmp(&b.support)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.description.cmp(&b.description))
        });
        suggestions.truncate(self.max_suggestions);
        suggestions
    }
}
