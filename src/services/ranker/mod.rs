//! Utility ranker: weighted sum of named utility functions over the
//! query-returned candidates, with a per-row score breakdown.

pub mod utility;

use crate::config::UtilityWeights;
use crate::models::*;

use super::expander::seniority_years;
use super::inference::InferenceResult;

/// Salary curve bounds when no budget is set.
const SALARY_FLOOR: f64 = 80_000.0;
const SALARY_CEILING: f64 = 300_000.0;
/// Confidence curve bounds.
const CONFIDENCE_MIN: f64 = 0.5;
const CONFIDENCE_MAX: f64 = 1.0;
/// Cap for the logarithmic years curve.
const YEARS_CAP: f64 = 20.0;

pub struct UtilityRanker {
    weights: UtilityWeights,
}

impl UtilityRanker {
    pub fn new(weights: UtilityWeights) -> Self {
        Self { weights }
    }

    /// Score and sort candidates, best first. Ties break on id so
    /// pagination is stable.
    pub fn rank(
        &self,
        candidates: Vec<Candidate>,
        criteria: &ExpandedCriteria,
        inference: &InferenceResult,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| self.score(candidate, criteria, inference))
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.candidate.id.cmp(&b.candidate.id))
        });
        scored
    }

    fn score(
        &self,
        candidate: Candidate,
        criteria: &ExpandedCriteria,
        inference: &InferenceResult,
    ) -> ScoredCandidate {
        let mut components = Vec::new();
        let mut push = |name: &str, weight: f64, raw: f64| {
            if raw > 0.0 && weight > 0.0 {
                components.push(ScoreComponent {
                    component: name.to_string(),
                    weight,
                    raw,
                    weighted: weight * raw,
                });
            }
        };

        let (required_raw, matched_skills) = required_skill_credit(&candidate, criteria);
        push("requiredSkills", self.weights.required_skills, required_raw);

        push(
            "preferredSkills",
            self.weights.preferred_skills,
            preferred_skill_credit(&candidate, criteria),
        );

        push(
            "confidence",
            self.weights.confidence,
            confidence_credit(&candidate, criteria),
        );

        push("salary", self.weights.salary, salary_credit(&candidate, criteria));

        push(
            "yearsExperience",
            self.weights.years_experience,
            utility::logarithmic(candidate.years_experience, YEARS_CAP),
        );

        push(
            "startTimeline",
            self.weights.start_timeline,
            utility::timeline_credit(candidate.start_timeline),
        );

        push(
            "preferredTimezone",
            self.weights.preferred_timezone,
            timezone_credit(&candidate, criteria),
        );

        push(
            "preferredSeniority",
            self.weights.preferred_seniority,
            seniority_credit(&candidate, criteria),
        );

        push(
            "relatedSkills",
            self.weights.related_skills,
            related_skill_credit(&candidate, criteria, inference),
        );

        let (domain_raw, matched_domains) = domain_coverage(&candidate, criteria);
        push("domainCoverage", self.weights.domain_coverage, domain_raw);

        let score = components.iter().map(|c| c.weighted).sum();
        ScoredCandidate {
            candidate,
            score,
            score_breakdown: ScoreBreakdown::Utility(UtilityBreakdown {
                components,
                matched_skills,
                matched_domains,
            }),
        }
    }
}

/// Mean of per-skill credits over the full required set (missing = 0).
/// With a preferred minimum proficiency the per-skill credit is
/// graduated; otherwise holding any expanded leaf earns full credit.
fn required_skill_credit(
    candidate: &Candidate,
    criteria: &ExpandedCriteria,
) -> (f64, Vec<String>) {
    let required = &criteria.resolved_required_skills;
    if required.is_empty() {
        return (0.0, Vec::new());
    }
    let mut total = 0.0;
    let mut matched = Vec::new();
    for requirement in required {
        let mut best = 0.0f64;
        let mut best_name = None;
        for leaf in &requirement.expanded_ids {
            if let Some(held) = candidate.skill(leaf) {
                let credit = match requirement.preferred_min_proficiency {
                    Some(preferred) => utility::proficiency_credit(
                        held.proficiency.index(),
                        preferred.index(),
                    ),
                    None => 1.0,
                };
                if credit > best {
                    best = credit;
                    best_name = Some(held.name.clone());
                }
            }
        }
        total += best;
        if let Some(name) = best_name {
            matched.push(name);
        }
    }
    (total / required.len() as f64, matched)
}

/// Coverage ratio over the user's preferred skills.
fn preferred_skill_credit(candidate: &Candidate, criteria: &ExpandedCriteria) -> f64 {
    let preferred = &criteria.resolved_preferred_skills;
    if preferred.is_empty() {
        return 0.0;
    }
    let matched = preferred
        .iter()
        .filter(|p| p.expanded_ids.iter().any(|leaf| candidate.skill(leaf).is_some()))
        .count();
    utility::ratio(matched as f64, preferred.len() as f64, 1.0)
}

/// Linear credit over the mean extraction confidence of matched skills.
fn confidence_credit(candidate: &Candidate, criteria: &ExpandedCriteria) -> f64 {
    let matched: Vec<f64> = candidate
        .skills
        .iter()
        .filter(|s| matches!(s.match_type, MatchType::Direct | MatchType::Descendant))
        .map(|s| s.confidence)
        .collect();
    if matched.is_empty() {
        // No requested skills: fall back to the whole profile.
        let all: Vec<f64> = candidate.skills.iter().map(|s| s.confidence).collect();
        if all.is_empty() || criteria.resolved_required_skills.is_empty() {
            return 0.0;
        }
        let mean = all.iter().sum::<f64>() / all.len() as f64;
        return utility::linear(mean, CONFIDENCE_MIN, CONFIDENCE_MAX);
    }
    let mean = matched.iter().sum::<f64>() / matched.len() as f64;
    utility::linear(mean, CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// Budget-aware salary credit; plain inverse-linear when no budget is set.
fn salary_credit(candidate: &Candidate, criteria: &ExpandedCriteria) -> f64 {
    match criteria.max_budget {
        Some(max) => utility::budget_credit(candidate.salary, max, criteria.stretch_budget),
        None => utility::inverse_linear(candidate.salary as f64, SALARY_FLOOR, SALARY_CEILING),
    }
}

/// Position credit over the preferred timezone list.
fn timezone_credit(candidate: &Candidate, criteria: &ExpandedCriteria) -> f64 {
    let preferred = &criteria.preferred_timezone;
    match preferred.iter().position(|z| *z == candidate.timezone) {
        Some(index) => utility::position(index, preferred.len(), 1.0),
        None => 0.0,
    }
}

/// Binary step: does the candidate clear the preferred seniority's years
/// floor?
fn seniority_credit(candidate: &Candidate, criteria: &ExpandedCriteria) -> f64 {
    match criteria.preferred_seniority_level {
        Some(level) => {
            let (min, _) = seniority_years(level);
            utility::step(candidate.years_experience >= min, 1.0)
        }
        None => 0.0,
    }
}

/// Exponential-decay credit for rule-boosted skills the request did not
/// ask for directly.
fn related_skill_credit(
    candidate: &Candidate,
    criteria: &ExpandedCriteria,
    inference: &InferenceResult,
) -> f64 {
    if inference.derived_skill_boosts.is_empty() {
        return 0.0;
    }
    let leaf_origins = criteria.required_leaf_origins();
    let count = candidate
        .skills
        .iter()
        .filter(|s| {
            inference.derived_skill_boosts.contains_key(&s.skill_id)
                && !leaf_origins.contains_key(s.skill_id.as_str())
        })
        .count();
    utility::exponential_decay(count as f64, 1.0, 1.0)
}

/// Coverage ratio over every requested domain (required and preferred,
/// business and technical).
fn domain_coverage(candidate: &Candidate, criteria: &ExpandedCriteria) -> (f64, Vec<String>) {
    let requirements: Vec<(&ResolvedDomain, &[CandidateDomain])> = criteria
        .resolved_business_domains
        .iter()
        .chain(criteria.resolved_preferred_business_domains.iter())
        .map(|d| (d, candidate.business_domains.as_slice()))
        .chain(
            criteria
                .resolved_technical_domains
                .iter()
                .chain(criteria.resolved_preferred_technical_domains.iter())
                .map(|d| (d, candidate.technical_domains.as_slice())),
        )
        .collect();
    if requirements.is_empty() {
        return (0.0, Vec::new());
    }
    let mut matched = Vec::new();
    for (requirement, held) in &requirements {
        let hit = held.iter().any(|d| {
            requirement.expanded_ids.contains(&d.domain_id)
                && requirement.min_years.map_or(true, |min| d.years >= min)
        });
        if hit {
            matched.push(requirement.name.clone());
        }
    }
    (
        utility::ratio(matched.len() as f64, requirements.len() as f64, 1.0),
        matched,
    )
}
