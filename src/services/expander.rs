//! Constraint expander: pure `SearchRequest` → `ExpandedCriteria`
//! transformation.
//!
//! Seniority becomes a years envelope, the required start time becomes a
//! timeline prefix set, skills and domains are resolved and expanded to
//! leaf ids, and every hard filter lands in the ordered `applied_filters`
//! audit list that is carried bit-exact into the response.

use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashMap;

use crate::config::TaxonomyConfig;
use crate::graph::{DomainGraph, SkillGraph};
use crate::models::*;
use crate::utils::EngineResult;

use super::taxonomy::TaxonomyResolver;

/// Years-of-experience envelope per seniority level. Upper bounds for
/// senior and above are open.
static SENIORITY_YEARS: Lazy<HashMap<SeniorityLevel, (f64, Option<f64>)>> = Lazy::new(|| {
    HashMap::from([
        (SeniorityLevel::Junior, (0.0, Some(3.0))),
        (SeniorityLevel::Mid, (3.0, Some(6.0))),
        (SeniorityLevel::Senior, (6.0, None)),
        (SeniorityLevel::Staff, (10.0, None)),
        (SeniorityLevel::Principal, (15.0, None)),
    ])
});

/// Years envelope for a seniority level.
pub fn seniority_years(level: SeniorityLevel) -> (f64, Option<f64>) {
    *SENIORITY_YEARS.get(&level).expect("every level is mapped")
}

pub struct ConstraintExpander {
    resolver: TaxonomyResolver,
}

impl ConstraintExpander {
    pub fn new(taxonomy: &TaxonomyConfig) -> Self {
        Self { resolver: TaxonomyResolver::new(taxonomy) }
    }

    /// Expand a validated request against the current graph snapshots.
    /// Pure: expanding twice yields the same `applied_filters` list.
    pub fn expand(
        &self,
        request: &SearchRequest,
        skills: &SkillGraph,
        domains: &DomainGraph,
    ) -> EngineResult<ExpandedCriteria> {
        request.validate()?;

        let mut criteria = ExpandedCriteria {
            required_seniority_level: request.required_seniority_level,
            preferred_seniority_level: request.preferred_seniority_level,
            preferred_max_start_time: request.preferred_max_start_time,
            preferred_timezone: request.preferred_timezone.clone(),
            max_budget: request.max_budget,
            stretch_budget: request.stretch_budget,
            ..Default::default()
        };

        self.expand_required_skills(request, skills, &mut criteria);
        self.expand_years(request, &mut criteria);
        self.expand_budget(request, &mut criteria);
        self.expand_timezone(request, &mut criteria);
        self.expand_timeline(request, &mut criteria);
        self.expand_domains(request, domains, &mut criteria);
        self.expand_preferences(request, skills, domains, &mut criteria);

        Ok(criteria)
    }

    fn expand_required_skills(
        &self,
        request: &SearchRequest,
        skills: &SkillGraph,
        criteria: &mut ExpandedCriteria,
    ) {
        let mut defaulted_proficiency = false;
        for requirement in &request.required_skills {
            let resolution = self.resolver.resolve_skill(skills, &requirement.identifier);
            let Some(canonical_id) = resolution.canonical_id.clone() else {
                criteria.unresolved_skills.push(requirement.identifier.clone());
                continue;
            };
            let min = requirement.min_proficiency.unwrap_or(Proficiency::Learning);
            if requirement.min_proficiency.is_none() {
                defaulted_proficiency = true;
            }
            let expanded = self.resolver.expand_skill(skills, &canonical_id);
            for leaf in &expanded {
                // Stricter proficiency wins when a leaf arrives via
                // multiple parents.
                criteria.skill_proficiency_buckets.insert(leaf, min);
            }
            let name = skills
                .get(&canonical_id)
                .map(|n| n.name.clone())
                .unwrap_or_else(|| canonical_id.clone());
            criteria.applied_filters.push(AppliedFilter {
                id: format!("filter:skill:{canonical_id}"),
                field: FilterField::Skills,
                operator: FilterOp::In,
                value: json!(expanded),
                display: format!("Skill '{name}' at {} or above", min.as_str()),
                source: ConstraintSource::User,
            });
            criteria.resolved_required_skills.push(ResolvedSkill {
                requested_identifier: requirement.identifier.clone(),
                canonical_id,
                name,
                expanded_ids: expanded,
                min_proficiency: min,
                preferred_min_proficiency: requirement.preferred_min_proficiency,
                resolution: resolution.method,
                confidence: resolution.confidence,
            });
        }
        if defaulted_proficiency {
            criteria
                .defaults_applied
                .push("min_proficiency defaulted to learning".to_string());
        }
    }

    fn expand_years(&self, request: &SearchRequest, criteria: &mut ExpandedCriteria) {
        let Some(level) = request.required_seniority_level else {
            return;
        };
        let (min, max) = seniority_years(level);
        criteria.min_years_experience = Some(min);
        criteria.max_years_experience = max;
        criteria.applied_filters.push(AppliedFilter {
            id: "filter:years_min".to_string(),
            field: FilterField::YearsExperience,
            operator: FilterOp::Gte,
            value: json!(min),
            display: format!("Years of experience ≥ {min}"),
            source: ConstraintSource::Derived,
        });
        if let Some(max) = max {
            criteria.applied_filters.push(AppliedFilter {
                id: "filter:years_max".to_string(),
                field: FilterField::YearsExperience,
                operator: FilterOp::Lte,
                value: json!(max),
                display: format!("Years of experience ≤ {max}"),
                source: ConstraintSource::Derived,
            });
        }
    }

    fn expand_budget(&self, request: &SearchRequest, criteria: &mut ExpandedCriteria) {
        let Some(ceiling) = request.stretch_budget.or(request.max_budget) else {
            return;
        };
        criteria.applied_filters.push(AppliedFilter {
            id: "filter:salary".to_string(),
            field: FilterField::Salary,
            operator: FilterOp::Lte,
            value: json!(ceiling),
            display: format!("Salary ≤ ${ceiling}"),
            source: ConstraintSource::User,
        });
    }

    fn expand_timezone(&self, request: &SearchRequest, criteria: &mut ExpandedCriteria) {
        // Empty array means no timezone filter.
        if request.required_timezone.is_empty() {
            return;
        }
        criteria.timezone_zones = request.required_timezone.clone();
        let zones: Vec<&str> = request.required_timezone.iter().map(|z| z.as_str()).collect();
        criteria.applied_filters.push(AppliedFilter {
            id: "filter:timezone".to_string(),
            field: FilterField::Timezone,
            operator: FilterOp::In,
            value: json!(zones),
            display: format!("Timezone in [{}]", zones.join(", ")),
            source: ConstraintSource::User,
        });
    }

    fn expand_timeline(&self, request: &SearchRequest, criteria: &mut ExpandedCriteria) {
        let Some(required) = request.required_max_start_time else {
            return;
        };
        let set: Vec<StartTimeline> = StartTimeline::ORDER
            .iter()
            .copied()
            .filter(|t| t.index() <= required.index())
            .collect();
        let labels: Vec<&str> = set.iter().map(|t| t.as_str()).collect();
        criteria.applied_filters.push(AppliedFilter {
            id: "filter:start_timeline".to_string(),
            field: FilterField::StartTimeline,
            operator: FilterOp::In,
            value: json!(labels),
            display: format!("Can start within {}", required.as_str()),
            source: ConstraintSource::User,
        });
        criteria.start_timeline_set = set;
    }

    fn expand_domains(
        &self,
        request: &SearchRequest,
        domains: &DomainGraph,
        criteria: &mut ExpandedCriteria,
    ) {
        for requirement in &request.required_business_domains {
            match self.resolve_domain(domains, requirement, false) {
                Some((resolved, filter)) => {
                    criteria.applied_filters.push(filter);
                    criteria.resolved_business_domains.push(resolved);
                }
                None => criteria.unresolved_skills.push(requirement.identifier.clone()),
            }
        }
        for requirement in &request.required_technical_domains {
            match self.resolve_domain(domains, requirement, true) {
                Some((resolved, filter)) => {
                    criteria.applied_filters.push(filter);
                    criteria.resolved_technical_domains.push(resolved);
                }
                None => criteria.unresolved_skills.push(requirement.identifier.clone()),
            }
        }
    }

    fn resolve_domain(
        &self,
        domains: &DomainGraph,
        requirement: &DomainRequirement,
        technical: bool,
    ) -> Option<(ResolvedDomain, AppliedFilter)> {
        let arena = if technical { &domains.technical } else { &domains.business };
        let resolution = self.resolver.resolve_domain(arena, &requirement.identifier);
        let canonical_id = resolution.canonical_id?;
        let expanded = if technical {
            self.resolver.expand_technical_domain(domains, &canonical_id)
        } else {
            self.resolver.expand_business_domain(domains, &canonical_id)
        };
        let name = arena
            .get(&canonical_id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| canonical_id.clone());
        let field =
            if technical { FilterField::TechnicalDomain } else { FilterField::BusinessDomain };
        let display = match requirement.min_years {
            Some(years) => format!("Domain '{name}' with ≥ {years} years"),
            None => format!("Domain '{name}'"),
        };
        let filter = AppliedFilter {
            id: format!("filter:domain:{canonical_id}"),
            field,
            operator: FilterOp::In,
            value: json!(expanded),
            display,
            source: ConstraintSource::User,
        };
        let resolved = ResolvedDomain {
            requested_identifier: requirement.identifier.clone(),
            canonical_id,
            name,
            expanded_ids: expanded,
            min_years: requirement.min_years,
            preferred_min_years: requirement.preferred_min_years,
        };
        Some((resolved, filter))
    }

    fn expand_preferences(
        &self,
        request: &SearchRequest,
        skills: &SkillGraph,
        domains: &DomainGraph,
        criteria: &mut ExpandedCriteria,
    ) {
        for requirement in &request.preferred_skills {
            let resolution = self.resolver.resolve_skill(skills, &requirement.identifier);
            let Some(canonical_id) = resolution.canonical_id.clone() else {
                criteria.unresolved_skills.push(requirement.identifier.clone());
                continue;
            };
            let expanded = self.resolver.expand_skill(skills, &canonical_id);
            let name = skills
                .get(&canonical_id)
                .map(|n| n.name.clone())
                .unwrap_or_else(|| canonical_id.clone());
            criteria.applied_preferences.push(AppliedPreference {
                id: format!("pref:skill:{canonical_id}"),
                field: FilterField::Skills,
                value: json!(expanded),
                display: format!("Prefers skill '{name}'"),
                source: ConstraintSource::User,
                strength: None,
            });
            criteria.resolved_preferred_skills.push(ResolvedSkill {
                requested_identifier: requirement.identifier.clone(),
                canonical_id,
                name,
                expanded_ids: expanded,
                min_proficiency: requirement.min_proficiency.unwrap_or(Proficiency::Learning),
                preferred_min_proficiency: requirement.preferred_min_proficiency,
                resolution: resolution.method,
                confidence: resolution.confidence,
            });
        }

        if let Some(level) = request.preferred_seniority_level {
            criteria.applied_preferences.push(AppliedPreference {
                id: "pref:seniority".to_string(),
                field: FilterField::Seniority,
                value: json!(level.as_str()),
                display: format!("Prefers {} seniority", level.as_str()),
                source: ConstraintSource::User,
                strength: None,
            });
        }
        if let Some(timeline) = request.preferred_max_start_time {
            criteria.applied_preferences.push(AppliedPreference {
                id: "pref:start_timeline".to_string(),
                field: FilterField::StartTimeline,
                value: json!(timeline.as_str()),
                display: format!("Prefers start within {}", timeline.as_str()),
                source: ConstraintSource::User,
                strength: None,
            });
        }
        if !request.preferred_timezone.is_empty() {
            let zones: Vec<&str> = request.preferred_timezone.iter().map(|z| z.as_str()).collect();
            criteria.applied_preferences.push(AppliedPreference {
                id: "pref:timezone".to_string(),
                field: FilterField::Timezone,
                value: json!(zones),
                display: format!("Prefers timezone [{}]", zones.join(", ")),
                source: ConstraintSource::User,
                strength: None,
            });
        }

        for (requirements, technical) in [
            (&request.preferred_business_domains, false),
            (&request.preferred_technical_domains, true),
        ] {
            for requirement in requirements {
                let arena = if technical { &domains.technical } else { &domains.business };
                let resolution = self.resolver.resolve_domain(arena, &requirement.identifier);
                let Some(canonical_id) = resolution.canonical_id else {
                    criteria.unresolved_skills.push(requirement.identifier.clone());
                    continue;
                };
                let expanded = if technical {
                    self.resolver.expand_technical_domain(domains, &canonical_id)
                } else {
                    self.resolver.expand_business_domain(domains, &canonical_id)
                };
                let name = arena
                    .get(&canonical_id)
                    .map(|n| n.name.clone())
                    .unwrap_or_else(|| canonical_id.clone());
                let field = if technical {
                    FilterField::TechnicalDomain
                } else {
                    FilterField::BusinessDomain
                };
                criteria.applied_preferences.push(AppliedPreference {
                    id: format!("pref:domain:{canonical_id}"),
                    field,
                    value: json!(expanded),
                    display: format!("Prefers domain '{name}'"),
                    source: ConstraintSource::User,
                    strength: None,
                });
                let resolved = ResolvedDomain {
                    requested_identifier: requirement.identifier.clone(),
                    canonical_id,
                    name,
                    expanded_ids: expanded,
                    min_years: requirement.min_years,
                    preferred_min_years: requirement.preferred_min_years,
                };
                if technical {
                    criteria.resolved_preferred_technical_domains.push(resolved);
                } else {
                    criteria.resolved_preferred_business_domains.push(resolved);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{DomainArenaBuilder, SkillGraphBuilder};

    fn fixture_skills() -> SkillGraph {
        let mut b = SkillGraphBuilder::default();
        b.add_skill("skill_backend", "Backend", "backend".into(), None, None);
        b.add_skill(
            "skill_python",
            "Python",
            "python".into(),
            Some("cat_languages".into()),
            Some("skill_backend".into()),
        );
        b.add_skill(
            "skill_go",
            "Go",
            "go".into(),
            Some("cat_languages".into()),
            Some("skill_backend".into()),
        );
        b.finish().unwrap()
    }

    fn fixture_domains() -> DomainGraph {
        let mut business = DomainArenaBuilder::default();
        business.add_domain("dom_fintech", "Fintech", "fintech".into(), None, vec![]);
        let mut technical = DomainArenaBuilder::default();
        technical.add_domain("tdom_web", "Web", "web".into(), None, vec![]);
        DomainGraph { business: business.finish().unwrap(), technical: technical.finish().unwrap() }
    }

    fn expander() -> ConstraintExpander {
        ConstraintExpander::new(&TaxonomyConfig::default())
    }

    #[test]
    fn senior_request_derives_min_years_filter() {
        let request = SearchRequest {
            required_seniority_level: Some(SeniorityLevel::Senior),
            ..Default::default()
        };
        let criteria = expander()
            .expand(&request, &fixture_skills(), &fixture_domains())
            .unwrap();
        assert_eq!(criteria.min_years_experience, Some(6.0));
        assert_eq!(criteria.max_years_experience, None);
        let years = criteria
            .applied_filters
            .iter()
            .find(|f| f.field == FilterField::YearsExperience)
            .unwrap();
        assert_eq!(years.operator, FilterOp::Gte);
        assert_eq!(years.value, json!(6.0));
        assert_eq!(years.source, ConstraintSource::Derived);
        assert!(criteria.applied_preferences.is_empty());
    }

    #[test]
    fn junior_request_derives_a_bounded_envelope() {
        let request = SearchRequest {
            required_seniority_level: Some(SeniorityLevel::Junior),
            ..Default::default()
        };
        let criteria = expander()
            .expand(&request, &fixture_skills(), &fixture_domains())
            .unwrap();
        assert_eq!(criteria.min_years_experience, Some(0.0));
        assert_eq!(criteria.max_years_experience, Some(3.0));
        assert!(criteria.applied_filters.iter().any(|f| f.id == "filter:years_max"));
    }

    #[test]
    fn timeline_expands_to_a_prefix_set() {
        let request = SearchRequest {
            required_max_start_time: Some(StartTimeline::OneMonth),
            ..Default::default()
        };
        let criteria = expander()
            .expand(&request, &fixture_skills(), &fixture_domains())
            .unwrap();
        assert_eq!(
            criteria.start_timeline_set,
            vec![StartTimeline::Immediate, StartTimeline::TwoWeeks, StartTimeline::OneMonth]
        );
    }

    #[test]
    fn category_skill_expands_and_buckets_leaves() {
        let request = SearchRequest {
            required_skills: vec![SkillRequirement {
                identifier: "Backend".into(),
                min_proficiency: Some(Proficiency::Proficient),
                preferred_min_proficiency: None,
            }],
            ..Default::default()
        };
        let criteria = expander()
            .expand(&request, &fixture_skills(), &fixture_domains())
            .unwrap();
        let buckets = &criteria.skill_proficiency_buckets;
        assert!(buckets.learning.is_empty());
        assert_eq!(buckets.bucket_of("skill_python"), Some(Proficiency::Proficient));
        assert_eq!(buckets.bucket_of("skill_go"), Some(Proficiency::Proficient));
    }

    #[test]
    fn stricter_proficiency_wins_across_requirements() {
        let request = SearchRequest {
            required_skills: vec![
                SkillRequirement {
                    identifier: "Backend".into(),
                    min_proficiency: None,
                    preferred_min_proficiency: None,
                },
                SkillRequirement {
                    identifier: "Python".into(),
                    min_proficiency: Some(Proficiency::Expert),
                    preferred_min_proficiency: None,
                },
            ],
            ..Default::default()
        };
        let criteria = expander()
            .expand(&request, &fixture_skills(), &fixture_domains())
            .unwrap();
        let buckets = &criteria.skill_proficiency_buckets;
        assert_eq!(buckets.bucket_of("skill_python"), Some(Proficiency::Expert));
        assert_eq!(buckets.bucket_of("skill_go"), Some(Proficiency::Learning));
        assert!(criteria
            .defaults_applied
            .iter()
            .any(|d| d.contains("min_proficiency")));
    }

    #[test]
    fn budget_ceiling_uses_stretch_when_present() {
        let request = SearchRequest {
            max_budget: Some(200_000),
            stretch_budget: Some(220_000),
            ..Default::default()
        };
        let criteria = expander()
            .expand(&request, &fixture_skills(), &fixture_domains())
            .unwrap();
        let salary = criteria
            .applied_filters
            .iter()
            .find(|f| f.field == FilterField::Salary)
            .unwrap();
        assert_eq!(salary.value, json!(220_000));
        assert_eq!(criteria.salary_ceiling(), Some(220_000));
    }

    #[test]
    fn unresolved_identifiers_are_reported_not_fatal() {
        let request = SearchRequest {
            required_skills: vec![SkillRequirement::named("underwater_basket_weaving")],
            ..Default::default()
        };
        let criteria = expander()
            .expand(&request, &fixture_skills(), &fixture_domains())
            .unwrap();
        assert_eq!(criteria.unresolved_skills, vec!["underwater_basket_weaving".to_string()]);
        assert!(criteria.resolved_required_skills.is_empty());
    }

    #[test]
    fn expansion_is_idempotent_for_applied_filters() {
        let request = SearchRequest {
            required_skills: vec![SkillRequirement::named("Python")],
            required_seniority_level: Some(SeniorityLevel::Senior),
            required_timezone: vec![UsTimezone::Eastern],
            max_budget: Some(150_000),
            ..Default::default()
        };
        let skills = fixture_skills();
        let domains = fixture_domains();
        let once = expander().expand(&request, &skills, &domains).unwrap();
        let twice = expander().expand(&request, &skills, &domains).unwrap();
        assert_eq!(once.applied_filters, twice.applied_filters);
    }
}
