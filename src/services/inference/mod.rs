//! Inference engine: fixed-point rule evaluation with provenance.
//!
//! The request seeds a fact base; rules over that base derive additional
//! filters and boosts; derivations of derivations are permitted. Every
//! derived constraint records its derivation chains, and override
//! resolution runs after the fixed point so user intent always wins.

pub mod facts;
pub mod rules;

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::InferenceConfig;
use crate::models::*;

use facts::{Chains, FactBase};
use rules::{EffectKind, Rule, RuleCatalog, TargetField};

/// Everything the engine derived, plus bookkeeping for the response.
#[derive(Debug, Default)]
pub struct InferenceResult {
    pub derived_constraints: Vec<DerivedConstraint>,
    pub fired_rules: Vec<String>,
    pub overridden_rules: Vec<String>,
    pub iteration_count: u32,
    pub warnings: Vec<String>,
    /// Skill ids hardened into the required set (overrides already
    /// subtracted).
    pub derived_required_skill_ids: Vec<String>,
    /// Per-skill boost strengths, max-aggregated (overrides subtracted).
    pub derived_skill_boosts: BTreeMap<String, f64>,
}

impl InferenceResult {
    /// Fold the derived constraints into the expanded criteria: required
    /// skills join the learning bucket and the audit lists gain one entry
    /// per surviving constraint.
    pub fn apply_to_criteria(&self, criteria: &mut ExpandedCriteria) {
        for skill_id in &self.derived_required_skill_ids {
            criteria.skill_proficiency_buckets.insert(skill_id, Proficiency::Learning);
        }
        for constraint in &self.derived_constraints {
            if constraint.is_fully_overridden() {
                continue;
            }
            let source = ConstraintSource::DerivedRule(constraint.rule.id.clone());
            match constraint.action.effect {
                ConstraintEffect::Filter => {
                    let ids = constraint.effective_skill_ids();
                    if ids.is_empty() {
                        continue;
                    }
                    criteria.applied_filters.push(AppliedFilter {
                        id: format!("filter:rule:{}", constraint.rule.id),
                        field: FilterField::Skills,
                        operator: FilterOp::In,
                        value: json!(ids),
                        display: constraint.rule.name.clone(),
                        source,
                    });
                }
                ConstraintEffect::Boost => {
                    let field = match constraint.action.target_field.as_str() {
                        "preferredSeniorityLevel" => FilterField::Seniority,
                        "preferredMaxStartTime" => FilterField::StartTimeline,
                        "preferredConfidenceScore" => FilterField::Confidence,
                        _ => FilterField::Skills,
                    };
                    criteria.applied_preferences.push(AppliedPreference {
                        id: format!("pref:rule:{}:{}", constraint.rule.id, constraint.action.target_field),
                        field,
                        value: constraint.action.target_value.clone(),
                        display: constraint.rule.name.clone(),
                        source,
                        strength: constraint.action.boost_strength,
                    });
                    // A derived start-time preference fills the slot only
                    // when the user left it empty.
                    if constraint.action.target_field == "preferredMaxStartTime"
                        && criteria.preferred_max_start_time.is_none()
                        && let Some(label) = constraint.action.target_value.as_str()
                        && let Ok(timeline) =
                            serde_json::from_value::<StartTimeline>(json!(label))
                    {
                        criteria.preferred_max_start_time = Some(timeline);
                    }
                    if constraint.action.target_field == "preferredSeniorityLevel"
                        && criteria.preferred_seniority_level.is_none()
                        && let Some(label) = constraint.action.target_value.as_str()
                        && let Ok(level) = serde_json::from_value::<SeniorityLevel>(json!(label))
                    {
                        criteria.preferred_seniority_level = Some(level);
                    }
                }
            }
        }
    }
}

#[derive(Debug)]
struct DerivationRecord {
    rule: RuleRef,
    kind: EffectKind,
    target_field: TargetField,
    target_value: serde_json::Value,
    boost_strength: Option<f64>,
    chains: Chains,
}

pub struct InferenceEngine {
    catalog: RuleCatalog,
    max_iterations: u32,
}

impl InferenceEngine {
    pub fn new(config: &InferenceConfig) -> Result<Self, anyhow::Error> {
        let catalog = match &config.rules_path {
            Some(path) => RuleCatalog::from_json_file(path)?,
            None => RuleCatalog::builtin(),
        };
        Ok(Self { catalog, max_iterations: config.max_iterations })
    }

    pub fn with_catalog(catalog: RuleCatalog, max_iterations: u32) -> Self {
        Self { catalog, max_iterations }
    }

    /// Run the fixed-point loop and resolve overrides.
    pub fn infer(&self, request: &SearchRequest, criteria: &ExpandedCriteria) -> InferenceResult {
        let mut facts = FactBase::seed(request, criteria);
        let mut records: BTreeMap<(String, String, String), DerivationRecord> = BTreeMap::new();
        let mut fired: BTreeSet<String> = BTreeSet::new();
        let mut overridden_fired: BTreeSet<String> = BTreeSet::new();
        let mut warnings = Vec::new();

        let mut iteration_count = 0;
        loop {
            iteration_count += 1;
            let mut changed = false;

            for rule in self.catalog.rules() {
                if !rule.condition.evaluate(&facts) {
                    continue;
                }
                let chains = Self::chains_through(rule, &facts);
                let key = (
                    rule.id.clone(),
                    rule.effect.target_field.key().to_string(),
                    rule.effect.target_value.to_string(),
                );

                if request.overridden_rule_ids.contains(&rule.id) {
                    // Suppressed rules still surface as derived constraints
                    // (marked FULL later) but never touch the fact base, so
                    // nothing downstream of them can fire.
                    overridden_fired.insert(rule.id.clone());
                    Self::merge_record(&mut records, key, rule, chains);
                    continue;
                }

                fired.insert(rule.id.clone());
                let applied = match rule.effect.kind {
                    EffectKind::Filter => {
                        facts.apply_filter(rule.effect.target_field.key(), &rule.effect.target_value, &chains)
                    }
                    EffectKind::Boost => facts.apply_boost(
                        rule.effect.target_field.key(),
                        &rule.effect.target_value,
                        rule.effect.boost_strength.unwrap_or(0.5),
                        &chains,
                    ),
                };
                changed |= applied;
                Self::merge_record(&mut records, key, rule, chains);
            }

            if !changed {
                break;
            }
            if iteration_count >= self.max_iterations {
                let warning = format!(
                    "inference iteration cap ({}) reached; continuing with the last stable fact map",
                    self.max_iterations
                );
                tracing::warn!("{warning}");
                warnings.push(warning);
                break;
            }
        }

        self.resolve(request, criteria, records, fired, overridden_fired, iteration_count, warnings)
    }

    /// Derivation chains for a firing rule: the chains of every fact its
    /// condition read, each extended with this rule's id.
    fn chains_through(rule: &Rule, facts: &FactBase) -> Chains {
        let mut paths = Vec::new();
        rule.condition.paths(&mut paths);
        let mut parents: Chains = Vec::new();
        for path in paths {
            for chain in facts.chains_for(path) {
                if !parents.contains(&chain) {
                    parents.push(chain);
                }
            }
        }
        if parents.is_empty() {
            parents.push(Vec::new());
        }
        let mut chains: Chains = Vec::new();
        for mut chain in parents {
            chain.push(rule.id.clone());
            if !chains.contains(&chain) {
                chains.push(chain);
            }
        }
        chains
    }

    fn merge_record(
        records: &mut BTreeMap<(String, String, String), DerivationRecord>,
        key: (String, String, String),
        rule: &Rule,
        chains: Chains,
    ) {
        let record = records.entry(key).or_insert_with(|| DerivationRecord {
            rule: RuleRef { id: rule.id.clone(), name: rule.name.clone() },
            kind: rule.effect.kind,
            target_field: rule.effect.target_field,
            target_value: rule.effect.target_value.clone(),
            boost_strength: rule.effect.boost_strength,
            chains: Vec::new(),
        });
        for chain in chains {
            if !record.chains.contains(&chain) {
                record.chains.push(chain);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve(
        &self,
        request: &SearchRequest,
        criteria: &ExpandedCriteria,
        records: BTreeMap<(String, String, String), DerivationRecord>,
        fired: BTreeSet<String>,
        overridden_fired: BTreeSet<String>,
        iteration_count: u32,
        warnings: Vec<String>,
    ) -> InferenceResult {
        // Skills the user already handles, canonical and expanded.
        let mut user_skill_ids: BTreeSet<String> = BTreeSet::new();
        for skill in criteria
            .resolved_required_skills
            .iter()
            .chain(criteria.resolved_preferred_skills.iter())
        {
            user_skill_ids.insert(skill.canonical_id.clone());
            user_skill_ids.extend(skill.expanded_ids.iter().cloned());
        }

        let mut result = InferenceResult {
            fired_rules: fired.into_iter().collect(),
            overridden_rules: overridden_fired.into_iter().collect(),
            iteration_count,
            warnings,
            ..Default::default()
        };

        let mut derived_required: BTreeSet<String> = BTreeSet::new();

        for ((rule_id, _, _), mut record) in records {
            record.chains.sort();
            let override_info =
                Self::resolve_override(request, &rule_id, &record, &user_skill_ids);

            let constraint = DerivedConstraint {
                rule: record.rule.clone(),
                action: ConstraintAction {
                    effect: match record.kind {
                        EffectKind::Filter => ConstraintEffect::Filter,
                        EffectKind::Boost => ConstraintEffect::Boost,
                    },
                    target_field: record.target_field.key().to_string(),
                    target_value: record.target_value.clone(),
                    boost_strength: record.boost_strength,
                },
                provenance: Provenance {
                    derivation_chains: record.chains.clone(),
                    explanation: Self::explain(&record),
                },
                r#override: override_info,
            };

            if !constraint.is_fully_overridden() && record.target_field == TargetField::DerivedSkills
            {
                let effective = constraint.effective_skill_ids();
                match record.kind {
                    EffectKind::Filter => derived_required.extend(effective),
                    EffectKind::Boost => {
                        let strength = record.boost_strength.unwrap_or(0.5);
                        for id in effective {
                            let entry = result.derived_skill_boosts.entry(id).or_insert(0.0);
                            if strength > *entry {
                                *entry = strength;
                            }
                        }
                    }
                }
            }

            result.derived_constraints.push(constraint);
        }

        result.derived_required_skill_ids = derived_required.into_iter().collect();
        result
    }

    fn resolve_override(
        request: &SearchRequest,
        rule_id: &str,
        record: &DerivationRecord,
        user_skill_ids: &BTreeSet<String>,
    ) -> Option<OverrideInfo> {
        if request.overridden_rule_ids.contains(rule_id) {
            return Some(OverrideInfo {
                scope: OverrideScope::Full,
                overridden_skills: Vec::new(),
                reason: OverrideReason::ExplicitRule,
            });
        }
        let user_set_field = match record.target_field {
            TargetField::PreferredSeniorityLevel => request.preferred_seniority_level.is_some(),
            TargetField::PreferredMaxStartTime => request.preferred_max_start_time.is_some(),
            _ => false,
        };
        if user_set_field {
            return Some(OverrideInfo {
                scope: OverrideScope::Full,
                overridden_skills: Vec::new(),
                reason: OverrideReason::ImplicitField,
            });
        }
        if record.target_field == TargetField::DerivedSkills {
            let targets = value_as_string_set(&record.target_value);
            if targets.is_empty() {
                return None;
            }
            let covered: Vec<String> = targets
                .iter()
                .filter(|id| user_skill_ids.contains(*id))
                .cloned()
                .collect();
            if covered.len() == targets.len() {
                return Some(OverrideInfo {
                    scope: OverrideScope::Full,
                    overridden_skills: covered,
                    reason: OverrideReason::ImplicitSkill,
                });
            }
            if !covered.is_empty() {
                return Some(OverrideInfo {
                    scope: OverrideScope::Partial,
                    overridden_skills: covered,
                    reason: OverrideReason::ImplicitSkill,
                });
            }
        }
        None
    }

    fn explain(record: &DerivationRecord) -> String {
        let chain_text = record
            .chains
            .iter()
            .map(|chain| chain.join(" → "))
            .collect::<Vec<_>>()
            .join("; ");
        let verb = match record.kind {
            EffectKind::Filter => "requires",
            EffectKind::Boost => "prefers",
        };
        format!(
            "{} {} {} (derived via {})",
            record.rule.name,
            verb,
            record.target_value,
            chain_text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> InferenceEngine {
        InferenceEngine::with_catalog(RuleCatalog::builtin(), 8)
    }

    fn infer(request: &SearchRequest) -> InferenceResult {
        infer_with(request, &ExpandedCriteria::default())
    }

    fn infer_with(request: &SearchRequest, criteria: &ExpandedCriteria) -> InferenceResult {
        engine().infer(request, criteria)
    }

    fn constraint_for<'a>(
        result: &'a InferenceResult,
        rule_id: &str,
    ) -> Option<&'a DerivedConstraint> {
        result.derived_constraints.iter().find(|c| c.rule.id == rule_id)
    }

    #[test]
    fn greenfield_chains_into_leadership_boosts() {
        let request =
            SearchRequest { team_focus: Some(TeamFocus::Greenfield), ..Default::default() };
        let result = infer(&request);

        assert!(result.fired_rules.contains(&"greenfield-prefers-senior".to_string()));
        assert!(result.fired_rules.contains(&"senior-prefers-leadership".to_string()));

        let leadership = constraint_for(&result, "senior-prefers-leadership").unwrap();
        assert_eq!(
            leadership.provenance.derivation_chains,
            vec![vec![
                "greenfield-prefers-senior".to_string(),
                "senior-prefers-leadership".to_string()
            ]]
        );
        for skill in ["skill_mentorship", "skill_code_review", "skill_tech_leadership"] {
            assert!(result.derived_skill_boosts.contains_key(skill));
        }
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn chains_start_at_request_reading_rules() {
        let request =
            SearchRequest { team_focus: Some(TeamFocus::Greenfield), ..Default::default() };
        let result = infer(&request);
        let root = constraint_for(&result, "greenfield-prefers-senior").unwrap();
        assert_eq!(
            root.provenance.derivation_chains,
            vec![vec!["greenfield-prefers-senior".to_string()]]
        );
    }

    #[test]
    fn explicit_rule_override_neutralizes_the_chain() {
        let request = SearchRequest {
            team_focus: Some(TeamFocus::Greenfield),
            overridden_rule_ids: ["greenfield-prefers-senior".to_string()].into(),
            ..Default::default()
        };
        let result = infer(&request);

        let suppressed = constraint_for(&result, "greenfield-prefers-senior").unwrap();
        assert!(suppressed.is_fully_overridden());
        assert_eq!(
            suppressed.r#override.as_ref().unwrap().reason,
            OverrideReason::ExplicitRule
        );
        // The downstream rule never saw the derived fact.
        assert!(constraint_for(&result, "senior-prefers-leadership").is_none());
        assert!(!result.derived_skill_boosts.contains_key("skill_mentorship"));
        assert!(result.overridden_rules.contains(&"greenfield-prefers-senior".to_string()));
    }

    #[test]
    fn user_preferred_seniority_is_an_implicit_field_override() {
        let request = SearchRequest {
            team_focus: Some(TeamFocus::Greenfield),
            preferred_seniority_level: Some(SeniorityLevel::Staff),
            ..Default::default()
        };
        let result = infer(&request);
        let constraint = constraint_for(&result, "greenfield-prefers-senior").unwrap();
        let info = constraint.r#override.as_ref().unwrap();
        assert_eq!(info.scope, OverrideScope::Full);
        assert_eq!(info.reason, OverrideReason::ImplicitField);
    }

    #[test]
    fn user_held_skills_trigger_partial_override() {
        let request =
            SearchRequest { team_focus: Some(TeamFocus::Migration), ..Default::default() };
        let mut criteria = ExpandedCriteria::default();
        criteria.resolved_required_skills.push(ResolvedSkill {
            requested_identifier: "refactoring".into(),
            canonical_id: "skill_refactoring".into(),
            name: "Refactoring".into(),
            expanded_ids: vec!["skill_refactoring".into()],
            min_proficiency: Proficiency::Learning,
            preferred_min_proficiency: None,
            resolution: ResolutionMethod::Exact,
            confidence: 1.0,
        });
        let result = infer_with(&request, &criteria);
        let constraint = constraint_for(&result, "migration-prefers-modernization").unwrap();
        let info = constraint.r#override.as_ref().unwrap();
        assert_eq!(info.scope, OverrideScope::Partial);
        assert_eq!(info.overridden_skills, vec!["skill_refactoring".to_string()]);
        // Boosts survive for the remainder of the group.
        assert!(!result.derived_skill_boosts.contains_key("skill_refactoring"));
        assert!(result.derived_skill_boosts.contains_key("skill_data_migration"));
    }

    #[test]
    fn filter_rules_harden_required_skills() {
        let request = SearchRequest::default();
        let mut criteria = ExpandedCriteria::default();
        criteria.resolved_business_domains.push(ResolvedDomain {
            requested_identifier: "fintech".into(),
            canonical_id: "dom_fintech".into(),
            name: "Fintech".into(),
            expanded_ids: vec!["dom_fintech".into()],
            min_years: None,
            preferred_min_years: None,
        });
        let result = infer_with(&request, &criteria);
        assert_eq!(
            result.derived_required_skill_ids,
            vec!["skill_regulatory_compliance".to_string()]
        );
        let constraint = constraint_for(&result, "fintech-requires-compliance").unwrap();
        assert_eq!(constraint.action.effect, ConstraintEffect::Filter);
    }

    #[test]
    fn empty_request_derives_nothing() {
        let result = infer(&SearchRequest::default());
        assert!(result.derived_constraints.is_empty());
        assert!(result.fired_rules.is_empty());
        assert_eq!(result.iteration_count, 1);
    }

    #[test]
    fn iteration_cap_degrades_with_a_warning() {
        // Two rules that keep rewriting each other's target never reach a
        // fixed point; the engine must stop at the cap and warn.
        use super::rules::{Condition, Effect, EffectKind, Rule, TargetField};
        use serde_json::json;
        let ping = Rule {
            id: "ping".into(),
            name: "ping".into(),
            priority: 10,
            condition: Condition::Equal {
                path: "$.derived.preferredProperties.preferredProficiency".into(),
                value: json!("expert"),
            },
            effect: Effect {
                kind: EffectKind::Boost,
                target_field: TargetField::PreferredProficiency,
                target_value: json!("proficient"),
                boost_strength: Some(0.1),
            },
        };
        let pong = Rule {
            id: "pong".into(),
            name: "pong".into(),
            priority: 5,
            condition: Condition::Equal {
                path: "$.derived.preferredProperties.preferredProficiency".into(),
                value: json!("proficient"),
            },
            effect: Effect {
                kind: EffectKind::Boost,
                target_field: TargetField::PreferredProficiency,
                target_value: json!("expert"),
                boost_strength: Some(0.1),
            },
        };
        let seed = Rule {
            id: "seed".into(),
            name: "seed".into(),
            priority: 100,
            condition: Condition::Equal {
                path: "$.request.teamFocus".into(),
                value: json!("scaling"),
            },
            effect: Effect {
                kind: EffectKind::Boost,
                target_field: TargetField::PreferredProficiency,
                target_value: json!("expert"),
                boost_strength: Some(0.1),
            },
        };
        let catalog = RuleCatalog::new(vec![ping, pong, seed]).unwrap();
        let engine = InferenceEngine::with_catalog(catalog, 4);
        let request =
            SearchRequest { team_focus: Some(TeamFocus::Scaling), ..Default::default() };
        let result = engine.infer(&request, &ExpandedCriteria::default());
        assert_eq!(result.iteration_count, 4);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("iteration cap"));
    }

    #[test]
    fn applying_to_criteria_adds_audit_entries() {
        let request =
            SearchRequest { team_focus: Some(TeamFocus::Greenfield), ..Default::default() };
        let mut criteria = ExpandedCriteria::default();
        let result = infer_with(&request, &criteria);
        result.apply_to_criteria(&mut criteria);
        assert!(criteria
            .applied_preferences
            .iter()
            .any(|p| p.source == ConstraintSource::DerivedRule("senior-prefers-leadership".into())));
        assert_eq!(criteria.preferred_seniority_level, Some(SeniorityLevel::Senior));
    }
}
