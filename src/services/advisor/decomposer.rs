//! Decomposer: converts the applied-filter audit list into independently
//! testable constraints.
//!
//! Each user skill becomes its own constraint so it can be tested alone;
//! derived skills are grouped per rule, so overriding the rule removes
//! the whole group. Property filters keep their operator and typed value.

use crate::models::*;

const BASE_MATCH_CLAUSE: &str = "MATCH (e:Engineer)";

pub fn decompose(criteria: &ExpandedCriteria) -> DecomposedConstraints {
    let mut constraints = Vec::new();

    for filter in &criteria.applied_filters {
        match filter.field {
            FilterField::Skills => match &filter.source {
                ConstraintSource::User => {
                    // One constraint per user skill requirement, carrying
                    // its proficiency floor.
                    let Some(resolved) = criteria
                        .resolved_required_skills
                        .iter()
                        .find(|s| filter.id == format!("filter:skill:{}", s.canonical_id))
                    else {
                        continue;
                    };
                    constraints.push(TestableConstraint {
                        id: filter.id.clone(),
                        display_value: filter.display.clone(),
                        source: ConstraintSource::User,
                        kind: ConstraintKind::SkillTraversal {
                            skill_ids: resolved.expanded_ids.clone(),
                            origin: TraversalOrigin::User,
                            min_proficiency: Some(resolved.min_proficiency),
                        },
                    });
                }
                ConstraintSource::DerivedRule(rule_id) => {
                    constraints.push(TestableConstraint {
                        id: format!("rule:{rule_id}"),
                        display_value: filter.display.clone(),
                        source: filter.source.clone(),
                        kind: ConstraintKind::SkillTraversal {
                            skill_ids: value_as_string_set(&filter.value),
                            origin: TraversalOrigin::Derived,
                            min_proficiency: None,
                        },
                    });
                }
                ConstraintSource::Derived => {}
            },
            FilterField::YearsExperience | FilterField::Salary => {
                constraints.push(property(filter, PropertyFieldType::Number));
            }
            FilterField::Timezone | FilterField::StartTimeline | FilterField::Seniority => {
                constraints.push(property(filter, PropertyFieldType::Enum));
            }
            FilterField::BusinessDomain | FilterField::TechnicalDomain => {
                constraints.push(property(filter, PropertyFieldType::Text));
            }
            FilterField::Confidence => {} // never a filter
        }
    }

    DecomposedConstraints { constraints, base_match_clause: BASE_MATCH_CLAUSE.to_string() }
}

fn property(filter: &AppliedFilter, field_type: PropertyFieldType) -> TestableConstraint {
    TestableConstraint {
        id: filter.id.clone(),
        display_value: filter.display.clone(),
        source: filter.source.clone(),
        kind: ConstraintKind::Property {
            field: filter.field,
            op: filter.operator,
            value: filter.value.clone(),
            field_type,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn criteria_fixture() -> ExpandedCriteria {
        let mut criteria = ExpandedCriteria::default();
        criteria.resolved_required_skills.push(ResolvedSkill {
            requested_identifier: "python".into(),
            canonical_id: "skill_python".into(),
            name: "Python".into(),
            expanded_ids: vec!["skill_python".into()],
            min_proficiency: Proficiency::Proficient,
            preferred_min_proficiency: None,
            resolution: ResolutionMethod::Exact,
            confidence: 1.0,
        });
        criteria.applied_filters = vec![
            AppliedFilter {
                id: "filter:skill:skill_python".into(),
                field: FilterField::Skills,
                operator: FilterOp::In,
                value: json!(["skill_python"]),
                display: "Skill 'Python' at proficient or above".into(),
                source: ConstraintSource::User,
            },
            AppliedFilter {
                id: "filter:years_min".into(),
                field: FilterField::YearsExperience,
                operator: FilterOp::Gte,
                value: json!(6.0),
                display: "Years of experience ≥ 6".into(),
                source: ConstraintSource::Derived,
            },
            AppliedFilter {
                id: "filter:rule:fintech-requires-compliance".into(),
                field: FilterField::Skills,
                operator: FilterOp::In,
                value: json!(["skill_regulatory_compliance"]),
                display: "Fintech work requires regulatory compliance".into(),
                source: ConstraintSource::DerivedRule("fintech-requires-compliance".into()),
            },
        ];
        criteria
    }

    #[test]
    fn user_skills_become_individual_traversals() {
        let decomposed = decompose(&criteria_fixture());
        let skill = decomposed
            .constraints
            .iter()
            .find(|c| c.id == "filter:skill:skill_python")
            .unwrap();
        match &skill.kind {
            ConstraintKind::SkillTraversal { skill_ids, origin, min_proficiency } => {
                assert_eq!(skill_ids, &vec!["skill_python".to_string()]);
                assert_eq!(*origin, TraversalOrigin::User);
                assert_eq!(*min_proficiency, Some(Proficiency::Proficient));
            }
            _ => panic!("expected skill traversal"),
        }
    }

    #[test]
    fn derived_skills_group_under_their_rule() {
        let decomposed = decompose(&criteria_fixture());
        let group = decomposed
            .constraints
            .iter()
            .find(|c| c.id == "rule:fintech-requires-compliance")
            .unwrap();
        match &group.kind {
            ConstraintKind::SkillTraversal { origin, .. } => {
                assert_eq!(*origin, TraversalOrigin::Derived);
            }
            _ => panic!("expected skill traversal"),
        }
        assert_eq!(
            group.source,
            ConstraintSource::DerivedRule("fintech-requires-compliance".into())
        );
    }

    #[test]
    fn property_filters_keep_operator_and_value() {
        let decomposed = decompose(&criteria_fixture());
        let years = decomposed
            .constraints
            .iter()
            .find(|c| c.id == "filter:years_min")
            .unwrap();
        match &years.kind {
            ConstraintKind::Property { field, op, value, field_type } => {
                assert_eq!(*field, FilterField::YearsExperience);
                assert_eq!(*op, FilterOp::Gte);
                assert_eq!(*value, json!(6.0));
                assert_eq!(*field_type, PropertyFieldType::Number);
            }
            _ => panic!("expected property"),
        }
        assert_eq!(decomposed.base_match_clause, "MATCH (e:Engineer)");
    }
}
