//! Relaxation suggester: for every constraint implicated in a conflict
//! set, propose up to three concrete widenings with their projected
//! counts.

use serde_json::json;

use crate::graph::GraphError;
use crate::models::*;

use super::tester::CountOracle;

/// Seniority-tier year floors, used to step a years bound down one tier.
const YEAR_TIERS: [f64; 5] = [0.0, 3.0, 6.0, 10.0, 15.0];

pub struct RelaxationAdvisor {
    salary_step: f64,
}

impl RelaxationAdvisor {
    pub fn new(salary_step: f64) -> Self {
        Self { salary_step }
    }

    /// Suggestions for every distinct constraint appearing in any MCS.
    /// Each carries `new_count`, computed by re-issuing the count with
    /// the suggestion applied to the full constraint set.
    pub async fn suggest(
        &self,
        conflict_sets: &[Vec<TestableConstraint>],
        all_constraints: &[TestableConstraint],
        oracle: &dyn CountOracle,
    ) -> Result<Vec<RelaxationSuggestion>, GraphError> {
        let mut seen = std::collections::BTreeSet::new();
        let mut suggestions = Vec::new();

        let user_skill_anchors = all_constraints
            .iter()
            .filter(|c| {
                matches!(
                    c.kind,
                    ConstraintKind::SkillTraversal { origin: TraversalOrigin::User, .. }
                )
            })
            .count();

        for set in conflict_sets {
            for constraint in set {
                if !seen.insert(constraint.id.clone()) {
                    continue;
                }
                for (action, description, modified) in
                    self.candidate_actions(constraint, all_constraints, user_skill_anchors)
                {
                    let refs: Vec<&TestableConstraint> = modified.iter().collect();
                    let new_count = oracle.count(&refs).await?;
                    suggestions.push(RelaxationSuggestion {
                        constraint_id: constraint.id.clone(),
                        action,
                        description,
                        new_count,
                        narrative: None,
                    });
                }
            }
        }

        // Most effective first; ties stay deterministic.
        suggestions.sort_by(|a, b| {
            b.new_count
                .cmp(&a.new_count)
                .then_with(|| a.constraint_id.cmp(&b.constraint_id))
        });
        Ok(suggestions)
    }

    /// Candidate widenings for one constraint, each paired with the full
    /// constraint set after applying it.
    fn candidate_actions(
        &self,
        constraint: &TestableConstraint,
        all: &[TestableConstraint],
        user_skill_anchors: usize,
    ) -> Vec<(RelaxationAction, String, Vec<TestableConstraint>)> {
        let mut out = Vec::new();
        match &constraint.kind {
            ConstraintKind::Property { field: FilterField::Salary, value, .. } => {
                let Some(current) = value.as_u64() else {
                    return out;
                };
                for steps in [1u64, 2] {
                    let factor = 1.0 + self.salary_step * steps as f64;
                    let new_ceiling = (current as f64 * factor).round() as u64;
                    out.push((
                        RelaxationAction::WidenSalary { new_ceiling },
                        format!("Raise the salary ceiling to ${new_ceiling}"),
                        replace_value(all, &constraint.id, json!(new_ceiling)),
                    ));
                }
            }
            ConstraintKind::Property {
                field: FilterField::YearsExperience,
                op: FilterOp::Gte,
                value,
                ..
            } => {
                let Some(current) = value.as_f64() else {
                    return out;
                };
                let new_min = YEAR_TIERS
                    .iter()
                    .rev()
                    .find(|tier| **tier < current)
                    .copied()
                    .unwrap_or(0.0);
                if new_min < current {
                    out.push((
                        RelaxationAction::LowerYears { new_min },
                        format!("Lower the experience floor to {new_min} years"),
                        replace_value(all, &constraint.id, json!(new_min)),
                    ));
                }
            }
            ConstraintKind::Property { field: FilterField::StartTimeline, value, .. } => {
                let labels = value_as_string_set(value);
                let next = StartTimeline::ORDER
                    .iter()
                    .find(|t| !labels.contains(&t.as_str().to_string()));
                if let Some(next) = next {
                    let mut widened = labels;
                    widened.push(next.as_str().to_string());
                    out.push((
                        RelaxationAction::SlowerTimeline { new_timeline: *next },
                        format!("Accept starts as late as {}", next.as_str()),
                        replace_value(all, &constraint.id, json!(widened)),
                    ));
                }
            }
            ConstraintKind::Property { .. } => {
                out.push((
                    RelaxationAction::DropConstraint,
                    format!("Drop the filter: {}", constraint.display_value),
                    remove_constraint(all, &constraint.id),
                ));
            }
            ConstraintKind::SkillTraversal { skill_ids, origin, .. } => match origin {
                TraversalOrigin::User => {
                    // Never drop the user's only skill anchor.
                    if user_skill_anchors > 1 {
                        out.push((
                            RelaxationAction::DropSkill { skill_ids: skill_ids.clone() },
                            format!("Drop the skill requirement: {}", constraint.display_value),
                            remove_constraint(all, &constraint.id),
                        ));
                    }
                }
                TraversalOrigin::Derived => {
                    if let Some(rule_id) = constraint.source.rule_id() {
                        out.push((
                            RelaxationAction::DropRule { rule_id: rule_id.to_string() },
                            format!("Override the rule `{rule_id}`"),
                            remove_constraint(all, &constraint.id),
                        ));
                    }
                }
            },
        }
        out.truncate(3);
        out
    }
}

fn replace_value(
    all: &[TestableConstraint],
    id: &str,
    new_value: serde_json::Value,
) -> Vec<TestableConstraint> {
    all.iter()
        .map(|c| {
            if c.id == id {
                let mut updated = c.clone();
                if let ConstraintKind::Property { ref mut value, .. } = updated.kind {
                    *value = new_value.clone();
                }
                updated
            } else {
                c.clone()
            }
        })
        .collect()
}

fn remove_constraint(all: &[TestableConstraint], id: &str) -> Vec<TestableConstraint> {
    all.iter().filter(|c| c.id != id).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::super::tester::test_support::TableOracle;
    use super::*;
    use serde_json::json;

    fn salary(id: &str, ceiling: u64) -> TestableConstraint {
        TestableConstraint {
            id: id.into(),
            display_value: format!("Salary ≤ ${ceiling}"),
            source: ConstraintSource::User,
            kind: ConstraintKind::Property {
                field: FilterField::Salary,
                op: FilterOp::Lte,
                value: json!(ceiling),
                field_type: PropertyFieldType::Number,
            },
        }
    }

    fn skill(id: &str, origin: TraversalOrigin, source: ConstraintSource) -> TestableConstraint {
        TestableConstraint {
            id: id.into(),
            display_value: id.into(),
            source,
            kind: ConstraintKind::SkillTraversal {
                skill_ids: vec![format!("{id}_leaf")],
                origin,
                min_proficiency: None,
            },
        }
    }

    #[tokio::test]
    async fn salary_widening_projects_new_counts() {
        let all = vec![salary("filter:salary", 120_000)];
        let sets = vec![all.clone()];
        // Removal/widening is invisible to the id-keyed oracle, so every
        // projection returns the same count; the suggestion shape and the
        // widened ceilings are what this test pins down.
        let oracle = TableOracle::new(vec![&["filter:salary"]]);
        let suggestions = RelaxationAdvisor::new(0.20)
            .suggest(&sets, &all, &oracle)
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 2);
        let ceilings: Vec<u64> = suggestions
            .iter()
            .filter_map(|s| match s.action {
                RelaxationAction::WidenSalary { new_ceiling } => Some(new_ceiling),
                _ => None,
            })
            .collect();
        assert!(ceilings.contains(&144_000));
        assert!(ceilings.contains(&168_000));
    }

    #[tokio::test]
    async fn the_only_user_skill_anchor_is_never_dropped() {
        let only_anchor = skill("skill:python", TraversalOrigin::User, ConstraintSource::User);
        let sets = vec![vec![only_anchor.clone()]];
        let oracle = TableOracle::new(vec![]);
        let suggestions = RelaxationAdvisor::new(0.20)
            .suggest(&sets, &[only_anchor], &oracle)
            .await
            .unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn derived_groups_suggest_overriding_the_rule() {
        let derived = skill(
            "rule:fintech-requires-compliance",
            TraversalOrigin::Derived,
            ConstraintSource::DerivedRule("fintech-requires-compliance".into()),
        );
        let sets = vec![vec![derived.clone()]];
        let oracle = TableOracle::new(vec![&[], &[]]);
        let suggestions = RelaxationAdvisor::new(0.20)
            .suggest(&sets, &[derived], &oracle)
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 1);
        match &suggestions[0].action {
            RelaxationAction::DropRule { rule_id } => {
                assert_eq!(rule_id, "fintech-requires-compliance");
            }
            other => panic!("expected drop-rule, got {other:?}"),
        }
        // Dropping the only constraint leaves the full catalogue.
        assert_eq!(suggestions[0].new_count, 2);
    }

    #[tokio::test]
    async fn years_floor_steps_down_one_tier() {
        let years = TestableConstraint {
            id: "filter:years_min".into(),
            display_value: "Years of experience ≥ 10".into(),
            source: ConstraintSource::Derived,
            kind: ConstraintKind::Property {
                field: FilterField::YearsExperience,
                op: FilterOp::Gte,
                value: json!(10.0),
                field_type: PropertyFieldType::Number,
            },
        };
        let sets = vec![vec![years.clone()]];
        let oracle = TableOracle::new(vec![]);
        let suggestions = RelaxationAdvisor::new(0.20)
            .suggest(&sets, &[years], &oracle)
            .await
            .unwrap();
        match &suggestions[0].action {
            RelaxationAction::LowerYears { new_min } => assert_eq!(*new_min, 6.0),
            other => panic!("expected lower-years, got {other:?}"),
        }
    }
}
