//! Derived constraints (inference output) and testable constraints (the
//! advisor's unit of conflict analysis).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::criteria::{ConstraintSource, FilterField, FilterOp};
use super::request::Proficiency;

// ============================================================================
// Derived constraints
// ============================================================================

/// Reference to the rule that produced a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub id: String,
    pub name: String,
}

/// Effect of a derived constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintEffect {
    Filter,
    Boost,
}

/// What a fired rule did to the fact base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintAction {
    pub effect: ConstraintEffect,
    pub target_field: String,
    pub target_value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost_strength: Option<f64>,
}

/// How a constraint was reached. Every chain starts at a rule whose
/// condition reads only request fields; later entries read facts written
/// by the previous rule. Multiple chains are kept when the same constraint
/// is derived via independent paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub derivation_chains: Vec<Vec<String>>,
    pub explanation: String,
}

/// Override scope after resolution against the user's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideScope {
    Full,
    Partial,
}

/// Why a constraint was overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideReason {
    #[serde(rename = "explicit-rule-override")]
    ExplicitRule,
    #[serde(rename = "implicit-field-override")]
    ImplicitField,
    #[serde(rename = "implicit-skill-override")]
    ImplicitSkill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideInfo {
    pub scope: OverrideScope,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overridden_skills: Vec<String>,
    pub reason: OverrideReason,
}

/// One constraint the inference engine derived, with full provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedConstraint {
    pub rule: RuleRef,
    pub action: ConstraintAction,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#override: Option<OverrideInfo>,
}

impl DerivedConstraint {
    /// Fully-overridden constraints contribute nothing downstream.
    pub fn is_fully_overridden(&self) -> bool {
        matches!(self.r#override, Some(OverrideInfo { scope: OverrideScope::Full, .. }))
    }

    /// Skill ids this constraint still applies to after override
    /// resolution. Non-skill constraints return the raw target ids.
    pub fn effective_skill_ids(&self) -> Vec<String> {
        let all = value_as_string_set(&self.action.target_value);
        match &self.r#override {
            Some(info) if info.scope == OverrideScope::Full => Vec::new(),
            Some(info) => all
                .into_iter()
                .filter(|id| !info.overridden_skills.contains(id))
                .collect(),
            None => all,
        }
    }
}

/// Interpret a target value as a set of string ids (scalar or array).
pub fn value_as_string_set(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Testable constraints
// ============================================================================

/// Value type hint for property constraints, used by the statistics
/// collector to pick the right enrichment query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyFieldType {
    Number,
    Text,
    Enum,
}

/// Who introduced a skill-traversal constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalOrigin {
    User,
    Derived,
}

/// Payload of a testable constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// A scalar property filter (`years_experience ≥ 6`).
    Property {
        field: FilterField,
        op: FilterOp,
        value: Value,
        field_type: PropertyFieldType,
    },
    /// A skill-graph traversal. User skills are one constraint each;
    /// derived skills are grouped per rule so overriding the rule removes
    /// the whole group.
    SkillTraversal {
        skill_ids: Vec<String>,
        origin: TraversalOrigin,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_proficiency: Option<Proficiency>,
    },
}

/// Unit of conflict analysis: independently removable, countable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestableConstraint {
    /// Stable within a request; used to correlate MCS members with
    /// suggestions.
    pub id: String,
    pub display_value: String,
    pub source: ConstraintSource,
    #[serde(flatten)]
    pub kind: ConstraintKind,
}

impl TestableConstraint {
    pub fn is_skill(&self) -> bool {
        matches!(self.kind, ConstraintKind::SkillTraversal { .. })
    }
}

/// Decomposed form of the applied-filter list plus the match clause every
/// count query starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecomposedConstraints {
    pub constraints: Vec<TestableConstraint>,
    pub base_match_clause: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn skills_constraint(override_info: Option<OverrideInfo>) -> DerivedConstraint {
        DerivedConstraint {
            rule: RuleRef { id: "r1".into(), name: "rule one".into() },
            action: ConstraintAction {
                effect: ConstraintEffect::Filter,
                target_field: "derivedSkills".into(),
                target_value: json!(["skill_a", "skill_b"]),
                boost_strength: None,
            },
            provenance: Provenance {
                derivation_chains: vec![vec!["r1".into()]],
                explanation: "test".into(),
            },
            r#override: override_info,
        }
    }

    #[test]
    fn full_override_removes_everything() {
        let constraint = skills_constraint(Some(OverrideInfo {
            scope: OverrideScope::Full,
            overridden_skills: vec![],
            reason: OverrideReason::ExplicitRule,
        }));
        assert!(constraint.is_fully_overridden());
        assert!(constraint.effective_skill_ids().is_empty());
    }

    #[test]
    fn partial_override_keeps_the_remainder() {
        let constraint = skills_constraint(Some(OverrideInfo {
            scope: OverrideScope::Partial,
            overridden_skills: vec!["skill_a".into()],
            reason: OverrideReason::ImplicitSkill,
        }));
        assert!(!constraint.is_fully_overridden());
        assert_eq!(constraint.effective_skill_ids(), vec!["skill_b".to_string()]);
    }

    #[test]
    fn override_reason_wire_literals() {
        let json = serde_json::to_value(OverrideReason::ImplicitField).unwrap();
        assert_eq!(json, "implicit-field-override");
    }

    #[test]
    fn testable_constraint_flattens_kind_tag() {
        let constraint = TestableConstraint {
            id: "filter:salary".into(),
            display_value: "Salary ≤ $120,000".into(),
            source: ConstraintSource::User,
            kind: ConstraintKind::Property {
                field: FilterField::Salary,
                op: FilterOp::Lte,
                value: json!(120_000),
                field_type: PropertyFieldType::Number,
            },
        };
        let json = serde_json::to_value(&constraint).unwrap();
        assert_eq!(json["kind"], "property");
        assert_eq!(json["field"], "salary");
        assert_eq!(json["op"], "LTE");
    }
}
