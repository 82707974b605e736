//! Rule catalogue: rules live as values in a read-only catalogue keyed by
//! id, with conditions as small expression trees over named fact paths.
//! Keeping rules as data keeps override handling, introspection, and
//! priority tie-breaking straightforward.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

use super::facts::FactBase;

/// Condition tree. Leaves read one fact path; composition is `all`/`any`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Equal { path: String, value: Value },
    In { path: String, values: Vec<Value> },
    Contains { path: String, value: Value },
}

impl Condition {
    /// All fact paths this condition reads.
    pub fn paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.paths(out);
                }
            }
            Self::Equal { path, .. } | Self::In { path, .. } | Self::Contains { path, .. } => {
                out.push(path);
            }
        }
    }

    pub fn evaluate(&self, facts: &FactBase) -> bool {
        match self {
            Self::All(children) => children.iter().all(|c| c.evaluate(facts)),
            Self::Any(children) => children.iter().any(|c| c.evaluate(facts)),
            Self::Equal { path, value } => facts.lookup(path).as_ref() == Some(value),
            Self::In { path, values } => match facts.lookup(path) {
                Some(fact) => values.contains(&fact),
                None => false,
            },
            Self::Contains { path, value } => match facts.lookup(path) {
                Some(Value::Array(items)) => items.contains(value),
                Some(Value::String(s)) => value.as_str().is_some_and(|v| s.contains(v)),
                _ => false,
            },
        }
    }
}

/// Effect kind: filters harden the required set, boosts feed ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Filter,
    Boost,
}

/// Closed set of writable fact fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetField {
    #[serde(rename = "derivedSkills")]
    DerivedSkills,
    #[serde(rename = "preferredSeniorityLevel")]
    PreferredSeniorityLevel,
    #[serde(rename = "preferredMaxStartTime")]
    PreferredMaxStartTime,
    #[serde(rename = "preferredConfidenceScore")]
    PreferredConfidenceScore,
    #[serde(rename = "preferredProficiency")]
    PreferredProficiency,
}

impl TargetField {
    pub fn key(self) -> &'static str {
        match self {
            Self::DerivedSkills => "derivedSkills",
            Self::PreferredSeniorityLevel => "preferredSeniorityLevel",
            Self::PreferredMaxStartTime => "preferredMaxStartTime",
            Self::PreferredConfidenceScore => "preferredConfidenceScore",
            Self::PreferredProficiency => "preferredProficiency",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub target_field: TargetField,
    pub target_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_strength: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub priority: i32,
    pub condition: Condition,
    pub effect: Effect,
}

/// Read-only rule catalogue, evaluated priority-first (ties break on id).
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
}

impl RuleCatalog {
    pub fn new(mut rules: Vec<Rule>) -> Result<Self, anyhow::Error> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id.clone()) {
                anyhow::bail!("duplicate rule id `{}`", rule.id);
            }
            if let Some(strength) = rule.effect.boost_strength
                && !(0.0..=1.0).contains(&strength)
            {
                anyhow::bail!("rule `{}`: boost_strength must be in [0, 1]", rule.id);
            }
            if rule.effect.kind == EffectKind::Filter && rule.effect.boost_strength.is_some() {
                anyhow::bail!("rule `{}`: filter effects carry no boost_strength", rule.id);
            }
        }
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(Self { rules })
    }

    /// Load a catalogue from a JSON file (array of rules).
    pub fn from_json_file(path: &str) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let rules: Vec<Rule> = serde_json::from_str(&content)?;
        Self::new(rules)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// The shipped catalogue.
    pub fn builtin() -> Self {
        let rules = vec![
            Rule {
                id: "greenfield-prefers-senior".into(),
                name: "Greenfield teams prefer senior engineers".into(),
                priority: 100,
                condition: Condition::Equal {
                    path: "$.request.teamFocus".into(),
                    value: json!("greenfield"),
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::PreferredSeniorityLevel,
                    target_value: json!("senior"),
                    boost_strength: Some(0.6),
                },
            },
            Rule {
                id: "greenfield-prefers-product-mindset".into(),
                name: "Greenfield teams prefer product-minded builders".into(),
                priority: 90,
                condition: Condition::Equal {
                    path: "$.request.teamFocus".into(),
                    value: json!("greenfield"),
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::DerivedSkills,
                    target_value: json!(["skill_prototyping", "skill_product_thinking"]),
                    boost_strength: Some(0.4),
                },
            },
            Rule {
                id: "senior-prefers-leadership".into(),
                name: "Senior preference implies leadership skills".into(),
                priority: 80,
                condition: Condition::In {
                    path: "$.derived.preferredProperties.preferredSeniorityLevel".into(),
                    values: vec![json!("senior"), json!("staff"), json!("principal")],
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::DerivedSkills,
                    target_value: json!([
                        "skill_mentorship",
                        "skill_code_review",
                        "skill_tech_leadership"
                    ]),
                    boost_strength: Some(0.5),
                },
            },
            Rule {
                id: "migration-prefers-modernization".into(),
                name: "Migration teams prefer modernization experience".into(),
                priority: 100,
                condition: Condition::Equal {
                    path: "$.request.teamFocus".into(),
                    value: json!("migration"),
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::DerivedSkills,
                    target_value: json!([
                        "skill_refactoring",
                        "skill_legacy_modernization",
                        "skill_data_migration"
                    ]),
                    boost_strength: Some(0.5),
                },
            },
            Rule {
                id: "migration-prefers-prompt-start".into(),
                name: "Migration work prefers a prompt start".into(),
                priority: 70,
                condition: Condition::Equal {
                    path: "$.request.teamFocus".into(),
                    value: json!("migration"),
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::PreferredMaxStartTime,
                    target_value: json!("one_month"),
                    boost_strength: Some(0.3),
                },
            },
            Rule {
                id: "maintenance-prefers-reliability".into(),
                name: "Maintenance teams prefer reliability practice".into(),
                priority: 100,
                condition: Condition::Equal {
                    path: "$.request.teamFocus".into(),
                    value: json!("maintenance"),
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::DerivedSkills,
                    target_value: json!([
                        "skill_debugging",
                        "skill_incident_response",
                        "skill_observability"
                    ]),
                    boost_strength: Some(0.5),
                },
            },
            Rule {
                id: "scaling-prefers-distributed".into(),
                name: "Scaling teams prefer distributed-systems depth".into(),
                priority: 100,
                condition: Condition::Equal {
                    path: "$.request.teamFocus".into(),
                    value: json!("scaling"),
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::DerivedSkills,
                    target_value: json!([
                        "skill_performance_tuning",
                        "skill_distributed_systems",
                        "skill_capacity_planning"
                    ]),
                    boost_strength: Some(0.5),
                },
            },
            Rule {
                id: "scaling-prefers-confident-profiles".into(),
                name: "Scaling work prefers high-confidence profiles".into(),
                priority: 60,
                condition: Condition::Equal {
                    path: "$.request.teamFocus".into(),
                    value: json!("scaling"),
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::PreferredConfidenceScore,
                    target_value: json!(0.8),
                    boost_strength: Some(0.3),
                },
            },
            Rule {
                id: "expert-demand-prefers-expertise".into(),
                name: "Expert requirements prefer expert proficiency overall".into(),
                priority: 60,
                condition: Condition::Contains {
                    path: "$.request.requiredProficiencies".into(),
                    value: json!("expert"),
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::PreferredProficiency,
                    target_value: json!("expert"),
                    boost_strength: Some(0.4),
                },
            },
            Rule {
                id: "staff-demand-prefers-architecture".into(),
                name: "Staff+ requirements prefer architecture practice".into(),
                priority: 80,
                condition: Condition::In {
                    path: "$.request.requiredSeniorityLevel".into(),
                    values: vec![json!("staff"), json!("principal")],
                },
                effect: Effect {
                    kind: EffectKind::Boost,
                    target_field: TargetField::DerivedSkills,
                    target_value: json!(["skill_system_design", "skill_architecture_review"]),
                    boost_strength: Some(0.5),
                },
            },
            Rule {
                id: "fintech-requires-compliance".into(),
                name: "Fintech work requires regulatory compliance".into(),
                priority: 100,
                condition: Condition::Contains {
                    path: "$.request.requiredBusinessDomainIds".into(),
                    value: json!("dom_fintech"),
                },
                effect: Effect {
                    kind: EffectKind::Filter,
                    target_field: TargetField::DerivedSkills,
                    target_value: json!(["skill_regulatory_compliance"]),
                    boost_strength: None,
                },
            },
            Rule {
                id: "healthcare-requires-privacy".into(),
                name: "Healthcare work requires privacy compliance".into(),
                priority: 100,
                condition: Condition::Contains {
                    path: "$.request.requiredBusinessDomainIds".into(),
                    value: json!("dom_healthcare"),
                },
                effect: Effect {
                    kind: EffectKind::Filter,
                    target_field: TargetField::DerivedSkills,
                    target_value: json!(["skill_hipaa_compliance"]),
                    boost_strength: None,
                },
            },
        ];
        Self::new(rules).expect("builtin catalogue is consistent")
    }
}
