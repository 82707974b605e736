//! Fact base for the inference engine.
//!
//! Facts are addressed by JSON-pointer-like paths: `$.request.*` is the
//! immutable seed, `$.derived.requiredProperties.*` and
//! `$.derived.preferredProperties.*` are the two mutable maps, and
//! `$.derived.allSkills` is the accumulated skill bag. Each derived path
//! remembers the derivation chains that wrote it; request paths have no
//! chains (they are the chain roots).

use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ExpandedCriteria, SearchRequest};

pub const REQUEST_PREFIX: &str = "$.request.";
pub const REQUIRED_PREFIX: &str = "$.derived.requiredProperties.";
pub const PREFERRED_PREFIX: &str = "$.derived.preferredProperties.";
pub const ALL_SKILLS_PATH: &str = "$.derived.allSkills";

/// Chains of rule ids, outermost-first. A request-seeded fact has no
/// chains; a fact written by rule R fired purely off the request has the
/// single chain `[R]`.
pub type Chains = Vec<Vec<String>>;

#[derive(Debug, Default)]
pub struct FactBase {
    request: BTreeMap<String, Value>,
    required: BTreeMap<String, Value>,
    preferred: BTreeMap<String, Value>,
    /// Boost strengths per preferred path, max-merged.
    preferred_strengths: BTreeMap<String, f64>,
    all_skills: BTreeSet<String>,
    /// Per-skill boost strengths, max-merged.
    skill_boosts: BTreeMap<String, f64>,
    chains: BTreeMap<String, Chains>,
}

impl FactBase {
    /// Seed the fact base from the request and its expanded criteria.
    pub fn seed(request: &SearchRequest, criteria: &ExpandedCriteria) -> Self {
        let mut base = Self::default();
        let mut put = |key: &str, value: Value| {
            if !value.is_null() {
                base.request.insert(key.to_string(), value);
            }
        };

        put("teamFocus", json!(request.team_focus.map(|f| f.as_str())));
        put(
            "requiredSeniorityLevel",
            json!(request.required_seniority_level.map(|l| l.as_str())),
        );
        put(
            "preferredSeniorityLevel",
            json!(request.preferred_seniority_level.map(|l| l.as_str())),
        );
        put(
            "requiredMaxStartTime",
            json!(request.required_max_start_time.map(|t| t.as_str())),
        );
        put(
            "preferredMaxStartTime",
            json!(request.preferred_max_start_time.map(|t| t.as_str())),
        );
        put("maxBudget", json!(request.max_budget));
        put(
            "requiredTimezone",
            json!(request.required_timezone.iter().map(|z| z.as_str()).collect::<Vec<_>>()),
        );
        put(
            "requiredSkillIds",
            json!(criteria
                .resolved_required_skills
                .iter()
                .map(|s| s.canonical_id.as_str())
                .collect::<Vec<_>>()),
        );
        put(
            "preferredSkillIds",
            json!(criteria
                .resolved_preferred_skills
                .iter()
                .map(|s| s.canonical_id.as_str())
                .collect::<Vec<_>>()),
        );
        put(
            "requiredProficiencies",
            json!(criteria
                .resolved_required_skills
                .iter()
                .map(|s| s.min_proficiency.as_str())
                .collect::<Vec<_>>()),
        );
        put(
            "requiredBusinessDomainIds",
            json!(criteria
                .resolved_business_domains
                .iter()
                .map(|d| d.canonical_id.as_str())
                .collect::<Vec<_>>()),
        );
        put(
            "requiredTechnicalDomainIds",
            json!(criteria
                .resolved_technical_domains
                .iter()
                .map(|d| d.canonical_id.as_str())
                .collect::<Vec<_>>()),
        );
        base
    }

    /// Look up a fact by full path.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        if path == ALL_SKILLS_PATH {
            return Some(json!(self.all_skills.iter().collect::<Vec<_>>()));
        }
        if let Some(key) = path.strip_prefix(REQUEST_PREFIX) {
            return self.request.get(key).cloned();
        }
        if let Some(key) = path.strip_prefix(REQUIRED_PREFIX) {
            return self.required.get(key).cloned();
        }
        if let Some(key) = path.strip_prefix(PREFERRED_PREFIX) {
            return self.preferred.get(key).cloned();
        }
        None
    }

    /// Chains recorded for a path. Request paths are chain roots and
    /// return the single empty chain.
    pub fn chains_for(&self, path: &str) -> Chains {
        if path.starts_with(REQUEST_PREFIX) {
            return vec![Vec::new()];
        }
        self.chains.get(path).cloned().unwrap_or_else(|| vec![Vec::new()])
    }

    /// Merge a filter effect into the required set. Returns true when the
    /// fact base changed.
    pub fn apply_filter(&mut self, field_key: &str, value: &Value, chains: &Chains) -> bool {
        let changed = if field_key == "derivedSkills" {
            let mut changed = false;
            for id in string_set(value) {
                changed |= self.all_skills.insert(id);
            }
            if changed {
                self.required
                    .insert(field_key.to_string(), json!(self.all_skills.iter().collect::<Vec<_>>()));
            }
            changed
        } else {
            let key = field_key.to_string();
            let changed = self.required.get(&key) != Some(value);
            if changed {
                self.required.insert(key, value.clone());
            }
            changed
        };
        if changed {
            self.merge_chains(&format!("{REQUIRED_PREFIX}{field_key}"), chains);
            if field_key == "derivedSkills" {
                self.merge_chains(ALL_SKILLS_PATH, chains);
            }
        }
        changed
    }

    /// Merge a boost effect into the preferred set with max(existing, new)
    /// strength. Returns true when the fact base changed.
    pub fn apply_boost(
        &mut self,
        field_key: &str,
        value: &Value,
        strength: f64,
        chains: &Chains,
    ) -> bool {
        let mut changed = false;
        if field_key == "derivedSkills" {
            for id in string_set(value) {
                changed |= self.all_skills.insert(id.clone());
                let entry = self.skill_boosts.entry(id).or_insert(0.0);
                if strength > *entry {
                    *entry = strength;
                    changed = true;
                }
            }
            if changed {
                self.preferred
                    .insert(field_key.to_string(), json!(self.skill_boosts.keys().collect::<Vec<_>>()));
            }
        } else {
            let key = field_key.to_string();
            if self.preferred.get(&key) != Some(value) {
                self.preferred.insert(key.clone(), value.clone());
                changed = true;
            }
            let entry = self.preferred_strengths.entry(key).or_insert(0.0);
            if strength > *entry {
                *entry = strength;
                changed = true;
            }
        }
        if changed {
            self.merge_chains(&format!("{PREFERRED_PREFIX}{field_key}"), chains);
            if field_key == "derivedSkills" {
                self.merge_chains(ALL_SKILLS_PATH, chains);
            }
        }
        changed
    }

    pub fn skill_boosts(&self) -> &BTreeMap<String, f64> {
        &self.skill_boosts
    }

    pub fn all_skills(&self) -> &BTreeSet<String> {
        &self.all_skills
    }

    fn merge_chains(&mut self, path: &str, new_chains: &Chains) {
        let entry = self.chains.entry(path.to_string()).or_default();
        for chain in new_chains {
            if !entry.contains(chain) {
                entry.push(chain.clone());
            }
        }
    }
}

/// Interpret a value as a set of string ids.
fn string_set(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
