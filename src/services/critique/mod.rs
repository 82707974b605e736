//! Critique interpreter: applies user-facing adjustments ("more senior",
//! "add Python") to a prior request, left to right.
//!
//! Every property × operation handler is total: unsupported combinations
//! land in `failed` with a reason, never panic. Warnings (duplicate adds)
//! attach to the applied record without failing it.

pub mod miner;

use serde_json::Value;

use crate::config::CritiqueConfig;
use crate::models::*;

/// One successfully applied critique.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCritique {
    pub critique: Critique,
    pub warnings: Vec<String>,
}

/// One rejected critique with its reason.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedCritique {
    pub critique: Critique,
    pub reason: String,
}

/// Interpretation result: the modified request plus the audit lists.
#[derive(Debug, Clone)]
pub struct CritiqueOutcome {
    pub request: SearchRequest,
    pub applied: Vec<AppliedCritique>,
    pub failed: Vec<FailedCritique>,
}

pub struct CritiqueInterpreter {
    adjustment_factor: f64,
    budget_floor: u64,
}

impl CritiqueInterpreter {
    pub fn new(config: &CritiqueConfig) -> Self {
        Self { adjustment_factor: config.adjustment_factor, budget_floor: config.budget_floor }
    }

    pub fn apply(&self, base: &SearchRequest, critiques: &[Critique]) -> CritiqueOutcome {
        let mut request = base.clone();
        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for critique in critiques {
            match self.apply_one(&mut request, critique) {
                Ok(warnings) => applied.push(AppliedCritique { critique: critique.clone(), warnings }),
                Err(reason) => {
                    tracing::debug!(
                        "Critique failed: {} {} ({reason})",
                        critique.property.as_str(),
                        critique.op.name()
                    );
                    failed.push(FailedCritique { critique: critique.clone(), reason });
                }
            }
        }

        CritiqueOutcome { request, applied, failed }
    }

    fn apply_one(
        &self,
        request: &mut SearchRequest,
        critique: &Critique,
    ) -> Result<Vec<String>, String> {
        match critique.property {
            CritiqueProperty::Seniority => self.seniority(request, &critique.op),
            CritiqueProperty::Budget => self.budget(request, &critique.op),
            CritiqueProperty::Timeline => self.timeline(request, &critique.op),
            CritiqueProperty::Timezone => self.timezone(request, &critique.op),
            CritiqueProperty::Skills => self.skills(request, &critique.op),
            CritiqueProperty::BusinessDomains => {
                Self::domains(&mut request.required_business_domains, &critique.op)
            }
            CritiqueProperty::TechnicalDomains => {
                Self::domains(&mut request.required_technical_domains, &critique.op)
            }
        }
    }

    fn seniority(&self, request: &mut SearchRequest, op: &CritiqueOp) -> Result<Vec<String>, String> {
        match op {
            CritiqueOp::Set { value } => {
                let level: SeniorityLevel = parse_enum(value, "seniority level")?;
                request.required_seniority_level = Some(level);
                Ok(vec![])
            }
            CritiqueOp::Adjust { direction } => {
                let current = request
                    .required_seniority_level
                    .ok_or_else(|| "no seniority level to adjust".to_string())?;
                let shifted = match direction {
                    AdjustDirection::More => current.index() + 1,
                    AdjustDirection::Less => current.index().saturating_sub(1),
                    other => return Err(format!("direction {other:?} does not apply to seniority")),
                };
                request.required_seniority_level = Some(SeniorityLevel::from_index(shifted));
                Ok(vec![])
            }
            CritiqueOp::Add { .. } | CritiqueOp::Remove { .. } => {
                Err("seniority supports set and adjust only".to_string())
            }
        }
    }

    fn budget(&self, request: &mut SearchRequest, op: &CritiqueOp) -> Result<Vec<String>, String> {
        match op {
            CritiqueOp::Set { value } => {
                let budget = value
                    .as_u64()
                    .filter(|b| *b > 0)
                    .ok_or_else(|| "budget must be a positive number".to_string())?;
                request.max_budget = Some(budget);
                Ok(self.reconcile_stretch(request))
            }
            CritiqueOp::Adjust { direction } => {
                let current = request
                    .max_budget
                    .ok_or_else(|| "no budget to adjust".to_string())?;
                let factor = match direction {
                    AdjustDirection::More => 1.0 + self.adjustment_factor,
                    AdjustDirection::Less => 1.0 - self.adjustment_factor,
                    other => return Err(format!("direction {other:?} does not apply to budget")),
                };
                let adjusted = ((current as f64 * factor).round() as u64).max(self.budget_floor);
                request.max_budget = Some(adjusted);
                Ok(self.reconcile_stretch(request))
            }
            CritiqueOp::Add { .. } | CritiqueOp::Remove { .. } => {
                Err("budget supports set and adjust only".to_string())
            }
        }
    }

    /// Keep `stretch_budget ≥ max_budget` after a budget change.
    fn reconcile_stretch(&self, request: &mut SearchRequest) -> Vec<String> {
        match (request.max_budget, request.stretch_budget) {
            (Some(max), Some(stretch)) if stretch < max => {
                request.stretch_budget = Some(max);
                vec![format!("stretch_budget raised to {max} to keep the envelope valid")]
            }
            _ => vec![],
        }
    }

    fn timeline(&self, request: &mut SearchRequest, op: &CritiqueOp) -> Result<Vec<String>, String> {
        match op {
            CritiqueOp::Set { value } => {
                let timeline: StartTimeline = parse_enum(value, "start timeline")?;
                request.required_max_start_time = Some(timeline);
                Ok(vec![])
            }
            CritiqueOp::Adjust { direction } => {
                let current = request
                    .required_max_start_time
                    .ok_or_else(|| "no start timeline to adjust".to_string())?;
                let shifted = match direction {
                    AdjustDirection::Sooner => current.index().saturating_sub(1),
                    AdjustDirection::Later => current.index() + 1,
                    other => return Err(format!("direction {other:?} does not apply to timeline")),
                };
                request.required_max_start_time = Some(StartTimeline::from_index(shifted));
                Ok(vec![])
            }
            CritiqueOp::Add { .. } | CritiqueOp::Remove { .. } => {
                Err("timeline supports set and adjust only".to_string())
            }
        }
    }

    fn timezone(&self, request: &mut SearchRequest, op: &CritiqueOp) -> Result<Vec<String>, String> {
        match op {
            CritiqueOp::Set { value } => {
                let zones: Vec<UsTimezone> = match value {
                    Value::Array(_) => serde_json::from_value(value.clone())
                        .map_err(|e| format!("invalid timezone list: {e}"))?,
                    scalar => vec![parse_enum(scalar, "timezone")?],
                };
                request.required_timezone = zones;
                Ok(vec![])
            }
            CritiqueOp::Adjust { direction } => {
                if request.required_timezone.is_empty() {
                    return Err("no timezone constraint to adjust".to_string());
                }
                let mut zones = request.required_timezone.clone();
                zones.sort_by_key(|z| z.index());
                zones.dedup();
                match direction {
                    AdjustDirection::Narrower => {
                        // Drop the outermost zones, keeping at least one.
                        if zones.len() >= 3 {
                            zones.remove(0);
                            zones.pop();
                        } else if zones.len() == 2 {
                            zones.pop();
                        }
                    }
                    AdjustDirection::Wider => {
                        let min = zones.first().map(|z| z.index()).unwrap_or(0);
                        let max = zones.last().map(|z| z.index()).unwrap_or(0);
                        if min > 0 {
                            zones.insert(0, UsTimezone::ORDER[min - 1]);
                        }
                        if max + 1 < UsTimezone::ORDER.len() {
                            zones.push(UsTimezone::ORDER[max + 1]);
                        }
                    }
                    other => {
                        return Err(format!("direction {other:?} does not apply to timezone"));
                    }
                }
                request.required_timezone = zones;
                Ok(vec![])
            }
            CritiqueOp::Add { value } => {
                let zone: UsTimezone = parse_enum(value, "timezone")?;
                if request.required_timezone.contains(&zone) {
                    return Ok(vec![format!("timezone {} already required", zone.as_str())]);
                }
                request.required_timezone.push(zone);
                Ok(vec![])
            }
            CritiqueOp::Remove { item } => {
                let zone: UsTimezone = parse_enum(item, "timezone")?;
                let before = request.required_timezone.len();
                request.required_timezone.retain(|z| *z != zone);
                if request.required_timezone.len() == before {
                    return Err(format!("timezone {} is not required", zone.as_str()));
                }
                Ok(vec![])
            }
        }
    }

    fn skills(&self, request: &mut SearchRequest, op: &CritiqueOp) -> Result<Vec<String>, String> {
        match op {
            CritiqueOp::Set { value } => {
                request.required_skills = parse_skill_list(value)?;
                Ok(vec![])
            }
            CritiqueOp::Add { value } => {
                let requirement = parse_skill(value)?;
                let duplicate = request
                    .required_skills
                    .iter()
                    .any(|s| same_identifier(&s.identifier, &requirement.identifier));
                if duplicate {
                    return Ok(vec![format!(
                        "skill '{}' already required",
                        requirement.identifier
                    )]);
                }
                request.required_skills.push(requirement);
                Ok(vec![])
            }
            CritiqueOp::Remove { item } => {
                let target = parse_skill(item)?;
                let before = request.required_skills.len();
                request
                    .required_skills
                    .retain(|s| !same_identifier(&s.identifier, &target.identifier));
                if request.required_skills.len() == before {
                    return Err(format!("skill '{}' is not required", target.identifier));
                }
                Ok(vec![])
            }
            CritiqueOp::Adjust { direction } => {
                if request.required_skills.is_empty() {
                    return Err("no skills to adjust".to_string());
                }
                let shift: i32 = match direction {
                    AdjustDirection::More => 1,
                    AdjustDirection::Less => -1,
                    other => return Err(format!("direction {other:?} does not apply to skills")),
                };
                for skill in &mut request.required_skills {
                    let index = skill.min_proficiency.unwrap_or(Proficiency::Learning).index()
                        as i32;
                    let shifted = (index + shift).clamp(0, Proficiency::ORDER.len() as i32 - 1);
                    skill.min_proficiency = Some(Proficiency::from_index(shifted as usize));
                }
                Ok(vec![])
            }
        }
    }

    fn domains(
        domains: &mut Vec<DomainRequirement>,
        op: &CritiqueOp,
    ) -> Result<Vec<String>, String> {
        match op {
            CritiqueOp::Set { value } => {
                *domains = parse_domain_list(value)?;
                Ok(vec![])
            }
            CritiqueOp::Add { value } => {
                let requirement = parse_domain(value)?;
                let duplicate = domains
                    .iter()
                    .any(|d| same_identifier(&d.identifier, &requirement.identifier));
                if duplicate {
                    return Ok(vec![format!(
                        "domain '{}' already required",
                        requirement.identifier
                    )]);
                }
                domains.push(requirement);
                Ok(vec![])
            }
            CritiqueOp::Remove { item } => {
                let target = parse_domain(item)?;
                let before = domains.len();
                domains.retain(|d| !same_identifier(&d.identifier, &target.identifier));
                if domains.len() == before {
                    return Err(format!("domain '{}' is not required", target.identifier));
                }
                Ok(vec![])
            }
            CritiqueOp::Adjust { direction } => {
                if domains.is_empty() {
                    return Err("no domains to adjust".to_string());
                }
                let shift: f64 = match direction {
                    AdjustDirection::More => 1.0,
                    AdjustDirection::Less => -1.0,
                    other => return Err(format!("direction {other:?} does not apply to domains")),
                };
                for domain in domains.iter_mut() {
                    let years = (domain.min_years.unwrap_or(0.0) + shift).max(0.0);
                    domain.min_years = Some(years);
                }
                Ok(vec![])
            }
        }
    }
}

fn parse_enum<T: serde::de::DeserializeOwned>(value: &Value, what: &str) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|_| format!("invalid {what}: {value}"))
}

fn parse_skill(value: &Value) -> Result<SkillRequirement, String> {
    match value {
        Value::String(name) => Ok(SkillRequirement::named(name.clone())),
        Value::Object(_) => serde_json::from_value(value.clone())
            .map_err(|e| format!("invalid skill requirement: {e}")),
        other => Err(format!("invalid skill value: {other}")),
    }
}

fn parse_skill_list(value: &Value) -> Result<Vec<SkillRequirement>, String> {
    match value {
        Value::Array(items) => items.iter().map(parse_skill).collect(),
        other => Err(format!("skills set expects an array, got {other}")),
    }
}

fn parse_domain(value: &Value) -> Result<DomainRequirement, String> {
    match value {
        Value::String(name) => Ok(DomainRequirement::named(name.clone())),
        Value::Object(_) => serde_json::from_value(value.clone())
            .map_err(|e| format!("invalid domain requirement: {e}")),
        other => Err(format!("invalid domain value: {other}")),
    }
}

fn parse_domain_list(value: &Value) -> Result<Vec<DomainRequirement>, String> {
    match value {
        Value::Array(items) => items.iter().map(parse_domain).collect(),
        other => Err(format!("domains set expects an array, got {other}")),
    }
}

fn same_identifier(a: &str, b: &str) -> bool {
    crate::utils::normalize_identifier(a) == crate::utils::normalize_identifier(b)
}
