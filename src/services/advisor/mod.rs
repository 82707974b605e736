//! Constraint advisor.
//!
//! When results are sparse, decomposes the applied filters, finds minimal
//! conflict sets via QuickXPlain, attaches per-constraint statistics, and
//! proposes relaxations. When results are plentiful, mines the returned
//! page for tightening patterns. The goldilocks zone in between emits
//! nothing.

pub mod decomposer;
pub mod quickxplain;
pub mod relaxation;
pub mod stats;
pub mod tester;
pub mod tightening;

use crate::config::AdvisorConfig;
use crate::graph::{Deadline, GraphError, QueryRunner};
use crate::models::*;

use quickxplain::ConflictSearch;
use relaxation::RelaxationAdvisor;
use stats::StatsCollector;
use tester::ConstraintTester;
use tightening::TighteningMiner;

/// Advisor output for one request.
#[derive(Debug, Default)]
pub struct AdvisorOutcome {
    pub relaxation: Option<RelaxationReport>,
    pub tightening: Option<TighteningReport>,
    pub warnings: Vec<String>,
}

pub struct ConstraintAdvisor {
    config: AdvisorConfig,
}

impl ConstraintAdvisor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self { config }
    }

    pub async fn advise(
        &self,
        total_count: u64,
        criteria: &ExpandedCriteria,
        candidates: &[Candidate],
        runner: &QueryRunner,
        deadline: Option<Deadline>,
    ) -> Result<AdvisorOutcome, GraphError> {
        if total_count < self.config.sparse_threshold {
            self.relax(criteria, runner, deadline).await
        } else if total_count >= self.config.many_threshold {
            Ok(self.tighten(criteria, candidates))
        } else {
            Ok(AdvisorOutcome::default())
        }
    }

    async fn relax(
        &self,
        criteria: &ExpandedCriteria,
        runner: &QueryRunner,
        deadline: Option<Deadline>,
    ) -> Result<AdvisorOutcome, GraphError> {
        let decomposed = decomposer::decompose(criteria);
        if decomposed.constraints.is_empty() {
            return Ok(AdvisorOutcome::default());
        }
        let tester = ConstraintTester::new(runner.clone(), deadline);

        let search = ConflictSearch::new(&tester, self.config.sparse_threshold, deadline);
        let found = search
            .find_conflict_sets(&decomposed.constraints, self.config.max_conflict_sets)
            .await?;

        let mut warnings = Vec::new();
        if found.truncated {
            warnings.push(
                "conflict analysis hit the request deadline; returning the sets found so far"
                    .to_string(),
            );
        }

        let mut conflict_sets = Vec::with_capacity(found.sets.len());
        let collector = StatsCollector::new(runner, &tester, deadline);
        for set in &found.sets {
            match collector.conflict_set_stats(set, &decomposed.constraints).await {
                Ok((stats, count_matching_all)) => conflict_sets.push(ConflictSet {
                    constraints: set.clone(),
                    stats,
                    count_matching_all,
                    explanation: None,
                }),
                Err(GraphError::DeadlineExceeded) => {
                    warnings.push(
                        "statistics collection hit the request deadline".to_string(),
                    );
                    conflict_sets.push(ConflictSet {
                        constraints: set.clone(),
                        stats: Vec::new(),
                        count_matching_all: 0,
                        explanation: None,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let suggestions = match RelaxationAdvisor::new(self.config.salary_relax_step)
            .suggest(&found.sets, &decomposed.constraints, &tester)
            .await
        {
            Ok(suggestions) => suggestions,
            Err(GraphError::DeadlineExceeded) => {
                warnings.push("relaxation projections hit the request deadline".to_string());
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            "Advisor relaxation: {} conflict sets, {} suggestions",
            conflict_sets.len(),
            suggestions.len()
        );
        Ok(AdvisorOutcome {
            relaxation: Some(RelaxationReport {
                conflict_analysis: ConflictAnalysis { conflict_sets, truncated: found.truncated },
                suggestions,
            }),
            tightening: None,
            warnings,
        })
    }

    fn tighten(&self, criteria: &ExpandedCriteria, candidates: &[Candidate]) -> AdvisorOutcome {
        let miner = TighteningMiner::new(
            self.config.min_support_threshold,
            self.config.max_suggestions,
        );
        let suggestions = miner.mine(criteria, candidates);
        tracing::info!("Advisor tightening: {} suggestions", suggestions.len());
        AdvisorOutcome {
            relaxation: None,
            tightening: Some(TighteningReport { suggestions }),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphStore, Params, Row};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// Store that answers every count query from a fixed table of
    /// engineer property rows, interpreting the advisor's generated
    /// Cypher shallowly (salary and years bounds only).
    struct CountingStore;

    #[async_trait]
    impl GraphStore for CountingStore {
        async fn query(
            &self,
            cypher: &str,
            params: Params,
            _deadline: Option<Deadline>,
        ) -> Result<Vec<Row>, GraphError> {
            if cypher.contains("min(e.salary)") {
                return Ok(vec![json!({"min_salary": 130_000, "max_salary": 240_000})]);
            }
            if cypher.contains("min(e.years_experience)") {
                return Ok(vec![json!({
                    "min_years": 2.0, "max_years": 12.0,
                    "bucket_0_3": 2, "bucket_3_6": 2, "bucket_6_10": 1,
                    "bucket_10_15": 1, "bucket_15_up": 0
                })]);
            }
            if cypher.contains("count(DISTINCT e)") {
                // Cheap engineers are junior, expensive ones are senior:
                // either bound alone is satisfiable, jointly they are not.
                let engineers: [(u64, f64); 7] = [
                    (130_000, 2.0),
                    (135_000, 3.0),
                    (140_000, 4.0),
                    (160_000, 10.0),
                    (200_000, 10.0),
                    (220_000, 11.0),
                    (240_000, 12.0),
                ];
                let salary_cap = params
                    .iter()
                    .find(|(k, _)| cypher.contains(&format!("e.salary <= ${k}")))
                    .and_then(|(_, v)| v.as_u64())
                    .unwrap_or(u64::MAX);
                let years_min = params
                    .iter()
                    .find(|(k, _)| cypher.contains(&format!("e.years_experience >= ${k}")))
                    .and_then(|(_, v)| v.as_f64())
                    .unwrap_or(0.0);
                let count = engineers
                    .iter()
                    .filter(|(salary, years)| *salary <= salary_cap && *years >= years_min)
                    .count() as u64;
                return Ok(vec![json!({"count": count})]);
            }
            Ok(vec![])
        }
    }

    fn sparse_criteria() -> ExpandedCriteria {
        // staff (≥10y) + salary ≤ 140k: individually satisfiable, jointly
        // conflicting over the fixture table.
        let mut criteria = ExpandedCriteria::default();
        criteria.min_years_experience = Some(10.0);
        criteria.max_budget = Some(140_000);
        criteria.applied_filters = vec![
            AppliedFilter {
                id: "filter:years_min".into(),
                field: FilterField::YearsExperience,
                operator: FilterOp::Gte,
                value: json!(10.0),
                display: "Years of experience ≥ 10".into(),
                source: ConstraintSource::Derived,
            },
            AppliedFilter {
                id: "filter:salary".into(),
                field: FilterField::Salary,
                operator: FilterOp::Lte,
                value: json!(140_000),
                display: "Salary ≤ $140,000".into(),
                source: ConstraintSource::User,
            },
        ];
        criteria
    }

    #[tokio::test]
    async fn sparse_results_produce_the_two_constraint_conflict() {
        let advisor = ConstraintAdvisor::new(AdvisorConfig::default());
        let runner = QueryRunner::new(Arc::new(CountingStore));
        let outcome = advisor
            .advise(0, &sparse_criteria(), &[], &runner, None)
            .await
            .unwrap();

        let relaxation = outcome.relaxation.expect("sparse results must relax");
        assert!(outcome.tightening.is_none());
        let sets = &relaxation.conflict_analysis.conflict_sets;
        assert_eq!(sets.len(), 1);
        let ids: Vec<&str> = sets[0].constraints.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["filter:years_min", "filter:salary"]);
        assert_eq!(sets[0].count_matching_all, 0);
        // Each member matches something on its own.
        for entry in &sets[0].stats {
            assert!(entry.stats.count_matching() > 0, "{}", entry.constraint_id);
        }
        assert!(!relaxation.suggestions.is_empty());
        // Projected counts are recomputed per suggestion.
        assert!(relaxation.suggestions.iter().any(|s| s.new_count > 0));
    }

    #[tokio::test]
    async fn goldilocks_zone_emits_nothing() {
        let advisor = ConstraintAdvisor::new(AdvisorConfig::default());
        let runner = QueryRunner::new(Arc::new(CountingStore));
        let outcome = advisor
            .advise(10, &sparse_criteria(), &[], &runner, None)
            .await
            .unwrap();
        assert!(outcome.relaxation.is_none());
        assert!(outcome.tightening.is_none());
    }

    #[tokio::test]
    async fn plentiful_results_switch_to_tightening() {
        let advisor = ConstraintAdvisor::new(AdvisorConfig::default());
        let runner = QueryRunner::new(Arc::new(CountingStore));
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| Candidate {
                id: format!("e{i}"),
                name: format!("e{i}"),
                headline: String::new(),
                salary: 120_000 + i * 10_000,
                years_experience: 4.0 + i as f64,
                start_timeline: StartTimeline::OneMonth,
                timezone: if i % 2 == 0 { UsTimezone::Eastern } else { UsTimezone::Central },
                skills: vec![],
                business_domains: vec![],
                technical_domains: vec![],
            })
            .collect();
        let outcome = advisor
            .advise(30, &ExpandedCriteria::default(), &candidates, &runner, None)
            .await
            .unwrap();
        assert!(outcome.relaxation.is_none());
        let tightening = outcome.tightening.expect("plentiful results must tighten");
        assert!(!tightening.suggestions.is_empty());
        assert!(tightening.suggestions.len() <= AdvisorConfig::default().max_suggestions);
    }
}
