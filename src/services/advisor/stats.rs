//! Per-constraint database statistics for conflict explanations.
//!
//! For each constraint in a conflict set: how many engineers match it
//! alone, plus type-specific enrichment (salary range in the catalogue,
//! years distribution, counts by zone/timeline, skill counts at lower
//! proficiency floors). The baseline `count_matching_all` runs over the
//! full constraint set.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::graph::{Deadline, GraphError, Params, QueryRunner};
use crate::models::*;

use super::tester::CountOracle;

const SALARY_RANGE_QUERY: &str = "\
MATCH (e:Engineer)
RETURN min(e.salary) AS min_salary, max(e.salary) AS max_salary";

const YEARS_DISTRIBUTION_QUERY: &str = "\
MATCH (e:Engineer)
RETURN min(e.years_experience) AS min_years, max(e.years_experience) AS max_years,
       count(CASE WHEN e.years_experience < 3 THEN 1 END) AS bucket_0_3,
       count(CASE WHEN e.years_experience >= 3 AND e.years_experience < 6 THEN 1 END) AS bucket_3_6,
       count(CASE WHEN e.years_experience >= 6 AND e.years_experience < 10 THEN 1 END) AS bucket_6_10,
       count(CASE WHEN e.years_experience >= 10 AND e.years_experience < 15 THEN 1 END) AS bucket_10_15,
       count(CASE WHEN e.years_experience >= 15 THEN 1 END) AS bucket_15_up";

const TIMEZONE_COUNTS_QUERY: &str = "\
MATCH (e:Engineer)
RETURN e.timezone AS key, count(*) AS count";

const TIMELINE_COUNTS_QUERY: &str = "\
MATCH (e:Engineer)
RETURN e.start_timeline AS key, count(*) AS count";

pub struct StatsCollector<'a> {
    runner: &'a QueryRunner,
    oracle: &'a dyn CountOracle,
    deadline: Option<Deadline>,
}

impl<'a> StatsCollector<'a> {
    pub fn new(
        runner: &'a QueryRunner,
        oracle: &'a dyn CountOracle,
        deadline: Option<Deadline>,
    ) -> Self {
        Self { runner, oracle, deadline }
    }

    /// Statistics for one conflict set plus the all-constraints baseline.
    pub async fn conflict_set_stats(
        &self,
        set: &[TestableConstraint],
        all_constraints: &[TestableConstraint],
    ) -> Result<(Vec<ConstraintStatsEntry>, u64), GraphError> {
        let mut entries = Vec::with_capacity(set.len());
        for constraint in set {
            let stats = self.constraint_stats(constraint).await?;
            entries.push(ConstraintStatsEntry { constraint_id: constraint.id.clone(), stats });
        }
        let all_refs: Vec<&TestableConstraint> = all_constraints.iter().collect();
        let count_matching_all = self.oracle.count(&all_refs).await?;
        Ok((entries, count_matching_all))
    }

    async fn constraint_stats(
        &self,
        constraint: &TestableConstraint,
    ) -> Result<ConstraintStats, GraphError> {
        let count_matching = self.oracle.count(&[constraint]).await?;
        match &constraint.kind {
            ConstraintKind::SkillTraversal { skill_ids, origin, .. } => {
                // How many engineers hold the skills at each lower floor.
                let mut count_by_proficiency = BTreeMap::new();
                for level in Proficiency::ORDER {
                    let relaxed = TestableConstraint {
                        id: constraint.id.clone(),
                        display_value: constraint.display_value.clone(),
                        source: constraint.source.clone(),
                        kind: ConstraintKind::SkillTraversal {
                            skill_ids: skill_ids.clone(),
                            origin: *origin,
                            min_proficiency: Some(level),
                        },
                    };
                    let count = self.oracle.count(&[&relaxed]).await?;
                    count_by_proficiency.insert(level.as_str().to_string(), count);
                }
                Ok(ConstraintStats::Skill { count_matching, count_by_proficiency })
            }
            ConstraintKind::Property { field, value, .. } => match field {
                FilterField::Salary => {
                    let rows = self
                        .runner
                        .run(SALARY_RANGE_QUERY, Params::new(), self.deadline)
                        .await?;
                    let row = rows.first();
                    Ok(ConstraintStats::Salary {
                        count_matching,
                        db_min: row.and_then(|r| r.get("min_salary")).and_then(Value::as_u64),
                        db_max: row.and_then(|r| r.get("max_salary")).and_then(Value::as_u64),
                        requested_max: value.as_u64().unwrap_or(0),
                    })
                }
                FilterField::YearsExperience => {
                    let rows = self
                        .runner
                        .run(YEARS_DISTRIBUTION_QUERY, Params::new(), self.deadline)
                        .await?;
                    let row = rows.first();
                    let bucket = |key: &str, label: &str, min: f64, max: Option<f64>| YearsBucket {
                        label: label.to_string(),
                        min_years: min,
                        max_years: max,
                        count: row
                            .and_then(|r| r.get(key))
                            .and_then(Value::as_u64)
                            .unwrap_or(0),
                    };
                    Ok(ConstraintStats::Years {
                        count_matching,
                        distribution: vec![
                            bucket("bucket_0_3", "0-3", 0.0, Some(3.0)),
                            bucket("bucket_3_6", "3-6", 3.0, Some(6.0)),
                            bucket("bucket_6_10", "6-10", 6.0, Some(10.0)),
                            bucket("bucket_10_15", "10-15", 10.0, Some(15.0)),
                            bucket("bucket_15_up", "15+", 15.0, None),
                        ],
                        db_min: row.and_then(|r| r.get("min_years")).and_then(Value::as_f64),
                        db_max: row.and_then(|r| r.get("max_years")).and_then(Value::as_f64),
                    })
                }
                FilterField::Timezone => Ok(ConstraintStats::Timezone {
                    count_matching,
                    count_by_zone: self.grouped_counts(TIMEZONE_COUNTS_QUERY).await?,
                }),
                FilterField::StartTimeline => Ok(ConstraintStats::Timeline {
                    count_matching,
                    count_by_timeline: self.grouped_counts(TIMELINE_COUNTS_QUERY).await?,
                }),
                _ => Ok(ConstraintStats::Fallback { count_matching }),
            },
        }
    }

    async fn grouped_counts(&self, query: &str) -> Result<BTreeMap<String, u64>, GraphError> {
        let rows = self.runner.run(query, Params::new(), self.deadline).await?;
        let mut counts = BTreeMap::new();
        for row in rows {
            if let (Some(key), Some(count)) = (
                row.get("key").and_then(Value::as_str),
                row.get("count").and_then(Value::as_u64),
            ) {
                counts.insert(key.to_string(), count);
            }
        }
        Ok(counts)
    }
}
