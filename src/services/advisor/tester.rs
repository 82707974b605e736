//! Tester: minimal count queries over arbitrary constraint subsets,
//! built from the same planner primitives as the search query.

use async_trait::async_trait;

use crate::graph::{Deadline, GraphError, QueryRunner};
use crate::models::TestableConstraint;

use super::super::planner::QueryPlanner;

/// Count oracle the conflict search and suggesters run against. The
/// production implementation queries the graph; tests swap in an
/// in-memory table.
#[async_trait]
pub trait CountOracle: Send + Sync {
    async fn count(&self, constraints: &[&TestableConstraint]) -> Result<u64, GraphError>;
}

/// Graph-backed oracle.
pub struct ConstraintTester {
    runner: QueryRunner,
    planner: QueryPlanner,
    deadline: Option<Deadline>,
}

impl ConstraintTester {
    pub fn new(runner: QueryRunner, deadline: Option<Deadline>) -> Self {
        Self { runner, planner: QueryPlanner::new(), deadline }
    }
}

#[async_trait]
impl CountOracle for ConstraintTester {
    async fn count(&self, constraints: &[&TestableConstraint]) -> Result<u64, GraphError> {
        let plan = self.planner.build_count_query(constraints);
        tracing::debug!("Advisor count query over {} constraints", constraints.len());
        self.runner.run_count(&plan.cypher, plan.params, self.deadline).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::BTreeSet;

    /// In-memory oracle: every engineer is described by the set of
    /// constraint ids it satisfies.
    pub struct TableOracle {
        pub engineers: Vec<BTreeSet<String>>,
    }

    impl TableOracle {
        pub fn new(engineers: Vec<&[&str]>) -> Self {
            Self {
                engineers: engineers
                    .into_iter()
                    .map(|ids| ids.iter().map(|s| s.to_string()).collect())
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl CountOracle for TableOracle {
        async fn count(&self, constraints: &[&TestableConstraint]) -> Result<u64, GraphError> {
            let required: Vec<&str> = constraints.iter().map(|c| c.id.as_str()).collect();
            Ok(self
                .engineers
                .iter()
                .filter(|satisfied| required.iter().all(|id| satisfied.contains(*id)))
                .count() as u64)
        }
    }
}
