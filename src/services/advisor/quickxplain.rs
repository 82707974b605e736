//! QuickXPlain: divide-and-conquer minimal-conflict-set search.
//!
//! A subset is conflicting when the count of engineers satisfying it
//! falls below the insufficient threshold. Multiple MCSes are enumerated
//! by re-running with one member of each found set forced out. The search
//! honours the request deadline and returns whatever it has found.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use crate::graph::{Deadline, GraphError};
use crate::models::TestableConstraint;

use super::tester::CountOracle;

/// Outcome of the MCS search.
#[derive(Debug, Default)]
pub struct ConflictSearchResult {
    pub sets: Vec<Vec<TestableConstraint>>,
    /// True when the deadline cut the enumeration short.
    pub truncated: bool,
}

pub struct ConflictSearch<'a> {
    oracle: &'a dyn CountOracle,
    threshold: u64,
    deadline: Option<Deadline>,
}

impl<'a> ConflictSearch<'a> {
    pub fn new(oracle: &'a dyn CountOracle, threshold: u64, deadline: Option<Deadline>) -> Self {
        Self { oracle, threshold, deadline }
    }

    /// Find up to `max_sets` minimal conflict sets.
    pub async fn find_conflict_sets(
        &self,
        constraints: &[TestableConstraint],
        max_sets: usize,
    ) -> Result<ConflictSearchResult, GraphError> {
        let mut result = ConflictSearchResult::default();
        if constraints.is_empty() || max_sets == 0 {
            return Ok(result);
        }
        let all: Vec<usize> = (0..constraints.len()).collect();

        match self.minimal_set(constraints, &all).await {
            Ok(Some(first)) => result.sets.push(self.materialize(constraints, &first)),
            Ok(None) => return Ok(result),
            Err(GraphError::DeadlineExceeded) => {
                result.truncated = true;
                return Ok(result);
            }
            Err(e) => return Err(e),
        }

        // Enumerate further sets by forcing one member of each found set
        // out of the candidate list.
        let mut tried_exclusions: BTreeSet<BTreeSet<usize>> = BTreeSet::new();
        let mut frontier: Vec<BTreeSet<usize>> = Vec::new();
        Self::extend_frontier(&result.sets, constraints, &mut frontier, &mut tried_exclusions);

        while result.sets.len() < max_sets {
            let Some(excluded) = frontier.pop() else {
                break;
            };
            let candidates: Vec<usize> = all
                .iter()
                .copied()
                .filter(|i| !excluded.contains(i))
                .collect();
            if candidates.is_empty() {
                continue;
            }
            match self.minimal_set(constraints, &candidates).await {
                Ok(Some(found)) => {
                    let set = self.materialize(constraints, &found);
                    if !result.sets.contains(&set) {
                        result.sets.push(set);
                        Self::extend_frontier(
                            &result.sets,
                            constraints,
                            &mut frontier,
                            &mut tried_exclusions,
                        );
                    }
                }
                Ok(None) => {}
                Err(GraphError::DeadlineExceeded) => {
                    result.truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    fn extend_frontier(
        sets: &[Vec<TestableConstraint>],
        constraints: &[TestableConstraint],
        frontier: &mut Vec<BTreeSet<usize>>,
        tried: &mut BTreeSet<BTreeSet<usize>>,
    ) {
        for set in sets {
            for member in set {
                let Some(index) = constraints.iter().position(|c| c.id == member.id) else {
                    continue;
                };
                let exclusion: BTreeSet<usize> = [index].into();
                if tried.insert(exclusion.clone()) {
                    frontier.push(exclusion);
                }
            }
        }
    }

    /// One minimal conflict set within `candidates`, or `None` when the
    /// candidates jointly leave enough results.
    async fn minimal_set(
        &self,
        constraints: &[TestableConstraint],
        candidates: &[usize],
    ) -> Result<Option<Vec<usize>>, GraphError> {
        if !self.conflicts(constraints, candidates).await? {
            return Ok(None);
        }
        let found = self
            .quickxplain(constraints, Vec::new(), false, candidates.to_vec())
            .await?;
        Ok(Some(found))
    }

    /// The QuickXPlain recurrence. `background` is always applied;
    /// `delta_added` records whether the last recursion extended it. When
    /// the background alone already conflicts, the candidates contribute
    /// nothing and the caller combines the partial explanations.
    fn quickxplain<'s>(
        &'s self,
        constraints: &'s [TestableConstraint],
        background: Vec<usize>,
        delta_added: bool,
        candidates: Vec<usize>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<usize>, GraphError>> + Send + 's>> {
        Box::pin(async move {
            if delta_added && self.conflicts(constraints, &background).await? {
                return Ok(Vec::new());
            }
            if candidates.len() == 1 {
                return Ok(candidates);
            }
            let mid = candidates.len() / 2;
            let (first, second) = candidates.split_at(mid);

            let mut with_first = background.clone();
            with_first.extend_from_slice(first);
            let delta2 = self
                .quickxplain(constraints, with_first, !first.is_empty(), second.to_vec())
                .await?;

            let mut with_delta2 = background.clone();
            with_delta2.extend_from_slice(&delta2);
            let delta1 = self
                .quickxplain(constraints, with_delta2, !delta2.is_empty(), first.to_vec())
                .await?;

            let mut combined = delta1;
            for index in delta2 {
                if !combined.contains(&index) {
                    combined.push(index);
                }
            }
            Ok(combined)
        })
    }

    async fn conflicts(
        &self,
        constraints: &[TestableConstraint],
        subset: &[usize],
    ) -> Result<bool, GraphError> {
        if let Some(deadline) = self.deadline
            && deadline.is_elapsed()
        {
            return Err(GraphError::DeadlineExceeded);
        }
        let selected: Vec<&TestableConstraint> =
            subset.iter().map(|&i| &constraints[i]).collect();
        let count = self.oracle.count(&selected).await?;
        Ok(count < self.threshold)
    }

    fn materialize(
        &self,
        constraints: &[TestableConstraint],
        indices: &[usize],
    ) -> Vec<TestableConstraint> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.iter().map(|&i| constraints[i].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tester::test_support::TableOracle;
    use super::*;
    use crate::models::{ConstraintKind, ConstraintSource, FilterField, FilterOp, PropertyFieldType};
    use serde_json::json;

    fn constraint(id: &str) -> TestableConstraint {
        TestableConstraint {
            id: id.to_string(),
            display_value: id.to_string(),
            source: ConstraintSource::User,
            kind: ConstraintKind::Property {
                field: FilterField::Salary,
                op: FilterOp::Lte,
                value: json!(0),
                field_type: PropertyFieldType::Number,
            },
        }
    }

    fn ids(set: &[TestableConstraint]) -> Vec<&str> {
        set.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn finds_the_pairwise_conflict() {
        // Plenty of engineers satisfy either constraint alone; none
        // satisfy both. `other` is satisfied by everyone.
        let oracle = TableOracle::new(vec![
            &["staff", "other"],
            &["staff", "other"],
            &["staff", "other"],
            &["budget", "other"],
            &["budget", "other"],
            &["budget", "other"],
        ]);
        let constraints =
            vec![constraint("staff"), constraint("budget"), constraint("other")];
        let search = ConflictSearch::new(&oracle, 3, None);
        let result = search.find_conflict_sets(&constraints, 3).await.unwrap();
        assert_eq!(result.sets.len(), 1);
        assert_eq!(ids(&result.sets[0]), vec!["staff", "budget"]);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn single_over_constrained_member_is_found_alone() {
        let oracle = TableOracle::new(vec![&["a", "b"], &["a", "b"], &["a", "b"], &["a"]]);
        let constraints = vec![constraint("a"), constraint("b"), constraint("rare")];
        let search = ConflictSearch::new(&oracle, 3, None);
        let result = search.find_conflict_sets(&constraints, 3).await.unwrap();
        assert_eq!(result.sets.len(), 1);
        assert_eq!(ids(&result.sets[0]), vec!["rare"]);
    }

    #[tokio::test]
    async fn no_conflict_returns_empty() {
        let oracle = TableOracle::new(vec![&["a"], &["a"], &["a"], &["a"]]);
        let constraints = vec![constraint("a")];
        let search = ConflictSearch::new(&oracle, 3, None);
        let result = search.find_conflict_sets(&constraints, 3).await.unwrap();
        assert!(result.sets.is_empty());
    }

    #[tokio::test]
    async fn minimality_holds_for_every_returned_set() {
        let oracle = TableOracle::new(vec![
            &["a", "c"],
            &["a", "c"],
            &["a", "c"],
            &["b", "c"],
            &["b", "c"],
            &["b", "c"],
        ]);
        let constraints = vec![constraint("a"), constraint("b"), constraint("c")];
        let search = ConflictSearch::new(&oracle, 3, None);
        let result = search.find_conflict_sets(&constraints, 3).await.unwrap();
        for set in &result.sets {
            // Every proper subset must leave at least `threshold` results.
            for skip in 0..set.len() {
                let subset: Vec<&TestableConstraint> = set
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != skip)
                    .map(|(_, c)| c)
                    .collect();
                let count = oracle.count(&subset).await.unwrap();
                assert!(count >= 3, "subset of {:?} still conflicts", ids(set));
            }
        }
    }

    #[tokio::test]
    async fn enumerates_disjoint_conflicts() {
        // Two independent singleton conflicts: `rare1` and `rare2`.
        let oracle = TableOracle::new(vec![
            &["common", "rare1"],
            &["common", "rare2"],
            &["common"],
            &["common"],
        ]);
        let constraints =
            vec![constraint("common"), constraint("rare1"), constraint("rare2")];
        let search = ConflictSearch::new(&oracle, 3, None);
        let result = search.find_conflict_sets(&constraints, 3).await.unwrap();
        let mut found: Vec<Vec<&str>> = result.sets.iter().map(|s| ids(s)).collect();
        found.sort();
        assert!(found.contains(&vec!["rare1"]));
        assert!(found.contains(&vec!["rare2"]));
    }

    #[tokio::test]
    async fn elapsed_deadline_returns_partial_results() {
        let oracle = TableOracle::new(vec![&["a"], &["a"], &["a"]]);
        let constraints = vec![constraint("a"), constraint("b")];
        let deadline =
            Deadline(tokio::time::Instant::now() - std::time::Duration::from_millis(1));
        let search = ConflictSearch::new(&oracle, 3, Some(deadline));
        let result = search.find_conflict_sets(&constraints, 3).await.unwrap();
        assert!(result.truncated);
        assert!(result.sets.is_empty());
    }
}
