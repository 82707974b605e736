//! Orchestrator: receive request → expand → infer → plan → execute →
//! rank or similarity-score → diversify → advise → mine critiques →
//! assemble response.
//!
//! Strictly sequential within a request; the deadline rides along on
//! every graph call. Degradations (inference cap, LLM downgrade, advisor
//! truncation) surface in `queryMetadata.warnings`, never silently.

use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::Config;
use crate::graph::{Deadline, GraphCatalog, QueryRunner};
use crate::models::*;
use crate::utils::{EngineError, EngineResult};

use super::advisor::ConstraintAdvisor;
use super::clock::Clock;
use super::critique::miner::DynamicCritiqueMiner;
use super::diversity::DiversitySelector;
use super::expander::ConstraintExpander;
use super::explain::ExplanationService;
use super::inference::InferenceEngine;
use super::planner::{Pagination, QueryPlanner};
use super::ranker::UtilityRanker;
use super::similarity::SimilarityScorer;

pub struct MatchOrchestrator {
    catalog: Arc<GraphCatalog>,
    runner: QueryRunner,
    expander: ConstraintExpander,
    inference: InferenceEngine,
    planner: QueryPlanner,
    ranker: UtilityRanker,
    similarity: SimilarityScorer,
    diversity: DiversitySelector,
    advisor: ConstraintAdvisor,
    critique_miner: DynamicCritiqueMiner,
    explain: ExplanationService,
    clock: Arc<dyn Clock>,
    recency_years: i32,
}

impl MatchOrchestrator {
    pub fn new(
        config: &Config,
        catalog: Arc<GraphCatalog>,
        runner: QueryRunner,
        explain: ExplanationService,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, anyhow::Error> {
        Ok(Self {
            catalog,
            runner,
            expander: ConstraintExpander::new(&config.taxonomy),
            inference: InferenceEngine::new(&config.inference)?,
            planner: QueryPlanner::new(),
            ranker: UtilityRanker::new(config.utility.clone()),
            similarity: SimilarityScorer::new(config.similarity.clone()),
            diversity: DiversitySelector::new(&config.diversity),
            advisor: ConstraintAdvisor::new(config.advisor.clone()),
            critique_miner: DynamicCritiqueMiner::new(&config.advisor),
            explain,
            clock,
            recency_years: config.graph.recency_years,
        })
    }

    /// Run one search end to end.
    pub async fn search(
        &self,
        request: SearchRequest,
        deadline: Option<Deadline>,
    ) -> EngineResult<SearchResponse> {
        let started = Instant::now();
        let trace_id = Uuid::new_v4().to_string();
        tracing::info!(trace_id = %trace_id, "Search started");

        request.validate()?;
        let mut warnings: Vec<String> = Vec::new();
        let mut defaults_applied: Vec<String> = Vec::new();
        if request.limit.is_none() {
            defaults_applied.push(format!("limit defaulted to {DEFAULT_LIMIT}"));
        }
        if request.offset.is_none() {
            defaults_applied.push("offset defaulted to 0".to_string());
        }
        let limit = request.effective_limit();
        let offset = request.effective_offset();

        let skills = self.catalog.skill_graph(deadline).await?;
        let domains = self.catalog.domain_graph(deadline).await?;

        let mut criteria = self.expander.expand(&request, &skills, &domains)?;
        let inference = self.inference.infer(&request, &criteria);
        inference.apply_to_criteria(&mut criteria);
        warnings.extend(inference.warnings.iter().cloned());
        defaults_applied.extend(criteria.defaults_applied.iter().cloned());

        let recency_min_year = self.clock.current_year() - self.recency_years;

        let (matches, total_count, page_candidates, candidates_before_diversity) =
            if let Some(reference_id) = request.reference_engineer_id.clone() {
                self.similarity_pipeline(
                    &criteria,
                    &skills,
                    &domains,
                    &reference_id,
                    limit,
                    offset,
                    recency_min_year,
                    deadline,
                )
                .await?
            } else {
                self.utility_pipeline(
                    &criteria,
                    &inference,
                    limit,
                    offset,
                    recency_min_year,
                    deadline,
                )
                .await?
            };

        // Advisor: relaxation when sparse, tightening when plentiful.
        let mut advisor_outcome = self
            .advisor
            .advise(total_count, &criteria, &page_candidates, &self.runner, deadline)
            .await?;
        warnings.append(&mut advisor_outcome.warnings);
        if let Some(report) = advisor_outcome.relaxation.as_mut() {
            warnings.extend(
                self.explain
                    .explain_conflicts(&mut report.conflict_analysis.conflict_sets)
                    .await,
            );
            warnings.extend(self.explain.explain_relaxations(&mut report.suggestions).await);
        }

        // Dynamic critique mining runs over the returned page only.
        let mined = self
            .critique_miner
            .mine(&request, &criteria, &page_candidates);
        let suggested_critiques = if mined.is_empty() { None } else { Some(mined) };

        let execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            trace_id = %trace_id,
            "Search completed: {} of {} matches in {}ms",
            matches.len(),
            total_count,
            execution_time_ms
        );

        Ok(SearchResponse {
            matches,
            total_count,
            applied_filters: criteria.applied_filters.clone(),
            applied_preferences: criteria.applied_preferences.clone(),
            derived_constraints: inference.derived_constraints,
            relaxation: advisor_outcome.relaxation,
            tightening: advisor_outcome.tightening,
            suggested_critiques,
            unresolved_skills: criteria.unresolved_skills.clone(),
            query_metadata: QueryMetadata {
                execution_time_ms,
                candidates_before_diversity,
                defaults_applied,
                warnings,
                trace_id,
            },
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn utility_pipeline(
        &self,
        criteria: &ExpandedCriteria,
        inference: &super::inference::InferenceResult,
        limit: u32,
        offset: u32,
        recency_min_year: i32,
        deadline: Option<Deadline>,
    ) -> EngineResult<(Vec<EngineerMatch>, u64, Vec<Candidate>, Option<usize>)> {
        let plan =
            self.planner
                .build_search_query(criteria, Pagination { limit, offset }, None);
        let rows = self.runner.run(&plan.cypher, plan.params, deadline).await?;
        let (page, total_count) = self.planner.decode_page(&rows)?;
        if page.is_empty() {
            return Ok((Vec::new(), total_count, Vec::new(), None));
        }

        let candidates = self
            .fetch_details(&page_ids(&page), criteria, false, recency_min_year, deadline)
            .await?;
        let scored = self.ranker.rank(candidates.clone(), criteria, inference);
        let matches = scored.into_iter().map(EngineerMatch::from).collect();
        Ok((matches, total_count, candidates, None))
    }

    #[allow(clippy::too_many_arguments)]
    async fn similarity_pipeline(
        &self,
        criteria: &ExpandedCriteria,
        skills: &crate::graph::SkillGraph,
        domains: &crate::graph::DomainGraph,
        reference_id: &str,
        limit: u32,
        offset: u32,
        recency_min_year: i32,
        deadline: Option<Deadline>,
    ) -> EngineResult<(Vec<EngineerMatch>, u64, Vec<Candidate>, Option<usize>)> {
        // The reference must exist.
        let reference = self
            .fetch_details(
                &[reference_id.to_string()],
                criteria,
                true,
                recency_min_year,
                deadline,
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::ReferenceNotFound(reference_id.to_string()))?;

        let pool_size = self.diversity.pool_size(limit, offset);
        let plan = self.planner.build_search_query(
            criteria,
            Pagination { limit: pool_size, offset: 0 },
            Some(reference_id),
        );
        let rows = self.runner.run(&plan.cypher, plan.params, deadline).await?;
        let (pool_page, total_count) = self.planner.decode_page(&rows)?;
        if pool_page.is_empty() {
            return Ok((Vec::new(), total_count, Vec::new(), Some(0)));
        }

        let pool = self
            .fetch_details(&page_ids(&pool_page), criteria, true, recency_min_year, deadline)
            .await?;
        let candidates_before_diversity = pool.len();

        let mut scored: Vec<ScoredCandidate> = pool
            .into_iter()
            .map(|candidate| self.similarity.score(skills, domains, &reference, candidate))
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.candidate.id.cmp(&b.candidate.id))
        });

        let picked = self.diversity.select(
            scored,
            (limit + offset) as usize,
            |a, b| self.similarity.profile_similarity(skills, a, b),
        );
        let page: Vec<ScoredCandidate> = picked
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        let page_candidates: Vec<Candidate> =
            page.iter().map(|s| s.candidate.clone()).collect();
        let matches = page.into_iter().map(EngineerMatch::from).collect();
        Ok((matches, total_count, page_candidates, Some(candidates_before_diversity)))
    }

    /// Detail step: full rows for a page of engineer ids, returned in the
    /// page order.
    async fn fetch_details(
        &self,
        ids: &[String],
        criteria: &ExpandedCriteria,
        collect_all_skills: bool,
        recency_min_year: i32,
        deadline: Option<Deadline>,
    ) -> EngineResult<Vec<Candidate>> {
        let plan = self.planner.build_detail_query(
            ids,
            criteria,
            collect_all_skills,
            recency_min_year,
        );
        let rows = self.runner.run(&plan.cypher, plan.params, deadline).await?;
        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            candidates.push(
                self.planner
                    .assemble_candidate(row, criteria, collect_all_skills)?,
            );
        }
        candidates.sort_by_key(|c| ids.iter().position(|id| *id == c.id).unwrap_or(usize::MAX));
        Ok(candidates)
    }
}

fn page_ids(page: &[super::planner::PageRow]) -> Vec<String> {
    page.iter().map(|row| row.engineer_id.clone()).collect()
}
