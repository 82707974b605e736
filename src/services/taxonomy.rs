//! Taxonomy resolution: free-text identifiers → canonical graph ids.
//!
//! Three-tier lookup over an immutable snapshot: exact id/name match,
//! synonym alias, then Levenshtein fuzzy match. Unresolved identifiers
//! are reported, never fatal. Hierarchy expansion returns leaf ids (self
//! included) with user proficiency inherited by every descendant;
//! stricter proficiency wins on multi-parent collisions.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::TaxonomyConfig;
use crate::graph::{DomainArena, DomainGraph, GraphCatalog, GraphError, SkillGraph};
use crate::models::criteria::ResolutionMethod;
use crate::utils::normalize_identifier;

/// Confidence attached to synonym matches.
const SYNONYM_CONFIDENCE: f64 = 0.95;

/// One resolution outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub input: String,
    pub canonical_id: Option<String>,
    pub method: ResolutionMethod,
    pub confidence: f64,
}

impl Resolution {
    fn unresolved(input: &str) -> Self {
        Self {
            input: input.to_string(),
            canonical_id: None,
            method: ResolutionMethod::Unresolved,
            confidence: 0.0,
        }
    }
}

/// Batch resolution result.
#[derive(Debug, Default)]
pub struct ResolutionBatch {
    pub resolved: Vec<Resolution>,
    pub unresolved: Vec<String>,
}

/// External contract for free-text resolution, implemented here over the
/// snapshot catalogue.
#[async_trait]
pub trait TextResolver: Send + Sync {
    async fn resolve_many(&self, names: &[String]) -> Result<Vec<Resolution>, GraphError>;
}

/// Deterministic resolver over graph snapshots.
#[derive(Debug, Clone)]
pub struct TaxonomyResolver {
    fuzzy_threshold: f64,
}

impl TaxonomyResolver {
    pub fn new(config: &TaxonomyConfig) -> Self {
        Self { fuzzy_threshold: config.fuzzy_threshold }
    }

    /// Resolve one skill identifier through the three tiers.
    pub fn resolve_skill(&self, graph: &SkillGraph, identifier: &str) -> Resolution {
        let normalized = normalize_identifier(identifier);
        if normalized.is_empty() {
            return Resolution::unresolved(identifier);
        }

        // Tier 1: exact id or exact (normalized) name.
        if graph.get(identifier).is_some() {
            return Resolution {
                input: identifier.to_string(),
                canonical_id: Some(identifier.to_string()),
                method: ResolutionMethod::Exact,
                confidence: 1.0,
            };
        }
        if let Some(id) = graph.id_by_name(&normalized) {
            return Resolution {
                input: identifier.to_string(),
                canonical_id: Some(id.to_string()),
                method: ResolutionMethod::Exact,
                confidence: 1.0,
            };
        }

        // Tier 2: synonym alias.
        if let Some(id) = graph.id_by_synonym(&normalized) {
            return Resolution {
                input: identifier.to_string(),
                canonical_id: Some(id.to_string()),
                method: ResolutionMethod::Synonym,
                confidence: SYNONYM_CONFIDENCE,
            };
        }

        // Tier 3: fuzzy scan over normalized names.
        self.fuzzy_scan(identifier, &normalized, graph.name_entries())
    }

    /// Resolve a domain identifier against one arena (same tiers, no
    /// synonyms are stored for domains).
    pub fn resolve_domain(&self, arena: &DomainArena, identifier: &str) -> Resolution {
        let normalized = normalize_identifier(identifier);
        if normalized.is_empty() {
            return Resolution::unresolved(identifier);
        }
        if arena.get(identifier).is_some() {
            return Resolution {
                input: identifier.to_string(),
                canonical_id: Some(identifier.to_string()),
                method: ResolutionMethod::Exact,
                confidence: 1.0,
            };
        }
        if let Some(id) = arena.id_by_name(&normalized) {
            return Resolution {
                input: identifier.to_string(),
                canonical_id: Some(id.to_string()),
                method: ResolutionMethod::Exact,
                confidence: 1.0,
            };
        }
        self.fuzzy_scan(identifier, &normalized, arena.name_entries())
    }

    /// Resolve a batch; deterministic for a given snapshot.
    pub fn resolve_skills(&self, graph: &SkillGraph, identifiers: &[String]) -> ResolutionBatch {
        let mut batch = ResolutionBatch::default();
        for identifier in identifiers {
            let resolution = self.resolve_skill(graph, identifier);
            if resolution.canonical_id.is_some() {
                batch.resolved.push(resolution);
            } else {
                tracing::debug!("Unresolved skill identifier: {identifier}");
                batch.unresolved.push(identifier.clone());
            }
        }
        batch
    }

    /// Leaf ids under a canonical skill id, self included for leaves.
    pub fn expand_skill(&self, graph: &SkillGraph, canonical_id: &str) -> Vec<String> {
        graph.leaf_ids_under(canonical_id)
    }

    /// Expanded id set for a business domain (hierarchy descendants).
    pub fn expand_business_domain(&self, graph: &DomainGraph, canonical_id: &str) -> Vec<String> {
        graph.business.expanded_ids(canonical_id)
    }

    /// Expanded id set for a technical domain (hierarchy + ENCOMPASSES).
    pub fn expand_technical_domain(&self, graph: &DomainGraph, canonical_id: &str) -> Vec<String> {
        graph.technical.expanded_ids(canonical_id)
    }

    fn fuzzy_scan<'a>(
        &self,
        input: &str,
        normalized: &str,
        entries: impl Iterator<Item = (&'a str, &'a str)>,
    ) -> Resolution {
        let mut best: Option<(f64, &str)> = None;
        for (name, id) in entries {
            let similarity = strsim::normalized_levenshtein(normalized, name);
            let better = match best {
                Some((score, best_id)) => {
                    similarity > score || (similarity == score && id < best_id)
                }
                None => true,
            };
            if better {
                best = Some((similarity, id));
            }
        }
        match best {
            Some((similarity, id)) if similarity >= self.fuzzy_threshold => Resolution {
                input: input.to_string(),
                canonical_id: Some(id.to_string()),
                method: ResolutionMethod::Fuzzy,
                confidence: similarity,
            },
            _ => Resolution::unresolved(input),
        }
    }
}

/// [`TextResolver`] backed by the process-wide snapshot catalogue.
pub struct CatalogTextResolver {
    catalog: Arc<GraphCatalog>,
    resolver: TaxonomyResolver,
}

impl CatalogTextResolver {
    pub fn new(catalog: Arc<GraphCatalog>, resolver: TaxonomyResolver) -> Self {
        Self { catalog, resolver }
    }
}

#[async_trait]
impl TextResolver for CatalogTextResolver {
    async fn resolve_many(&self, names: &[String]) -> Result<Vec<Resolution>, GraphError> {
        let graph = self.catalog.skill_graph(None).await?;
        Ok(names
            .iter()
            .map(|name| self.resolver.resolve_skill(&graph, name))
            .collect())
    }
}
