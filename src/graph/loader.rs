//! Builds immutable graph snapshots from the talent graph.
//!
//! The loader issues a fixed set of queries per snapshot and refuses to
//! serve a graph whose hierarchy edges are cyclic.

use serde_json::Value;

use super::model::{DomainArenaBuilder, DomainGraph, SkillGraph, SkillGraphBuilder};
use super::store::{row_opt_f64, row_opt_str, row_str, Deadline, GraphError, Params, QueryRunner};
use crate::utils::normalize_identifier;

const SKILL_NODES_QUERY: &str = "\
MATCH (s:Skill)
OPTIONAL MATCH (s)-[:CHILD_OF]->(parent:Skill)
OPTIONAL MATCH (s)-[:IN_CATEGORY]->(cat:SkillCategory)
RETURN s.id AS id, s.name AS name, parent.id AS parent_id, cat.id AS category_id";

const SKILL_SYNONYMS_QUERY: &str = "\
MATCH (syn:SkillSynonym)-[:ALIAS_FOR]->(s:Skill)
RETURN syn.name AS alias, s.id AS skill_id";

const SKILL_CORRELATIONS_QUERY: &str = "\
MATCH (a:Skill)-[r:CORRELATES_WITH]->(b:Skill)
RETURN a.id AS from_id, b.id AS to_id, r.strength AS strength, r.kind AS kind";

const BUSINESS_DOMAINS_QUERY: &str = "\
MATCH (d:BusinessDomain)
OPTIONAL MATCH (d)-[:CHILD_OF]->(parent:BusinessDomain)
RETURN d.id AS id, d.name AS name, parent.id AS parent_id";

const TECHNICAL_DOMAINS_QUERY: &str = "\
MATCH (d:TechnicalDomain)
OPTIONAL MATCH (d)-[:CHILD_OF]->(parent:TechnicalDomain)
OPTIONAL MATCH (cat:SkillCategory)-[:MAPS_TO]->(d)
RETURN d.id AS id, d.name AS name, parent.id AS parent_id,
       collect(DISTINCT cat.id) AS category_ids";

const TECHNICAL_ENCOMPASSES_QUERY: &str = "\
MATCH (composite:TechnicalDomain)-[:ENCOMPASSES]->(member:TechnicalDomain)
RETURN composite.id AS composite_id, member.id AS member_id";

/// Loads skill and domain snapshots through the retrying query runner.
pub struct GraphLoader {
    runner: QueryRunner,
}

impl GraphLoader {
    pub fn new(runner: QueryRunner) -> Self {
        Self { runner }
    }

    pub async fn load_skill_graph(
        &self,
        deadline: Option<Deadline>,
    ) -> Result<SkillGraph, GraphError> {
        let mut builder = SkillGraphBuilder::default();

        let nodes = self.runner.run(SKILL_NODES_QUERY, Params::new(), deadline).await?;
        for row in &nodes {
            let id = row_str(row, "id")?;
            let name = row_str(row, "name")?;
            builder.add_skill(
                &id,
                &name,
                normalize_identifier(&name),
                row_opt_str(row, "category_id"),
                row_opt_str(row, "parent_id"),
            );
        }

        let synonyms = self.runner.run(SKILL_SYNONYMS_QUERY, Params::new(), deadline).await?;
        for row in &synonyms {
            let alias = row_str(row, "alias")?;
            let skill_id = row_str(row, "skill_id")?;
            builder.add_synonym(normalize_identifier(&alias), &skill_id);
        }

        let correlations =
            self.runner.run(SKILL_CORRELATIONS_QUERY, Params::new(), deadline).await?;
        for row in &correlations {
            builder.add_correlation(
                &row_str(row, "from_id")?,
                &row_str(row, "to_id")?,
                row_opt_f64(row, "strength").unwrap_or(0.0),
                row_opt_str(row, "kind").as_deref().unwrap_or("related"),
            );
        }

        let graph = builder.finish()?;
        tracing::info!("Loaded skill graph: {} nodes", graph.len());
        Ok(graph)
    }

    pub async fn load_domain_graph(
        &self,
        deadline: Option<Deadline>,
    ) -> Result<DomainGraph, GraphError> {
        let mut business = DomainArenaBuilder::default();
        let rows = self.runner.run(BUSINESS_DOMAINS_QUERY, Params::new(), deadline).await?;
        for row in &rows {
            let id = row_str(row, "id")?;
            let name = row_str(row, "name")?;
            business.add_domain(
                &id,
                &name,
                normalize_identifier(&name),
                row_opt_str(row, "parent_id"),
                Vec::new(),
            );
        }

        let mut technical = DomainArenaBuilder::default();
        let rows = self.runner.run(TECHNICAL_DOMAINS_QUERY, Params::new(), deadline).await?;
        for row in &rows {
            let id = row_str(row, "id")?;
            let name = row_str(row, "name")?;
            let categories = row
                .get("category_ids")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            technical.add_domain(
                &id,
                &name,
                normalize_identifier(&name),
                row_opt_str(row, "parent_id"),
                categories,
            );
        }

        let rows = self.runner.run(TECHNICAL_ENCOMPASSES_QUERY, Params::new(), deadline).await?;
        for row in &rows {
            technical.add_encompasses(
                &row_str(row, "composite_id")?,
                &row_str(row, "member_id")?,
            );
        }

        let graph = DomainGraph { business: business.finish()?, technical: technical.finish()? };
        tracing::info!(
            "Loaded domain graph: {} business, {} technical",
            graph.business.len(),
            graph.technical.len()
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::{GraphStore, Row};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    /// Canned store keyed by a distinguishing substring of the query.
    struct CannedStore;

    #[async_trait]
    impl GraphStore for CannedStore {
        async fn query(
            &self,
            cypher: &str,
            _params: Params,
            _deadline: Option<Deadline>,
        ) -> Result<Vec<Row>, GraphError> {
            if cypher.contains(":SkillSynonym") {
                Ok(vec![json!({"alias": "ReactJS", "skill_id": "skill_react"})])
            } else if cypher.contains("CORRELATES_WITH") {
                Ok(vec![json!({
                    "from_id": "skill_react",
                    "to_id": "skill_vue",
                    "strength": 0.75,
                    "kind": "alternative"
                })])
            } else if cypher.contains("(s:Skill)") {
                Ok(vec![
                    json!({"id": "skill_frontend", "name": "Frontend", "parent_id": null, "category_id": null}),
                    json!({"id": "skill_react", "name": "React", "parent_id": "skill_frontend", "category_id": "cat_frameworks"}),
                    json!({"id": "skill_vue", "name": "Vue", "parent_id": "skill_frontend", "category_id": "cat_frameworks"}),
                ])
            } else if cypher.contains(":BusinessDomain") {
                Ok(vec![json!({"id": "dom_fintech", "name": "Fintech", "parent_id": null})])
            } else if cypher.contains("ENCOMPASSES") {
                Ok(vec![])
            } else if cypher.contains(":TechnicalDomain") {
                Ok(vec![json!({
                    "id": "tdom_web",
                    "name": "Web",
                    "parent_id": null,
                    "category_ids": ["cat_frameworks"]
                })])
            } else {
                Ok(vec![])
            }
        }
    }

    #[tokio::test]
    async fn loads_a_consistent_skill_graph() {
        let loader = GraphLoader::new(QueryRunner::new(Arc::new(CannedStore)));
        let graph = loader.load_skill_graph(None).await.unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.id_by_synonym("reactjs"), Some("skill_react"));
        assert_eq!(graph.correlation_between("skill_react", "skill_vue"), Some(0.75));
        assert_eq!(
            graph.leaf_ids_under("skill_frontend"),
            vec!["skill_react".to_string(), "skill_vue".to_string()]
        );
    }

    #[tokio::test]
    async fn loads_domain_graph_with_category_mappings() {
        let loader = GraphLoader::new(QueryRunner::new(Arc::new(CannedStore)));
        let graph = loader.load_domain_graph(None).await.unwrap();
        assert_eq!(graph.business.len(), 1);
        let web = graph.technical.get("tdom_web").unwrap();
        assert_eq!(web.implied_by_categories, vec!["cat_frameworks".to_string()]);
    }
}
