//! Query planner: one parameterised graph query per search.
//!
//! The plan qualifies engineers by bucketed skills, applies property and
//! domain filters, computes `total_count` once, orders, paginates, and
//! re-collects full detail for the page only. A separate count-only
//! builder serves the constraint advisor's tester. Every field in
//! `applied_filters` is bound by the produced query.

use serde_json::{json, Value};

use crate::models::*;
use crate::graph::{row_opt_f64, row_opt_str, row_str, GraphError, Params, Row};

/// Page window after defaulting.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

/// A parameterised query ready for the store.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub cypher: String,
    pub params: Params,
}

/// One row of the search query: page entry plus the shared total.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRow {
    pub engineer_id: String,
    pub qualifying_skill_count: u64,
    pub total_count: u64,
}

const PROFICIENT_OR_ABOVE: &[&str] = &["proficient", "expert"];

pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        Self
    }

    // ========================================================================
    // Search query (steps 1-4)
    // ========================================================================

    /// Build the qualify → filter → count → paginate query.
    pub fn build_search_query(
        &self,
        criteria: &ExpandedCriteria,
        page: Pagination,
        exclude_engineer: Option<&str>,
    ) -> QueryPlan {
        let mut params = Params::new();
        let mut cypher = String::new();
        let buckets = &criteria.skill_proficiency_buckets;

        if buckets.is_empty() {
            cypher.push_str("MATCH (e:Engineer)\nWITH e, [] AS qualifying_ids\n");
        } else {
            params.insert("all_skill_ids".into(), json!(buckets.all_ids()));
            params.insert("learning_skill_ids".into(), json!(buckets.learning));
            params.insert("proficient_skill_ids".into(), json!(buckets.proficient));
            params.insert("expert_skill_ids".into(), json!(buckets.expert));
            params.insert("proficient_or_above".into(), json!(PROFICIENT_OR_ABOVE));
            cypher.push_str(
                "MATCH (e:Engineer)-[:HAS]->(es:EngineerSkill)-[:FOR]->(s:Skill)\n\
                 WHERE s.id IN $all_skill_ids\n\
                 WITH e, collect(DISTINCT CASE\n\
                   WHEN s.id IN $learning_skill_ids THEN s.id\n\
                   WHEN s.id IN $proficient_skill_ids AND es.proficiency IN $proficient_or_above THEN s.id\n\
                   WHEN s.id IN $expert_skill_ids AND es.proficiency = 'expert' THEN s.id\n\
                   ELSE null END) AS qualifying_raw\n\
                 WITH e, [id IN qualifying_raw WHERE id IS NOT NULL] AS qualifying_ids\n\
                 WHERE size(qualifying_ids) > 0\n",
            );
        }

        let conditions = self.property_and_domain_conditions(criteria, exclude_engineer, &mut params);
        cypher.push_str("WITH e, qualifying_ids\n");
        if !conditions.is_empty() {
            cypher.push_str("WHERE ");
            cypher.push_str(&conditions.join("\n  AND "));
            cypher.push('\n');
        }

        // Count once, then unroll and paginate. Collecting ids (not full
        // skill lists) keeps the pre-pagination rows small.
        params.insert("offset".into(), json!(page.offset));
        params.insert("limit".into(), json!(page.limit));
        cypher.push_str(
            "WITH collect({eid: e.id, qualifying: size(qualifying_ids), years: e.years_experience}) AS rows\n\
             WITH rows, size(rows) AS total_count\n\
             UNWIND rows AS row\n\
             WITH row, total_count\n\
             ORDER BY row.qualifying DESC, row.years DESC\n\
             SKIP $offset LIMIT $limit\n\
             RETURN row.eid AS id, row.qualifying AS qualifying_skill_count, total_count\n",
        );

        QueryPlan { cypher, params }
    }

    /// Decode the search query's rows. An empty row set means zero
    /// matches (the unwind of an empty collection yields nothing).
    pub fn decode_page(&self, rows: &[Row]) -> Result<(Vec<PageRow>, u64), GraphError> {
        let mut page = Vec::with_capacity(rows.len());
        let mut total = 0;
        for row in rows {
            let entry = PageRow {
                engineer_id: row_str(row, "id")?,
                qualifying_skill_count: row
                    .get("qualifying_skill_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                total_count: row.get("total_count").and_then(Value::as_u64).unwrap_or(0),
            };
            total = entry.total_count;
            page.push(entry);
        }
        Ok((page, total))
    }

    fn property_and_domain_conditions(
        &self,
        criteria: &ExpandedCriteria,
        exclude_engineer: Option<&str>,
        params: &mut Params,
    ) -> Vec<String> {
        let mut conditions = Vec::new();

        if let Some(reference_id) = exclude_engineer {
            params.insert("exclude_id".into(), json!(reference_id));
            conditions.push("e.id <> $exclude_id".to_string());
        }
        if !criteria.start_timeline_set.is_empty() {
            let labels: Vec<&str> =
                criteria.start_timeline_set.iter().map(|t| t.as_str()).collect();
            params.insert("start_timelines".into(), json!(labels));
            conditions.push("e.start_timeline IN $start_timelines".to_string());
        }
        if let Some(min) = criteria.min_years_experience {
            params.insert("min_years".into(), json!(min));
            conditions.push("e.years_experience >= $min_years".to_string());
        }
        if let Some(max) = criteria.max_years_experience {
            params.insert("max_years".into(), json!(max));
            conditions.push("e.years_experience <= $max_years".to_string());
        }
        if !criteria.timezone_zones.is_empty() {
            let zones: Vec<&str> = criteria.timezone_zones.iter().map(|z| z.as_str()).collect();
            params.insert("timezones".into(), json!(zones));
            conditions.push("e.timezone IN $timezones".to_string());
        }
        if let Some(ceiling) = criteria.salary_ceiling() {
            params.insert("salary_ceiling".into(), json!(ceiling));
            conditions.push("e.salary <= $salary_ceiling".to_string());
        }

        for (i, domain) in criteria.resolved_business_domains.iter().enumerate() {
            let ids_param = format!("biz_domain_ids_{i}");
            params.insert(ids_param.clone(), json!(domain.expanded_ids));
            let years_clause = match domain.min_years {
                Some(years) => {
                    let years_param = format!("biz_domain_years_{i}");
                    params.insert(years_param.clone(), json!(years));
                    format!(" AND x.years >= ${years_param}")
                }
                None => String::new(),
            };
            conditions.push(format!(
                "EXISTS {{ MATCH (e)-[x:HAS_EXPERIENCE_IN]->(d:BusinessDomain) \
                 WHERE d.id IN ${ids_param}{years_clause} }}"
            ));
        }

        // Technical domains are satisfied by explicit experience or by
        // skill inference through SkillCategory → TechnicalDomain.
        for (i, domain) in criteria.resolved_technical_domains.iter().enumerate() {
            let ids_param = format!("tech_domain_ids_{i}");
            params.insert(ids_param.clone(), json!(domain.expanded_ids));
            let (explicit_years, inferred_years) = match domain.min_years {
                Some(years) => {
                    let years_param = format!("tech_domain_years_{i}");
                    params.insert(years_param.clone(), json!(years));
                    (
                        format!(" AND x.years >= ${years_param}"),
                        format!(" AND es2.years_used >= ${years_param}"),
                    )
                }
                None => (String::new(), String::new()),
            };
            conditions.push(format!(
                "(EXISTS {{ MATCH (e)-[x:HAS_EXPERIENCE_IN]->(d:TechnicalDomain) \
                 WHERE d.id IN ${ids_param}{explicit_years} }} \
                 OR EXISTS {{ MATCH (e)-[:HAS]->(es2:EngineerSkill)-[:FOR]->(:Skill)\
                 -[:IN_CATEGORY]->(:SkillCategory)-[:MAPS_TO]->(td:TechnicalDomain) \
                 WHERE td.id IN ${ids_param}{inferred_years} }})"
            ));
        }

        conditions
    }

    // ========================================================================
    // Detail query (step 5)
    // ========================================================================

    /// Re-collect full rows for the paginated page. In similarity mode
    /// `collect_all_skills` disables the requested-skill restriction so
    /// the scorer sees full profiles.
    pub fn build_detail_query(
        &self,
        page_ids: &[String],
        criteria: &ExpandedCriteria,
        collect_all_skills: bool,
        recency_min_year: i32,
    ) -> QueryPlan {
        let mut params = Params::new();
        params.insert("page_ids".into(), json!(page_ids));
        params.insert("collect_all".into(), json!(collect_all_skills));
        params.insert(
            "all_skill_ids".into(),
            json!(criteria.skill_proficiency_buckets.all_ids()),
        );
        params.insert("recency_min_year".into(), json!(recency_min_year));

        let cypher = "\
MATCH (e:Engineer)
WHERE e.id IN $page_ids
OPTIONAL MATCH (e)-[:HAS]->(es:EngineerSkill)-[:FOR]->(s:Skill)
WHERE ($collect_all OR s.id IN $all_skill_ids)
  AND es.last_used_year >= $recency_min_year
WITH e, collect({skill_id: s.id, name: s.name, proficiency: es.proficiency, \
confidence: es.confidence, years_used: es.years_used}) AS skills
OPTIONAL MATCH (e)-[bx:HAS_EXPERIENCE_IN]->(bd:BusinessDomain)
WITH e, skills, collect({domain_id: bd.id, name: bd.name, years: bx.years}) AS business_domains
OPTIONAL MATCH (e)-[tx:HAS_EXPERIENCE_IN]->(td:TechnicalDomain)
RETURN e.id AS id, e.name AS name, e.headline AS headline, e.salary AS salary,
       e.years_experience AS years_experience, e.start_timeline AS start_timeline,
       e.timezone AS timezone, skills, business_domains,
       collect({domain_id: td.id, name: td.name, years: tx.years}) AS technical_domains
"
        .to_string();

        QueryPlan { cypher, params }
    }

    /// Assemble a candidate from one detail row, classifying each skill
    /// against the request. In utility mode a skill the user named is
    /// `direct`, a leaf reached through a named category is `descendant`,
    /// anything else is `none`; the similarity scorer owns `correlated`.
    pub fn assemble_candidate(
        &self,
        row: &Row,
        criteria: &ExpandedCriteria,
        similarity_mode: bool,
    ) -> Result<Candidate, GraphError> {
        let leaf_origins = criteria.required_leaf_origins();
        let mut skills = Vec::new();
        for entry in row.get("skills").and_then(Value::as_array).into_iter().flatten() {
            let Some(skill_id) = entry.get("skill_id").and_then(Value::as_str) else {
                continue; // engineer without skills: OPTIONAL MATCH null row
            };
            let proficiency: Proficiency = entry
                .get("proficiency")
                .and_then(Value::as_str)
                .and_then(|p| serde_json::from_value(json!(p)).ok())
                .unwrap_or(Proficiency::Learning);
            let (match_type, meets_proficiency) = if similarity_mode {
                (MatchType::None, None)
            } else {
                match leaf_origins.get(skill_id) {
                    Some(origin) => {
                        let match_type = if origin.canonical_id == skill_id {
                            MatchType::Direct
                        } else {
                            MatchType::Descendant
                        };
                        let meets = proficiency >= origin.min_proficiency;
                        (match_type, Some(meets))
                    }
                    None => (MatchType::None, None),
                }
            };
            skills.push(CandidateSkill {
                skill_id: skill_id.to_string(),
                name: entry
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(skill_id)
                    .to_string(),
                proficiency,
                confidence: entry.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
                years_used: entry.get("years_used").and_then(Value::as_f64).unwrap_or(0.0),
                match_type,
                meets_proficiency,
            });
        }

        let start_timeline: StartTimeline = row_str(row, "start_timeline")
            .and_then(|s| {
                serde_json::from_value(json!(s))
                    .map_err(|e| GraphError::Decode(format!("start_timeline: {e}")))
            })?;
        let timezone: UsTimezone = row_str(row, "timezone").and_then(|s| {
            serde_json::from_value(json!(s)).map_err(|e| GraphError::Decode(format!("timezone: {e}")))
        })?;

        Ok(Candidate {
            id: row_str(row, "id")?,
            name: row_str(row, "name")?,
            headline: row_opt_str(row, "headline").unwrap_or_default(),
            salary: row.get("salary").and_then(Value::as_u64).unwrap_or(0),
            years_experience: row_opt_f64(row, "years_experience").unwrap_or(0.0),
            start_timeline,
            timezone,
            skills,
            business_domains: decode_domains(row, "business_domains"),
            technical_domains: decode_domains(row, "technical_domains"),
        })
    }

    // ========================================================================
    // Count query (advisor tester)
    // ========================================================================

    /// Minimal count query over an arbitrary subset of testable
    /// constraints, built from the same primitives as the search query.
    pub fn build_count_query(&self, constraints: &[&TestableConstraint]) -> QueryPlan {
        let mut params = Params::new();
        let mut conditions = Vec::new();

        for (i, constraint) in constraints.iter().enumerate() {
            match &constraint.kind {
                ConstraintKind::Property { field, op, value, .. } => {
                    let param = format!("p{i}");
                    params.insert(param.clone(), value.clone());
                    match field {
                        FilterField::BusinessDomain => conditions.push(format!(
                            "EXISTS {{ MATCH (e)-[:HAS_EXPERIENCE_IN]->(d:BusinessDomain) \
                             WHERE d.id IN ${param} }}"
                        )),
                        FilterField::TechnicalDomain => conditions.push(format!(
                            "EXISTS {{ MATCH (e)-[:HAS_EXPERIENCE_IN]->(d:TechnicalDomain) \
                             WHERE d.id IN ${param} }}"
                        )),
                        _ => {
                            let property = match field {
                                FilterField::YearsExperience => "years_experience",
                                FilterField::Salary => "salary",
                                FilterField::Timezone => "timezone",
                                FilterField::StartTimeline => "start_timeline",
                                FilterField::Seniority => "years_experience",
                                _ => "id",
                            };
                            let operator = match op {
                                FilterOp::In => "IN",
                                FilterOp::Gte => ">=",
                                FilterOp::Lte => "<=",
                                FilterOp::Eq => "=",
                                FilterOp::StartsWith => "STARTS WITH",
                            };
                            conditions.push(format!("e.{property} {operator} ${param}"));
                        }
                    }
                }
                ConstraintKind::SkillTraversal { skill_ids, min_proficiency, .. } => {
                    let ids_param = format!("p{i}");
                    params.insert(ids_param.clone(), json!(skill_ids));
                    let proficiency_clause = match min_proficiency {
                        Some(min) => {
                            let levels: Vec<&str> = Proficiency::ORDER
                                .iter()
                                .filter(|p| **p >= *min)
                                .map(|p| p.as_str())
                                .collect();
                            let levels_param = format!("p{i}_levels");
                            params.insert(levels_param.clone(), json!(levels));
                            format!(" AND es.proficiency IN ${levels_param}")
                        }
                        None => String::new(),
                    };
                    conditions.push(format!(
                        "EXISTS {{ MATCH (e)-[:HAS]->(es:EngineerSkill)-[:FOR]->(s:Skill) \
                         WHERE s.id IN ${ids_param}{proficiency_clause} }}"
                    ));
                }
            }
        }

        let mut cypher = String::from("MATCH (e:Engineer)\n");
        if !conditions.is_empty() {
            cypher.push_str("WHERE ");
            cypher.push_str(&conditions.join("\n  AND "));
            cypher.push('\n');
        }
        cypher.push_str("RETURN count(DISTINCT e) AS count\n");
        QueryPlan { cypher, params }
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_domains(row: &Row, key: &str) -> Vec<CandidateDomain> {
    row.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let domain_id = entry.get("domain_id").and_then(Value::as_str)?;
            Some(CandidateDomain {
                domain_id: domain_id.to_string(),
                name: entry
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(domain_id)
                    .to_string(),
                years: entry.get("years").and_then(Value::as_f64).unwrap_or(0.0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria_with_skills() -> ExpandedCriteria {
        let mut criteria = ExpandedCriteria::default();
        criteria.skill_proficiency_buckets.insert("skill_python", Proficiency::Proficient);
        criteria.skill_proficiency_buckets.insert("skill_django", Proficiency::Learning);
        criteria.resolved_required_skills.push(ResolvedSkill {
            requested_identifier: "python".into(),
            canonical_id: "skill_python".into(),
            name: "Python".into(),
            expanded_ids: vec!["skill_python".into(), "skill_django".into()],
            min_proficiency: Proficiency::Proficient,
            preferred_min_proficiency: None,
            resolution: ResolutionMethod::Exact,
            confidence: 1.0,
        });
        criteria.min_years_experience = Some(6.0);
        criteria.timezone_zones = vec![UsTimezone::Eastern];
        criteria.max_budget = Some(200_000);
        criteria
    }

    #[test]
    fn search_query_binds_every_filter() {
        let plan = QueryPlanner::new().build_search_query(
            &criteria_with_skills(),
            Pagination { limit: 10, offset: 0 },
            None,
        );
        for param in [
            "all_skill_ids",
            "learning_skill_ids",
            "proficient_skill_ids",
            "expert_skill_ids",
            "min_years",
            "timezones",
            "salary_ceiling",
            "offset",
            "limit",
        ] {
            assert!(plan.params.contains_key(param), "missing param {param}");
        }
        assert!(plan.cypher.contains("size(qualifying_ids) > 0"));
        assert!(plan.cypher.contains("total_count"));
        assert!(plan.cypher.contains("SKIP $offset LIMIT $limit"));
    }

    #[test]
    fn skill_free_search_skips_the_qualifying_step() {
        let mut criteria = ExpandedCriteria::default();
        criteria.min_years_experience = Some(3.0);
        let plan = QueryPlanner::new().build_search_query(
            &criteria,
            Pagination { limit: 10, offset: 0 },
            None,
        );
        assert!(!plan.cypher.contains("EngineerSkill"));
        assert!(plan.cypher.contains("e.years_experience >= $min_years"));
    }

    #[test]
    fn reference_engineer_is_always_excluded() {
        let plan = QueryPlanner::new().build_search_query(
            &criteria_with_skills(),
            Pagination { limit: 30, offset: 0 },
            Some("eng_reference"),
        );
        assert!(plan.cypher.contains("e.id <> $exclude_id"));
        assert_eq!(plan.params["exclude_id"], json!("eng_reference"));
    }

    #[test]
    fn technical_domains_allow_skill_inference() {
        let mut criteria = ExpandedCriteria::default();
        criteria.resolved_technical_domains.push(ResolvedDomain {
            requested_identifier: "web".into(),
            canonical_id: "tdom_web".into(),
            name: "Web".into(),
            expanded_ids: vec!["tdom_web".into()],
            min_years: Some(2.0),
            preferred_min_years: None,
        });
        let plan = QueryPlanner::new().build_search_query(
            &criteria,
            Pagination { limit: 10, offset: 0 },
            None,
        );
        assert!(plan.cypher.contains("MAPS_TO"));
        assert!(plan.cypher.contains("es2.years_used >= $tech_domain_years_0"));
    }

    #[test]
    fn candidate_assembly_classifies_match_types() {
        let criteria = criteria_with_skills();
        let row = json!({
            "id": "e1",
            "name": "Engineer One",
            "headline": "Backend",
            "salary": 150000,
            "years_experience": 8.0,
            "start_timeline": "two_weeks",
            "timezone": "eastern",
            "skills": [
                {"skill_id": "skill_python", "name": "Python", "proficiency": "expert", "confidence": 0.9, "years_used": 6.0},
                {"skill_id": "skill_django", "name": "Django", "proficiency": "learning", "confidence": 0.8, "years_used": 1.0},
                {"skill_id": "skill_rust", "name": "Rust", "proficiency": "proficient", "confidence": 0.7, "years_used": 2.0}
            ],
            "business_domains": [{"domain_id": "dom_fintech", "name": "Fintech", "years": 4.0}],
            "technical_domains": []
        });
        let candidate = QueryPlanner::new()
            .assemble_candidate(&row, &criteria, false)
            .unwrap();
        let python = candidate.skill("skill_python").unwrap();
        assert_eq!(python.match_type, MatchType::Direct);
        assert_eq!(python.meets_proficiency, Some(true));
        let django = candidate.skill("skill_django").unwrap();
        assert_eq!(django.match_type, MatchType::Descendant);
        assert_eq!(django.meets_proficiency, Some(false));
        let rust = candidate.skill("skill_rust").unwrap();
        assert_eq!(rust.match_type, MatchType::None);
        assert_eq!(rust.meets_proficiency, None);
    }

    #[test]
    fn count_query_covers_both_constraint_kinds() {
        let skill = TestableConstraint {
            id: "skill:python".into(),
            display_value: "Python".into(),
            source: ConstraintSource::User,
            kind: ConstraintKind::SkillTraversal {
                skill_ids: vec!["skill_python".into()],
                origin: TraversalOrigin::User,
                min_proficiency: Some(Proficiency::Proficient),
            },
        };
        let salary = TestableConstraint {
            id: "filter:salary".into(),
            display_value: "Salary ≤ $120,000".into(),
            source: ConstraintSource::User,
            kind: ConstraintKind::Property {
                field: FilterField::Salary,
                op: FilterOp::Lte,
                value: json!(120_000),
                field_type: PropertyFieldType::Number,
            },
        };
        let plan = QueryPlanner::new().build_count_query(&[&skill, &salary]);
        assert!(plan.cypher.contains("count(DISTINCT e) AS count"));
        assert!(plan.cypher.contains("e.salary <= $p1"));
        assert_eq!(plan.params["p0_levels"], json!(["proficient", "expert"]));
    }

    #[test]
    fn empty_constraint_set_counts_everyone() {
        let plan = QueryPlanner::new().build_count_query(&[]);
        assert!(!plan.cypher.contains("WHERE"));
        assert!(plan.cypher.starts_with("MATCH (e:Engineer)"));
    }
}
