//! Graph-aware similarity scoring, active when the request names a
//! reference engineer.
//!
//! Per-skill similarity is tiered by first match: identical id,
//! sufficiently strong correlation edge, shared category, shared parent.
//! Set similarity is the symmetric (harmonic) average of directional
//! mean-of-best-matches; engineer similarity is the configured weighted
//! sum over skills, years, domain, and timezone.

use crate::config::SimilarityConfig;
use crate::graph::{DomainArena, DomainGraph, SkillGraph};
use crate::models::*;

const SAME_CATEGORY_CREDIT: f64 = 0.5;
const SHARED_PARENT_CREDIT: f64 = 0.3;

/// Skill-set comparison result with the transparency lists.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillSetSimilarity {
    pub score: f64,
    pub shared: Vec<String>,
    pub correlated: Vec<CorrelatedSkillPair>,
}

pub struct SimilarityScorer {
    config: SimilarityConfig,
}

impl SimilarityScorer {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    /// Tiered per-skill similarity, first match wins.
    fn skill_pair(&self, graph: &SkillGraph, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        if let Some(strength) = graph.correlation_between(a, b)
            && strength >= self.config.min_correlation_strength
        {
            return strength;
        }
        if graph.same_category(a, b) {
            return SAME_CATEGORY_CREDIT;
        }
        if graph.share_parent(a, b) {
            return SHARED_PARENT_CREDIT;
        }
        0.0
    }

    /// Symmetric skill-set similarity: mean-of-best-matches in both
    /// directions, combined harmonically so a one-sided match cannot
    /// dominate.
    pub fn skill_set_similarity(
        &self,
        graph: &SkillGraph,
        reference: &[&str],
        other: &[&str],
    ) -> SkillSetSimilarity {
        if reference.is_empty() || other.is_empty() {
            return SkillSetSimilarity { score: 0.0, shared: Vec::new(), correlated: Vec::new() };
        }

        let mut shared = Vec::new();
        let mut correlated = Vec::new();

        let mut forward_sum = 0.0;
        for &a in reference {
            let mut best = 0.0f64;
            let mut best_target: Option<&str> = None;
            for &b in other {
                let sim = self.skill_pair(graph, a, b);
                if sim > best {
                    best = sim;
                    best_target = Some(b);
                }
            }
            forward_sum += best;
            if let Some(b) = best_target {
                if a == b {
                    shared.push(a.to_string());
                } else if let Some(strength) = graph.correlation_between(a, b)
                    && strength >= self.config.min_correlation_strength
                {
                    correlated.push(CorrelatedSkillPair {
                        reference_skill_id: a.to_string(),
                        candidate_skill_id: b.to_string(),
                        strength,
                    });
                }
            }
        }
        let forward = forward_sum / reference.len() as f64;

        let mut backward_sum = 0.0;
        for &b in other {
            let best = reference
                .iter()
                .map(|&a| self.skill_pair(graph, a, b))
                .fold(0.0f64, f64::max);
            backward_sum += best;
        }
        let backward = backward_sum / other.len() as f64;

        let score = if forward + backward > 0.0 {
            2.0 * forward * backward / (forward + backward)
        } else {
            0.0
        };
        shared.sort();
        SkillSetSimilarity { score, shared, correlated }
    }

    /// Domain-set similarity with the same tiered rules (no correlation or
    /// category tiers exist for domains).
    fn domain_set_similarity(
        &self,
        arena: &DomainArena,
        reference: &[&str],
        other: &[&str],
    ) -> f64 {
        if reference.is_empty() || other.is_empty() {
            return 0.0;
        }
        let pair = |a: &str, b: &str| -> f64 {
            if a == b {
                1.0
            } else if arena.share_parent(a, b) {
                SHARED_PARENT_CREDIT
            } else {
                0.0
            }
        };
        let forward = reference
            .iter()
            .map(|&a| other.iter().map(|&b| pair(a, b)).fold(0.0f64, f64::max))
            .sum::<f64>()
            / reference.len() as f64;
        let backward = other
            .iter()
            .map(|&b| reference.iter().map(|&a| pair(a, b)).fold(0.0f64, f64::max))
            .sum::<f64>()
            / other.len() as f64;
        if forward + backward > 0.0 {
            2.0 * forward * backward / (forward + backward)
        } else {
            0.0
        }
    }

    /// Logarithmic years similarity: distance on the log curve, capped.
    fn years_similarity(&self, a: f64, b: f64) -> f64 {
        let cap = self.config.years_cap;
        let distance = ((1.0 + a.max(0.0)).ln() - (1.0 + b.max(0.0)).ln()).abs();
        (1.0 - distance / (1.0 + cap).ln()).clamp(0.0, 1.0)
    }

    /// Score one candidate against the reference engineer. Candidate
    /// skills shared with the reference are marked `direct`; sufficiently
    /// correlated ones are marked `correlated`.
    pub fn score(
        &self,
        skills: &SkillGraph,
        domains: &DomainGraph,
        reference: &Candidate,
        mut candidate: Candidate,
    ) -> ScoredCandidate {
        let reference_ids = reference.skill_ids();
        let candidate_ids = candidate.skill_ids();
        let skill_sim = self.skill_set_similarity(skills, &reference_ids, &candidate_ids);

        let business = self.domain_set_similarity(
            &domains.business,
            &domain_ids(&reference.business_domains),
            &domain_ids(&candidate.business_domains),
        );
        let technical = self.domain_set_similarity(
            &domains.technical,
            &domain_ids(&reference.technical_domains),
            &domain_ids(&candidate.technical_domains),
        );
        let domain_sim = (business + technical) / 2.0;

        let years_sim = self.years_similarity(
            reference.years_experience,
            candidate.years_experience,
        );
        let timezone_sim = if reference.timezone == candidate.timezone { 1.0 } else { 0.0 };

        let component = |name: &str, weight: f64, raw: f64| ScoreComponent {
            component: name.to_string(),
            weight,
            raw,
            weighted: weight * raw,
        };
        let components = SimilarityComponents {
            skills: component("skills", self.config.skills_weight, skill_sim.score),
            years_experience: component("yearsExperience", self.config.years_weight, years_sim),
            domain: component("domain", self.config.domain_weight, domain_sim),
            timezone: component("timezone", self.config.timezone_weight, timezone_sim),
        };
        let score = components.skills.weighted
            + components.years_experience.weighted
            + components.domain.weighted
            + components.timezone.weighted;

        for skill in &mut candidate.skills {
            if skill_sim.shared.contains(&skill.skill_id) {
                skill.match_type = MatchType::Direct;
            } else if skill_sim
                .correlated
                .iter()
                .any(|pair| pair.candidate_skill_id == skill.skill_id)
            {
                skill.match_type = MatchType::Correlated;
            }
        }

        ScoredCandidate {
            candidate,
            score,
            score_breakdown: ScoreBreakdown::Similarity(SimilarityBreakdown {
                components,
                shared_skills: skill_sim.shared,
                correlated_skills: skill_sim.correlated,
            }),
        }
    }

    /// Profile-level similarity for the diversity selector: the skill-set
    /// score between two already-returned candidates.
    pub fn profile_similarity(&self, skills: &SkillGraph, a: &Candidate, b: &Candidate) -> f64 {
        self.skill_set_similarity(skills, &a.skill_ids(), &b.skill_ids()).score
    }
}

fn domain_ids(domains: &[CandidateDomain]) -> Vec<&str> {
    domains.iter().map(|d| d.domain_id.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{DomainArenaBuilder, SkillGraphBuilder};

    fn fixture_graph() -> SkillGraph {
        let mut b = SkillGraphBuilder::default();
        b.add_skill("skill_langs", "Languages", "languages".into(), None, None);
        b.add_skill(
            "skill_python",
            "Python",
            "python".into(),
            Some("cat_lang".into()),
            Some("skill_langs".into()),
        );
        b.add_skill(
            "skill_ruby",
            "Ruby",
            "ruby".into(),
            Some("cat_lang".into()),
            Some("skill_langs".into()),
        );
        b.add_skill("skill_terraform", "Terraform", "terraform".into(), Some("cat_infra".into()), None);
        b.add_skill("skill_pulumi", "Pulumi", "pulumi".into(), Some("cat_infra".into()), None);
        b.add_correlation("skill_terraform", "skill_pulumi", 0.85, "alternative");
        b.finish().unwrap()
    }

    fn scorer() -> SimilarityScorer {
        SimilarityScorer::new(SimilarityConfig::default())
    }

    fn candidate(id: &str, skills: &[&str], years: f64, timezone: UsTimezone) -> Candidate {
        Candidate {
            id: id.into(),
            name: id.into(),
            headline: String::new(),
            salary: 150_000,
            years_experience: years,
            start_timeline: StartTimeline::OneMonth,
            timezone,
            skills: skills
                .iter()
                .map(|s| CandidateSkill {
                    skill_id: s.to_string(),
                    name: s.to_string(),
                    proficiency: Proficiency::Proficient,
                    confidence: 0.9,
                    years_used: 3.0,
                    match_type: MatchType::None,
                    meets_proficiency: None,
                })
                .collect(),
            business_domains: vec![],
            technical_domains: vec![],
        }
    }

    #[test]
    fn identical_sets_score_one() {
        let graph = fixture_graph();
        let sim = scorer().skill_set_similarity(
            &graph,
            &["skill_python", "skill_terraform"],
            &["skill_python", "skill_terraform"],
        );
        assert!((sim.score - 1.0).abs() < 1e-9);
        assert_eq!(sim.shared, vec!["skill_python".to_string(), "skill_terraform".to_string()]);
        assert!(sim.correlated.is_empty());
    }

    #[test]
    fn similarity_is_symmetric() {
        let graph = fixture_graph();
        let s = scorer();
        let a = ["skill_python", "skill_terraform"];
        let b = ["skill_ruby", "skill_pulumi"];
        let ab = s.skill_set_similarity(&graph, &a, &b).score;
        let ba = s.skill_set_similarity(&graph, &b, &a).score;
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn strong_correlation_beats_category() {
        let graph = fixture_graph();
        let sim = scorer().skill_set_similarity(&graph, &["skill_terraform"], &["skill_pulumi"]);
        assert!((sim.score - 0.85).abs() < 1e-9);
        assert_eq!(sim.correlated.len(), 1);
        assert_eq!(sim.correlated[0].strength, 0.85);
    }

    #[test]
    fn weak_correlation_falls_back_to_category_tier() {
        let mut b = SkillGraphBuilder::default();
        b.add_skill("a", "A", "a".into(), Some("cat".into()), None);
        b.add_skill("b", "B", "b".into(), Some("cat".into()), None);
        b.add_correlation("a", "b", 0.4, "related");
        let graph = b.finish().unwrap();
        let sim = scorer().skill_set_similarity(&graph, &["a"], &["b"]);
        assert!((sim.score - SAME_CATEGORY_CREDIT).abs() < 1e-9);
        assert!(sim.correlated.is_empty());
    }

    #[test]
    fn sibling_skills_earn_parent_tier() {
        let mut b = SkillGraphBuilder::default();
        b.add_skill("root", "Root", "root".into(), None, None);
        b.add_skill("x", "X", "x".into(), None, Some("root".into()));
        b.add_skill("y", "Y", "y".into(), None, Some("root".into()));
        let graph = b.finish().unwrap();
        let sim = scorer().skill_set_similarity(&graph, &["x"], &["y"]);
        assert!((sim.score - SHARED_PARENT_CREDIT).abs() < 1e-9);
    }

    #[test]
    fn engineer_score_marks_shared_and_correlated_skills() {
        let graph = fixture_graph();
        let mut business = DomainArenaBuilder::default();
        business.add_domain("dom_x", "X", "x".into(), None, vec![]);
        let domains = DomainGraph {
            business: business.finish().unwrap(),
            technical: DomainArenaBuilder::default().finish().unwrap(),
        };
        let reference =
            candidate("ref", &["skill_python", "skill_terraform"], 8.0, UsTimezone::Eastern);
        let other =
            candidate("e1", &["skill_python", "skill_pulumi"], 8.0, UsTimezone::Eastern);
        let scored = scorer().score(&graph, &domains, &reference, other);

        let ScoreBreakdown::Similarity(breakdown) = &scored.score_breakdown else {
            panic!("expected similarity breakdown");
        };
        assert_eq!(breakdown.shared_skills, vec!["skill_python".to_string()]);
        assert_eq!(breakdown.correlated_skills.len(), 1);
        assert!((breakdown.components.timezone.raw - 1.0).abs() < 1e-9);
        assert!((breakdown.components.years_experience.raw - 1.0).abs() < 1e-9);

        let python = scored.candidate.skill("skill_python").unwrap();
        assert_eq!(python.match_type, MatchType::Direct);
        let pulumi = scored.candidate.skill("skill_pulumi").unwrap();
        assert_eq!(pulumi.match_type, MatchType::Correlated);
        assert!(scored.score > 0.5);
    }

    #[test]
    fn years_similarity_decays_on_the_log_curve() {
        let s = scorer();
        assert!((s.years_similarity(8.0, 8.0) - 1.0).abs() < 1e-9);
        assert!(s.years_similarity(2.0, 18.0) < s.years_similarity(10.0, 12.0));
        assert!(s.years_similarity(0.0, 50.0) >= 0.0);
    }
}
