//! Diversity selector: greedy marginal-relevance re-rank of the
//! similarity pool so the page is not filled with near-duplicates.

use crate::config::DiversityConfig;
use crate::models::{Candidate, ScoredCandidate};

pub struct DiversitySelector {
    lambda: f64,
    multiplier: u32,
}

impl DiversitySelector {
    pub fn new(config: &DiversityConfig) -> Self {
        Self { lambda: config.lambda, multiplier: config.multiplier }
    }

    /// Candidate pool size for a page window.
    pub fn pool_size(&self, limit: u32, offset: u32) -> u32 {
        (limit + offset).saturating_mul(self.multiplier)
    }

    /// Greedy selection over a pool already sorted by similarity score
    /// descending. The seed is the top candidate; every further pick
    /// maximises `λ·relevance − (1−λ)·max_similarity_to_picked`. Ties
    /// break on id so the page is stable.
    pub fn select<F>(
        &self,
        pool: Vec<ScoredCandidate>,
        k: usize,
        pairwise: F,
    ) -> Vec<ScoredCandidate>
    where
        F: Fn(&Candidate, &Candidate) -> f64,
    {
        if pool.len() <= 1 || k == 0 {
            return pool.into_iter().take(k).collect();
        }

        let mut remaining = pool;
        let mut picked: Vec<ScoredCandidate> = vec![remaining.remove(0)];

        while picked.len() < k && !remaining.is_empty() {
            let mut best_index = 0;
            let mut best_value = f64::NEG_INFINITY;
            for (index, entry) in remaining.iter().enumerate() {
                let max_sim = picked
                    .iter()
                    .map(|p| pairwise(&p.candidate, &entry.candidate))
                    .fold(0.0f64, f64::max);
                let value = self.lambda * entry.score - (1.0 - self.lambda) * max_sim;
                let better = value > best_value
                    || (value == best_value
                        && entry.candidate.id < remaining[best_index].candidate.id);
                if better {
                    best_value = value;
                    best_index = index;
                }
            }
            picked.push(remaining.remove(best_index));
        }
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;

    fn scored(id: &str, score: f64, skills: &[&str]) -> ScoredCandidate {
        ScoredCandidate {
            candidate: Candidate {
                id: id.into(),
                name: id.into(),
                headline: String::new(),
                salary: 100_000,
                years_experience: 5.0,
                start_timeline: StartTimeline::OneMonth,
                timezone: UsTimezone::Central,
                skills: skills
                    .iter()
                    .map(|s| CandidateSkill {
                        skill_id: s.to_string(),
                        name: s.to_string(),
                        proficiency: Proficiency::Proficient,
                        confidence: 0.9,
                        years_used: 2.0,
                        match_type: MatchType::None,
                        meets_proficiency: None,
                    })
                    .collect(),
                business_domains: vec![],
                technical_domains: vec![],
            },
            score,
            score_breakdown: ScoreBreakdown::Utility(UtilityBreakdown {
                components: vec![],
                matched_skills: vec![],
                matched_domains: vec![],
            }),
        }
    }

    /// Jaccard over skill ids, enough to exercise the selector.
    fn overlap(a: &Candidate, b: &Candidate) -> f64 {
        let a_ids: std::collections::HashSet<&str> = a.skill_ids().into_iter().collect();
        let b_ids: std::collections::HashSet<&str> = b.skill_ids().into_iter().collect();
        let shared = a_ids.intersection(&b_ids).count() as f64;
        let union = a_ids.union(&b_ids).count() as f64;
        if union == 0.0 { 0.0 } else { shared / union }
    }

    fn selector() -> DiversitySelector {
        DiversitySelector::new(&DiversityConfig::default())
    }

    #[test]
    fn pool_size_multiplies_the_page_window() {
        assert_eq!(selector().pool_size(10, 0), 30);
        assert_eq!(selector().pool_size(10, 20), 90);
    }

    #[test]
    fn seed_is_the_top_candidate() {
        let pool = vec![
            scored("best", 0.9, &["a"]),
            scored("second", 0.8, &["a"]),
            scored("third", 0.7, &["b"]),
        ];
        let picked = selector().select(pool, 2, overlap);
        assert_eq!(picked[0].candidate.id, "best");
    }

    #[test]
    fn near_duplicate_is_deferred_for_a_diverse_pick() {
        // "twin" duplicates the seed's skills; "different" scores slightly
        // lower but shares nothing.
        let pool = vec![
            scored("seed", 0.90, &["a", "b"]),
            scored("twin", 0.89, &["a", "b"]),
            scored("different", 0.80, &["c", "d"]),
        ];
        let picked = selector().select(pool, 2, overlap);
        let ids: Vec<&str> = picked.iter().map(|p| p.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["seed", "different"]);
    }

    #[test]
    fn every_pick_comes_from_the_pool() {
        let pool: Vec<ScoredCandidate> = (0..9)
            .map(|i| scored(&format!("e{i}"), 1.0 - i as f64 * 0.05, &["a"]))
            .collect();
        let pool_ids: Vec<String> = pool.iter().map(|p| p.candidate.id.clone()).collect();
        let picked = selector().select(pool, 5, overlap);
        assert_eq!(picked.len(), 5);
        for pick in &picked {
            assert!(pool_ids.contains(&pick.candidate.id));
        }
    }

    #[test]
    fn short_pool_returns_everything() {
        let pool = vec![scored("only", 0.5, &["a"])];
        let picked = selector().select(pool, 10, overlap);
        assert_eq!(picked.len(), 1);
    }
}
