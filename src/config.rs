//! Engine configuration.
//!
//! Loading order (priority from highest to lowest):
//! 1. Environment variables (prefixed with TALENTGRAPH_)
//! 2. Configuration file (config.toml)
//! 3. Default values
//!
//! Weights and thresholds are read-only after startup. `validate()` runs
//! on every load and refuses inconsistent weight tables.

use serde::Deserialize;
use std::fs;
use std::path::Path;

const WEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceConfig,
    pub utility: UtilityWeights,
    pub similarity: SimilarityConfig,
    pub diversity: DiversityConfig,
    pub advisor: AdvisorConfig,
    pub critique: CritiqueConfig,
    pub graph: GraphConfig,
    pub taxonomy: TaxonomyConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

/// Fixed-point rule evaluation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Iteration ceiling; exceeding it degrades with a warning.
    pub max_iterations: u32,
    /// Optional rule catalogue file (JSON). Built-in rules load when unset.
    pub rules_path: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { max_iterations: 8, rules_path: None }
    }
}

/// Utility ranker component weights. Must sum to 1.0 ± 1e-9.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UtilityWeights {
    pub required_skills: f64,
    pub preferred_skills: f64,
    pub confidence: f64,
    pub salary: f64,
    pub years_experience: f64,
    pub start_timeline: f64,
    pub preferred_timezone: f64,
    pub preferred_seniority: f64,
    pub related_skills: f64,
    pub domain_coverage: f64,
}

impl Default for UtilityWeights {
    fn default() -> Self {
        Self {
            required_skills: 0.28,
            preferred_skills: 0.10,
            confidence: 0.08,
            salary: 0.10,
            years_experience: 0.10,
            start_timeline: 0.08,
            preferred_timezone: 0.04,
            preferred_seniority: 0.05,
            related_skills: 0.05,
            domain_coverage: 0.12,
        }
    }
}

impl UtilityWeights {
    pub fn sum(&self) -> f64 {
        self.required_skills
            + self.preferred_skills
            + self.confidence
            + self.salary
            + self.years_experience
            + self.start_timeline
            + self.preferred_timezone
            + self.preferred_seniority
            + self.related_skills
            + self.domain_coverage
    }
}

/// Similarity scorer settings. Component weights must sum to 1.0 ± 1e-9.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub skills_weight: f64,
    pub years_weight: f64,
    pub domain_weight: f64,
    pub timezone_weight: f64,
    /// Correlation edges weaker than this never count as matches.
    pub min_correlation_strength: f64,
    /// Cap for the logarithmic years curve.
    pub years_cap: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            skills_weight: 0.45,
            years_weight: 0.27,
            domain_weight: 0.22,
            timezone_weight: 0.06,
            min_correlation_strength: 0.7,
            years_cap: 20.0,
        }
    }
}

impl SimilarityConfig {
    pub fn sum(&self) -> f64 {
        self.skills_weight + self.years_weight + self.domain_weight + self.timezone_weight
    }
}

/// Diversity selector settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    /// Pool factor applied to `limit + offset`.
    pub multiplier: u32,
    /// Relevance/diversity trade-off in the greedy selection.
    pub lambda: f64,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self { multiplier: 3, lambda: 0.5 }
    }
}

/// Constraint advisor thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Below this count the advisor proposes relaxations.
    pub sparse_threshold: u64,
    /// At or above this count the advisor proposes tightenings.
    pub many_threshold: u64,
    /// Maximum minimal conflict sets to enumerate.
    pub max_conflict_sets: usize,
    /// Tightening / critique support floor.
    pub min_support_threshold: f64,
    /// Maximum suggestions per report.
    pub max_suggestions: usize,
    /// Fractional widening step for salary relaxations.
    pub salary_relax_step: f64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            sparse_threshold: 3,
            many_threshold: 25,
            max_conflict_sets: 3,
            min_support_threshold: 0.15,
            max_suggestions: 5,
            salary_relax_step: 0.20,
        }
    }
}

/// Critique interpreter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CritiqueConfig {
    /// Fractional budget change applied by `adjust more|less`.
    pub adjustment_factor: f64,
    /// Budget never adjusts below this floor.
    pub budget_floor: u64,
}

impl Default for CritiqueConfig {
    fn default() -> Self {
        Self { adjustment_factor: 0.20, budget_floor: 30_000 }
    }
}

/// Graph snapshot settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Snapshot cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Recency window for skill usage, in years.
    pub recency_years: i32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { cache_ttl_secs: 300, recency_years: 3 }
    }
}

/// Taxonomy resolver settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// Minimum normalized Levenshtein ratio for a fuzzy match.
    pub fuzzy_threshold: f64,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self { fuzzy_threshold: 0.8 }
    }
}

/// Optional LLM explanation polish. The engine is fully functional with
/// `enabled = false`; explanations degrade to templates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 512,
            temperature: 0.2,
            timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,talentgraph=debug".to_string(), file: None }
    }
}

impl Config {
    /// Load configuration with environment variable and file support.
    pub fn load() -> Result<Self, anyhow::Error> {
        let config_path = std::env::var("TALENTGRAPH_CONFIG")
            .ok()
            .or_else(Self::find_config_file);
        let mut config = if let Some(path) = config_path {
            Self::from_toml(&path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TALENTGRAPH_LOG_LEVEL: Logging level (e.g., "info,talentgraph=debug")
    /// - TALENTGRAPH_LLM_API_BASE / TALENTGRAPH_LLM_API_KEY / TALENTGRAPH_LLM_MODEL
    /// - TALENTGRAPH_LLM_ENABLED: Enable/disable LLM polish (true/false)
    /// - TALENTGRAPH_GRAPH_CACHE_TTL_SECS: Snapshot cache TTL
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("TALENTGRAPH_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }
        if let Ok(base) = std::env::var("TALENTGRAPH_LLM_API_BASE") {
            self.llm.api_base = base;
            tracing::info!("Override llm.api_base from env");
        }
        if let Ok(key) = std::env::var("TALENTGRAPH_LLM_API_KEY") {
            self.llm.api_key = Some(key);
            tracing::info!("Override llm.api_key from env");
        }
        if let Ok(model) = std::env::var("TALENTGRAPH_LLM_MODEL") {
            self.llm.model = model;
            tracing::info!("Override llm.model from env: {}", self.llm.model);
        }
        if let Ok(enabled) = std::env::var("TALENTGRAPH_LLM_ENABLED")
            && let Ok(val) = enabled.parse()
        {
            self.llm.enabled = val;
            tracing::info!("Override llm.enabled from env: {}", self.llm.enabled);
        }
        if let Ok(ttl) = std::env::var("TALENTGRAPH_GRAPH_CACHE_TTL_SECS")
            && let Ok(val) = ttl.parse()
        {
            self.graph.cache_ttl_secs = val;
            tracing::info!("Override graph.cache_ttl_secs from env: {}", self.graph.cache_ttl_secs);
        }
    }

    /// Validate configuration. Inconsistent weight tables are refused.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let utility_sum = self.utility.sum();
        if (utility_sum - 1.0).abs() > WEIGHT_EPSILON {
            anyhow::bail!("utility weights must sum to 1.0, got {utility_sum}");
        }
        let similarity_sum = self.similarity.sum();
        if (similarity_sum - 1.0).abs() > WEIGHT_EPSILON {
            anyhow::bail!("similarity weights must sum to 1.0, got {similarity_sum}");
        }
        if self.inference.max_iterations == 0 {
            anyhow::bail!("inference.max_iterations must be > 0");
        }
        if self.advisor.sparse_threshold >= self.advisor.many_threshold {
            anyhow::bail!(
                "advisor.sparse_threshold ({}) must be below advisor.many_threshold ({})",
                self.advisor.sparse_threshold,
                self.advisor.many_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.advisor.min_support_threshold) {
            anyhow::bail!("advisor.min_support_threshold must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.diversity.lambda) {
            anyhow::bail!("diversity.lambda must be in [0, 1]");
        }
        if self.diversity.multiplier == 0 {
            anyhow::bail!("diversity.multiplier must be > 0");
        }
        if !(0.0..=1.0).contains(&self.similarity.min_correlation_strength) {
            anyhow::bail!("similarity.min_correlation_strength must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.taxonomy.fuzzy_threshold) {
            anyhow::bail!("taxonomy.fuzzy_threshold must be in [0, 1]");
        }
        if self.llm.enabled && self.llm.api_key.is_none() {
            anyhow::bail!("llm.enabled requires llm.api_key");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];
        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
