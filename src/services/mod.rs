pub mod advisor;
pub mod clock;
pub mod critique;
pub mod diversity;
pub mod expander;
pub mod explain;
pub mod inference;
pub mod orchestrator;
pub mod planner;
pub mod ranker;
pub mod similarity;
pub mod taxonomy;

pub use advisor::{AdvisorOutcome, ConstraintAdvisor};
pub use clock::{Clock, FixedClock, SystemClock};
pub use critique::miner::DynamicCritiqueMiner;
pub use critique::{AppliedCritique, CritiqueInterpreter, CritiqueOutcome, FailedCritique};
pub use diversity::DiversitySelector;
pub use expander::{seniority_years, ConstraintExpander};
pub use explain::{ExplanationService, LlmError, LlmProvider, OpenAiCompatProvider};
pub use inference::{InferenceEngine, InferenceResult};
pub use orchestrator::MatchOrchestrator;
pub use planner::{Pagination, QueryPlan, QueryPlanner};
pub use ranker::UtilityRanker;
pub use similarity::{SimilarityScorer, SkillSetSimilarity};
pub use taxonomy::{CatalogTextResolver, Resolution, ResolutionBatch, TaxonomyResolver, TextResolver};
