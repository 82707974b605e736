//! Talentgraph
//!
//! Constraint-based recommender engine over a graph-modelled talent
//! knowledge base: inference rules expand a hiring request into hard
//! filters and soft boosts, a planner turns them into one bounded graph
//! query, and the results are utility-ranked or similarity-scored with
//! diversity, conflict analysis, and critique mining on top.
//!
//! The hosting process owns the HTTP surface; this crate owns the
//! pipeline between a validated request and its response payload.

use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod graph;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use graph::{Deadline, GraphCatalog, GraphError, GraphLoader, GraphStore, QueryRunner};
pub use models::{SearchRequest, SearchResponse};
pub use services::{
    Clock, CritiqueInterpreter, ExplanationService, LlmProvider, MatchOrchestrator,
    OpenAiCompatProvider, SystemClock,
};
pub use utils::{EngineError, EngineResult};

/// Engine shared state
///
/// Rust's type system is the DI container: every service is built once
/// from the configuration and shared behind `Arc`.
pub struct EngineState {
    pub config: Config,
    pub catalog: Arc<GraphCatalog>,
    pub orchestrator: Arc<MatchOrchestrator>,
    pub critique_interpreter: Arc<CritiqueInterpreter>,
}

impl EngineState {
    /// Wire the engine against a graph store. The LLM provider is built
    /// from configuration when enabled; passing one explicitly (tests,
    /// custom providers) overrides that.
    pub fn new(
        config: Config,
        store: Arc<dyn GraphStore>,
        llm_override: Option<Arc<dyn LlmProvider>>,
    ) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let runner = QueryRunner::new(store);
        let catalog = Arc::new(GraphCatalog::new(
            GraphLoader::new(runner.clone()),
            Duration::from_secs(config.graph.cache_ttl_secs),
        ));

        let provider: Option<Arc<dyn LlmProvider>> = match llm_override {
            Some(provider) => Some(provider),
            None if config.llm.enabled => {
                Some(Arc::new(OpenAiCompatProvider::new(config.llm.clone())?))
            }
            None => None,
        };
        let explain = ExplanationService::new(provider, config.llm.timeout_seconds);

        let orchestrator = Arc::new(MatchOrchestrator::new(
            &config,
            catalog.clone(),
            runner,
            explain,
            Arc::new(SystemClock),
        )?);
        let critique_interpreter = Arc::new(CritiqueInterpreter::new(&config.critique));

        Ok(Self { config, catalog, orchestrator, critique_interpreter })
    }

    /// Drop cached graph snapshots after an ingestion event.
    pub fn invalidate_graphs(&self) {
        self.catalog.invalidate();
    }
}

/// Install the tracing subscriber for a hosting process that has none.
pub fn init_tracing(config: &config::LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    match &config.file {
        Some(path) => {
            let appender = tracing_appender::rolling::daily(
                std::path::Path::new(path).parent().unwrap_or_else(|| std::path::Path::new(".")),
                std::path::Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "talentgraph.log".to_string()),
            );
            fmt().with_env_filter(filter).with_writer(appender).init();
        }
        None => {
            fmt().with_env_filter(filter).init();
        }
    }
}
