//! Graph boundary: store contract, immutable snapshots, loader, cache.

pub mod cache;
pub mod loader;
pub mod model;
pub mod store;

pub use cache::GraphCatalog;
pub use loader::GraphLoader;
pub use model::{DomainArena, DomainGraph, DomainNode, SkillGraph, SkillNode};
pub use store::{
    Deadline, GraphError, GraphStore, Params, QueryRunner, Row, row_array, row_f64, row_opt_f64,
    row_opt_str, row_str, row_u64,
};
