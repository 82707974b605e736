pub mod collection_ext;
pub mod error;
pub mod text;

pub use collection_ext::{count_by, percentile, top_n_by_count, unique_ordered};
pub use error::{EngineError, EngineResult, ErrorPayload};
pub use text::{clean_optional, normalize_identifier};
