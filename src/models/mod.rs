pub mod candidate;
pub mod constraint;
pub mod criteria;
pub mod critique;
pub mod request;
pub mod response;

pub use candidate::*;
pub use constraint::*;
pub use criteria::*;
pub use critique::*;
pub use request::*;
pub use response::*;
