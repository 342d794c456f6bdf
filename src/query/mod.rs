pub mod capabilities;
pub mod options;
pub mod pipeline;
pub mod transaction;

pub use capabilities::{Capabilities, Capability, EntityIter};
pub use options::{ExpandRequest, QueryOptions, RawQueryOptions};
pub use transaction::Transaction;
