pub mod codec;
pub mod compaction;
pub mod error;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use store::{DedupStore, StoreOptions};
pub use types::{ExistsCode, SetOutcome, StoreStats};
