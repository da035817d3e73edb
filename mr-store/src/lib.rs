//! Shared persisted format between the extractor and the analyzer.
//!
//! - [`MrRecord`]: one merge request snapshot (JSON on disk).
//! - [`RecordStore`] / [`ResultStore`]: atomic, overwrite-only file stores.

pub mod errors;
pub mod record;
pub mod store;

pub use errors::{StoreError, StoreResult};
pub use record::{Inconsistency, MrRecord, MrState};
pub use store::{RecordStore, ResultStore, load_record, write_atomic};
