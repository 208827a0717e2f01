pub mod detect;
pub mod fingerprint;
pub mod issue;
pub mod pipeline;
pub mod product;
pub mod report;
pub mod snapshot;
pub mod source;
pub mod store;

pub use detect::{Change, ChangeDetector, ChangeKind, Detection, SnapshotWrite};
pub use fingerprint::{Diff, canonicalize, fingerprint, merge_diff};
pub use issue::Issue;
pub use pipeline::{PaginationMode, Pipeline, PipelineConfig};
pub use product::{KeyError, KeyFormat, PageIndex, Product, ProductId, ProductKey};
pub use report::{RunOutcome, RunReport, RunStats};
pub use snapshot::ProductSnapshot;
pub use source::{Page, PageError, PageSource};
pub use store::{HistorySink, SnapshotStore, StoreError};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
