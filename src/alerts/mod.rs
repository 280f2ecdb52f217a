//! Alert reconciliation
//!
//! Fetches open problems per category, diffs them against the stored
//! snapshot and drives the resulting inserts, deletes and chat messages.

pub mod fetcher;
pub mod reconcile;
pub mod record;
pub mod relay;
pub mod router;

pub use fetcher::{Fetcher, TagMap};
pub use reconcile::Diff;
pub use record::{AlertRecord, Category};
pub use relay::{CategoryReport, Relay, RelayError, RunSummary, Stage};
pub use router::{Router, Transition};
