//! Grade aggregation and ranking for group summary reports.
//!
//! One request flows through item selection, per-member aggregation, optional
//! ranking and assembly. Nothing here performs I/O directly; all data comes
//! through the traits in [`crate::backend`].

mod aggregate;
mod error;
mod identity;
mod model;
mod rank;
mod report;
mod select;

pub use error::SummaryError;
pub use model::{Group, Member, ReportMode, ScoredItem};
pub use report::{build_report, ReportRequest};
