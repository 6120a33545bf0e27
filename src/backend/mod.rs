//! Read-only collaborators the summary pipeline consumes.
//!
//! Every call is blocking and returns fully materialized data. Failures are
//! passed through untouched; the pipeline never retries.

mod sqlite;

use crate::summary::{Group, Member, ScoredItem};
use chrono::{DateTime, TimeDelta, Utc};

pub use sqlite::SqliteBackend;

pub trait GroupLookup {
    fn find_group(&self, slug: &str) -> anyhow::Result<Option<Group>>;
}

pub trait Roster {
    /// Members ordered by their stored composite string.
    fn members_of(&self, group: &Group) -> anyhow::Result<Vec<Member>>;
}

pub trait ItemCatalog {
    /// Items whose code starts with any of `prefixes`.
    fn items_matching(&self, prefixes: &[String]) -> anyhow::Result<Vec<ScoredItem>>;
}

pub trait ScoringOracle {
    fn grade_of(&self, item: &ScoredItem, member: &Member) -> anyhow::Result<Option<f64>>;
    fn best_time_of(&self, item: &ScoredItem, member: &Member)
        -> anyhow::Result<Option<TimeDelta>>;
    fn containing_contest(&self, item: &ScoredItem, member: &Member) -> anyhow::Result<bool>;
    fn best_submission_date_of(
        &self,
        item: &ScoredItem,
        member: &Member,
    ) -> anyhow::Result<Option<DateTime<Utc>>>;
    /// Highest points, earliest submission on ties.
    fn best_score_of(&self, item: &ScoredItem, member: &Member) -> anyhow::Result<Option<f64>>;
}

pub trait AccessPolicy {
    fn may_view_summaries(&self, requester: &str) -> anyhow::Result<bool>;
}

pub trait SummaryBackend: GroupLookup + Roster + ItemCatalog + ScoringOracle + AccessPolicy {}

impl<T> SummaryBackend for T where T: GroupLookup + Roster + ItemCatalog + ScoringOracle + AccessPolicy
{}
