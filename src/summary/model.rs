use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub slug: String,
    pub name: String,
}

/// A roster entry. `display` is the stored composite identity string; it is
/// only split into name parts during aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub username: String,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub code: String,
    pub name: String,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Grade, contest time and submission date per item.
    Overall,
    /// Best recorded score per item only.
    Completion,
}

impl ReportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportMode::Overall => "overall",
            ReportMode::Completion => "completion",
        }
    }
}

/// One cell of the report grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemResult {
    /// `grade` is `None` when the item was never graded for this member.
    Timed {
        grade: Option<f64>,
        time: Option<TimeDelta>,
    },
    Completion { grade: f64 },
}

impl ItemResult {
    /// Contribution to the member total; ungraded counts as zero.
    pub fn points(&self) -> f64 {
        match self {
            ItemResult::Timed { grade, .. } => grade.unwrap_or(0.0),
            ItemResult::Completion { grade } => *grade,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberSummary {
    pub member_id: String,
    /// Reserved; always empty for now.
    pub sid: String,
    pub last_name: String,
    pub first_name: String,
    pub section: String,
    pub cn: Option<String>,
    /// Ordered by item code.
    pub grades: Vec<ItemResult>,
    pub total_points: f64,
    /// Max elapsed time over contest-scoped items. Zero when none recorded.
    pub total_time: TimeDelta,
    /// Max submission date over non-contest items.
    pub best_submission_date: Option<DateTime<Utc>>,
    pub is_contest: bool,
}
