use super::model::{MemberSummary, ReportMode};
use chrono::{DateTime, TimeDelta, Utc};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankRule {
    /// Points, then elapsed contest time.
    ContestTime,
    /// Points, then latest submission date; missing dates count as `now`.
    SubmissionDate { now: DateTime<Utc> },
}

impl RankRule {
    pub fn for_report(mode: ReportMode, is_contest: bool, now: DateTime<Utc>) -> Self {
        match mode {
            ReportMode::Overall if is_contest => RankRule::ContestTime,
            _ => RankRule::SubmissionDate { now },
        }
    }
}

// A member with no points and no recorded time did nothing; sort them below
// zero-point members who at least submitted.
fn contest_time_key(s: &MemberSummary) -> TimeDelta {
    if s.total_points == 0.0 && s.total_time.is_zero() {
        TimeDelta::MAX
    } else {
        s.total_time
    }
}

pub fn compare(a: &MemberSummary, b: &MemberSummary, rule: RankRule) -> Ordering {
    let by_points = b
        .total_points
        .partial_cmp(&a.total_points)
        .unwrap_or(Ordering::Equal);
    let by_tiebreak = match rule {
        RankRule::ContestTime => contest_time_key(a).cmp(&contest_time_key(b)),
        RankRule::SubmissionDate { now } => a
            .best_submission_date
            .unwrap_or(now)
            .cmp(&b.best_submission_date.unwrap_or(now)),
    };
    by_points
        .then(by_tiebreak)
        .then_with(|| a.last_name.cmp(&b.last_name))
        .then_with(|| a.first_name.cmp(&b.first_name))
}

/// Stable: rows equal on every key keep roster order.
pub fn rank(rows: &mut [MemberSummary], rule: RankRule) {
    rows.sort_by(|a, b| compare(a, b, rule));
}
