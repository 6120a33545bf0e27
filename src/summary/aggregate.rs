use super::error::SummaryError;
use super::identity::{parse_identity, IdentityLayout};
use super::model::{ItemResult, Member, MemberSummary, ReportMode, ScoredItem};
use crate::backend::ScoringOracle;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

/// What the oracle reported for one (member, item) pair in overall mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemObservation {
    pub grade: Option<f64>,
    pub time: Option<TimeDelta>,
    pub is_contest: bool,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverallTotals {
    pub total_points: f64,
    pub total_time: TimeDelta,
    pub best_submission_date: Option<DateTime<Utc>>,
    pub is_contest: bool,
}

impl Default for OverallTotals {
    fn default() -> Self {
        Self {
            total_points: 0.0,
            total_time: TimeDelta::zero(),
            best_submission_date: None,
            is_contest: false,
        }
    }
}

/// Contest items contribute their time, other items their date.
pub fn fold_overall(observations: &[ItemObservation]) -> OverallTotals {
    observations
        .iter()
        .fold(OverallTotals::default(), |acc, obs| {
            let total_points = acc.total_points + obs.grade.unwrap_or(0.0);
            let (total_time, best_submission_date) = match (obs.is_contest, obs.time, obs.date) {
                (true, Some(t), _) => (acc.total_time.max(t), acc.best_submission_date),
                (false, _, Some(d)) => (
                    acc.total_time,
                    Some(acc.best_submission_date.map_or(d, |best| best.max(d))),
                ),
                _ => (acc.total_time, acc.best_submission_date),
            };
            OverallTotals {
                total_points,
                total_time,
                best_submission_date,
                is_contest: acc.is_contest || obs.is_contest,
            }
        })
}

pub fn observe<O>(oracle: &O, item: &ScoredItem, member: &Member) -> anyhow::Result<ItemObservation>
where
    O: ScoringOracle + ?Sized,
{
    Ok(ItemObservation {
        grade: oracle.grade_of(item, member)?,
        time: oracle.best_time_of(item, member)?,
        is_contest: oracle.containing_contest(item, member)?,
        date: oracle.best_submission_date_of(item, member)?,
    })
}

/// Builds one member's row. `items` must already be sorted by code.
pub fn aggregate_member<O>(
    oracle: &O,
    member: &Member,
    items: &[ScoredItem],
    mode: ReportMode,
    delimiter: &str,
) -> Result<MemberSummary, SummaryError>
where
    O: ScoringOracle + ?Sized,
{
    let identity = parse_identity(&member.display, delimiter, IdentityLayout::for_mode(mode))
        .map_err(|e| {
            warn!(
                member_id = %member.id,
                raw = %member.display,
                found = e.found,
                "malformed identity string"
            );
            SummaryError::DataIntegrity {
                member_id: member.id.clone(),
                raw: member.display.clone(),
                expected: e.expected,
                found: e.found,
            }
        })?;

    let (grades, totals) = match mode {
        ReportMode::Overall => {
            let observations = items
                .iter()
                .map(|item| observe(oracle, item, member))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let grades = observations
                .iter()
                .map(|o| ItemResult::Timed {
                    grade: o.grade,
                    time: o.time,
                })
                .collect();
            (grades, fold_overall(&observations))
        }
        ReportMode::Completion => {
            let grades = items
                .iter()
                .map(|item| {
                    let grade = oracle.best_score_of(item, member)?.unwrap_or(0.0);
                    Ok::<_, anyhow::Error>(ItemResult::Completion { grade })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let totals = OverallTotals {
                total_points: grades.iter().map(ItemResult::points).sum(),
                ..OverallTotals::default()
            };
            (grades, totals)
        }
    };

    debug!(
        member_id = %member.id,
        username = %member.username,
        total_points = totals.total_points,
        is_contest = totals.is_contest,
        "aggregated member"
    );

    Ok(MemberSummary {
        member_id: member.id.clone(),
        sid: String::new(),
        last_name: identity.last_name,
        first_name: identity.first_name,
        section: identity.section,
        cn: identity.cn,
        grades,
        total_points: totals.total_points,
        total_time: totals.total_time,
        best_submission_date: totals.best_submission_date,
        is_contest: totals.is_contest,
    })
}
