use super::aggregate::aggregate_member;
use super::error::SummaryError;
use super::model::{Group, ItemResult, MemberSummary, ReportMode, ScoredItem};
use super::rank::{rank, RankRule};
use super::select::{headers, select_items};
use crate::backend::SummaryBackend;
use crate::config::TimeFormat;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub mode: ReportMode,
    pub group_slug: String,
    pub problem_prefix: String,
    pub ranked: bool,
    /// Display hint only; completion mode.
    pub zero_row: bool,
    pub requester: Option<String>,
    pub require_superuser: bool,
    pub identity_delimiter: String,
    /// Instant used as "now" for members without a submission date.
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub report_id: Uuid,
    pub mode: ReportMode,
    pub group: Group,
    pub headers: Vec<String>,
    pub items: Vec<ScoredItem>,
    pub student_grades: Vec<MemberSummary>,
    pub ranked: bool,
    pub is_contest: bool,
    pub zero_row: Option<bool>,
    pub generated_at: DateTime<Utc>,
}

/// Runs the full pipeline: access gate, group, items, roster, one row per
/// member, optional ranking.
pub fn build_report<B>(backend: &B, req: &ReportRequest) -> Result<Report, SummaryError>
where
    B: SummaryBackend + ?Sized,
{
    if req.require_superuser {
        let allowed = match req.requester.as_deref() {
            Some(who) => backend.may_view_summaries(who)?,
            None => false,
        };
        if !allowed {
            return Err(SummaryError::AccessDenied {
                requester: req
                    .requester
                    .clone()
                    .unwrap_or_else(|| "anonymous".to_string()),
            });
        }
    }

    let group = backend
        .find_group(&req.group_slug)?
        .ok_or_else(|| SummaryError::GroupNotFound {
            slug: req.group_slug.clone(),
        })?;

    let items = select_items(backend, &req.problem_prefix)?;
    let members = backend.members_of(&group)?;

    let mut rows = members
        .iter()
        .map(|m| aggregate_member(backend, m, &items, req.mode, &req.identity_delimiter))
        .collect::<Result<Vec<_>, _>>()?;

    let is_contest = req.mode == ReportMode::Overall && rows.iter().any(|r| r.is_contest);
    if req.ranked {
        rank(&mut rows, RankRule::for_report(req.mode, is_contest, req.as_of));
    }

    let report = assemble(req, group, items, rows, is_contest);
    info!(
        report_id = %report.report_id,
        group = %report.group.slug,
        mode = report.mode.as_str(),
        members = report.student_grades.len(),
        items = report.headers.len(),
        ranked = report.ranked,
        is_contest = report.is_contest,
        "summary report built"
    );
    Ok(report)
}

pub fn assemble(
    req: &ReportRequest,
    group: Group,
    items: Vec<ScoredItem>,
    student_grades: Vec<MemberSummary>,
    is_contest: bool,
) -> Report {
    Report {
        report_id: Uuid::new_v4(),
        mode: req.mode,
        group,
        headers: headers(&items),
        items,
        student_grades,
        ranked: req.ranked,
        is_contest,
        zero_row: match req.mode {
            ReportMode::Completion => Some(req.zero_row),
            ReportMode::Overall => None,
        },
        generated_at: req.as_of,
    }
}

fn format_hms(d: TimeDelta) -> String {
    let total = d.num_seconds().max(0);
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

fn timestamp(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn cell_json(cell: &ItemResult) -> Value {
    match cell {
        ItemResult::Timed { grade, time } => json!({
            "grade": grade,
            "time": time.map(|t| t.num_seconds()),
        }),
        ItemResult::Completion { grade } => json!({ "grade": grade }),
    }
}

fn row_json(row: &MemberSummary, mode: ReportMode, time_format: TimeFormat) -> Value {
    let mut out = json!({
        "memberId": row.member_id,
        "sid": row.sid,
        "lastName": row.last_name,
        "firstName": row.first_name,
        "section": row.section,
        "grades": row.grades.iter().map(cell_json).collect::<Vec<_>>(),
        "totalPoints": row.total_points,
    });
    if mode == ReportMode::Overall {
        out["cn"] = json!(row.cn);
        out["totalTime"] = json!(row.total_time.num_seconds());
        out["date"] = json!(row.best_submission_date.as_ref().map(timestamp));
        if time_format == TimeFormat::Hms {
            out["totalTimeText"] = json!(format_hms(row.total_time));
        }
    }
    out
}

impl Report {
    pub fn to_json(&self, time_format: TimeFormat) -> Value {
        let mut out = json!({
            "reportId": self.report_id.to_string(),
            "mode": self.mode.as_str(),
            "group": self.group,
            "problemHeaders": self.headers,
            "problems": self.items,
            "studentGrades": self
                .student_grades
                .iter()
                .map(|r| row_json(r, self.mode, time_format))
                .collect::<Vec<_>>(),
            "ranked": self.ranked,
            "isContest": self.is_contest,
            "generatedAt": timestamp(&self.generated_at),
        });
        if let Some(zero_row) = self.zero_row {
            out["zeroRow"] = json!(zero_row);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{secs, Cell, FakeBackend};
    use chrono::TimeZone;

    fn request(mode: ReportMode, prefix: &str) -> ReportRequest {
        ReportRequest {
            mode,
            group_slug: "cs12201".into(),
            problem_prefix: prefix.into(),
            ranked: true,
            zero_row: false,
            requester: Some("admin".into()),
            require_superuser: true,
            identity_delimiter: "_".into(),
            as_of: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    fn contest(grade: Option<f64>, time: Option<i64>) -> Cell {
        Cell {
            grade,
            time: time.map(secs),
            contest: true,
            date: None,
        }
    }

    fn two_member_group() -> FakeBackend {
        FakeBackend::with_group("cs12201")
            .member("m2", "201_02_Abad_Ben")
            .member("m1", "201_01_Cruz_Ana")
            .item("CS12-2")
            .item("CS12-1")
            .item("MATH-1")
            .cell("CS12-1", "m1", contest(Some(10.0), Some(5)))
            .cell("CS12-2", "m1", contest(Some(8.0), Some(3)))
            .cell("CS12-1", "m2", contest(None, None))
            .cell("CS12-2", "m2", contest(Some(2.0), Some(1)))
    }

    #[test]
    fn contest_scenario_ranks_by_points() {
        let backend = two_member_group();
        let report = build_report(&backend, &request(ReportMode::Overall, "CS12")).expect("report");

        assert_eq!(report.headers, vec!["CS12-1", "CS12-2"]);
        assert!(report.is_contest);
        assert!(report.ranked);
        assert_eq!(report.zero_row, None);

        let rows = &report.student_grades;
        assert_eq!(rows[0].member_id, "m1");
        assert_eq!(rows[0].total_points, 18.0);
        assert_eq!(rows[0].total_time, secs(5));
        assert_eq!(rows[1].member_id, "m2");
        assert_eq!(rows[1].total_points, 2.0);
        assert_eq!(rows[1].total_time, secs(1));
    }

    #[test]
    fn one_contest_member_makes_the_report_contest_scoped() {
        let practice = |grade: f64, day: u32| Cell {
            grade: Some(grade),
            time: None,
            contest: false,
            date: Some(Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()),
        };
        let backend = FakeBackend::with_group("cs12201")
            .member("c", "201_01_Cruz_Ana")
            .member("x", "201_02_Diaz_Ben")
            .member("p", "201_03_Perez_Cy")
            .item("P1")
            .item("P2")
            .cell("P1", "c", contest(Some(5.0), Some(100)))
            .cell("P1", "x", contest(Some(2.0), Some(7)))
            .cell("P2", "x", practice(1.0, 2))
            .cell("P1", "p", practice(5.0, 2));
        let report = build_report(&backend, &request(ReportMode::Overall, "P")).expect("report");

        assert!(report.is_contest);
        let rows = &report.student_grades;
        let ids: Vec<&str> = rows.iter().map(|r| r.member_id.as_str()).collect();
        // Equal points: the practice-only member has no contest time and goes first.
        assert_eq!(ids, vec!["p", "c", "x"]);

        assert!(!rows[0].is_contest);
        assert_eq!(rows[0].total_time, TimeDelta::zero());
        assert!(rows[0].best_submission_date.is_some());
        assert!(rows[1].is_contest);
        assert_eq!(rows[1].total_time, secs(100));
        assert!(rows[2].is_contest);
        assert_eq!(rows[2].total_points, 3.0);
        assert_eq!(rows[2].total_time, secs(7));
        assert!(rows[2].best_submission_date.is_some());
    }

    #[test]
    fn json_exposes_member_ids_and_selected_problems() {
        let backend = two_member_group();
        let report = build_report(&backend, &request(ReportMode::Overall, "CS12")).expect("report");
        let v = report.to_json(TimeFormat::Seconds);
        assert_eq!(v["problems"][0]["code"], "CS12-1");
        assert_eq!(v["problems"].as_array().map(Vec::len), Some(2));
        assert_eq!(v["studentGrades"][0]["memberId"], "m1");
        assert!(v["studentGrades"][0].get("totalTimeText").is_none());
    }

    #[test]
    fn unranked_keeps_roster_order() {
        let backend = two_member_group();
        let mut req = request(ReportMode::Overall, "CS12");
        req.ranked = false;
        let report = build_report(&backend, &req).expect("report");
        let ids: Vec<&str> = report
            .student_grades
            .iter()
            .map(|r| r.member_id.as_str())
            .collect();
        assert_eq!(ids, vec!["m2", "m1"]);
    }

    #[test]
    fn access_is_checked_before_anything_else() {
        let mut backend = two_member_group();
        backend.fail_roster = true;

        let mut req = request(ReportMode::Overall, "CS12");
        req.requester = Some("student".into());
        let e = build_report(&backend, &req).expect_err("denied");
        assert_eq!(e.code(), "access_denied");

        req.requester = None;
        let e = build_report(&backend, &req).expect_err("denied");
        assert_eq!(e.code(), "access_denied");

        req.require_superuser = false;
        let e = build_report(&backend, &req).expect_err("roster fails");
        assert_eq!(e.code(), "db_query_failed");
    }

    #[test]
    fn unknown_group_is_not_found() {
        let backend = two_member_group();
        let mut req = request(ReportMode::Overall, "CS12");
        req.group_slug = "nope".into();
        let e = build_report(&backend, &req).expect_err("missing");
        assert!(matches!(e, SummaryError::GroupNotFound { .. }));
    }

    #[test]
    fn one_bad_identity_fails_the_whole_report() {
        let backend = two_member_group().member("m3", "broken");
        let e = build_report(&backend, &request(ReportMode::Overall, "CS12")).expect_err("bad row");
        assert_eq!(e.code(), "data_integrity");
    }

    #[test]
    fn completion_report_json_shape() {
        let backend = FakeBackend::with_group("cs12201")
            .member("m1", "2019-1_201_Cruz_Ana")
            .item("A1")
            .cell("A1", "m1", contest(Some(4.0), Some(9)));
        let mut req = request(ReportMode::Completion, "A");
        req.zero_row = true;
        let report = build_report(&backend, &req).expect("report");
        assert!(!report.is_contest);

        let v = report.to_json(TimeFormat::Seconds);
        assert_eq!(v["mode"], "completion");
        assert_eq!(v["zeroRow"], true);
        assert_eq!(v["problemHeaders"], json!(["A1"]));
        let row = &v["studentGrades"][0];
        assert_eq!(row["grades"], json!([{ "grade": 4.0 }]));
        assert!(row.get("cn").is_none());
        assert!(row.get("totalTime").is_none());
    }

    #[test]
    fn overall_json_carries_time_and_date() {
        let backend = two_member_group();
        let report = build_report(&backend, &request(ReportMode::Overall, "CS12")).expect("report");
        let v = report.to_json(TimeFormat::Hms);
        assert!(v.get("zeroRow").is_none());
        let row = &v["studentGrades"][1];
        assert_eq!(row["cn"], "02");
        assert_eq!(row["totalTime"], 1);
        assert_eq!(row["totalTimeText"], "0:00:01");
        assert_eq!(row["date"], Value::Null);
        assert_eq!(row["grades"][0], json!({ "grade": null, "time": null }));
        assert_eq!(v["generatedAt"], "2024-06-01T00:00:00Z");
    }

    #[test]
    fn empty_prefix_gives_rows_without_cells() {
        let backend = two_member_group();
        let report = build_report(&backend, &request(ReportMode::Overall, "")).expect("report");
        assert!(report.headers.is_empty());
        assert_eq!(report.student_grades.len(), 2);
        assert!(report.student_grades.iter().all(|r| r.grades.is_empty()));
        assert!(!report.is_contest);
    }

    #[test]
    fn format_hms_pads_minutes_and_seconds() {
        assert_eq!(format_hms(TimeDelta::seconds(3725)), "1:02:05");
    }
}
