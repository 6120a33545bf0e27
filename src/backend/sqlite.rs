use super::{AccessPolicy, GroupLookup, ItemCatalog, Roster, ScoringOracle};
use crate::summary::{Group, Member, ScoredItem};
use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use std::cmp::Ordering;
use tracing::warn;

/// Workspace-database implementation of every backend trait.
///
/// Stored timestamps are RFC 3339 text with any offset; ordering is always
/// done on parsed instants.
pub struct SqliteBackend<'a> {
    conn: &'a Connection,
}

#[derive(Debug, Clone, PartialEq)]
struct SubmissionRow {
    points: Option<f64>,
    date: Option<DateTime<Utc>>,
    contest_key: Option<String>,
    contest_start: Option<DateTime<Utc>>,
}

// Highest points first (ungraded last), then earliest instant (unparseable last).
fn best_first(a: &SubmissionRow, b: &SubmissionRow) -> Ordering {
    let by_points = match (a.points, b.points) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    let by_date = match (a.date, b.date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_points.then(by_date)
}

impl<'a> SqliteBackend<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn submissions(
        &self,
        item: &ScoredItem,
        member: &Member,
    ) -> anyhow::Result<Vec<SubmissionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.points, s.date, s.contest_key, c.start_time
             FROM submissions s
             LEFT JOIN contests c ON c.key = s.contest_key
             WHERE s.problem_code = ? AND s.member_id = ?
             ORDER BY s.id",
        )?;
        let raw = stmt
            .query_map((&item.code, &member.id), |r| {
                Ok((
                    r.get::<_, Option<f64>>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, Option<String>>(3)?,
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(raw
            .into_iter()
            .map(|(points, date, contest_key, start)| SubmissionRow {
                points,
                date: parse_timestamp(&date),
                contest_key,
                contest_start: start.as_deref().and_then(parse_timestamp),
            })
            .collect())
    }

    fn best_submission(
        &self,
        item: &ScoredItem,
        member: &Member,
    ) -> anyhow::Result<Option<SubmissionRow>> {
        Ok(self.submissions(item, member)?.into_iter().min_by(best_first))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(v) => Some(v.with_timezone(&Utc)),
        Err(e) => {
            warn!(raw, error = %e, "ignoring unparseable timestamp");
            None
        }
    }
}

impl GroupLookup for SqliteBackend<'_> {
    fn find_group(&self, slug: &str) -> anyhow::Result<Option<Group>> {
        let group = self
            .conn
            .query_row(
                "SELECT slug, name FROM organizations WHERE slug = ?",
                [slug],
                |r| {
                    Ok(Group {
                        slug: r.get(0)?,
                        name: r.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(group)
    }
}

impl Roster for SqliteBackend<'_> {
    fn members_of(&self, group: &Group) -> anyhow::Result<Vec<Member>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, last_name
             FROM members
             WHERE organization_slug = ?
             ORDER BY last_name, id",
        )?;
        let members = stmt
            .query_map([&group.slug], |r| {
                Ok(Member {
                    id: r.get(0)?,
                    username: r.get(1)?,
                    display: r.get(2)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(members)
    }
}

impl ItemCatalog for SqliteBackend<'_> {
    fn items_matching(&self, prefixes: &[String]) -> anyhow::Result<Vec<ScoredItem>> {
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }
        // substr instead of LIKE: LIKE is case-insensitive and treats '_' as a wildcard.
        let clauses = std::iter::repeat("substr(code, 1, length(?)) = ?")
            .take(prefixes.len())
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT code, name, points FROM problems WHERE {} ORDER BY code",
            clauses
        );
        let mut bind_values: Vec<Value> = Vec::with_capacity(prefixes.len() * 2);
        for p in prefixes {
            bind_values.push(Value::Text(p.clone()));
            bind_values.push(Value::Text(p.clone()));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(bind_values), |r| {
                Ok(ScoredItem {
                    code: r.get(0)?,
                    name: r.get(1)?,
                    points: r.get(2)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(items)
    }
}

impl ScoringOracle for SqliteBackend<'_> {
    fn grade_of(&self, item: &ScoredItem, member: &Member) -> anyhow::Result<Option<f64>> {
        Ok(self.best_submission(item, member)?.and_then(|s| s.points))
    }

    fn best_time_of(
        &self,
        item: &ScoredItem,
        member: &Member,
    ) -> anyhow::Result<Option<TimeDelta>> {
        let best = self
            .submissions(item, member)?
            .into_iter()
            .filter(|s| s.contest_key.is_some())
            .min_by(best_first);
        let Some(SubmissionRow {
            date: Some(date),
            contest_start: Some(start),
            ..
        }) = best
        else {
            return Ok(None);
        };
        Ok(Some((date - start).max(TimeDelta::zero())))
    }

    fn containing_contest(&self, item: &ScoredItem, member: &Member) -> anyhow::Result<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT EXISTS(
               SELECT 1 FROM submissions
               WHERE problem_code = ? AND member_id = ? AND contest_key IS NOT NULL
             )",
            (&item.code, &member.id),
            |r| r.get(0),
        )?;
        Ok(found != 0)
    }

    fn best_submission_date_of(
        &self,
        item: &ScoredItem,
        member: &Member,
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.best_submission(item, member)?.and_then(|s| s.date))
    }

    fn best_score_of(&self, item: &ScoredItem, member: &Member) -> anyhow::Result<Option<f64>> {
        self.grade_of(item, member)
    }
}

impl AccessPolicy for SqliteBackend<'_> {
    fn may_view_summaries(&self, requester: &str) -> anyhow::Result<bool> {
        let flag: Option<i64> = self
            .conn
            .query_row(
                "SELECT is_superuser FROM users WHERE username = ?",
                [requester],
                |r| r.get(0),
            )
            .optional()?;
        Ok(flag.map(|v| v != 0).unwrap_or(false))
    }
}
