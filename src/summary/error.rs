use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("access denied: {requester} may not view summaries")]
    AccessDenied { requester: String },

    #[error("group not found: {slug}")]
    GroupNotFound { slug: String },

    /// A composite identity string did not split into the expected fields.
    /// Fatal for the whole report.
    #[error("member {member_id} has malformed identity {raw:?}: expected {expected} fields, found {found}")]
    DataIntegrity {
        member_id: String,
        raw: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl SummaryError {
    pub fn code(&self) -> &'static str {
        match self {
            SummaryError::AccessDenied { .. } => "access_denied",
            SummaryError::GroupNotFound { .. } => "not_found",
            SummaryError::DataIntegrity { .. } => "data_integrity",
            SummaryError::Backend(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            SummaryError::GroupNotFound { slug } => Some(json!({ "group": slug })),
            SummaryError::DataIntegrity {
                member_id,
                raw,
                expected,
                found,
            } => Some(json!({
                "memberId": member_id,
                "raw": raw,
                "expected": expected,
                "found": found,
            })),
            SummaryError::AccessDenied { .. } | SummaryError::Backend(_) => None,
        }
    }
}
