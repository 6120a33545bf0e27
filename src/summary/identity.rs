//! Composite identity strings.
//!
//! Rosters store a member's display identity as one delimited string in the
//! last-name column. Overall reports use `section_cn_last_first`; completion
//! reports use `sid_section_last_first`. The leading student id only counts
//! towards the arity check; report rows keep `sid` empty.

use super::model::ReportMode;

pub const IDENTITY_FIELDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityLayout {
    /// `section_cn_last_first`
    SectionClassNumber,
    /// `sid_section_last_first`
    StudentIdSection,
}

impl IdentityLayout {
    pub fn for_mode(mode: ReportMode) -> Self {
        match mode {
            ReportMode::Overall => IdentityLayout::SectionClassNumber,
            ReportMode::Completion => IdentityLayout::StudentIdSection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub section: String,
    pub cn: Option<String>,
    pub last_name: String,
    pub first_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArityMismatch {
    pub expected: usize,
    pub found: usize,
}

pub fn parse_identity(
    raw: &str,
    delimiter: &str,
    layout: IdentityLayout,
) -> Result<Identity, ArityMismatch> {
    if delimiter.is_empty() {
        return Err(ArityMismatch {
            expected: IDENTITY_FIELDS,
            found: 1,
        });
    }
    let parts: Vec<&str> = raw.split(delimiter).collect();
    let [first, second, last_name, first_name] = parts.as_slice() else {
        return Err(ArityMismatch {
            expected: IDENTITY_FIELDS,
            found: parts.len(),
        });
    };

    let identity = match layout {
        IdentityLayout::SectionClassNumber => Identity {
            section: first.to_string(),
            cn: Some(second.to_string()),
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
        },
        IdentityLayout::StudentIdSection => Identity {
            section: second.to_string(),
            cn: None,
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
        },
    };
    Ok(identity)
}
