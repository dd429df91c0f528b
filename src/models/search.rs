// file: src/models/search.rs
// description: search filter over code membership and issue-date range

use crate::models::record::PrescriptionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub code: Option<String>,
    pub issue_date_from: Option<DateTime<Utc>>,
    pub issue_date_to: Option<DateTime<Utc>>,
}

impl SearchCriteria {
    pub fn by_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// A record without an issue date never satisfies a date bound.
    pub fn matches(&self, record: &PrescriptionRecord) -> bool {
        if let Some(code) = &self.code
            && !record.has_code(code)
        {
            return false;
        }

        if let Some(from) = self.issue_date_from {
            match record.issue_date {
                Some(date) if date >= from => {}
                _ => return false,
            }
        }

        if let Some(to) = self.issue_date_to {
            match record.issue_date {
                Some(date) if date <= to => {}
                _ => return false,
            }
        }

        true
    }

    /// Filters and orders newest upload first.
    pub fn apply<I>(&self, records: I) -> Vec<PrescriptionRecord>
    where
        I: IntoIterator<Item = PrescriptionRecord>,
    {
        let mut matched: Vec<_> = records.into_iter().filter(|r| self.matches(r)).collect();
        sort_newest_first(&mut matched);
        matched
    }
}

pub fn sort_newest_first(records: &mut [PrescriptionRecord]) {
    records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
}
