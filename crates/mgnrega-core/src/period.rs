//! Reporting-period identity and fiscal-month ordering.

use crate::record::{Record, fields};

/// Indian fiscal year month sequence, April first.
pub const FISCAL_MONTHS: [&str; 12] = [
    "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec", "Jan", "Feb", "Mar",
];

/// Position of a period label in [`FISCAL_MONTHS`].
///
/// Matches on the first three characters of the trimmed label, ignoring
/// ASCII case, so `"April"`, `"apr"` and `"APR"` all map to `0`.
pub fn fiscal_month_index(label: &str) -> Option<usize> {
    let prefix: String = label.trim().chars().take(3).collect();
    FISCAL_MONTHS
        .iter()
        .position(|month| month.eq_ignore_ascii_case(&prefix))
}

/// How wide the grouping key for snapshots is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyScope {
    /// `(period label, fiscal year)`: a single region's series.
    #[default]
    Period,
    /// Period key widened with state and district, for batches that span
    /// several regions.
    RegionQualified,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionKey {
    pub state: String,
    pub district: String,
}

/// Identity of a reporting period; snapshots sharing one are revisions of
/// the same statistics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeriodKey {
    pub label: String,
    pub fiscal_year: String,
    pub region: Option<RegionKey>,
}

impl PeriodKey {
    pub fn from_record(record: &Record, scope: KeyScope) -> Self {
        let trimmed = |field: &str| record.text(field).unwrap_or("").trim().to_string();

        let region = match scope {
            KeyScope::Period => None,
            KeyScope::RegionQualified => Some(RegionKey {
                state: trimmed(fields::STATE_NAME),
                district: trimmed(fields::DISTRICT_NAME),
            }),
        };

        Self {
            label: trimmed(fields::MONTH),
            fiscal_year: trimmed(fields::FIN_YEAR),
            region,
        }
    }
}
