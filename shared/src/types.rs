//! Common types used across the platform

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open UTC time range `[start, end)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Range of `days` days ending at `end` (exclusive)
    pub fn trailing(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether the range still reaches into the future relative to `now`
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.end > now
    }
}

/// Granularity of a report run
///
/// Drives cache lifetimes and whether the (expensive) dead-stock pass runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Today,
    Daily,
    Weekly,
    Monthly,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Today => "today",
            ReportPeriod::Daily => "daily",
            ReportPeriod::Weekly => "weekly",
            ReportPeriod::Monthly => "monthly",
        }
    }

    /// Weekly and monthly runs are coarse-grained
    pub fn is_coarse(&self) -> bool {
        matches!(self, ReportPeriod::Weekly | ReportPeriod::Monthly)
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(ReportPeriod::Today),
            "daily" | "day" | "yesterday" => Ok(ReportPeriod::Daily),
            "weekly" | "week" => Ok(ReportPeriod::Weekly),
            "monthly" | "month" => Ok(ReportPeriod::Monthly),
            other => Err(format!("unknown report period: {}", other)),
        }
    }
}

/// Normalize a platform identifier to its numeric tail.
///
/// `gid://shopify/ProductVariant/123` and `"123"` both become `"123"`.
/// Query strings some global IDs carry (`...?inventory_item_id=9`) are dropped.
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_query = trimmed.split('?').next().unwrap_or(trimmed);
    without_query
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}

/// Build a global ID for the GraphQL generation of the API
pub fn to_global_id(resource: &str, id: &str) -> String {
    if id.starts_with("gid://") {
        id.to_string()
    } else {
        format!("gid://shopify/{}/{}", resource, normalize_id(id))
    }
}
