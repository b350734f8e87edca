//! Chunk planning over a time domain or a remote key prefix.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use ocean_common::{BoundingBox, TimeRange};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunk::ChunkDescriptor;
use crate::error::{PlanError, SourceError};

/// Step size between consecutive window boundaries.
///
/// Written in job files as a single-key map such as `months: 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GranularityMap", into = "GranularityMap")]
pub enum Granularity {
    Months(u32),
    Days(u32),
    Hours(u32),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct GranularityMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    months: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hours: Option<u32>,
}

impl TryFrom<GranularityMap> for Granularity {
    type Error = String;

    fn try_from(map: GranularityMap) -> Result<Self, Self::Error> {
        match (map.months, map.days, map.hours) {
            (Some(n), None, None) => Ok(Self::Months(n)),
            (None, Some(n), None) => Ok(Self::Days(n)),
            (None, None, Some(n)) => Ok(Self::Hours(n)),
            _ => Err("granularity needs exactly one of months, days or hours".to_string()),
        }
    }
}

impl From<Granularity> for GranularityMap {
    fn from(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Months(n) => Self {
                months: Some(n),
                ..Self::default()
            },
            Granularity::Days(n) => Self {
                days: Some(n),
                ..Self::default()
            },
            Granularity::Hours(n) => Self {
                hours: Some(n),
                ..Self::default()
            },
        }
    }
}

impl Granularity {
    pub fn validate(&self) -> Result<(), PlanError> {
        let n = match self {
            Self::Months(n) | Self::Days(n) | Self::Hours(n) => *n,
        };
        if n == 0 {
            return Err(PlanError::InvalidGranularity(self.to_string()));
        }
        Ok(())
    }

    /// Next boundary after `t`, or `None` when it is not representable.
    ///
    /// Monthly steps land on `min(day, 28)` and keep the time of day.
    pub fn advance(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::Months(n) => {
                let months = t.year() as i64 * 12 + t.month0() as i64 + n as i64;
                let year = i32::try_from(months.div_euclid(12)).ok()?;
                let month = months.rem_euclid(12) as u32 + 1;
                let date = NaiveDate::from_ymd_opt(year, month, t.day().min(28))?;
                Some(date.and_time(t.time()).and_utc())
            }
            Self::Days(n) => t.checked_add_signed(Duration::days(n as i64)),
            Self::Hours(n) => t.checked_add_signed(Duration::hours(n as i64)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Months(n) => write!(f, "{} month(s)", n),
            Self::Days(n) => write!(f, "{} day(s)", n),
            Self::Hours(n) => write!(f, "{} hour(s)", n),
        }
    }
}

/// Partitions a time domain into consecutive half-open windows.
#[derive(Debug, Clone)]
pub struct TimeWindowPlanner {
    domain: TimeRange,
    granularity: Granularity,
    bbox: Option<BoundingBox>,
}

impl TimeWindowPlanner {
    pub fn new(
        domain: TimeRange,
        granularity: Granularity,
        bbox: Option<BoundingBox>,
    ) -> Result<Self, PlanError> {
        granularity.validate()?;
        Ok(Self {
            domain,
            granularity,
            bbox,
        })
    }

    pub fn domain(&self) -> TimeRange {
        self.domain
    }

    /// Lazily iterate the windows in chronological order.
    ///
    /// Each call starts over from the beginning of the domain.
    pub fn chunks(&self) -> TimeWindows {
        TimeWindows {
            cursor: self.domain.start,
            end: self.domain.end,
            granularity: self.granularity,
            bbox: self.bbox,
        }
    }
}

/// Iterator returned by [`TimeWindowPlanner::chunks`].
#[derive(Debug, Clone)]
pub struct TimeWindows {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    bbox: Option<BoundingBox>,
}

impl Iterator for TimeWindows {
    type Item = ChunkDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }

        let next = match self.granularity.advance(self.cursor) {
            Some(next) if next > self.cursor && next < self.end => next,
            _ => self.end,
        };

        let range = TimeRange::new(self.cursor, next);
        self.cursor = next;
        Some(ChunkDescriptor::window(range, self.bbox))
    }
}

/// Lists object keys under a prefix.
#[async_trait]
pub trait KeyLister: Send + Sync {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, SourceError>;
}

/// One chunk per remote object under a prefix.
#[derive(Debug, Clone)]
pub struct KeyPrefixPlanner {
    prefix: String,
    suffix: Option<String>,
}

impl KeyPrefixPlanner {
    pub fn new(prefix: impl Into<String>, suffix: Option<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix,
        }
    }

    /// List the prefix and keep matching keys in listing order.
    pub async fn plan(&self, lister: &dyn KeyLister) -> Result<Vec<ChunkDescriptor>, PlanError> {
        let keys = lister.list_keys(&self.prefix).await?;
        let listed = keys.len();

        let chunks: Vec<ChunkDescriptor> = keys
            .into_iter()
            .filter(|key| !key.ends_with('/'))
            .filter(|key| match &self.suffix {
                Some(suffix) => key.ends_with(suffix.as_str()),
                None => true,
            })
            .map(ChunkDescriptor::object)
            .collect();

        debug!(listed, kept = chunks.len(), "Filtered source keys");
        info!(prefix = %self.prefix, chunks = chunks.len(), "Planned key-prefix chunks");
        Ok(chunks)
    }
}
