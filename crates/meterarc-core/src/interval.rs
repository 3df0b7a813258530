use time::OffsetDateTime;

use crate::error::{Error, Result};

/// A time span with independently optional bounds.
///
/// Invariant: when both bounds are present, `start <= end`. A span with
/// exactly one bound is "half-bounded"; with neither it covers everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}

impl Interval {
    pub fn new(start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> Self {
        if let (Some(s), Some(e)) = (start, end) {
            debug_assert!(s <= e, "interval start must not exceed end");
        }
        Self { start, end }
    }

    pub fn bounded(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self::new(Some(start), Some(end))
    }

    pub fn starting_at(start: OffsetDateTime) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn ending_at(end: OffsetDateTime) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// True iff exactly one bound is present.
    pub fn is_half_bounded(&self) -> bool {
        self.start.is_some() != self.end.is_some()
    }

    /// Membership with bounded sides inclusive and open sides unconstrained.
    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        let after_start = self.start.map_or(true, |s| ts >= s);
        let before_end = self.end.map_or(true, |e| ts <= e);
        after_start && before_end
    }

    /// Intersection of two spans: the later of the starts, the earlier of
    /// the ends. `None` when the computed bounds cross.
    pub fn overlap(&self, other: &Interval) -> Option<Interval> {
        let start = match (self.start, other.start) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return None;
            }
        }
        Some(Interval { start, end })
    }

    /// Convert to the closed range shape the store requires. Fails unless
    /// both bounds are present; half-bounded spans must be resolved against
    /// a store-wide bound first.
    pub fn to_date_range(&self) -> Result<DateRange> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(DateRange::new(start, end)),
            _ => Err(Error::UnboundedInterval),
        }
    }
}

impl From<DateRange> for Interval {
    fn from(range: DateRange) -> Self {
        Interval::bounded(range.min, range.max)
    }
}

/// A closed time range, the only interval shape the store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub min: OffsetDateTime,
    pub max: OffsetDateTime,
}

impl DateRange {
    pub fn new(min: OffsetDateTime, max: OffsetDateTime) -> Self {
        debug_assert!(min <= max, "range min must not exceed max");
        Self { min, max }
    }

    pub fn to_interval(self) -> Interval {
        Interval::from(self)
    }
}
