use time::macros::datetime;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::interval::{DateRange, Interval};
use crate::models::{ArchiveKind, EnergyAggregation, Quantity, RowsQuery};
use crate::rows::{RowSource, Rows};
use crate::series::TimeSeries;
use crate::slice::slice;

/// Store-wide default bounds substituted for the open side of a
/// half-bounded interval; no archive holds rows outside them.
const STORE_RANGE_MIN: OffsetDateTime = datetime!(1970-01-01 0:00 UTC);
const STORE_RANGE_MAX: OffsetDateTime = datetime!(9999-12-31 23:59:59 UTC);

/// Read access to one group's archive over any `RowSource`.
pub struct Archive<'a, S: RowSource + ?Sized> {
    source: &'a S,
    group: Uuid,
    arch: ArchiveKind,
}

impl<'a, S: RowSource + ?Sized> Archive<'a, S> {
    pub fn new(source: &'a S, group: Uuid, arch: ArchiveKind) -> Self {
        Self {
            source,
            group,
            arch,
        }
    }

    /// The overall span of available data, derived by walking every row
    /// with a placeholder quantity and keeping the first and last
    /// timestamps. A single-row archive yields the degenerate `[t, t]`
    /// interval; an empty one yields `None`.
    pub fn fetch_interval(&self) -> Result<Option<Interval>> {
        let quantities = [Quantity::placeholder()];
        let rows = match self.source.open_rows(
            self.group,
            self.arch,
            None,
            &quantities,
            0,
            EnergyAggregation::default(),
        )? {
            Some(rows) => rows,
            None => return Ok(None),
        };

        let mut first = None;
        let mut last = None;
        for (ts, _) in rows {
            if first.is_none() {
                first = Some(ts);
            }
            last = Some(ts);
        }
        Ok(first.map(|start| Interval::bounded(start, last.unwrap_or(start))))
    }

    /// Fetch decoded rows for the query's interval.
    ///
    /// The store only accepts closed ranges, so a half-bounded interval is
    /// resolved against the store-wide span first and the resulting
    /// sequence is sliced back to the interval actually requested. "No
    /// data" comes back as an empty sequence.
    pub fn fetch_rows(&self, query: &RowsQuery) -> Result<Rows> {
        let interval = query.interval.ok_or(Error::MissingInterval)?;

        let range = if interval.is_unbounded() {
            None
        } else if interval.is_bounded() {
            Some(interval.to_date_range()?)
        } else {
            match resolve_half_bounded(interval)? {
                Some(range) => Some(range),
                None => return Ok(empty_rows()),
            }
        };

        let rows = match self.source.open_rows(
            self.group,
            self.arch,
            range,
            &query.quantities,
            query.aggregation,
            query.energy,
        )? {
            Some(rows) => rows,
            None => return Ok(empty_rows()),
        };

        if interval.is_half_bounded() {
            Ok(Box::new(slice(rows, interval)))
        } else {
            Ok(rows)
        }
    }

    /// Materialize a query into a time series container.
    pub fn fetch_series(&self, query: &RowsQuery) -> Result<TimeSeries<Vec<f32>>> {
        Ok(self.fetch_rows(query)?.collect())
    }

    pub fn fetch_quantities(&self, range: DateRange) -> Result<Vec<Quantity>> {
        self.source.quantities(self.group, self.arch, range)
    }
}

/// Fill the open side of `interval` with the store-wide default bound, so
/// the closed-range conversion succeeds. The widened result is what the
/// store sees; the caller slices the rows back to the true interval.
/// `None` when the interval lies entirely outside the store-wide bounds.
fn resolve_half_bounded(interval: Interval) -> Result<Option<DateRange>> {
    debug!("substituting store-wide bound for half-bounded interval");
    let store_wide = Interval::bounded(STORE_RANGE_MIN, STORE_RANGE_MAX);
    match interval.overlap(&store_wide) {
        Some(widened) => Ok(Some(widened.to_date_range()?)),
        None => Ok(None),
    }
}

fn empty_rows() -> Rows {
    Box::new(std::iter::empty())
}
