use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::interval::DateRange;
use crate::models::{ArchiveKind, EnergyAggregation, Group, Quantity};
use crate::rows::{Row, RowSource, Rows};
use crate::timeutils::format_timestamp;

/// Spacing between generated rows.
pub const SAMPLE_PERIOD: Duration = Duration::seconds(10);

/// Upper bound (exclusive) of an instantaneous sample.
const SAMPLE_MAX: f32 = 100.0;

/// Upper bound (exclusive) of one cumulative increment.
const INCREMENT_MAX: f32 = 1.0;

/// A deterministic stand-in for a real archive store.
///
/// Every value stream is seeded from the identity of the query (group id,
/// date range, quantity name) plus a generator-wide base seed, so the same
/// logical query always reproduces the same series, across runs.
#[derive(Debug, Clone)]
pub struct SyntheticArchive {
    seed: i64,
    span: DateRange,
    groups: Vec<Group>,
    catalog: Vec<Quantity>,
}

impl SyntheticArchive {
    pub fn new(seed: i64, span: DateRange, groups: Vec<Group>) -> Self {
        Self {
            seed,
            span,
            groups,
            catalog: Vec::new(),
        }
    }

    /// Set the quantity catalog reported by `quantities()` for every
    /// configured group.
    pub fn with_quantities(mut self, catalog: Vec<Quantity>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn span(&self) -> DateRange {
        self.span
    }

    fn check_group(&self, group: Uuid) -> Result<()> {
        if self.groups.iter().any(|g| g.id == group) {
            Ok(())
        } else {
            Err(Error::InvalidGroup(group))
        }
    }

    /// Seed of one quantity's stream. The string hashes are deliberately
    /// weak order-independent character sums; only stability matters.
    fn stream_seed(&self, group: Uuid, range: Option<&DateRange>, quantity: &Quantity) -> u64 {
        let group_hash = char_sum(&group.hyphenated().to_string());
        let range_hash = range.map_or(0, |r| {
            char_sum(&format_timestamp(r.min)).wrapping_add(char_sum(&format_timestamp(r.max)))
        });
        let quantity_hash = char_sum(&quantity.property);
        self.seed
            .wrapping_add(group_hash)
            .wrapping_add(range_hash)
            .wrapping_add(quantity_hash) as u64
    }
}

impl RowSource for SyntheticArchive {
    fn open_rows(
        &self,
        group: Uuid,
        arch: ArchiveKind,
        range: Option<DateRange>,
        quantities: &[Quantity],
        _aggregation: u32,
        _energy: EnergyAggregation,
    ) -> Result<Option<Rows>> {
        self.check_group(group)?;

        let cumulative = arch.is_cumulative();
        let streams: Vec<QuantitySeries> = quantities
            .iter()
            .map(|quantity| {
                QuantitySeries::new(self.stream_seed(group, range.as_ref(), quantity), cumulative)
            })
            .collect();

        let mut interval = self.span.to_interval();
        if let Some(range) = range {
            interval = match interval.overlap(&range.to_interval()) {
                Some(overlap) => overlap,
                None => return Ok(None),
            };
        }

        let start = interval.start.unwrap_or(self.span.min);
        let end = interval.end.unwrap_or(self.span.max);
        debug!(
            group = %group,
            start = %format_timestamp(start),
            end = %format_timestamp(end),
            streams = streams.len(),
            "generating synthetic rows"
        );
        Ok(Some(Box::new(SyntheticRows {
            time: start,
            end,
            streams,
        })))
    }

    fn quantities(
        &self,
        group: Uuid,
        _arch: ArchiveKind,
        _range: DateRange,
    ) -> Result<Vec<Quantity>> {
        self.check_group(group)?;
        Ok(self.catalog.clone())
    }
}

/// One quantity's seeded value stream. In cumulative mode each draw adds a
/// non-negative increment to a running total, so samples never decrease.
#[derive(Debug)]
struct QuantitySeries {
    rng: StdRng,
    cumulative: bool,
    total: f32,
}

impl QuantitySeries {
    fn new(seed: u64, cumulative: bool) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            cumulative,
            total: 0.0,
        }
    }

    fn next_value(&mut self) -> f32 {
        if self.cumulative {
            self.total += self.rng.gen_range(0.0..INCREMENT_MAX);
            self.total
        } else {
            self.rng.gen_range(0.0..SAMPLE_MAX)
        }
    }
}

/// Forward-only generated row cursor: steps from the resolved start in
/// `SAMPLE_PERIOD` increments while strictly before the resolved end.
struct SyntheticRows {
    time: OffsetDateTime,
    end: OffsetDateTime,
    streams: Vec<QuantitySeries>,
}

impl Iterator for SyntheticRows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.time >= self.end {
            return None;
        }
        let values = self
            .streams
            .iter_mut()
            .map(QuantitySeries::next_value)
            .collect();
        let row = (self.time, values);
        self.time += SAMPLE_PERIOD;
        Some(row)
    }
}

fn char_sum(s: &str) -> i64 {
    s.chars().fold(0i64, |acc, c| acc.wrapping_add(c as i64))
}
