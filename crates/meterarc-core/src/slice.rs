use crate::interval::Interval;
use crate::rows::Row;

/// Trim an ordered row sequence back to `interval` in a single forward
/// pass, preserving order. Bounded sides are inclusive, open sides pass
/// everything through.
///
/// Used after a half-bounded query interval was widened to the store-wide
/// closed range: the widened query may return rows the caller never asked
/// for, and this drops them.
pub fn slice<I>(rows: I, interval: Interval) -> impl Iterator<Item = Row>
where
    I: Iterator<Item = Row>,
{
    rows.skip_while(move |(ts, _)| interval.start.map_or(false, |start| *ts < start))
        .take_while(move |(ts, _)| interval.end.map_or(true, |end| *ts <= end))
}
