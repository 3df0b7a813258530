use anyhow::{Context, Result};
use std::time::Duration as StdDuration;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn utc_from_timestamp(ts: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(ts).unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Parse an RFC 3339 timestamp, e.g. `2024-03-01T00:00:00Z`.
pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339).with_context(|| format!("invalid timestamp: {s}"))
}

pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

pub fn parse_range(spec: &str) -> Result<Duration> {
    let std = humantime::parse_duration(spec).context("invalid duration format")?;
    Ok(duration_from_std(std))
}

pub fn duration_from_std(std: StdDuration) -> Duration {
    Duration::new(std.as_secs() as i64, std.subsec_nanos() as i32)
}
