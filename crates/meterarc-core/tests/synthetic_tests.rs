use meterarc_core::{
    Archive, ArchiveKind, DateRange, Error, Group, Interval, Quantity, RowsQuery,
    SyntheticArchive,
};
use time::macros::datetime;
use time::Duration;
use uuid::Uuid;

fn group_id() -> Uuid {
    Uuid::from_u128(0x00c0_ffee)
}

fn generator(seed: i64, span: DateRange) -> SyntheticArchive {
    SyntheticArchive::new(seed, span, vec![Group::new(group_id(), "Site A")])
        .with_quantities(vec![Quantity::new("P", Some("kW"))])
}

fn span_100s() -> DateRange {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    DateRange::new(t0, t0 + Duration::seconds(100))
}

fn fetch(
    source: &SyntheticArchive,
    arch: ArchiveKind,
    quantities: Vec<Quantity>,
    interval: Interval,
) -> Vec<(time::OffsetDateTime, Vec<f32>)> {
    Archive::new(source, group_id(), arch)
        .fetch_rows(&RowsQuery::new(quantities, interval))
        .expect("query succeeds")
        .collect()
}

#[test]
fn identical_queries_reproduce_the_same_series() {
    let source = generator(42, span_100s());
    let interval = span_100s().to_interval();
    let quantities = vec![Quantity::new("U1", None), Quantity::new("I1", None)];

    let first = fetch(&source, ArchiveKind::Main, quantities.clone(), interval);
    let second = fetch(&source, ArchiveKind::Main, quantities, interval);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn changing_the_quantity_changes_the_series() {
    let source = generator(42, span_100s());
    let interval = span_100s().to_interval();

    let a = fetch(&source, ArchiveKind::Main, vec![Quantity::new("A", None)], interval);
    let b = fetch(&source, ArchiveKind::Main, vec![Quantity::new("B", None)], interval);
    assert_ne!(a, b);
}

#[test]
fn changing_the_group_changes_the_series() {
    let other = Uuid::from_u128(0x0b5e_55ed);
    let source = SyntheticArchive::new(
        42,
        span_100s(),
        vec![Group::new(group_id(), "Site A"), Group::new(other, "Site B")],
    );
    let query = RowsQuery::new(vec![Quantity::new("P", None)], span_100s().to_interval());

    let a: Vec<_> = Archive::new(&source, group_id(), ArchiveKind::Main)
        .fetch_rows(&query)
        .expect("query succeeds")
        .collect();
    let b: Vec<_> = Archive::new(&source, other, ArchiveKind::Main)
        .fetch_rows(&query)
        .expect("query succeeds")
        .collect();
    assert_ne!(a, b);
}

#[test]
fn changing_the_range_changes_the_values() {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    let source = generator(42, DateRange::new(t0, t0 + Duration::seconds(200)));
    let quantity = vec![Quantity::new("P", None)];

    let short = Interval::bounded(t0, t0 + Duration::seconds(30));
    let long = Interval::bounded(t0, t0 + Duration::seconds(60));
    let a = fetch(&source, ArchiveKind::Main, quantity.clone(), short);
    let b = fetch(&source, ArchiveKind::Main, quantity, long);
    // Same start times, but the range is part of the seed.
    assert_ne!(a[0].1, b[0].1);
}

#[test]
fn cumulative_streams_never_decrease() {
    let source = generator(7, span_100s());
    let rows = fetch(
        &source,
        ArchiveKind::ElectricityMeter,
        vec![Quantity::new("A+", None), Quantity::new("A-", None)],
        span_100s().to_interval(),
    );
    assert!(rows.len() > 2);
    for pair in rows.windows(2) {
        for (prev, next) in pair[0].1.iter().zip(&pair[1].1) {
            assert!(next >= prev, "cumulative sample decreased: {prev} -> {next}");
        }
    }
}

#[test]
fn seed_five_scenario_produces_three_rows() {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    let source = generator(5, span_100s());
    let rows = fetch(
        &source,
        ArchiveKind::Main,
        vec![Quantity::new("P", None)],
        Interval::bounded(t0, t0 + Duration::seconds(30)),
    );

    let times: Vec<_> = rows.iter().map(|(ts, _)| *ts).collect();
    assert_eq!(
        times,
        vec![
            t0,
            t0 + Duration::seconds(10),
            t0 + Duration::seconds(20),
        ]
    );
    assert!(rows.iter().all(|(_, values)| values.len() == 1));
}

#[test]
fn unknown_group_fails_before_any_row() {
    let source = generator(1, span_100s());
    let stranger = Uuid::from_u128(0xdead_beef);
    let err = Archive::new(&source, stranger, ArchiveKind::Main)
        .fetch_rows(&RowsQuery::new(
            vec![Quantity::new("P", None)],
            span_100s().to_interval(),
        ))
        .err()
        .expect("unknown group must fail");
    assert!(matches!(err, Error::InvalidGroup(id) if id == stranger));
}

#[test]
fn missing_interval_is_an_error() {
    let source = generator(1, span_100s());
    let query = RowsQuery {
        quantities: vec![Quantity::new("P", None)],
        interval: None,
        aggregation: 0,
        energy: Default::default(),
    };
    let err = Archive::new(&source, group_id(), ArchiveKind::Main)
        .fetch_rows(&query)
        .err()
        .expect("missing interval must fail");
    assert!(matches!(err, Error::MissingInterval));
}

#[test]
fn disjoint_range_yields_no_rows() {
    let source = generator(1, span_100s());
    let far_future = datetime!(2030-01-01 0:00 UTC);
    let rows = fetch(
        &source,
        ArchiveKind::Main,
        vec![Quantity::new("P", None)],
        Interval::bounded(far_future, far_future + Duration::hours(1)),
    );
    assert!(rows.is_empty());
}

#[test]
fn unbounded_interval_walks_the_whole_span() {
    let source = generator(3, span_100s());
    let rows = fetch(
        &source,
        ArchiveKind::Main,
        vec![Quantity::new("P", None)],
        Interval::unbounded(),
    );
    // 100 s span at a 10 s step, end exclusive.
    assert_eq!(rows.len(), 10);
}

#[test]
fn fetch_interval_spans_first_to_last_row() {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    let source = generator(3, span_100s());
    let interval = Archive::new(&source, group_id(), ArchiveKind::Main)
        .fetch_interval()
        .expect("query succeeds")
        .expect("generator has data");
    assert_eq!(interval.start, Some(t0));
    assert_eq!(interval.end, Some(t0 + Duration::seconds(90)));
}

#[test]
fn fetch_interval_of_zero_span_is_none() {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    let source = generator(3, DateRange::new(t0, t0));
    let interval = Archive::new(&source, group_id(), ArchiveKind::Main)
        .fetch_interval()
        .expect("query succeeds");
    assert_eq!(interval, None);
}

#[test]
fn half_bounded_interval_slices_from_the_start_bound() {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    let source = generator(9, span_100s());
    let cut = t0 + Duration::seconds(30);
    let rows = fetch(
        &source,
        ArchiveKind::Main,
        vec![Quantity::new("P", None)],
        Interval::starting_at(cut),
    );

    let times: Vec<_> = rows.iter().map(|(ts, _)| *ts).collect();
    assert_eq!(times.first(), Some(&cut));
    assert_eq!(times.last(), Some(&(t0 + Duration::seconds(90))));
    assert_eq!(times.len(), 7);
    assert!(times.iter().all(|ts| *ts >= cut));
    assert!(times.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn fetch_series_materializes_rows_in_order() {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    let source = generator(11, span_100s());
    let series = Archive::new(&source, group_id(), ArchiveKind::Main)
        .fetch_series(&RowsQuery::new(
            vec![Quantity::new("P", None)],
            Interval::bounded(t0, t0 + Duration::seconds(30)),
        ))
        .expect("query succeeds");
    assert_eq!(series.len(), 3);
    assert_eq!(series.start_time(), Some(t0));
    assert_eq!(series.end_time(), Some(t0 + Duration::seconds(20)));
}

#[test]
fn quantities_come_from_the_configured_catalog() {
    let source = generator(1, span_100s());
    let quantities = Archive::new(&source, group_id(), ArchiveKind::Main)
        .fetch_quantities(span_100s())
        .expect("query succeeds");
    assert_eq!(quantities, vec![Quantity::new("P", Some("kW"))]);

    let err = Archive::new(&source, Uuid::from_u128(1), ArchiveKind::Main)
        .fetch_quantities(span_100s())
        .expect_err("unknown group must fail");
    assert!(matches!(err, Error::InvalidGroup(_)));
}
