use meterarc_core::{Error, FieldKind, FieldSlot, RowBuffer, RowLayout};
use time::macros::datetime;

fn pack_row(ts: i64, voltage: f32, energy: f64) -> Vec<u8> {
    let mut row = Vec::new();
    row.extend_from_slice(&ts.to_le_bytes());
    row.extend_from_slice(&voltage.to_le_bytes());
    row.extend_from_slice(&energy.to_le_bytes());
    row
}

fn layout() -> RowLayout {
    RowLayout::new(
        20,
        vec![
            FieldSlot {
                offset: 8,
                kind: FieldKind::Float32,
            },
            FieldSlot {
                offset: 12,
                kind: FieldKind::Float64,
            },
        ],
    )
}

#[test]
fn decodes_rows_in_buffer_order() {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    let mut bytes = pack_row(t0.unix_timestamp(), 230.5, 17.25);
    bytes.extend(pack_row(t0.unix_timestamp() + 10, 231.0, 18.0));

    let buffer = RowBuffer::new(bytes, layout()).expect("valid buffer");
    assert_eq!(buffer.row_count(), 2);

    let rows: Vec<_> = buffer.into_rows().collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, t0);
    assert_eq!(rows[0].1, vec![230.5, 17.25]);
    assert_eq!(rows[1].0, t0 + time::Duration::seconds(10));
    assert_eq!(rows[1].1, vec![231.0, 18.0]);
}

#[test]
fn absent_field_decodes_to_nan() {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    let bytes = pack_row(t0.unix_timestamp(), 230.5, 17.25);
    let layout = RowLayout::new(
        20,
        vec![
            FieldSlot::absent(),
            FieldSlot {
                offset: 8,
                kind: FieldKind::Float32,
            },
        ],
    );
    let rows: Vec<_> = RowBuffer::new(bytes, layout)
        .expect("valid buffer")
        .into_rows()
        .collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].1[0].is_nan());
    assert_eq!(rows[0].1[1], 230.5);
}

#[test]
fn rejects_partial_rows() {
    let t0 = datetime!(2024-01-01 0:00 UTC);
    let mut bytes = pack_row(t0.unix_timestamp(), 1.0, 2.0);
    bytes.pop();
    let err = RowBuffer::new(bytes, layout()).expect_err("truncated buffer must fail");
    assert!(matches!(err, Error::MalformedBuffer(_)));
}

#[test]
fn rejects_fields_outside_the_stride() {
    let layout = RowLayout::new(
        12,
        vec![FieldSlot {
            offset: 8,
            kind: FieldKind::Float64,
        }],
    );
    let err = RowBuffer::new(vec![0; 12], layout).expect_err("field exceeds stride");
    assert!(matches!(err, Error::MalformedBuffer(_)));
}

#[test]
fn empty_buffer_yields_no_rows() {
    let buffer = RowBuffer::new(Vec::new(), layout()).expect("empty buffer is valid");
    assert_eq!(buffer.row_count(), 0);
    assert_eq!(buffer.into_rows().count(), 0);
}
