use byteorder::{ByteOrder, LittleEndian};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::interval::DateRange;
use crate::models::{ArchiveKind, EnergyAggregation, Quantity};
use crate::timeutils::utc_from_timestamp;

/// One decoded row: a timestamp plus one value per requested quantity.
pub type Row = (OffsetDateTime, Vec<f32>);

/// A single-use, forward-only row sequence. Dropping it releases whatever
/// backs it; a caller needing the data twice must re-issue the query.
pub type Rows = Box<dyn Iterator<Item = Row>>;

/// Bytes reserved at the start of each row for the little-endian unix
/// timestamp.
pub const TIMESTAMP_LEN: usize = 8;

/// Wire type of one field inside a packed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float32,
    Float64,
    Int32,
    Uint16,
    /// No backing bytes; decodes to NaN. Used when a requested property is
    /// not part of the stored catalog.
    Absent,
}

impl FieldKind {
    pub fn width(&self) -> usize {
        match self {
            FieldKind::Float32 => 4,
            FieldKind::Float64 => 8,
            FieldKind::Int32 => 4,
            FieldKind::Uint16 => 2,
            FieldKind::Absent => 0,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            FieldKind::Float32 => 0,
            FieldKind::Float64 => 1,
            FieldKind::Int32 => 2,
            FieldKind::Uint16 => 3,
            FieldKind::Absent => 4,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FieldKind::Float32),
            1 => Some(FieldKind::Float64),
            2 => Some(FieldKind::Int32),
            3 => Some(FieldKind::Uint16),
            4 => Some(FieldKind::Absent),
            _ => None,
        }
    }

    fn decode(&self, row: &[u8], offset: usize) -> f32 {
        match self {
            FieldKind::Float32 => LittleEndian::read_f32(&row[offset..offset + 4]),
            FieldKind::Float64 => LittleEndian::read_f64(&row[offset..offset + 8]) as f32,
            FieldKind::Int32 => LittleEndian::read_i32(&row[offset..offset + 4]) as f32,
            FieldKind::Uint16 => LittleEndian::read_u16(&row[offset..offset + 2]) as f32,
            FieldKind::Absent => f32::NAN,
        }
    }
}

/// Where one requested quantity lives inside a row. Offsets are relative
/// to the row start, so the first real field sits at `TIMESTAMP_LEN`.
#[derive(Debug, Clone, Copy)]
pub struct FieldSlot {
    pub offset: usize,
    pub kind: FieldKind,
}

impl FieldSlot {
    pub fn absent() -> Self {
        Self {
            offset: 0,
            kind: FieldKind::Absent,
        }
    }
}

/// The row stride descriptor: total bytes per row and the slots of the
/// requested quantities, in request order.
#[derive(Debug, Clone)]
pub struct RowLayout {
    pub stride: usize,
    pub fields: Vec<FieldSlot>,
}

impl RowLayout {
    pub fn new(stride: usize, fields: Vec<FieldSlot>) -> Self {
        Self { stride, fields }
    }

    fn validate(&self) -> Result<()> {
        if self.stride < TIMESTAMP_LEN {
            return Err(Error::MalformedBuffer(format!(
                "stride {} shorter than the timestamp field",
                self.stride
            )));
        }
        for field in &self.fields {
            if field.kind == FieldKind::Absent {
                continue;
            }
            if field.offset < TIMESTAMP_LEN || field.offset + field.kind.width() > self.stride {
                return Err(Error::MalformedBuffer(format!(
                    "field at offset {} ({:?}) exceeds stride {}",
                    field.offset, field.kind, self.stride
                )));
            }
        }
        Ok(())
    }
}

/// A contiguous buffer of fixed-stride packed rows, as returned by one
/// store query. Layout and bounds are checked once at construction, so
/// iteration never reads outside the buffer.
#[derive(Debug)]
pub struct RowBuffer {
    bytes: Vec<u8>,
    layout: RowLayout,
}

impl RowBuffer {
    pub fn new(bytes: Vec<u8>, layout: RowLayout) -> Result<Self> {
        layout.validate()?;
        if bytes.len() % layout.stride != 0 {
            return Err(Error::MalformedBuffer(format!(
                "buffer of {} bytes is not a whole number of {}-byte rows",
                bytes.len(),
                layout.stride
            )));
        }
        for pos in (0..bytes.len()).step_by(layout.stride) {
            let ts = LittleEndian::read_i64(&bytes[pos..pos + TIMESTAMP_LEN]);
            if OffsetDateTime::from_unix_timestamp(ts).is_err() {
                return Err(Error::MalformedBuffer(format!(
                    "unrepresentable timestamp {ts} at byte {pos}"
                )));
            }
        }
        Ok(Self { bytes, layout })
    }

    pub fn row_count(&self) -> usize {
        self.bytes.len() / self.layout.stride
    }

    /// Consume the buffer into its decoding iterator. The backing bytes
    /// are released when the iterator is dropped, on every exit path.
    pub fn into_rows(self) -> BufferRows {
        BufferRows {
            bytes: self.bytes,
            layout: self.layout,
            pos: 0,
        }
    }
}

/// Owning decode cursor over a `RowBuffer`.
#[derive(Debug)]
pub struct BufferRows {
    bytes: Vec<u8>,
    layout: RowLayout,
    pos: usize,
}

impl Iterator for BufferRows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.pos + self.layout.stride > self.bytes.len() {
            return None;
        }
        let row = &self.bytes[self.pos..self.pos + self.layout.stride];
        let ts = utc_from_timestamp(LittleEndian::read_i64(&row[..TIMESTAMP_LEN]));
        let values = self
            .layout
            .fields
            .iter()
            .map(|field| field.kind.decode(row, field.offset))
            .collect();
        self.pos += self.layout.stride;
        Some((ts, values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.bytes.len() - self.pos) / self.layout.stride;
        (remaining, Some(remaining))
    }
}

/// The narrow store capability the archive reader consumes: open a query,
/// pull rows, done. Satisfied by the SQLite adapter and by the synthetic
/// generator.
pub trait RowSource {
    /// Open a row query. `Ok(None)` means the archive holds no data for
    /// the request, which is not an error. `range` of `None` means all
    /// available rows. `aggregation` (0 = raw) and `energy` are passed
    /// through for adapters that honor them; both built-in sources ignore
    /// them.
    fn open_rows(
        &self,
        group: Uuid,
        arch: ArchiveKind,
        range: Option<DateRange>,
        quantities: &[Quantity],
        aggregation: u32,
        energy: EnergyAggregation,
    ) -> Result<Option<Rows>>;

    /// The quantity catalog of a group's archive. The range parameter is
    /// part of the store contract; both built-in sources treat the catalog
    /// as static and do not filter by it.
    fn quantities(&self, group: Uuid, arch: ArchiveKind, range: DateRange)
        -> Result<Vec<Quantity>>;
}
