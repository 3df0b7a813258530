use byteorder::{ByteOrder, LittleEndian};
use rusqlite::{params, Connection, OpenFlags};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::interval::DateRange;
use crate::models::{ArchiveKind, EnergyAggregation, Group, Quantity};
use crate::rows::{FieldKind, FieldSlot, RowBuffer, RowLayout, RowSource, Rows, TIMESTAMP_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    V1 = 1,
}

/// SQLite-backed archive store. Rows are persisted as packed per-row
/// payloads; the quantity catalog doubles as the row stride descriptor the
/// decoder reads them back with.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

/// One catalog entry: where a stored property's bytes sit within a row.
#[derive(Debug, Clone)]
struct StoredField {
    property: String,
    unit: Option<String>,
    offset: usize,
    kind: FieldKind,
}

impl SqliteStore {
    pub fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.pragma_update(None, "journal_mode", &"WAL")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 0 {
            self.install_v1()?;
            self.conn
                .pragma_update(None, "user_version", &(SchemaVersion::V1 as i32))?;
        }
        Ok(())
    }

    fn install_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                parent TEXT
            );

            CREATE TABLE IF NOT EXISTS quantities (
                group_id TEXT NOT NULL,
                arch INTEGER NOT NULL,
                property TEXT NOT NULL,
                unit TEXT,
                field_offset INTEGER NOT NULL,
                field_kind INTEGER NOT NULL,
                PRIMARY KEY (group_id, arch, property)
            );

            CREATE TABLE IF NOT EXISTS archive_rows (
                group_id TEXT NOT NULL,
                arch INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                payload BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_archive_rows_ts
                ON archive_rows(group_id, arch, timestamp);
            "#,
        )?;
        Ok(())
    }

    pub fn put_group(&self, group: &Group) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO groups(id, name, parent) VALUES (?1, ?2, ?3)",
            params![
                group.id.to_string(),
                group.name,
                group.parent.map(|p| p.to_string())
            ],
        )?;
        Ok(())
    }

    pub fn groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, parent FROM groups ORDER BY name")?;
        let groups = stmt
            .query_map([], |row| {
                let id = parse_uuid_column(row.get::<_, String>(0)?, 0)?;
                let parent = match row.get::<_, Option<String>>(2)? {
                    Some(p) => Some(parse_uuid_column(p, 2)?),
                    None => None,
                };
                Ok(Group {
                    id,
                    name: row.get(1)?,
                    parent,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    /// Declare the stored quantities of a group's archive, assigning each a
    /// slot after the row timestamp in declaration order. Replaces any
    /// previous catalog for that archive.
    pub fn define_quantities(
        &self,
        group: Uuid,
        arch: ArchiveKind,
        defs: &[(Quantity, FieldKind)],
    ) -> Result<()> {
        self.conn.execute(
            "DELETE FROM quantities WHERE group_id = ?1 AND arch = ?2",
            params![group.to_string(), arch.as_u8()],
        )?;
        let mut offset = TIMESTAMP_LEN;
        for (quantity, kind) in defs {
            self.conn.execute(
                "INSERT INTO quantities(group_id, arch, property, unit, field_offset, field_kind)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    group.to_string(),
                    arch.as_u8(),
                    quantity.property,
                    quantity.unit,
                    offset as i64,
                    kind.as_u8()
                ],
            )?;
            offset += kind.width();
        }
        Ok(())
    }

    /// Append one row, encoding `values` per the archive's catalog order.
    pub fn append_row(
        &self,
        group: Uuid,
        arch: ArchiveKind,
        timestamp: OffsetDateTime,
        values: &[f32],
    ) -> Result<()> {
        let catalog = self.catalog(group, arch)?;
        if values.len() != catalog.len() {
            return Err(Error::MalformedBuffer(format!(
                "expected {} values per row, got {}",
                catalog.len(),
                values.len()
            )));
        }
        let mut payload = Vec::new();
        let mut tmp = [0u8; 8];
        for (field, value) in catalog.iter().zip(values) {
            let width = field.kind.width();
            match field.kind {
                FieldKind::Float32 => LittleEndian::write_f32(&mut tmp[..4], *value),
                FieldKind::Float64 => LittleEndian::write_f64(&mut tmp[..8], *value as f64),
                FieldKind::Int32 => LittleEndian::write_i32(&mut tmp[..4], *value as i32),
                FieldKind::Uint16 => LittleEndian::write_u16(&mut tmp[..2], *value as u16),
                FieldKind::Absent => {}
            }
            payload.extend_from_slice(&tmp[..width]);
        }
        self.conn.execute(
            "INSERT INTO archive_rows(group_id, arch, timestamp, payload) VALUES (?1, ?2, ?3, ?4)",
            params![
                group.to_string(),
                arch.as_u8(),
                timestamp.unix_timestamp(),
                payload
            ],
        )?;
        Ok(())
    }

    fn group_exists(&self, group: Uuid) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM groups WHERE id = ?1",
            params![group.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn catalog(&self, group: Uuid, arch: ArchiveKind) -> Result<Vec<StoredField>> {
        let mut stmt = self.conn.prepare(
            "SELECT property, unit, field_offset, field_kind FROM quantities
             WHERE group_id = ?1 AND arch = ?2 ORDER BY field_offset",
        )?;
        let fields = stmt
            .query_map(params![group.to_string(), arch.as_u8()], |row| {
                let kind_raw: u8 = row.get(3)?;
                let kind = FieldKind::from_u8(kind_raw).ok_or_else(|| {
                    rusqlite::Error::IntegralValueOutOfRange(3, kind_raw as i64)
                })?;
                Ok(StoredField {
                    property: row.get(0)?,
                    unit: row.get(1)?,
                    offset: row.get::<_, i64>(2)? as usize,
                    kind,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(fields)
    }
}

impl RowSource for SqliteStore {
    fn open_rows(
        &self,
        group: Uuid,
        arch: ArchiveKind,
        range: Option<DateRange>,
        quantities: &[Quantity],
        _aggregation: u32,
        _energy: EnergyAggregation,
    ) -> Result<Option<Rows>> {
        if !self.group_exists(group)? {
            return Err(Error::InvalidGroup(group));
        }
        let catalog = self.catalog(group, arch)?;
        let stride = TIMESTAMP_LEN + catalog.iter().map(|f| f.kind.width()).sum::<usize>();

        let mut bytes = Vec::new();
        let mut count = 0usize;
        {
            let (sql, bounds) = match range {
                Some(range) => (
                    "SELECT timestamp, payload FROM archive_rows
                     WHERE group_id = ?1 AND arch = ?2 AND timestamp BETWEEN ?3 AND ?4
                     ORDER BY timestamp",
                    Some((range.min.unix_timestamp(), range.max.unix_timestamp())),
                ),
                None => (
                    "SELECT timestamp, payload FROM archive_rows
                     WHERE group_id = ?1 AND arch = ?2
                     ORDER BY timestamp",
                    None,
                ),
            };
            let mut stmt = self.conn.prepare(sql)?;
            let mut handle_row = |ts: i64, payload: Vec<u8>| -> Result<()> {
                if TIMESTAMP_LEN + payload.len() != stride {
                    return Err(Error::MalformedBuffer(format!(
                        "stored payload of {} bytes does not match stride {}",
                        payload.len(),
                        stride
                    )));
                }
                let mut ts_bytes = [0u8; TIMESTAMP_LEN];
                LittleEndian::write_i64(&mut ts_bytes, ts);
                bytes.extend_from_slice(&ts_bytes);
                bytes.extend_from_slice(&payload);
                count += 1;
                Ok(())
            };
            match bounds {
                Some((min, max)) => {
                    let mut rows = stmt.query(params![group.to_string(), arch.as_u8(), min, max])?;
                    while let Some(row) = rows.next()? {
                        handle_row(row.get(0)?, row.get(1)?)?;
                    }
                }
                None => {
                    let mut rows = stmt.query(params![group.to_string(), arch.as_u8()])?;
                    while let Some(row) = rows.next()? {
                        handle_row(row.get(0)?, row.get(1)?)?;
                    }
                }
            }
        }

        if count == 0 {
            return Ok(None);
        }
        debug!(group = %group, rows = count, stride, "decoding stored rows");

        let fields = quantities
            .iter()
            .map(|quantity| {
                catalog
                    .iter()
                    .find(|f| f.property == quantity.property)
                    .map(|f| FieldSlot {
                        offset: f.offset,
                        kind: f.kind,
                    })
                    .unwrap_or_else(FieldSlot::absent)
            })
            .collect();
        let buffer = RowBuffer::new(bytes, RowLayout::new(stride, fields))?;
        Ok(Some(Box::new(buffer.into_rows())))
    }

    fn quantities(
        &self,
        group: Uuid,
        arch: ArchiveKind,
        _range: DateRange,
    ) -> Result<Vec<Quantity>> {
        if !self.group_exists(group)? {
            return Err(Error::InvalidGroup(group));
        }
        Ok(self
            .catalog(group, arch)?
            .into_iter()
            .map(|f| Quantity {
                property: f.property,
                unit: f.unit,
            })
            .collect())
    }
}

fn parse_uuid_column(raw: String, index: usize) -> std::result::Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}
