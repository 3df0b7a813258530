pub mod archive;
pub mod config;
pub mod error;
pub mod interval;
pub mod models;
pub mod rows;
pub mod series;
pub mod slice;
pub mod store;
pub mod synthetic;
pub mod timeutils;

pub use archive::Archive;
pub use config::{Config, LoggingConfig, Preset, StoreConfig, StoreMode, SyntheticSection};
pub use error::{Error, Result};
pub use interval::{DateRange, Interval};
pub use models::{ArchiveKind, EnergyAggregation, Group, Quantity, RowsQuery};
pub use rows::{FieldKind, FieldSlot, Row, RowBuffer, RowLayout, RowSource, Rows};
pub use series::TimeSeries;
pub use slice::slice;
pub use store::SqliteStore;
pub use synthetic::{SyntheticArchive, SAMPLE_PERIOD};
pub use timeutils::{now_utc, parse_range, parse_timestamp, utc_from_timestamp};
