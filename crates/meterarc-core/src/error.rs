use uuid::Uuid;

/// Failures surfaced by archive queries and the containers built on them.
///
/// "No data" is never an error: sources report it as an empty row sequence
/// or `None`, and callers should treat it as a normal outcome.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The group id is not known to the store or generator.
    #[error("unknown group: {0}")]
    InvalidGroup(Uuid),

    /// The operation requires an interval and none was supplied.
    #[error("query requires an interval")]
    MissingInterval,

    /// Conversion to a closed range was attempted on an interval with an
    /// open side. Resolve the missing bound first.
    #[error("interval is not fully bounded")]
    UnboundedInterval,

    /// Random access outside `[0, len)` on a time series.
    #[error("index {index} out of range (len: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A packed row buffer does not match its layout descriptor.
    #[error("malformed row buffer: {0}")]
    MalformedBuffer(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
