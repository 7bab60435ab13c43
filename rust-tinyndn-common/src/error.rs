//! Error types for the tinyNDN implementation.

use thiserror::Error;

/// All possible errors that can occur within the tinyNDN implementation.
///
/// Every variant maps to a stable status code through [`Error::code`], so that
/// faces and applications sitting behind a narrow interface can report the
/// failure without carrying the whole enum around.
#[derive(Error, Debug)]
pub enum Error {
    /// A TLV length points past the end of the input.
    #[error("TLV oversize: {needed} bytes requested but only {remaining} available")]
    TlvOversize { needed: usize, remaining: usize },

    /// A TLV block carried an unexpected type.
    #[error("TLV wrong type: expected {expected:#x}, got {found:#x}")]
    TlvWrongType { expected: u32, found: u32 },

    /// A fixed-width numeric field declared a width other than 1, 2, 4 or 8.
    #[error("TLV wrong length: {0} is not a valid fixed-width length")]
    TlvWrongLength(usize),

    /// The output buffer cannot hold the value being encoded.
    #[error("buffer too small: {needed} bytes needed, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    /// A name exceeds the maximum encoded size.
    #[error("name too long: {0} bytes")]
    NameTooLong(usize),

    /// A name component exceeds the maximum component size.
    #[error("name component too long: {0} bytes")]
    ComponentTooLong(usize),

    /// A name carries more components than supported.
    #[error("too many name components: {0}")]
    TooManyComponents(usize),

    /// A URI could not be parsed into a name.
    #[error("invalid name URI: {0}")]
    InvalidUri(String),

    /// The Pending Interest Table has no free entry.
    #[error("PIT full")]
    PitFull,

    /// A PIT entry cannot record another incoming face.
    #[error("PIT entry face set full")]
    PitFaceSetFull,

    /// The FIB has no free record.
    #[error("FIB full")]
    FibFull,

    /// A FIB record cannot hold another nexthop.
    #[error("FIB nexthop set full")]
    FibNexthopsFull,

    /// The name-tree arena has no free entry.
    #[error("name-tree full")]
    NameTreeFull,

    /// The memory pool has no free block.
    #[error("memory pool exhausted")]
    PoolExhausted,

    /// A free was attempted on a block that is not currently allocated.
    #[error("invalid free at offset {0}")]
    InvalidFree(usize),

    /// A packet does not fit in a pool block.
    #[error("packet too large: {size} bytes exceeds block size {limit}")]
    PacketTooLarge { size: usize, limit: usize },

    /// The face table has no free slot.
    #[error("face table full")]
    FaceTableFull,

    /// The face identifier is not registered.
    #[error("unknown face {0}")]
    UnknownFace(u16),

    /// The timer identifier is outside the scheduler's table.
    #[error("unknown timer {0}")]
    UnknownTimer(usize),

    /// The local prefix table has no free slot.
    #[error("local prefix table full")]
    LocalPrefixTableFull,

    /// No route and no local registration exist for an Interest.
    #[error("Interest rejected: no route for {0}")]
    InterestRejected(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A face failed to emit a packet.
    #[error("face error: {0}")]
    Face(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable numeric status code for this error.
    ///
    /// Codes are negative and never reused; `0` is reserved for success.
    pub fn code(&self) -> i32 {
        match self {
            Error::TlvOversize { .. } => -10,
            Error::TlvWrongType { .. } => -11,
            Error::TlvWrongLength(_) => -12,
            Error::BufferTooSmall { .. } => -13,
            Error::NameTooLong(_) => -14,
            Error::ComponentTooLong(_) => -15,
            Error::TooManyComponents(_) => -16,
            Error::InvalidUri(_) => -17,
            Error::PitFull => -20,
            Error::PitFaceSetFull => -21,
            Error::FibFull => -22,
            Error::FibNexthopsFull => -23,
            Error::NameTreeFull => -24,
            Error::PoolExhausted => -25,
            Error::FaceTableFull => -26,
            Error::LocalPrefixTableFull => -27,
            Error::PacketTooLarge { .. } => -28,
            Error::InvalidFree(_) => -30,
            Error::UnknownFace(_) => -31,
            Error::InvalidConfig(_) => -32,
            Error::UnknownTimer(_) => -33,
            Error::InterestRejected(_) => -40,
            Error::Face(_) => -50,
            Error::Io(_) => -51,
        }
    }

    /// Whether this error was caused by malformed wire input.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::TlvOversize { .. }
                | Error::TlvWrongType { .. }
                | Error::TlvWrongLength(_)
                | Error::NameTooLong(_)
                | Error::ComponentTooLong(_)
                | Error::TooManyComponents(_)
        )
    }

    /// Whether this error reports a bounded table or pool running out of room.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            Error::PitFull
                | Error::PitFaceSetFull
                | Error::FibFull
                | Error::FibNexthopsFull
                | Error::NameTreeFull
                | Error::PoolExhausted
                | Error::FaceTableFull
                | Error::LocalPrefixTableFull
        )
    }
}
