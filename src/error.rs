use thiserror::Error;

/// Reasons an encoded bit stream cannot be turned back into a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("bit sequence ended after {available} bits, {needed} required")]
    InsufficientBits { needed: usize, available: usize },

    #[error("first bit of a frame must be dominant")]
    MissingStartOfFrame,

    #[error("data length code {0} exceeds 8")]
    InvalidDlc(u8),

    #[error("identifier 0x{0:X} exceeds 11 bits")]
    InvalidId(u16),

    #[error("stuff bit at position {0} repeats the preceding run")]
    StuffViolation(usize),

    #[error("dominant bit at position {0} of end-of-frame trailer")]
    BadTrailer(usize),
}

#[derive(Error, Debug)]
pub enum SimError {
    // Channel payload errors
    #[error("malformed payload on `{channel}`: expected {expected}, found {found}")]
    MalformedPayload {
        channel: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("`{channel}` carried {count} values in one step, at most one expected")]
    UnexpectedSampleCount { channel: String, count: usize },

    // Physical layer errors
    #[error("no voltage samples on either bus line")]
    MissingSamples,
    #[error("bus line sample counts differ: {low} low, {high} high")]
    SampleCountMismatch { low: usize, high: usize },
    #[error("low sample {low} V exceeds paired high sample {high} V")]
    LowAboveHigh { low: f32, high: f32 },
    #[error("voltage {0} V outside operating range")]
    VoltageOutOfRange(f32),
    #[error("bus pair ({low} V, {high} V) is neither dominant nor recessive")]
    UnknownBusLevel { low: f32, high: f32 },

    // Data link errors
    #[error("bus fault on `{node}`: recessive level overrode a dominant bit")]
    BusFault { node: String },
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("`{0}` is configured listen-only")]
    ListenOnly(String),

    // Transport errors
    #[error("ISO-TP error: {0}")]
    IsoTp(String),

    // Application errors
    #[error("OBD-II error: {0}")]
    Obd(String),

    // Generic errors
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("buffer overflow")]
    BufferOverflow,
    #[error("simulation still active after {0} steps")]
    StepLimitExceeded(u64),
}

pub type Result<T> = std::result::Result<T, SimError>;
