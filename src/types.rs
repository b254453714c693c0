use std::fmt;
use std::ops::Not;

/// CAN ID type (11-bit base format)
pub type CanId = u16;

/// Index of a node on the simulated bus
pub type NodeId = usize;

/// Ordered stream of line states
pub type BitSequence = Vec<Bit>;

/// One line state. Dominant is logical 0 and always wins on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bit {
    Dominant,
    Recessive,
}

impl Bit {
    /// Maps a logical value to a line state (`true` is recessive).
    pub fn from_bool(value: bool) -> Self {
        if value {
            Bit::Recessive
        } else {
            Bit::Dominant
        }
    }

    pub fn as_bool(self) -> bool {
        self == Bit::Recessive
    }

    pub fn is_dominant(self) -> bool {
        self == Bit::Dominant
    }
}

impl Not for Bit {
    type Output = Bit;

    fn not(self) -> Bit {
        match self {
            Bit::Dominant => Bit::Recessive,
            Bit::Recessive => Bit::Dominant,
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bit::Dominant => write!(f, "0"),
            Bit::Recessive => write!(f, "1"),
        }
    }
}

/// Analog sample of one bus line, in volts
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Voltage(pub f32);

impl Voltage {
    pub fn volts(self) -> f32 {
        self.0
    }
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} V", self.0)
    }
}

/// Configuration trait that must be implemented by all component configurations
pub trait Config {
    fn validate(&self) -> crate::error::Result<()>;
}
