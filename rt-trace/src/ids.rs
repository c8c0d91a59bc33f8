use std::fmt;
use std::str::FromStr;

use rand::RngCore;

/// A 128-bit trace identifier, causally constant for every span in a trace.
///
/// B3 allows either a 64-bit (16 hex chars) or a 128-bit (32 hex chars) trace
/// id on the wire; both are represented here as a `u128` so comparisons and
/// hashing are uniform, with [`TraceId::is_short`] recording which width the
/// id round-trips as.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId {
    value: u128,
    short: bool,
}

impl TraceId {
    pub const INVALID: TraceId = TraceId { value: 0, short: false };

    /// Generates a fresh 128-bit trace id.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        TraceId { value: ((rng.next_u64() as u128) << 64) | rng.next_u64() as u128, short: false }
    }

    /// Generates a fresh 64-bit trace id (some B3 consumers only support the short form).
    pub fn random_short() -> Self {
        TraceId { value: rand::rng().next_u64() as u128, short: true }
    }

    pub fn is_valid(&self) -> bool {
        self.value != 0
    }

    pub fn is_short(&self) -> bool {
        self.short
    }

    fn parse(s: &str) -> Option<Self> {
        if s.len() != 16 && s.len() != 32 {
            return None;
        }
        u128::from_str_radix(s, 16).ok().map(|value| TraceId { value, short: s.len() == 16 })
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.short {
            write!(f, "{:016x}", self.value as u64)
        } else {
            write!(f, "{:032x}", self.value)
        }
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self)
    }
}

impl FromStr for TraceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TraceId::parse(s).ok_or(IdParseError(s.to_string()))
    }
}

/// A 64-bit span identifier, unique within its trace for all practical purposes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    pub const INVALID: SpanId = SpanId(0);

    pub fn random() -> Self {
        SpanId(rand::rng().next_u64())
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({})", self)
    }
}

impl FromStr for SpanId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(IdParseError(s.to_string()));
        }
        u64::from_str_radix(s, 16).map(SpanId).map_err(|_| IdParseError(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0:?} is not a valid trace/span id")]
pub struct IdParseError(String);
