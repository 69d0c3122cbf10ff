//! Bandwidth values and live speed handles

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// A bandwidth ceiling in bits per second; zero means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "SpeedRepr", into = "String")]
pub struct Speed(u64);

impl Speed {
    pub const UNLIMITED: Speed = Speed(0);

    pub const fn from_bits_per_second(bps: u64) -> Self {
        Speed(bps)
    }

    pub const fn from_bytes_per_second(bytes: u64) -> Self {
        Speed(bytes.saturating_mul(8))
    }

    pub const fn bits_per_second(self) -> u64 {
        self.0
    }

    pub const fn is_unlimited(self) -> bool {
        self.0 == 0
    }

    /// Nominal time in milliseconds that `bytes` should take at this speed
    pub fn nominal_millis(self, bytes: usize) -> f64 {
        if self.is_unlimited() {
            return 0.0;
        }
        bytes as f64 * 8.0 * 1000.0 / self.0 as f64
    }
}

impl FromStr for Speed {
    type Err = ConfigError;

    /// Parses `<quantity><unit>` where the unit is an optional `k`/`M`/`G`/`T`
    /// prefix, an optional `i` for powers of 1024, then `b` for bits or `B`
    /// for bytes, optionally followed by `ps` or `/s`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidSpeed {
            input: input.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("unlimited") {
            return Ok(Speed::UNLIMITED);
        }

        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (quantity, unit) = trimmed.split_at(split);
        let quantity: f64 = quantity.parse().map_err(|_| invalid())?;
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(invalid());
        }

        let unit = unit.trim();
        if unit.is_empty() {
            return Ok(Speed(quantity.round() as u64));
        }

        let unit = unit
            .strip_suffix("ps")
            .or_else(|| unit.strip_suffix("/s"))
            .unwrap_or(unit);
        let mut chars = unit.chars().peekable();

        let power = match chars.peek() {
            Some('k' | 'K') => 1,
            Some('m' | 'M') => 2,
            Some('g' | 'G') => 3,
            Some('t' | 'T') => 4,
            Some('b' | 'B') => 0,
            _ => return Err(invalid()),
        };
        if power > 0 {
            chars.next();
        }

        let base: f64 = if power > 0 && chars.peek() == Some(&'i') {
            chars.next();
            1024.0
        } else {
            1000.0
        };

        let bits_per_unit = match chars.next() {
            Some('b') => 1.0,
            Some('B') => 8.0,
            _ => return Err(invalid()),
        };
        if chars.next().is_some() {
            return Err(invalid());
        }

        Ok(Speed(
            (quantity * base.powi(power) * bits_per_unit).round() as u64,
        ))
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unlimited() {
            return f.write_str("unlimited");
        }

        const UNITS: [(u64, &str); 8] = [
            (1 << 40, "Tibps"),
            (1_000_000_000_000, "Tbps"),
            (1 << 30, "Gibps"),
            (1_000_000_000, "Gbps"),
            (1 << 20, "Mibps"),
            (1_000_000, "Mbps"),
            (1 << 10, "Kibps"),
            (1_000, "kbps"),
        ];

        for (size, suffix) in UNITS {
            if self.0 >= size && self.0 % size == 0 {
                return write!(f, "{}{}", self.0 / size, suffix);
            }
        }
        write!(f, "{}bps", self.0)
    }
}

/// Serialized forms accepted in configuration files
#[derive(Deserialize)]
#[serde(untagged)]
enum SpeedRepr {
    Bits(u64),
    Text(String),
}

impl TryFrom<SpeedRepr> for Speed {
    type Error = ConfigError;

    fn try_from(repr: SpeedRepr) -> Result<Self, Self::Error> {
        match repr {
            SpeedRepr::Bits(bps) => Ok(Speed(bps)),
            SpeedRepr::Text(text) => text.parse(),
        }
    }
}

impl From<Speed> for String {
    fn from(speed: Speed) -> Self {
        speed.to_string()
    }
}

/// Shared, live-adjustable speed ceiling
///
/// Cloning yields another handle to the same value, so a throttled stream
/// and its owner can both see updates.
#[derive(Debug, Clone, Default)]
pub struct SpeedLimit(Arc<AtomicU64>);

impl SpeedLimit {
    pub fn new(speed: Speed) -> Self {
        Self(Arc::new(AtomicU64::new(speed.bits_per_second())))
    }

    pub fn unlimited() -> Self {
        Self::new(Speed::UNLIMITED)
    }

    pub fn get(&self) -> Speed {
        Speed(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, speed: Speed) {
        self.0.store(speed.bits_per_second(), Ordering::Relaxed);
    }
}

impl From<Speed> for SpeedLimit {
    fn from(speed: Speed) -> Self {
        Self::new(speed)
    }
}
