//! Exact resource quantities
//!
//! A [`Quantity`] is a fixed-point amount stored as a signed count of
//! nano-units, wide enough to hold exabyte-scale memory without losing the
//! milli-CPU precision that fractional CPU requests need. The representable
//! range is `±i128::MAX` nano-units (about `±1.7e29` units); parsing or
//! summing past it is an error, never a silent clamp.
//!
//! Quantities are parsed from the decimal strings found in topology objects
//! and workload descriptors:
//!
//! ```
//! use nrtsched_core::Quantity;
//!
//! let cpu: Quantity = "1500m".parse().unwrap();
//! let mem: Quantity = "2Gi".parse().unwrap();
//! assert_eq!(cpu, Quantity::from_milli(1500));
//! assert_eq!(mem, Quantity::from_units(2 * 1024 * 1024 * 1024));
//! ```

use crate::{NrtError, NrtResult};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const NANOS_PER_UNIT: i128 = 1_000_000_000;
const NANOS_PER_MILLI: i128 = 1_000_000;

/// Exact amount of a named resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity {
    nanos: i128,
}

impl Quantity {
    /// The canonical zero quantity
    pub const ZERO: Quantity = Quantity { nanos: 0 };

    /// Build a quantity from whole units (CPUs, bytes, devices)
    pub fn from_units(units: i64) -> Self {
        Self {
            nanos: i128::from(units) * NANOS_PER_UNIT,
        }
    }

    /// Build a quantity from milli-units (e.g. millicores)
    pub fn from_milli(milli: i64) -> Self {
        Self {
            nanos: i128::from(milli) * NANOS_PER_MILLI,
        }
    }

    /// Build a quantity from its raw nano-unit count
    pub fn from_nanos(nanos: i128) -> Self {
        Self { nanos }
    }

    /// Raw nano-unit count
    pub fn nanos(&self) -> i128 {
        self.nanos
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// Addition that reports overflow instead of wrapping or clamping
    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.nanos.checked_add(other.nanos).map(Quantity::from_nanos)
    }

    /// Lossy conversion used only where a ratio is needed
    pub fn as_f64(&self) -> f64 {
        self.nanos as f64 / NANOS_PER_UNIT as f64
    }
}

/// Scale applied by a quantity suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suffix {
    /// Power of ten (SI suffixes and `e<N>` exponents)
    Decimal(i32),
    /// Power of 1024 (`Ki`, `Mi`, ...)
    Binary(u32),
}

fn parse_suffix(suffix: &str) -> Option<Suffix> {
    let scale = match suffix {
        "" => Suffix::Decimal(0),
        "n" => Suffix::Decimal(-9),
        "u" => Suffix::Decimal(-6),
        "m" => Suffix::Decimal(-3),
        "k" => Suffix::Decimal(3),
        "M" => Suffix::Decimal(6),
        "G" => Suffix::Decimal(9),
        "T" => Suffix::Decimal(12),
        "P" => Suffix::Decimal(15),
        "E" => Suffix::Decimal(18),
        "Ki" => Suffix::Binary(1),
        "Mi" => Suffix::Binary(2),
        "Gi" => Suffix::Binary(3),
        "Ti" => Suffix::Binary(4),
        "Pi" => Suffix::Binary(5),
        "Ei" => Suffix::Binary(6),
        _ => {
            let exp = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))?;
            Suffix::Decimal(exp.parse().ok()?)
        }
    };
    Some(scale)
}

fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}

/// Parse an ASCII digit string, ignoring leading zeros; empty is zero
fn parse_digits(digits: &str) -> Option<i128> {
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Some(0);
    }
    significant.parse().ok()
}

/// `digits / 10^shift`, rounded up when any dropped digit is nonzero.
/// Works on the digit string so arbitrarily long or tiny values never
/// overflow on the way down.
fn shift_right_round_up(digits: &str, shift: u32) -> Option<i128> {
    let shift = usize::try_from(shift).ok()?;
    let keep = digits.len().saturating_sub(shift);
    let (kept, dropped) = digits.split_at(keep);
    let value = parse_digits(kept)?;
    if dropped.bytes().any(|b| b != b'0') {
        value.checked_add(1)
    } else {
        Some(value)
    }
}

/// Multiply an ASCII digit string by `factor`, exactly
fn scale_digits(digits: &str, factor: u64) -> String {
    let mut reversed = Vec::with_capacity(digits.len() + 20);
    let mut carry: u128 = 0;
    for digit in digits.bytes().rev() {
        let product = u128::from(digit - b'0') * u128::from(factor) + carry;
        reversed.push((product % 10) as u8);
        carry = product / 10;
    }
    while carry > 0 {
        reversed.push((carry % 10) as u8);
        carry /= 10;
    }
    reversed.iter().rev().map(|d| char::from(b'0' + d)).collect()
}

impl FromStr for Quantity {
    type Err = NrtError;

    fn from_str(s: &str) -> NrtResult<Self> {
        let invalid = || NrtError::InvalidQuantity(s.to_string());

        let trimmed = s.trim();
        let (negative, rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            Some(_) => (false, trimmed),
            None => return Err(invalid()),
        };

        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(number_end);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
            return Err(invalid());
        }

        let suffix = parse_suffix(suffix).ok_or_else(invalid)?;

        let frac_digits = i32::try_from(frac_part.len()).map_err(|_| invalid())?;

        // value = digits * 10^exp nanos, binary scale folded into the digits
        let (digits, decimal_exp) = match suffix {
            Suffix::Decimal(exp) => (format!("{int_part}{frac_part}"), exp),
            Suffix::Binary(power) => {
                let factor = 1024u64.checked_pow(power).ok_or_else(invalid)?;
                (scale_digits(&format!("{int_part}{frac_part}"), factor), 0)
            }
        };
        let exp = decimal_exp
            .checked_add(9)
            .and_then(|e| e.checked_sub(frac_digits))
            .ok_or_else(invalid)?;

        let nanos = if digits.bytes().all(|d| d == b'0') {
            0
        } else if exp >= 0 {
            parse_digits(&digits)
                .and_then(|m| m.checked_mul(pow10(exp.unsigned_abs())?))
                .ok_or_else(invalid)?
        } else {
            // Precision below one nano-unit rounds up
            shift_right_round_up(&digits, exp.unsigned_abs()).ok_or_else(invalid)?
        };

        Ok(Quantity {
            nanos: if negative { -nanos } else { nanos },
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos % NANOS_PER_UNIT == 0 {
            write!(f, "{}", self.nanos / NANOS_PER_UNIT)
        } else if self.nanos % NANOS_PER_MILLI == 0 {
            write!(f, "{}m", self.nanos / NANOS_PER_MILLI)
        } else {
            write!(f, "{}n", self.nanos)
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuantityVisitor;

        impl de::Visitor<'_> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a quantity string such as \"4\", \"500m\" or \"2Gi\", or an integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Quantity, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
                Ok(Quantity::from_units(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
                i64::try_from(v)
                    .map(Quantity::from_units)
                    .map_err(|_| E::custom(format!("quantity {v} out of range")))
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}
