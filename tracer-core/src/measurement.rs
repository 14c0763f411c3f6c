//! Validity-tagged physical values
//!
//! The controller reserves all-bits-set patterns to mean "not measured". A
//! decoded field therefore carries one of three states so that a measured
//! zero is never confused with a missing value.

use std::fmt;

/// Validity of a decoded field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validity {
    /// Decoded and inside the plausible range
    Decoded,
    /// Decoded but outside the plausible range for the quantity
    OutOfRange,
    /// The controller sent the sentinel pattern
    NotReported,
}

/// A single decoded field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement<T> {
    Reported(T),
    /// Raw wire value that fell outside the plausible range
    OutOfRange { raw: u16 },
    NotReported,
}

impl<T: Copy> Measurement<T> {
    /// Get the value if it was reported and plausible
    pub fn value(&self) -> Option<T> {
        match self {
            Measurement::Reported(value) => Some(*value),
            _ => None,
        }
    }

    /// Get the validity tag of this measurement
    pub fn validity(&self) -> Validity {
        match self {
            Measurement::Reported(_) => Validity::Decoded,
            Measurement::OutOfRange { .. } => Validity::OutOfRange,
            Measurement::NotReported => Validity::NotReported,
        }
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, Measurement::Reported(_))
    }

    /// Map the reported value, keeping the validity tag
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Measurement<U> {
        match self {
            Measurement::Reported(value) => Measurement::Reported(f(value)),
            Measurement::OutOfRange { raw } => Measurement::OutOfRange { raw },
            Measurement::NotReported => Measurement::NotReported,
        }
    }

    /// Combine two measurements into a derived one
    ///
    /// The result is not reported if either input is not reported, otherwise
    /// out of range if either input is out of range (carrying the first
    /// offending raw value).
    pub fn combine<U: Copy, V, F: FnOnce(T, U) -> V>(
        self,
        other: Measurement<U>,
        f: F,
    ) -> Measurement<V> {
        match (self, other) {
            (Measurement::Reported(a), Measurement::Reported(b)) => Measurement::Reported(f(a, b)),
            (Measurement::NotReported, _) | (_, Measurement::NotReported) => {
                Measurement::NotReported
            }
            (Measurement::OutOfRange { raw }, _) | (_, Measurement::OutOfRange { raw }) => {
                Measurement::OutOfRange { raw }
            }
        }
    }
}

impl<T: fmt::Display> fmt::Display for Measurement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Reported(value) => write!(f, "{}", value),
            Measurement::OutOfRange { raw } => write!(f, "out of range (raw 0x{:04X})", raw),
            Measurement::NotReported => write!(f, "not reported"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_reported_is_not_zero() {
        let missing: Measurement<f64> = Measurement::NotReported;
        assert_eq!(missing.value(), None);
        assert_eq!(missing.validity(), Validity::NotReported);

        let zero = Measurement::Reported(0.0);
        assert_eq!(zero.value(), Some(0.0));
        assert_eq!(zero.validity(), Validity::Decoded);
    }

    #[test]
    fn test_combine_propagates_validity() {
        let volts = Measurement::Reported(12.5);
        let amps = Measurement::Reported(2.0);
        assert_eq!(volts.combine(amps, |v, a| v * a), Measurement::Reported(25.0));

        let bad: Measurement<f64> = Measurement::OutOfRange { raw: 0x9999 };
        assert_eq!(
            volts.combine(bad, |v, a| v * a),
            Measurement::OutOfRange { raw: 0x9999 }
        );

        let missing: Measurement<f64> = Measurement::NotReported;
        assert_eq!(bad.combine(missing, |v, a| v * a), Measurement::NotReported);
    }
}
