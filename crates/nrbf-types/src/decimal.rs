use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A decimal number carried in its textual wire form.
///
/// The wire encodes decimals as length-prefixed strings; the exact text
/// (including trailing zeros) is preserved so re-encoding is byte-identical.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Decimal(String);

impl Decimal {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lossy conversion for display and arithmetic.
    pub fn to_f64(&self) -> f64 {
        // Validated on construction, so the parse cannot fail.
        self.0.parse().unwrap_or(f64::NAN)
    }
}

fn is_decimal_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    match frac_part {
        Some(frac) => {
            all_digits(int_part) && all_digits(frac) && !(int_part.is_empty() && frac.is_empty())
        }
        None => !int_part.is_empty() && all_digits(int_part),
    }
}

impl FromStr for Decimal {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_decimal_literal(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(TypeError::InvalidDecimal(s.to_owned()))
        }
    }
}

impl TryFrom<String> for Decimal {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if is_decimal_literal(&s) {
            Ok(Self(s))
        } else {
            Err(TypeError::InvalidDecimal(s))
        }
    }
}

impl From<Decimal> for String {
    fn from(d: Decimal) -> Self {
        d.0
    }
}

impl From<i64> for Decimal {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_literals() {
        for s in ["0", "-1", "+42", "3.14", "1.50", "-0.001", ".5", "7."] {
            let d: Decimal = s.parse().unwrap();
            assert_eq!(d.as_str(), s);
        }
    }

    #[test]
    fn rejects_garbage() {
        for s in ["", "-", ".", "1e5", "1.2.3", "abc", "1 ", "--1"] {
            assert!(s.parse::<Decimal>().is_err(), "{s:?} should be rejected");
        }
    }

    #[test]
    fn trailing_zeros_preserved() {
        let d: Decimal = "2.500".parse().unwrap();
        assert_eq!(d.to_string(), "2.500");
        assert_eq!(d.to_f64(), 2.5);
    }

    #[test]
    fn serde_rejects_invalid() {
        assert!(serde_json::from_str::<Decimal>("\"x1\"").is_err());
        let d: Decimal = serde_json::from_str("\"12.0\"").unwrap();
        assert_eq!(d.as_str(), "12.0");
    }
}
