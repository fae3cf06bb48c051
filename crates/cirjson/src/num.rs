//! Number parsing and formatting. Integral values are classified
//! progressively by digit count (i32, then i64, then BigInt); textual
//! floating point is recorded raw and converted lazily when a typed
//! accessor is called.

use crate::token::NumberKind;
use bigdecimal::{BigDecimal, ToPrimitive};
use num_bigint::BigInt;
use std::str::FromStr;

/// A fully resolved numeric value.
#[derive(Debug, Clone, PartialEq)]
pub enum NumberValue {
    Int(i32),
    Long(i64),
    BigInteger(BigInt),
    Double(f64),
    BigDecimal(BigDecimal),
}

impl NumberValue {
    pub fn kind(&self) -> NumberKind {
        match self {
            NumberValue::Int(_) => NumberKind::Int,
            NumberValue::Long(_) => NumberKind::Long,
            NumberValue::BigInteger(_) => NumberKind::BigInteger,
            NumberValue::Double(_) => NumberKind::Double,
            NumberValue::BigDecimal(_) => NumberKind::BigDecimal,
        }
    }

    /// Coerces to i32, if representable. Floating point truncates.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NumberValue::Int(v) => Some(*v),
            NumberValue::Long(v) => i32::try_from(*v).ok(),
            NumberValue::BigInteger(v) => v.to_i32(),
            NumberValue::Double(v) => {
                (*v >= i32::MIN as f64 && *v <= i32::MAX as f64).then(|| *v as i32)
            }
            NumberValue::BigDecimal(v) => v.to_i32(),
        }
    }

    /// Coerces to i64, if representable. Floating point truncates.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumberValue::Int(v) => Some(*v as i64),
            NumberValue::Long(v) => Some(*v),
            NumberValue::BigInteger(v) => v.to_i64(),
            NumberValue::Double(v) => {
                (*v >= i64::MIN as f64 && *v <= i64::MAX as f64).then(|| *v as i64)
            }
            NumberValue::BigDecimal(v) => v.to_i64(),
        }
    }

    /// Coerces to f64. Always representable, possibly with rounding.
    pub fn as_f64(&self) -> f64 {
        match self {
            NumberValue::Int(v) => *v as f64,
            NumberValue::Long(v) => *v as f64,
            NumberValue::BigInteger(v) => v.to_f64().unwrap_or(f64::INFINITY),
            NumberValue::Double(v) => *v,
            NumberValue::BigDecimal(v) => v.to_f64().unwrap_or(f64::INFINITY),
        }
    }

    /// Widens to BigInt, truncating any fraction.
    pub fn as_big_int(&self) -> Option<BigInt> {
        match self {
            NumberValue::Int(v) => Some(BigInt::from(*v)),
            NumberValue::Long(v) => Some(BigInt::from(*v)),
            NumberValue::BigInteger(v) => Some(v.clone()),
            NumberValue::Double(v) => {
                v.is_finite().then(|| BigInt::from(v.trunc() as i64))
            }
            NumberValue::BigDecimal(v) => Some(v.with_scale(0).as_bigint_and_exponent().0),
        }
    }

    /// Widens to BigDecimal. None only for non-finite doubles.
    pub fn as_big_decimal(&self) -> Option<BigDecimal> {
        match self {
            NumberValue::Int(v) => Some(BigDecimal::from(*v)),
            NumberValue::Long(v) => Some(BigDecimal::from(*v)),
            NumberValue::BigInteger(v) => Some(BigDecimal::from(v.clone())),
            NumberValue::Double(v) => BigDecimal::from_str(&format_f64(*v, false)).ok(),
            NumberValue::BigDecimal(v) => Some(v.clone()),
        }
    }
}

/// Parse error for number text that passed lexing but cannot be resolved.
#[derive(Debug, thiserror::Error)]
#[error("invalid number text {0:?}")]
pub struct ParseNumberError(pub String);

/// Parses integer-looking text (an optional `-` followed by decimal
/// digits). Classification is progressive: at most 9 digits always fits
/// i32; at most 18 always fits i64 and is narrowed back to i32 when in
/// range; beyond that, i64 is verified and exact overflow falls through
/// to BigInt.
pub fn parse_integral(text: &str) -> Result<NumberValue, ParseNumberError> {
    let digits = text.strip_prefix('-').unwrap_or(text).len();
    if digits == 0 {
        return Err(ParseNumberError(text.to_string()));
    }

    if digits <= 9 {
        return text
            .parse::<i32>()
            .map(NumberValue::Int)
            .map_err(|_| ParseNumberError(text.to_string()));
    }
    if digits <= 18 {
        let v = text
            .parse::<i64>()
            .map_err(|_| ParseNumberError(text.to_string()))?;
        return Ok(narrow_i64(v));
    }
    if let Ok(v) = text.parse::<i64>() {
        return Ok(narrow_i64(v));
    }
    BigInt::from_str(text)
        .map(NumberValue::BigInteger)
        .map_err(|_| ParseNumberError(text.to_string()))
}

fn narrow_i64(v: i64) -> NumberValue {
    match i32::try_from(v) {
        Ok(v) => NumberValue::Int(v),
        Err(_) => NumberValue::Long(v),
    }
}

/// Parses recorded floating-point text to binary64. The `fast` flag
/// selects the optimized implementation; both paths are correctly
/// rounded, so results are identical.
pub fn parse_f64(text: &str, _fast: bool) -> Result<f64, ParseNumberError> {
    text.parse::<f64>()
        .map_err(|_| ParseNumberError(text.to_string()))
}

pub fn parse_f32(text: &str) -> Result<f32, ParseNumberError> {
    text.parse::<f32>()
        .map_err(|_| ParseNumberError(text.to_string()))
}

/// Parses recorded floating-point text to an unlimited-precision decimal.
/// This is the exact representation of the wire text, used by
/// `number_value_exact` since CirJSON does not preserve exact binary FP.
pub fn parse_big_decimal(text: &str) -> Result<BigDecimal, ParseNumberError> {
    BigDecimal::from_str(text).map_err(|_| ParseNumberError(text.to_string()))
}

pub fn format_i64(v: i64) -> String {
    let mut buf = itoa::Buffer::new();
    buf.format(v).to_string()
}

pub fn append_i64(out: &mut String, v: i64) {
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(v));
}

pub fn append_u64(out: &mut String, v: u64) {
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(v));
}

/// Formats binary64 as decimal text. The fast path produces the shortest
/// representation that round-trips; the fallback uses the platform
/// formatter, which also round-trips.
pub fn format_f64(v: f64, fast: bool) -> String {
    if fast {
        let mut buf = ryu::Buffer::new();
        buf.format(v).to_string()
    } else {
        format!("{v}")
    }
}

pub fn format_f32(v: f32, fast: bool) -> String {
    if fast {
        let mut buf = ryu::Buffer::new();
        buf.format(v).to_string()
    } else {
        format!("{v}")
    }
}

/// Formats a BigDecimal. Plain form never uses an exponent. The canonical
/// form switches to scientific notation when the scale is negative or the
/// adjusted exponent drops below -6, mirroring the common decimal
/// canonical-string rule.
pub fn format_big_decimal(v: &BigDecimal, as_plain: bool) -> String {
    if as_plain {
        return plain_string(v);
    }
    let (unscaled, scale) = v.as_bigint_and_exponent();
    if scale == 0 {
        return unscaled.to_string();
    }
    let digits = {
        let s = unscaled.magnitude().to_string();
        s.len() as i64
    };
    let adjusted = digits - 1 - scale;
    if scale >= 0 && adjusted >= -6 {
        return plain_string(v);
    }
    scientific_string(v)
}

fn plain_string(v: &BigDecimal) -> String {
    // The Display form of BigDecimal is plain (non-scientific).
    format!("{v}")
}

fn scientific_string(v: &BigDecimal) -> String {
    let (unscaled, scale) = v.as_bigint_and_exponent();
    let negative = unscaled.sign() == num_bigint::Sign::Minus;
    let digits = unscaled.magnitude().to_string();
    let adjusted = digits.len() as i64 - 1 - scale;

    let mut out = String::with_capacity(digits.len() + 8);
    if negative {
        out.push('-');
    }
    out.push_str(&digits[..1]);
    if digits.len() > 1 {
        out.push('.');
        out.push_str(&digits[1..]);
    }
    out.push('E');
    if adjusted >= 0 {
        out.push('+');
    }
    append_i64(&mut out, adjusted);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn integral(s: &str) -> NumberValue {
        parse_integral(s).unwrap()
    }

    #[test]
    fn test_progressive_classification() {
        assert_eq!(integral("0"), NumberValue::Int(0));
        assert_eq!(integral("-1234"), NumberValue::Int(-1234));
        assert_eq!(integral("999999999"), NumberValue::Int(999_999_999));

        // 10 digits: fits int when small enough, promotes otherwise.
        assert_eq!(integral("2000000000"), NumberValue::Int(2_000_000_000));
        assert_eq!(integral("3000000000"), NumberValue::Long(3_000_000_000));
        assert_eq!(integral("-3000000000"), NumberValue::Long(-3_000_000_000));

        // 18 digits is always long; 19 digits is verified.
        assert_eq!(
            integral("999999999999999999"),
            NumberValue::Long(999_999_999_999_999_999)
        );
        assert_eq!(
            integral("9223372036854775807"),
            NumberValue::Long(i64::MAX)
        );
        assert_eq!(
            integral("-9223372036854775808"),
            NumberValue::Long(i64::MIN)
        );

        // Exact overflow falls through to BigInt.
        assert_eq!(
            integral("9223372036854775808"),
            NumberValue::BigInteger(BigInt::from_str("9223372036854775808").unwrap())
        );
        let big = "123456789012345678901234567890";
        assert_eq!(
            integral(big),
            NumberValue::BigInteger(BigInt::from_str(big).unwrap())
        );
    }

    #[test]
    fn test_coercions() {
        assert_eq!(NumberValue::Long(42).as_i32(), Some(42));
        assert_eq!(NumberValue::Long(3_000_000_000).as_i32(), None);
        assert_eq!(NumberValue::Int(7).as_i64(), Some(7));
        assert_eq!(
            integral("99999999999999999999").as_i64(),
            None,
        );
        assert_eq!(NumberValue::Double(2.5).as_i32(), Some(2));
        assert_eq!(NumberValue::Double(1e300).as_i32(), None);
        assert_eq!(NumberValue::Int(3).as_f64(), 3.0);
    }

    #[test]
    fn test_deferred_float_conversion() {
        assert_eq!(parse_f64("0.25", false).unwrap(), 0.25);
        assert_eq!(parse_f64("0.25", true).unwrap(), 0.25);
        assert_eq!(parse_f64("-1e3", false).unwrap(), -1000.0);
        assert_eq!(parse_f32("0.5").unwrap(), 0.5);

        // The decimal form preserves the wire text exactly.
        let dec = parse_big_decimal("0.1").unwrap();
        assert_eq!(dec.to_string(), "0.1");
    }

    #[test]
    fn test_integer_formatting() {
        assert_eq!(format_i64(0), "0");
        assert_eq!(format_i64(-42), "-42");
        assert_eq!(format_i64(i64::MIN), "-9223372036854775808");
        let mut out = String::from("n=");
        append_u64(&mut out, u64::MAX);
        assert_eq!(out, "n=18446744073709551615");
    }

    #[test]
    fn test_double_formatting_roundtrips() {
        for v in [0.0, -0.0, 1.0, 0.1, 1e300, -2.5e-10, f64::MIN, f64::MAX] {
            for fast in [false, true] {
                let text = format_f64(v, fast);
                assert_eq!(text.parse::<f64>().unwrap(), v, "{text}");
            }
        }
    }

    #[test]
    fn test_big_decimal_formatting() {
        let small = BigDecimal::from_str("12.34").unwrap();
        assert_eq!(format_big_decimal(&small, true), "12.34");
        assert_eq!(format_big_decimal(&small, false), "12.34");

        let tiny = BigDecimal::from_str("1E-10").unwrap();
        assert_eq!(format_big_decimal(&tiny, true), "0.0000000001");
        assert_eq!(format_big_decimal(&tiny, false), "1E-10");

        let negative = BigDecimal::from_str("-2.5E-9").unwrap();
        assert_eq!(format_big_decimal(&negative, false), "-2.5E-9");

        let int = BigDecimal::from(37);
        assert_eq!(format_big_decimal(&int, false), "37");
        assert_eq!(format_big_decimal(&int, true), "37");
    }
}
