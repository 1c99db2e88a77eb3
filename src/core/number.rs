//! Numeric representation and conversion helpers shared by the scanner,
//! the operator table and the typed-array stores.

const TWO_32: f64 = 2_i64.pow(32) as f64; // 2^32

/// Comparison tolerance for floating point equality.
pub(crate) const FP_EPSILON: f64 = 1e-10;

/// A number is either an exact 32-bit integer or a double. Integer results
/// stay integers until an operation forces them out (division, overflow,
/// mixing with a double).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Num {
    Int(i32),
    Fp(f64),
}

impl Num {
    pub fn to_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Fp(f) => f,
        }
    }

    pub fn is_fp(self) -> bool {
        matches!(self, Num::Fp(_))
    }

    pub fn is_nan(self) -> bool {
        matches!(self, Num::Fp(f) if f.is_nan())
    }

    /// Fold a double back into the integer representation when it is exact.
    pub fn normalized(self) -> Num {
        match self {
            Num::Fp(f) if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 => {
                Num::Int(f as i32)
            }
            other => other,
        }
    }
}

impl std::fmt::Display for Num {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Num::Int(i) => write!(f, "{i}"),
            Num::Fp(v) if v.is_nan() => write!(f, "NaN"),
            Num::Fp(v) if v.is_infinite() => {
                write!(f, "{}Infinity", if v < 0.0 { "-" } else { "" })
            }
            Num::Fp(v) => write!(f, "{v}"),
        }
    }
}

/// Equality with tolerance. NaN compares unequal to everything, itself
/// included.
pub(crate) fn fp_is_eq(a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    (a - b).abs() < FP_EPSILON
}

/// ToInt32 semantics for Number inputs (bitwise operand coercion).
pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let int = n.trunc();
    let int32bit = ((int % TWO_32) + TWO_32) % TWO_32;
    if int32bit >= TWO_32 / 2.0 {
        (int32bit - TWO_32) as i32
    } else {
        int32bit as i32
    }
}

/// ToUint32 semantics for Number inputs (`>>>` coercion).
pub(crate) fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0_u32;
    }
    let int = n.trunc();
    (((int % TWO_32) + TWO_32) % TWO_32) as u32
}

fn parse_radix(digits: &str, radix: u32) -> Option<Num> {
    if digits.is_empty() {
        return None;
    }
    let v = i64::from_str_radix(digits, radix).ok()?;
    if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
        Some(Num::Int(v as i32))
    } else {
        Some(Num::Fp(v as f64))
    }
}

/// Parse a numeric literal exactly as the scanner delimits them: decimal
/// with optional fraction and exponent, `0x`/`0o`/`0b` prefixes, and the
/// legacy leading-zero octal form. Returns `None` for malformed input
/// (e.g. `0x` with no digits, `08` outside octal range).
pub(crate) fn parse_num(text: &str) -> Option<Num> {
    if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return parse_radix(rest, 16);
    }
    if let Some(rest) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        return parse_radix(rest, 8);
    }
    if let Some(rest) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        return parse_radix(rest, 2);
    }
    if text.len() > 1
        && text.starts_with('0')
        && text.bytes().all(|b| b.is_ascii_digit())
    {
        return parse_radix(&text[1..], 8);
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return parse_radix(text, 10);
    }
    let f: f64 = text.parse().ok()?;
    Some(Num::Fp(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_forms() {
        assert_eq!(parse_num("42"), Some(Num::Int(42)));
        assert_eq!(parse_num("0"), Some(Num::Int(0)));
        assert_eq!(parse_num("0x1f"), Some(Num::Int(31)));
        assert_eq!(parse_num("0o17"), Some(Num::Int(15)));
        assert_eq!(parse_num("0b101"), Some(Num::Int(5)));
        assert_eq!(parse_num("017"), Some(Num::Int(15)));
    }

    #[test]
    fn parses_fp_forms() {
        assert_eq!(parse_num("1.5"), Some(Num::Fp(1.5)));
        assert_eq!(parse_num("2e3"), Some(Num::Fp(2000.0)));
        assert_eq!(parse_num(".25"), Some(Num::Fp(0.25)));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse_num("0x"), None);
        assert_eq!(parse_num("08"), None);
        assert_eq!(parse_num("1.2.3"), None);
    }

    #[test]
    fn large_hex_overflows_to_fp() {
        assert_eq!(parse_num("0xffffffff"), Some(Num::Fp(4294967295.0)));
    }

    #[test]
    fn formatting() {
        assert_eq!(Num::Int(-3).to_string(), "-3");
        assert_eq!(Num::Fp(1.5).to_string(), "1.5");
        assert_eq!(Num::Fp(f64::NAN).to_string(), "NaN");
        assert_eq!(Num::Fp(f64::INFINITY).to_string(), "Infinity");
    }

    #[test]
    fn int32_wrapping() {
        assert_eq!(to_int32(TWO_32 + 5.0), 5);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(to_int32(f64::NAN), 0);
    }
}
