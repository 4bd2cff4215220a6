//! Small text utilities shared by the parser: numeric/boolean property
//! parsing, identifier validation and the access-key comparator used for
//! name lookups.

use once_cell::sync::Lazy;
use regex::Regex;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap());
static REF_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$").unwrap());

/// Checks that `name` is a valid DSL identifier.
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Checks that `name` is a valid dotted reference (`ns.sub.Elem`).
pub fn is_valid_ref_name(name: &str) -> bool {
    REF_NAME_RE.is_match(name)
}

/// Lookup key for fields/messages/interfaces/frames: only the first
/// character is case-folded. The DSL allows references to vary the case of
/// the leading letter (`someField` vs `SomeField`) while the rest of the
/// name is matched exactly.
pub fn access_key(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parses `true`/`false`/`1`/`0` (ASCII case-insensitive).
pub fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") || s == "1" {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s == "0" {
        Some(false)
    } else {
        None
    }
}

fn split_radix(s: &str) -> (&str, u32) {
    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (rest, 16)
    } else if let Some(rest) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (rest, 2)
    } else {
        (s, 10)
    }
}

/// Parses an unsigned decimal/hex/binary number.
pub fn parse_unsigned(s: &str) -> Option<u32> {
    let (digits, radix) = split_radix(s.trim());
    u32::from_str_radix(digits, radix).ok()
}

/// Parses an unsigned number up to `u64` range.
pub fn parse_uint_max(s: &str) -> Option<u64> {
    let (digits, radix) = split_radix(s.trim());
    u64::from_str_radix(digits, radix).ok()
}

/// Parses a possibly-negative number into the `i64` storage the IR uses for
/// all integral values. Values in `(i64::MAX, u64::MAX]` are stored as their
/// two's-complement bit pattern and flagged through the second tuple member,
/// mirroring how big unsigned constants travel through the library.
pub fn parse_intmax(s: &str) -> Option<(i64, bool)> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('-') {
        let (digits, radix) = split_radix(rest);
        let val = i64::from_str_radix(&format!("-{}", digits), radix).ok()?;
        return Some((val, false));
    }

    let (digits, radix) = split_radix(s.strip_prefix('+').unwrap_or(s));
    let val = u64::from_str_radix(digits, radix).ok()?;
    Some((val as i64, val > i64::MAX as u64))
}

/// Parses a floating point property value; accepts the `nan`/`inf`/`-inf`
/// spellings the DSL documents for `<float>` defaults.
pub fn parse_float(s: &str) -> Option<f64> {
    match s.trim() {
        "nan" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

/// Parses a hex byte string (`"ab 01 ff"` or `"ab01ff"`) into bytes.
pub fn parse_hex_bytes(s: &str) -> Option<Vec<u8>> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        return None;
    }

    (0..cleaned.len())
        .step_by(2)
        .map(|idx| u8::from_str_radix(&cleaned[idx..idx + 2], 16).ok())
        .collect()
}

/// Collapses internal whitespace runs into single spaces.
pub fn normalise(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert!(is_valid_name("Msg1"));
        assert!(is_valid_name("_field"));
        assert!(!is_valid_name("1Msg"));
        assert!(!is_valid_name("a.b"));
        assert!(is_valid_ref_name("ns1.ns2.Field"));
        assert!(!is_valid_ref_name("ns1..Field"));
        assert!(!is_valid_ref_name(".Field"));
        assert!(!is_valid_ref_name("Field."));
    }

    #[test]
    fn access_key_folds_first_char_only() {
        assert_eq!("someField", access_key("SomeField"));
        assert_eq!("someField", access_key("someField"));
        // Only the leading character participates.
        assert_ne!(access_key("FieldA"), access_key("FieldA".to_lowercase().as_str()));
    }

    #[test]
    fn numbers() {
        assert_eq!(Some(16), parse_unsigned("0x10"));
        assert_eq!(Some(5), parse_unsigned("0b101"));
        assert_eq!(Some((-2, false)), parse_intmax("-2"));
        assert_eq!(Some((255, false)), parse_intmax("0xff"));
        let (bits, big) = parse_intmax("0xffffffffffffffff").unwrap();
        assert_eq!(-1, bits);
        assert!(big);
        assert_eq!(None, parse_unsigned("12abc"));
    }

    #[test]
    fn hex_bytes() {
        assert_eq!(Some(vec![0xab, 0x01, 0xff]), parse_hex_bytes("ab 01 ff"));
        assert_eq!(Some(vec![0xde, 0xad]), parse_hex_bytes("dead"));
        assert_eq!(None, parse_hex_bytes("abc"));
    }

    #[test]
    fn floats() {
        assert!(parse_float("nan").unwrap().is_nan());
        assert_eq!(Some(f64::INFINITY), parse_float("inf"));
        assert_eq!(Some(-1.25), parse_float("-1.25"));
    }
}
