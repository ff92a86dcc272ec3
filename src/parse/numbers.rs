//! Hand-rolled number parsing for the hot attributes of an OSM file.
//!
//! `lat`/`lon` go straight to fixed point without a float parser, and ids
//! skip `str::parse`'s UTF-8 and sign handling. In relaxed mode nothing is
//! validated and malformed text yields an unspecified value.

use crate::data::osm::{LatLonT, OsmId, LATLON_MAX, LAT_MAX, LATLON_SCALE};
use crate::errors::{Error, Result};

/// Parse `[-]D+(.D+)?` degrees into 1e-7 degree units.
///
/// Fractional digits past the seventh are dropped (truncation toward zero).
pub fn parse_latlon(text: &[u8], strict: bool) -> Result<LatLonT> {
    parse_fixed(text, strict, LATLON_MAX)
}

/// [`parse_latlon`] for latitudes: strict mode also rejects |v| > 90.
pub fn parse_lat(text: &[u8], strict: bool) -> Result<LatLonT> {
    parse_fixed(text, strict, LAT_MAX)
}

fn parse_fixed(text: &[u8], strict: bool, max: LatLonT) -> Result<LatLonT> {
    let (negative, digits) = match text.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, text),
    };

    let mut value: i64 = 0;
    let mut lsb: i64 = LATLON_SCALE;
    let mut int_digits = 0usize;
    let mut frac_digits = 0usize;
    let mut in_fraction = false;

    for &c in digits {
        match c {
            b'0'..=b'9' => {
                let d = (c - b'0') as i64;
                if !in_fraction {
                    int_digits += 1;
                    value = value.saturating_mul(10).saturating_add(d);
                } else {
                    frac_digits += 1;
                    if lsb > 1 {
                        lsb /= 10;
                        value = value.saturating_mul(10).saturating_add(d);
                    }
                }
            }
            b'.' if !in_fraction => in_fraction = true,
            _ if strict => {
                return Err(Error::syntax(format!(
                    "invalid character {:?} in coordinate {:?}",
                    c as char,
                    String::from_utf8_lossy(text)
                )));
            }
            _ => {}
        }
    }

    if strict && (int_digits == 0 || (in_fraction && frac_digits == 0)) {
        return Err(Error::syntax(format!(
            "malformed coordinate {:?}",
            String::from_utf8_lossy(text)
        )));
    }

    let scaled = value.saturating_mul(lsb);
    let signed = if negative { -scaled } else { scaled };
    if strict && signed.unsigned_abs() > max as u64 {
        return Err(Error::syntax(format!(
            "coordinate {:?} out of range",
            String::from_utf8_lossy(text)
        )));
    }
    Ok(signed as LatLonT)
}

/// Parse an unsigned decimal id of width `I`.
///
/// Relaxed mode behaves like `strtoull`: it stops at the first non-digit and
/// wraps on overflow, then keeps the low bits for narrow ids.
pub fn parse_id<I: OsmId>(text: &[u8], strict: bool) -> Result<I> {
    if !strict {
        let value = text
            .iter()
            .take_while(|c| c.is_ascii_digit())
            .fold(0u64, |acc, &c| acc.wrapping_mul(10).wrapping_add((c - b'0') as u64));
        return Ok(I::from_u64_truncating(value));
    }

    let invalid = || Error::syntax(format!("invalid id {:?}", String::from_utf8_lossy(text)));
    if text.is_empty() {
        return Err(invalid());
    }
    let mut value: u64 = 0;
    for &c in text {
        if !c.is_ascii_digit() {
            return Err(invalid());
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((c - b'0') as u64))
            .ok_or_else(invalid)?;
    }
    if value > I::MAX {
        return Err(Error::syntax(format!(
            "id {value} exceeds the configured maximum {}",
            I::MAX
        )));
    }
    Ok(I::from_u64_truncating(value))
}

/// `atoi`-style parse of a `layer` value, clamped to `i8`.
pub fn parse_layer(text: &str) -> i8 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', rest)) => (false, rest),
        _ => (false, text.as_bytes()),
    };
    let magnitude = digits
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .fold(0i32, |acc, &c| acc.saturating_mul(10).saturating_add((c - b'0') as i32));
    let value = if negative { -magnitude } else { magnitude };
    value.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}
