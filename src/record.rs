use memchr::memchr;

use crate::error::ParseError;

/// One `key;value` line. The key borrows from the chunk it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub key: &'a [u8],
    /// Fixed-point: the decimal point has been dropped, so `-12.3` is `-123`.
    pub value: i64,
}

/// Splits `line` at the first `separator` and decodes the value.
///
/// A trailing `\r` is stripped first. The value is read as an optionally
/// signed run of digits with at most one decimal point, which is removed; the
/// number of fractional digits is assumed to be the same across the input.
#[inline]
pub fn parse_record(line: &[u8], separator: u8) -> Result<Record<'_>, ParseError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let split = memchr(separator, line).ok_or(ParseError::MissingSeparator)?;
    let key = &line[..split];
    let value = parse_fixed(&line[split + 1..])?;
    Ok(Record { key, value })
}

#[inline]
pub fn parse_fixed(text: &[u8]) -> Result<i64, ParseError> {
    let invalid = || ParseError::InvalidValue(String::from_utf8_lossy(text).into_owned());
    let overflow = || ParseError::Overflow(String::from_utf8_lossy(text).into_owned());

    let (negative, digits) = match text.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', rest)) => (false, rest),
        _ => (false, text),
    };

    let mut seen_point = false;
    let mut seen_digit = false;
    let mut value: i64 = 0;
    for &b in digits {
        match b {
            b'0'..=b'9' => {
                seen_digit = true;
                let digit = i64::from(b - b'0');
                // Accumulate negatively so i64::MIN stays representable.
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_sub(digit))
                    .ok_or_else(overflow)?;
            }
            b'.' if !seen_point => seen_point = true,
            _ => return Err(invalid()),
        }
    }
    if !seen_digit {
        return Err(invalid());
    }

    if negative {
        Ok(value)
    } else {
        value.checked_neg().ok_or_else(overflow)
    }
}
