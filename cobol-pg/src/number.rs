//! Codecs between COBOL numeric storage and `rust_decimal::Decimal`.
//!
//! Display numerics keep one ASCII digit per byte with the decimal point
//! implied by the declared scale. Packed decimal is BCD with a trailing sign
//! nibble. Binary is big-endian two's complement sized by the digit count.

use rust_decimal::Decimal;

use crate::error::{CobConvError, CobConvResult};

/// Sign placement of a display numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignStyle {
    /// Unsigned; any sign is an error.
    None,
    /// Sign overpunched on the last digit byte.
    TrailingCombined,
    /// A separate `+`/`-` byte after the digits.
    TrailingSeparate,
    /// Sign overpunched on the first digit byte.
    LeadingCombined,
    /// A separate `+`/`-` byte before the digits.
    LeadingSeparate,
}

/// Storage width of a COMP field holding `digits` decimal digits.
pub fn binary_size(digits: u32) -> usize {
    match digits {
        0..=4 => 2,
        5..=9 => 4,
        _ => 8,
    }
}

/// The field's mantissa at the declared scale, range-checked against the
/// declared digit count.
fn rescaled_mantissa(value: &Decimal, digits: u32, scale: u32) -> CobConvResult<i128> {
    let mut v = *value;
    v.rescale(scale);
    let mantissa = v.mantissa();
    if mantissa.unsigned_abs() >= 10u128.pow(digits) {
        return Err(CobConvError::FieldOverflow(value.to_string(), digits));
    }
    Ok(mantissa)
}

fn decimal_from_mantissa(mantissa: i128, scale: u32) -> Decimal {
    Decimal::from_i128_with_scale(mantissa, scale)
}

// Overpunch tables, ASCII convention: positive 0..9 -> '{', 'A'..'I';
// negative 0..9 -> '}', 'J'..'R'. Plain digits read back as positive.
fn overpunch_encode(digit: u8, negative: bool) -> u8 {
    if negative {
        if digit == 0 {
            b'}'
        } else {
            b'J' + digit - 1
        }
    } else if digit == 0 {
        b'{'
    } else {
        b'A' + digit - 1
    }
}

fn overpunch_decode(byte: u8) -> CobConvResult<(u8, bool)> {
    match byte {
        b'0'..=b'9' => Ok((byte - b'0', false)),
        b'{' => Ok((0, false)),
        b'A'..=b'I' => Ok((byte - b'A' + 1, false)),
        b'}' => Ok((0, true)),
        b'J'..=b'R' => Ok((byte - b'J' + 1, true)),
        _ => Err(CobConvError::BadDigit(byte)),
    }
}

fn ascii_digit(byte: u8) -> CobConvResult<u8> {
    if byte.is_ascii_digit() {
        Ok(byte - b'0')
    } else {
        Err(CobConvError::BadDigit(byte))
    }
}

/// Storage width of a display numeric with the given sign style.
pub fn display_size(digits: u32, style: SignStyle) -> usize {
    let sep = matches!(style, SignStyle::TrailingSeparate | SignStyle::LeadingSeparate);
    digits as usize + usize::from(sep)
}

pub fn decode_display(
    data: &[u8],
    digits: u32,
    scale: u32,
    style: SignStyle,
) -> CobConvResult<Decimal> {
    let expected = display_size(digits, style);
    if data.len() != expected {
        return Err(CobConvError::BadFieldSize {
            expected,
            actual: data.len(),
        });
    }

    let mut negative = false;
    let mut mantissa: i128 = 0;
    let last = data.len() - 1;
    for (i, &byte) in data.iter().enumerate() {
        let digit = match (style, i) {
            (SignStyle::TrailingCombined, idx) if idx == last => {
                let (d, neg) = overpunch_decode(byte)?;
                negative = neg;
                d
            }
            (SignStyle::LeadingCombined, 0) => {
                let (d, neg) = overpunch_decode(byte)?;
                negative = neg;
                d
            }
            (SignStyle::TrailingSeparate, idx) if idx == last => {
                negative = match byte {
                    b'+' | b' ' => false,
                    b'-' => true,
                    _ => return Err(CobConvError::BadSign(byte)),
                };
                continue;
            }
            (SignStyle::LeadingSeparate, 0) => {
                negative = match byte {
                    b'+' | b' ' => false,
                    b'-' => true,
                    _ => return Err(CobConvError::BadSign(byte)),
                };
                continue;
            }
            // space-filled fields read as zero digits
            _ if byte == b' ' => 0,
            _ => ascii_digit(byte)?,
        };
        mantissa = mantissa * 10 + i128::from(digit);
    }

    if negative {
        mantissa = -mantissa;
    }
    Ok(decimal_from_mantissa(mantissa, scale))
}

pub fn encode_display(
    value: &Decimal,
    digits: u32,
    scale: u32,
    style: SignStyle,
) -> CobConvResult<Vec<u8>> {
    let mantissa = rescaled_mantissa(value, digits, scale)?;
    let negative = mantissa < 0;
    if negative && style == SignStyle::None {
        return Err(CobConvError::NegativeUnsigned(value.to_string()));
    }

    let body = format!("{:0width$}", mantissa.unsigned_abs(), width = digits as usize);
    let mut out = Vec::with_capacity(display_size(digits, style));
    match style {
        SignStyle::None => out.extend_from_slice(body.as_bytes()),
        SignStyle::TrailingCombined => {
            out.extend_from_slice(body.as_bytes());
            let last = out.last_mut().unwrap();
            *last = overpunch_encode(*last - b'0', negative);
        }
        SignStyle::LeadingCombined => {
            out.extend_from_slice(body.as_bytes());
            let first = out.first_mut().unwrap();
            *first = overpunch_encode(*first - b'0', negative);
        }
        SignStyle::TrailingSeparate => {
            out.extend_from_slice(body.as_bytes());
            out.push(if negative { b'-' } else { b'+' });
        }
        SignStyle::LeadingSeparate => {
            out.push(if negative { b'-' } else { b'+' });
            out.extend_from_slice(body.as_bytes());
        }
    }
    Ok(out)
}

/// Storage width of a COMP-3 field holding `digits` decimal digits.
pub fn packed_size(digits: u32) -> usize {
    digits as usize / 2 + 1
}

pub fn decode_packed(data: &[u8], scale: u32, signed: bool) -> CobConvResult<Decimal> {
    if data.is_empty() {
        return Err(CobConvError::BadFieldSize {
            expected: 1,
            actual: 0,
        });
    }

    let mut mantissa: i128 = 0;
    let last = data.len() - 1;
    for (i, &byte) in data.iter().enumerate() {
        let high = byte >> 4;
        let low = byte & 0x0f;

        if high > 9 {
            return Err(CobConvError::BadNibble(high));
        }
        mantissa = mantissa * 10 + i128::from(high);

        if i == last {
            let negative = match low {
                0x0a | 0x0c | 0x0e | 0x0f => false,
                0x0b | 0x0d => true,
                _ => return Err(CobConvError::BadNibble(low)),
            };
            if negative {
                if !signed {
                    return Err(CobConvError::BadNibble(low));
                }
                mantissa = -mantissa;
            }
        } else {
            if low > 9 {
                return Err(CobConvError::BadNibble(low));
            }
            mantissa = mantissa * 10 + i128::from(low);
        }
    }
    Ok(decimal_from_mantissa(mantissa, scale))
}

pub fn encode_packed(
    value: &Decimal,
    digits: u32,
    scale: u32,
    signed: bool,
) -> CobConvResult<Vec<u8>> {
    let mantissa = rescaled_mantissa(value, digits, scale)?;
    let negative = mantissa < 0;
    if negative && !signed {
        return Err(CobConvError::NegativeUnsigned(value.to_string()));
    }

    let size = packed_size(digits);
    // digit nibbles available ahead of the sign nibble
    let nibbles = size * 2 - 1;
    let body = format!("{:0width$}", mantissa.unsigned_abs(), width = nibbles);

    let mut out = Vec::with_capacity(size);
    let bytes = body.as_bytes();
    for pair in 0..size - 1 {
        let high = bytes[pair * 2] - b'0';
        let low = bytes[pair * 2 + 1] - b'0';
        out.push((high << 4) | low);
    }
    let sign = if !signed {
        0x0f
    } else if negative {
        0x0d
    } else {
        0x0c
    };
    out.push(((bytes[nibbles - 1] - b'0') << 4) | sign);
    Ok(out)
}

pub fn decode_binary(data: &[u8], scale: u32, signed: bool) -> CobConvResult<Decimal> {
    let mantissa: i128 = match (data.len(), signed) {
        (2, true) => i128::from(i16::from_be_bytes([data[0], data[1]])),
        (2, false) => i128::from(u16::from_be_bytes([data[0], data[1]])),
        (4, true) => i128::from(i32::from_be_bytes([data[0], data[1], data[2], data[3]])),
        (4, false) => i128::from(u32::from_be_bytes([data[0], data[1], data[2], data[3]])),
        (8, true) => i128::from(i64::from_be_bytes(data.try_into().unwrap())),
        (8, false) => i128::from(u64::from_be_bytes(data.try_into().unwrap())),
        (n, _) => {
            return Err(CobConvError::BadFieldSize {
                expected: 8,
                actual: n,
            })
        }
    };
    Ok(decimal_from_mantissa(mantissa, scale))
}

pub fn encode_binary(
    value: &Decimal,
    digits: u32,
    scale: u32,
    signed: bool,
) -> CobConvResult<Vec<u8>> {
    let mantissa = rescaled_mantissa(value, digits, scale)?;
    if mantissa < 0 && !signed {
        return Err(CobConvError::NegativeUnsigned(value.to_string()));
    }

    let out = match binary_size(digits) {
        2 => {
            let v = i16::try_from(mantissa)
                .map_err(|_| CobConvError::FieldOverflow(value.to_string(), digits))?;
            v.to_be_bytes().to_vec()
        }
        4 => {
            let v = i32::try_from(mantissa)
                .map_err(|_| CobConvError::FieldOverflow(value.to_string(), digits))?;
            v.to_be_bytes().to_vec()
        }
        _ => {
            let v = i64::try_from(mantissa)
                .map_err(|_| CobConvError::FieldOverflow(value.to_string(), digits))?;
            v.to_be_bytes().to_vec()
        }
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_display_unsigned_round_trip() {
        let out = encode_display(&dec("1.5"), 4, 2, SignStyle::None).unwrap();
        assert_eq!(out, b"0150");
        assert_eq!(decode_display(&out, 4, 2, SignStyle::None).unwrap(), dec("1.50"));
    }

    #[test]
    fn test_display_trailing_combined() {
        let out = encode_display(&dec("-123"), 3, 0, SignStyle::TrailingCombined).unwrap();
        assert_eq!(out, b"12L");
        assert_eq!(
            decode_display(b"12L", 3, 0, SignStyle::TrailingCombined).unwrap(),
            dec("-123")
        );
        // plain digits are read as positive
        assert_eq!(
            decode_display(b"123", 3, 0, SignStyle::TrailingCombined).unwrap(),
            dec("123")
        );
    }

    #[test]
    fn test_display_leading_separate() {
        let out = encode_display(&dec("-42"), 4, 0, SignStyle::LeadingSeparate).unwrap();
        assert_eq!(out, b"-0042");
        assert_eq!(
            decode_display(&out, 4, 0, SignStyle::LeadingSeparate).unwrap(),
            dec("-42")
        );
    }

    #[test]
    fn test_display_overflow() {
        assert!(matches!(
            encode_display(&dec("1234"), 3, 0, SignStyle::None),
            Err(CobConvError::FieldOverflow(_, 3))
        ));
        assert!(matches!(
            encode_display(&dec("-1"), 3, 0, SignStyle::None),
            Err(CobConvError::NegativeUnsigned(_))
        ));
    }

    #[test]
    fn test_packed_round_trip() {
        let out = encode_packed(&dec("123.45"), 7, 2, true).unwrap();
        assert_eq!(out, vec![0x00, 0x12, 0x34, 0x5c]);
        assert_eq!(decode_packed(&out, 2, true).unwrap(), dec("123.45"));

        let neg = encode_packed(&dec("-1"), 3, 0, true).unwrap();
        assert_eq!(neg, vec![0x00, 0x1d]);
        assert_eq!(decode_packed(&neg, 0, true).unwrap(), dec("-1"));
    }

    #[test]
    fn test_packed_unsigned_sign_nibble() {
        let out = encode_packed(&dec("7"), 1, 0, false).unwrap();
        assert_eq!(out, vec![0x7f]);
        assert!(matches!(
            decode_packed(&[0x7d], 0, false),
            Err(CobConvError::BadNibble(0x0d))
        ));
    }

    #[test]
    fn test_binary_round_trip() {
        assert_eq!(binary_size(4), 2);
        assert_eq!(binary_size(9), 4);
        assert_eq!(binary_size(18), 8);

        let out = encode_binary(&dec("-300"), 4, 0, true).unwrap();
        assert_eq!(out, (-300i16).to_be_bytes().to_vec());
        assert_eq!(decode_binary(&out, 0, true).unwrap(), dec("-300"));

        let wide = encode_binary(&dec("40000"), 5, 0, false).unwrap();
        assert_eq!(decode_binary(&wide, 0, false).unwrap(), dec("40000"));
    }

    #[test]
    fn test_binary_scale() {
        let out = encode_binary(&dec("99.99"), 4, 2, true).unwrap();
        assert_eq!(decode_binary(&out, 2, true).unwrap(), dec("99.99"));
    }
}
