use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{CobConvError, CobConvResult};
use crate::number::{
    binary_size, decode_binary, decode_display, decode_packed, display_size, encode_binary,
    encode_display, encode_packed, packed_size, SignStyle,
};
use crate::param::PgBindValue;
use crate::vartype::{CobolVarType, FLAG_AUTOTRIM, FLAG_BINARY, FLAG_VARLEN, VARLEN_PREFIX_SZ};

/// Descriptor of one host variable as it appears in a generated parameter
/// line: storage class, declared length (digits for numerics, characters
/// otherwise), decimal scale and the flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CobField {
    pub var_type: CobolVarType,
    pub length: u32,
    pub scale: u32,
    pub flags: u32,
}

impl CobField {
    pub fn new(var_type: CobolVarType, length: u32, scale: u32, flags: u32) -> CobField {
        CobField {
            var_type,
            length,
            scale,
            flags,
        }
    }

    pub fn is_varlen(&self) -> bool {
        self.flags & FLAG_VARLEN != 0
    }

    pub fn is_binary_payload(&self) -> bool {
        self.flags & FLAG_BINARY != 0
    }

    fn autotrim(&self) -> bool {
        self.flags & FLAG_AUTOTRIM != 0
    }

    fn sign_style(&self) -> SignStyle {
        match self.var_type {
            CobolVarType::SignedNumberTc => SignStyle::TrailingCombined,
            CobolVarType::SignedNumberTs => SignStyle::TrailingSeparate,
            CobolVarType::SignedNumberLc => SignStyle::LeadingCombined,
            CobolVarType::SignedNumberLs => SignStyle::LeadingSeparate,
            _ => SignStyle::None,
        }
    }

    /// Bytes the field occupies in program storage.
    pub fn storage_size(&self) -> usize {
        let base = match self.var_type {
            t if t.is_display_numeric() => display_size(self.length, self.sign_style()),
            CobolVarType::UnsignedNumberPd | CobolVarType::SignedNumberPd => {
                packed_size(self.length)
            }
            CobolVarType::UnsignedBinary | CobolVarType::SignedBinary => binary_size(self.length),
            CobolVarType::Alphanumeric => self.length as usize,
            CobolVarType::Japanese => self.length as usize * 2,
            _ => unreachable!(),
        };
        if self.is_varlen() {
            VARLEN_PREFIX_SZ + base
        } else {
            base
        }
    }

    /// Slice the effective payload out of raw field storage, honouring the
    /// varlen length prefix.
    fn payload<'a>(&self, data: &'a [u8]) -> CobConvResult<&'a [u8]> {
        if !self.is_varlen() {
            return Ok(data);
        }
        if data.len() < VARLEN_PREFIX_SZ {
            return Err(CobConvError::BadFieldSize {
                expected: VARLEN_PREFIX_SZ,
                actual: data.len(),
            });
        }
        let len = u32::from_ne_bytes(data[..VARLEN_PREFIX_SZ].try_into().unwrap());
        let end = VARLEN_PREFIX_SZ + len as usize;
        if end > data.len() {
            return Err(CobConvError::BadVarlenPrefix(len));
        }
        Ok(&data[VARLEN_PREFIX_SZ..end])
    }

    /// Decode field storage into the value bound as a SQL parameter.
    ///
    /// Numerics become their decimal text form and bind in text format; the
    /// server's input conversion does the typing. A BINARY payload binds as
    /// raw bytes.
    pub fn param_from_storage(&self, data: &[u8]) -> CobConvResult<PgBindValue> {
        let payload = self.payload(data)?;
        if self.is_binary_payload() {
            return Ok(PgBindValue::Bytes(payload.to_vec()));
        }

        let value = match self.var_type {
            t if t.is_display_numeric() => {
                decode_display(payload, self.length, self.scale, self.sign_style())?.to_string()
            }
            CobolVarType::UnsignedNumberPd | CobolVarType::SignedNumberPd => {
                decode_packed(payload, self.scale, self.var_type.is_signed())?.to_string()
            }
            CobolVarType::UnsignedBinary | CobolVarType::SignedBinary => {
                decode_binary(payload, self.scale, self.var_type.is_signed())?.to_string()
            }
            CobolVarType::Alphanumeric | CobolVarType::Japanese => {
                let text = String::from_utf8_lossy(payload);
                if self.autotrim() && !self.is_varlen() {
                    text.trim_end_matches(' ').to_string()
                } else {
                    text.into_owned()
                }
            }
            _ => unreachable!(),
        };
        Ok(PgBindValue::Text(value))
    }

    /// Encode a result column's text form back into field storage bytes.
    pub fn storage_from_text(&self, text: &str) -> CobConvResult<Vec<u8>> {
        if self.var_type.is_numeric() {
            let value = Decimal::from_str(text.trim())
                .map_err(|_| CobConvError::BadDecimal(text.to_string()))?;
            return match self.var_type {
                t if t.is_display_numeric() => {
                    encode_display(&value, self.length, self.scale, self.sign_style())
                }
                CobolVarType::UnsignedNumberPd | CobolVarType::SignedNumberPd => {
                    encode_packed(&value, self.length, self.scale, self.var_type.is_signed())
                }
                _ => encode_binary(&value, self.length, self.scale, self.var_type.is_signed()),
            };
        }

        let capacity = match self.var_type {
            CobolVarType::Japanese => self.length as usize * 2,
            _ => self.length as usize,
        };
        let bytes = text.as_bytes();
        if bytes.len() > capacity {
            return Err(CobConvError::Truncated(bytes.len(), capacity));
        }

        if self.is_varlen() {
            let mut out = Vec::with_capacity(VARLEN_PREFIX_SZ + capacity);
            out.extend_from_slice(&(bytes.len() as u32).to_ne_bytes());
            out.extend_from_slice(bytes);
            out.resize(VARLEN_PREFIX_SZ + capacity, b' ');
            Ok(out)
        } else {
            let mut out = Vec::with_capacity(capacity);
            out.extend_from_slice(bytes);
            out.resize(capacity, b' ');
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vartype::FLAG_NONE;

    #[test]
    fn test_storage_sizes() {
        let packed = CobField::new(CobolVarType::SignedNumberPd, 7, 2, FLAG_NONE);
        assert_eq!(packed.storage_size(), 4);

        let sep = CobField::new(CobolVarType::SignedNumberLs, 4, 0, FLAG_NONE);
        assert_eq!(sep.storage_size(), 5);

        let varchar = CobField::new(CobolVarType::Alphanumeric, 30, 0, FLAG_VARLEN);
        assert_eq!(varchar.storage_size(), VARLEN_PREFIX_SZ + 30);
    }

    #[test]
    fn test_param_from_packed_storage() {
        let field = CobField::new(CobolVarType::SignedNumberPd, 7, 2, FLAG_NONE);
        let data = vec![0x00, 0x12, 0x34, 0x5c];
        assert_eq!(
            field.param_from_storage(&data).unwrap(),
            PgBindValue::Text("123.45".to_string())
        );
    }

    #[test]
    fn test_param_from_varlen_storage() {
        let field = CobField::new(CobolVarType::Alphanumeric, 10, 0, FLAG_VARLEN);
        let mut data = 5u32.to_ne_bytes().to_vec();
        data.extend_from_slice(b"hello     ");
        assert_eq!(
            field.param_from_storage(&data).unwrap(),
            PgBindValue::Text("hello".to_string())
        );
    }

    #[test]
    fn test_param_autotrim() {
        let trimmed = CobField::new(CobolVarType::Alphanumeric, 8, 0, FLAG_AUTOTRIM);
        assert_eq!(
            trimmed.param_from_storage(b"ab      ").unwrap(),
            PgBindValue::Text("ab".to_string())
        );
        let fixed = CobField::new(CobolVarType::Alphanumeric, 8, 0, FLAG_NONE);
        assert_eq!(
            fixed.param_from_storage(b"ab      ").unwrap(),
            PgBindValue::Text("ab      ".to_string())
        );
    }

    #[test]
    fn test_storage_from_text_round_trip() {
        let field = CobField::new(CobolVarType::SignedNumberTc, 5, 2, FLAG_NONE);
        let storage = field.storage_from_text("-9.5").unwrap();
        assert_eq!(
            field.param_from_storage(&storage).unwrap(),
            PgBindValue::Text("-9.50".to_string())
        );
    }

    #[test]
    fn test_storage_from_text_truncation() {
        let field = CobField::new(CobolVarType::Alphanumeric, 3, 0, FLAG_NONE);
        assert!(matches!(
            field.storage_from_text("abcd"),
            Err(CobConvError::Truncated(4, 3))
        ));
    }

    #[test]
    fn test_binary_payload_passthrough() {
        let field = CobField::new(CobolVarType::Alphanumeric, 4, 0, FLAG_BINARY);
        assert_eq!(
            field.param_from_storage(&[0xde, 0xad, 0xbe, 0xef]).unwrap(),
            PgBindValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef])
        );
    }
}
