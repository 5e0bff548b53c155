use std::error::Error;

use bytes::{BufMut, BytesMut};
use postgres_types::{to_sql_checked, Format, IsNull, ToSql, Type};

/// A bound parameter value on its way to the backend.
///
/// Text payloads are sent in text format with no client-side type claim, so
/// the server's input conversion resolves the target type — numerics, dates
/// and booleans all travel as their literal text form, the way the
/// translated programs bound them historically. Raw payloads (the BINARY
/// flag) are sent in binary format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgBindValue {
    Text(String),
    Bytes(Vec<u8>),
    Null,
}

impl ToSql for PgBindValue {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            PgBindValue::Null => Ok(IsNull::Yes),
            PgBindValue::Text(s) => {
                out.put_slice(s.as_bytes());
                Ok(IsNull::No)
            }
            PgBindValue::Bytes(b) => {
                out.put_slice(b);
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        match self {
            PgBindValue::Bytes(_) => Format::Binary,
            _ => Format::Text,
        }
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_encoding() {
        let mut buf = BytesMut::new();
        let v = PgBindValue::Text("123.45".to_string());
        assert!(matches!(v.to_sql(&Type::INT4, &mut buf), Ok(IsNull::No)));
        assert_eq!(&buf[..], b"123.45");
        assert!(matches!(v.encode_format(&Type::INT4), Format::Text));
    }

    #[test]
    fn test_null_encoding() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            PgBindValue::Null.to_sql(&Type::TEXT, &mut buf),
            Ok(IsNull::Yes)
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_bytes_use_binary_format() {
        let v = PgBindValue::Bytes(vec![0x00, 0xff]);
        assert!(matches!(v.encode_format(&Type::BYTEA), Format::Binary));
    }
}
