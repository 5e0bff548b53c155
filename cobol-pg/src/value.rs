//! Result-column extraction: one match arm per supported Postgres type,
//! everything funnelled into the text form the translated program stores
//! back into its host variables.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::Type;
use tokio_postgres::Row;

use crate::error::{CobConvError, CobConvResult};

fn hex_escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// The column value at `idx` rendered as SQL text, `None` for NULL.
///
/// Binary columns come back in the `\x…` escaped form; use [`cell_to_bytes`]
/// when the caller asked for raw bytes.
pub fn cell_to_text(row: &Row, idx: usize) -> CobConvResult<Option<String>> {
    let ty = row.columns()[idx].type_().clone();

    let text = if ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?
            .map(|v| (if v { "1" } else { "0" }).to_string())
    } else if ty == Type::CHAR {
        row.try_get::<_, Option<i8>>(idx)?.map(|v| v.to_string())
    } else if ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(|v| v.to_string())
    } else if ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(|v| v.to_string())
    } else if ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(|v| v.to_string())
    } else if ty == Type::OID {
        row.try_get::<_, Option<u32>>(idx)?.map(|v| v.to_string())
    } else if ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| v.to_string())
    } else if ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(|v| v.to_string())
    } else if ty == Type::NUMERIC {
        row.try_get::<_, Option<Decimal>>(idx)?.map(|v| v.to_string())
    } else if ty == Type::TEXT
        || ty == Type::VARCHAR
        || ty == Type::BPCHAR
        || ty == Type::NAME
        || ty == Type::UNKNOWN
    {
        row.try_get::<_, Option<String>>(idx)?
    } else if ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?
            .map(|v| hex_escape(&v))
    } else if ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| v.format("%Y-%m-%d").to_string())
    } else if ty == Type::TIME {
        row.try_get::<_, Option<NaiveTime>>(idx)?
            .map(|v| v.format("%H:%M:%S%.f").to_string())
    } else if ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    } else if ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| v.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())
    } else {
        return Err(CobConvError::UnsupportedColumnType(ty.to_string()));
    };

    Ok(text)
}

/// The column value at `idx` as raw bytes, `None` for NULL. Non-BYTEA
/// columns yield the bytes of their text form.
pub fn cell_to_bytes(row: &Row, idx: usize) -> CobConvResult<Option<Vec<u8>>> {
    let ty = row.columns()[idx].type_().clone();
    if ty == Type::BYTEA {
        Ok(row.try_get::<_, Option<Vec<u8>>>(idx)?)
    } else {
        Ok(cell_to_text(row, idx)?.map(String::into_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_escape() {
        assert_eq!(hex_escape(&[0xde, 0xad, 0x00]), "\\xdead00");
        assert_eq!(hex_escape(&[]), "\\x");
    }
}
