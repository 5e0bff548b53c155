//! Data mapping between COBOL host-variable storage and Postgres.
//!
//! One side of the bridge is the closed set of COBOL storage classes
//! ([`CobolVarType`]): display numerics with overpunched or separate signs,
//! packed decimal, native binary, fixed and variable-length character
//! fields. The other side is the Postgres parameter/result surface via
//! `postgres_types`. [`CobField`] describes one host variable;
//! [`PgBindValue`] is what actually goes onto the wire.

pub mod error;
pub mod field;
pub mod number;
pub mod param;
pub mod value;
mod vartype;

pub use error::{CobConvError, CobConvResult};
pub use field::CobField;
pub use param::PgBindValue;
pub use value::{cell_to_bytes, cell_to_text};
pub use vartype::{
    CobolVarType, DB_NULL, FLAG_AUTOTRIM, FLAG_BINARY, FLAG_NONE, FLAG_NULLIND, FLAG_VARLEN,
    VARLEN_PICX_THRESHOLD, VARLEN_PREFIX_SZ,
};
