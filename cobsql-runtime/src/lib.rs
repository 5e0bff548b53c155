//! Runtime bridge between translated COBOL programs and SQL backends.
//!
//! The code the preprocessor generates drives one [`DbInterface`] instance
//! per connection: statements and cursors go in, result columns come back
//! as bytes ready to store into host variables. [`factory::get_interface`]
//! hands out the backend implementation by name; the PostgreSQL reference
//! driver ships behind the default `pgsql` feature.

pub mod cursor;
pub mod drivers;
pub mod error;
pub mod factory;
pub mod fixup;
pub mod interface;
pub mod params;

pub use cursor::Cursor;
pub use error::{code, DbError, DbResult, LastStatus};
pub use factory::get_interface;
pub use fixup::fixup_parameters;
pub use interface::{features, DbInterface, FetchMode, ResultSource, SqlParam};
pub use params::ConnectParams;
