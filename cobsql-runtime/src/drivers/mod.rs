#[cfg(feature = "pgsql")]
pub mod pgsql;
