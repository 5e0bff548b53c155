use async_trait::async_trait;

use cobol_pg::{CobField, PgBindValue};

use crate::cursor::Cursor;
use crate::error::{DbError, DbResult, LastStatus};
use crate::params::ConnectParams;

/// Positioning mode of a single-row fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Next,
    Prev,
    Current,
}

impl FetchMode {
    /// Mode codes as emitted by the code generator.
    pub fn from_code(code: i32) -> Option<FetchMode> {
        match code {
            0 => Some(FetchMode::Next),
            1 => Some(FetchMode::Prev),
            2 => Some(FetchMode::Current),
            _ => None,
        }
    }
}

/// Which result set a value is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSource {
    /// The rows of the last plain `exec`/`exec_params` query.
    Current,
    Cursor(String),
    /// The rows of a named prepared statement's last execution.
    Statement(String),
}

/// Backend capability bits reported by `native_features`.
pub mod features {
    pub const RESULTSET_ROW_COUNT: u32 = 1 << 0;
}

/// One bound parameter: the host variable descriptor plus its raw storage,
/// copied out of the program before the backend call. `data == None` is the
/// NULL sentinel.
#[derive(Debug, Clone)]
pub struct SqlParam {
    pub field: CobField,
    pub data: Option<Vec<u8>>,
}

impl SqlParam {
    pub fn new(field: CobField, data: Vec<u8>) -> SqlParam {
        SqlParam {
            field,
            data: Some(data),
        }
    }

    pub fn null(field: CobField) -> SqlParam {
        SqlParam { field, data: None }
    }

    /// Decode the stored bytes into the value bound on the wire.
    pub fn bind_value(&self) -> DbResult<PgBindValue> {
        match &self.data {
            None => Ok(PgBindValue::Null),
            Some(bytes) => self
                .field
                .param_from_storage(bytes)
                .map_err(|e| DbError::internal(e.to_string())),
        }
    }
}

/// The capability set a backend driver exposes to the translated program.
///
/// Every operation records its outcome in the driver's last-status triple;
/// `last_rc`/`last_error`/`last_state` read it back. One instance serves
/// one connection from one thread; operations may block on backend I/O for
/// as long as the backend permits.
impl std::fmt::Debug for dyn DbInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn DbInterface")
    }
}

#[async_trait]
pub trait DbInterface: Send {
    async fn connect(&mut self, params: &ConnectParams) -> DbResult<()>;

    /// Tear down and re-establish the session with the same parameters.
    async fn reset(&mut self) -> DbResult<()>;

    async fn terminate(&mut self) -> DbResult<()>;

    async fn exec(&mut self, sql: &str) -> DbResult<()>;

    async fn exec_params(&mut self, sql: &str, params: &[SqlParam]) -> DbResult<()>;

    /// Register a server-side prepared statement under `name`
    /// (lower-cased). A name still present fails; deallocate first.
    async fn prepare(&mut self, name: &str, sql: &str) -> DbResult<()>;

    async fn exec_prepared(&mut self, name: &str, params: &[SqlParam]) -> DbResult<()>;

    /// Record a cursor without executing anything.
    async fn cursor_declare(&mut self, cursor: Cursor) -> DbResult<()>;

    async fn cursor_open(&mut self, name: &str, params: &[SqlParam]) -> DbResult<()>;

    async fn cursor_fetch_one(&mut self, name: &str, mode: FetchMode) -> DbResult<()>;

    async fn cursor_close(&mut self, name: &str) -> DbResult<()>;

    /// Succeeds iff the named (or current) result set has at least one row;
    /// an empty set reports NO_DATA / SQLSTATE 02000.
    async fn move_to_first_record(&mut self, stmt_name: Option<&str>) -> DbResult<()>;

    /// Read one column value as bytes. `max_len` bounds the caller's
    /// buffer: a longer value fails with TOO_MUCH_DATA and writes nothing.
    fn get_resultset_value(
        &self,
        source: &ResultSource,
        row: usize,
        col: usize,
        max_len: usize,
    ) -> DbResult<(Vec<u8>, bool)>;

    fn native_features(&self) -> u32;

    fn last_status(&self) -> &LastStatus;

    fn last_rc(&self) -> i32 {
        self.last_status().rc
    }

    fn last_error(&self) -> String {
        self.last_status().message.clone()
    }

    fn last_state(&self) -> String {
        self.last_status().state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobol_pg::{CobolVarType, FLAG_NONE};

    #[test]
    fn test_fetch_mode_codes() {
        assert_eq!(FetchMode::from_code(0), Some(FetchMode::Next));
        assert_eq!(FetchMode::from_code(1), Some(FetchMode::Prev));
        assert_eq!(FetchMode::from_code(2), Some(FetchMode::Current));
        assert_eq!(FetchMode::from_code(9), None);
    }

    #[test]
    fn test_param_bind_value() {
        let field = CobField::new(CobolVarType::UnsignedNumber, 4, 0, FLAG_NONE);
        let p = SqlParam::new(field, b"0042".to_vec());
        assert_eq!(p.bind_value().unwrap(), PgBindValue::Text("42".to_string()));

        let p = SqlParam::null(field);
        assert_eq!(p.bind_value().unwrap(), PgBindValue::Null);
    }
}
