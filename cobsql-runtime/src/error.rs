use thiserror::Error;

pub const SQLSTATE_SUCCESS: &str = "00000";
pub const SQLSTATE_NO_DATA: &str = "02000";
/// Generic driver-side failure with no backend SQLSTATE.
pub const SQLSTATE_GENERIC: &str = "HV000";

/// Numeric codes surfaced to the translated program. Negative values are
/// failures; 100 is the conventional "no data" SQLCODE.
pub mod code {
    pub const OK: i32 = 0;
    pub const NO_DATA: i32 = 100;
    pub const CONNECTION_FAILED: i32 = -100;
    pub const CONN_RESET_FAILED: i32 = -101;
    pub const DISCONNECT_FAILED: i32 = -102;
    pub const SQL_ERROR: i32 = -200;
    pub const PREPARE_FAILED: i32 = -201;
    pub const INTERNAL_ERR: i32 = -202;
    pub const DECLARE_CURSOR_FAILED: i32 = -300;
    pub const OPEN_CURSOR_FAILED: i32 = -301;
    pub const CLOSE_CURSOR_FAILED: i32 = -302;
    pub const FETCH_ROW_FAILED: i32 = -303;
    pub const MOVE_TO_FIRST_FAILED: i32 = -304;
    pub const TOO_MUCH_DATA: i32 = -400;
}

#[derive(Debug, Clone, Error)]
#[error("{message} (code {code}, state {state})")]
pub struct DbError {
    pub code: i32,
    pub state: String,
    pub message: String,
}

impl DbError {
    pub fn new(code: i32, state: impl Into<String>, message: impl Into<String>) -> DbError {
        DbError {
            code,
            state: state.into(),
            message: message.into(),
        }
    }

    /// A failure class with no backend SQLSTATE attached.
    pub fn with_code(code: i32, message: impl Into<String>) -> DbError {
        DbError::new(code, SQLSTATE_GENERIC, message)
    }

    pub fn internal(message: impl Into<String>) -> DbError {
        DbError::with_code(code::INTERNAL_ERR, message)
    }

    pub fn no_data() -> DbError {
        DbError::new(code::NO_DATA, SQLSTATE_NO_DATA, "no data")
    }

    pub fn is_no_data(&self) -> bool {
        self.code == code::NO_DATA
    }

    /// Wrap a backend error, keeping its SQLSTATE when there is one.
    pub fn from_pg(code: i32, err: tokio_postgres::Error) -> DbError {
        let state = err
            .code()
            .map(|s| s.code().to_string())
            .unwrap_or_else(|| SQLSTATE_GENERIC.to_string());
        DbError::new(code, state, err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// The `(last_rc, last_error, last_state)` triple every driver stashes
/// after each operation for the program to inspect.
#[derive(Debug, Clone)]
pub struct LastStatus {
    pub rc: i32,
    pub state: String,
    pub message: String,
}

impl Default for LastStatus {
    fn default() -> Self {
        LastStatus {
            rc: code::OK,
            state: SQLSTATE_SUCCESS.to_string(),
            message: String::new(),
        }
    }
}

impl LastStatus {
    pub fn record_ok(&mut self) {
        self.rc = code::OK;
        self.state = SQLSTATE_SUCCESS.to_string();
        self.message.clear();
    }

    pub fn record_err(&mut self, err: &DbError) {
        self.rc = err.code;
        self.state = err.state.clone();
        self.message = err.message.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_shape() {
        let e = DbError::no_data();
        assert_eq!(e.code, 100);
        assert_eq!(e.state, SQLSTATE_NO_DATA);
        assert!(e.is_no_data());
    }

    #[test]
    fn test_last_status_cycle() {
        let mut last = LastStatus::default();
        assert_eq!(last.rc, 0);
        assert_eq!(last.state, SQLSTATE_SUCCESS);

        last.record_err(&DbError::with_code(code::PREPARE_FAILED, "dup"));
        assert_eq!(last.rc, code::PREPARE_FAILED);
        assert_eq!(last.state, SQLSTATE_GENERIC);

        last.record_ok();
        assert_eq!(last.rc, 0);
        assert!(last.message.is_empty());
    }
}
