//! Reference backend driver over the native PostgreSQL protocol.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use log::{debug, warn};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, NoTls, Row, Statement};

use cobol_pg::{cell_to_bytes, cell_to_text, PgBindValue};

use crate::cursor::{Cursor, RowPosition};
use crate::error::{code, DbError, DbResult, LastStatus};
use crate::fixup::fixup_parameters;
use crate::interface::{features, DbInterface, FetchMode, ResultSource, SqlParam};
use crate::params::ConnectParams;

struct PreparedEntry {
    stmt: Statement,
    sql: String,
}

struct OpenCursor {
    native: bool,
    rows: Vec<Row>,
    pos: RowPosition,
}

fn first_keyword(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn is_tx_control(kw: &str) -> bool {
    matches!(kw, "begin" | "start" | "commit" | "rollback" | "end" | "abort")
}

fn ends_transaction(kw: &str) -> bool {
    matches!(kw, "commit" | "rollback" | "end" | "abort")
}

fn is_dml(kw: &str) -> bool {
    matches!(kw, "insert" | "update" | "delete")
}

fn returns_rows(kw: &str) -> bool {
    matches!(kw, "select" | "with" | "values" | "show" | "table" | "fetch")
}

/// One connection to a PostgreSQL backend: a client plus the prepared
/// statement and cursor tables the translated program drives.
pub struct PgsqlDriver {
    client: Option<Client>,
    conn_task: Option<tokio::task::JoinHandle<()>>,
    saved_params: Option<ConnectParams>,
    autocommit: bool,
    fixup_params: bool,
    native_cursors: bool,
    decode_binary: bool,
    prepared: HashMap<String, PreparedEntry>,
    declared: HashMap<String, Cursor>,
    cursors: HashMap<String, OpenCursor>,
    current_rows: Option<Vec<Row>>,
    stmt_rows: HashMap<String, Vec<Row>>,
    last: LastStatus,
}

impl Default for PgsqlDriver {
    fn default() -> Self {
        PgsqlDriver::new()
    }
}

impl PgsqlDriver {
    pub fn new() -> PgsqlDriver {
        PgsqlDriver {
            client: None,
            conn_task: None,
            saved_params: None,
            autocommit: true,
            fixup_params: false,
            native_cursors: false,
            decode_binary: false,
            prepared: HashMap::new(),
            declared: HashMap::new(),
            cursors: HashMap::new(),
            current_rows: None,
            stmt_rows: HashMap::new(),
            last: LastStatus::default(),
        }
    }

    fn client(&self) -> DbResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| DbError::with_code(code::CONNECTION_FAILED, "not connected"))
    }

    fn record<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        match &result {
            Ok(_) => self.last.record_ok(),
            Err(e) => self.last.record_err(e),
        }
        result
    }

    fn bind_values(params: &[SqlParam]) -> DbResult<Vec<PgBindValue>> {
        params.iter().map(SqlParam::bind_value).collect()
    }

    fn as_refs(values: &[PgBindValue]) -> Vec<&(dyn ToSql + Sync)> {
        values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }

    async fn begin_transaction(&self) -> DbResult<()> {
        self.client()?
            .batch_execute("BEGIN")
            .await
            .map_err(|e| DbError::from_pg(code::SQL_ERROR, e))
    }

    async fn connect_inner(&mut self, params: &ConnectParams) -> DbResult<()> {
        let mut config = Config::new();
        config.host(if params.host().is_empty() {
            "localhost"
        } else {
            params.host()
        });
        if *params.port() > 0 {
            config.port(*params.port());
        }
        if !params.username().is_empty() {
            config.user(params.username());
        }
        if !params.password().is_empty() {
            config.password(params.password());
        }
        if !params.dbname().is_empty() {
            config.dbname(params.dbname());
        }
        if let Some(timeout) = params.opt_str("connect_timeout") {
            if let Ok(secs) = timeout.parse::<u64>() {
                config.connect_timeout(Duration::from_secs(secs));
            }
        }
        if let Some(options) = params.opt_str("options") {
            config.options(options);
        }

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| DbError::from_pg(code::CONNECTION_FAILED, e))?;
        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("connection task ended with error: {e}");
            }
        });

        self.client = Some(client);
        self.conn_task = Some(task);
        self.saved_params = Some(params.clone());
        self.autocommit = params.opt_bool("autocommit", true);
        self.fixup_params = params.opt_bool("fixup_parameters", false);
        self.native_cursors = params.opt_bool("use_native_cursors", false);
        self.decode_binary = params.opt_bool("decode_binary", false);

        // with autocommit off the session always sits inside a transaction
        if !self.autocommit {
            self.begin_transaction().await?;
        }
        debug!(
            "connected to {}:{}/{}",
            params.host(),
            params.port(),
            params.dbname()
        );
        Ok(())
    }

    fn release_session(&mut self) {
        self.client = None;
        if let Some(task) = self.conn_task.take() {
            task.abort();
        }
        self.prepared.clear();
        self.declared.clear();
        self.cursors.clear();
        self.current_rows = None;
        self.stmt_rows.clear();
    }

    async fn exec_inner(&mut self, sql: &str, params: &[SqlParam]) -> DbResult<()> {
        let kw = first_keyword(sql);
        let values = Self::bind_values(params)?;
        let refs = Self::as_refs(&values);

        if is_tx_control(&kw) && refs.is_empty() {
            self.client()?
                .batch_execute(sql)
                .await
                .map_err(|e| DbError::from_pg(code::SQL_ERROR, e))?;
            if !self.autocommit && ends_transaction(&kw) {
                self.begin_transaction().await?;
            }
            return Ok(());
        }

        if returns_rows(&kw) {
            let rows = self
                .client()?
                .query(sql, &refs)
                .await
                .map_err(|e| DbError::from_pg(code::SQL_ERROR, e))?;
            self.current_rows = Some(rows);
            Ok(())
        } else {
            let affected = self
                .client()?
                .execute(sql, &refs)
                .await
                .map_err(|e| DbError::from_pg(code::SQL_ERROR, e))?;
            if is_dml(&kw) && affected == 0 {
                return Err(DbError::no_data());
            }
            Ok(())
        }
    }

    async fn prepare_inner(&mut self, name: &str, sql: &str) -> DbResult<()> {
        let key = name.to_lowercase();
        if self.prepared.contains_key(&key) {
            return Err(DbError::with_code(
                code::PREPARE_FAILED,
                format!("statement {key} is already prepared"),
            ));
        }
        let sql = if self.fixup_params {
            fixup_parameters(sql)
        } else {
            sql.to_string()
        };
        let stmt = self
            .client()?
            .prepare(&sql)
            .await
            .map_err(|e| DbError::from_pg(code::PREPARE_FAILED, e))?;
        debug!("prepared {key}: {sql}");
        self.prepared.insert(key, PreparedEntry { stmt, sql });
        Ok(())
    }

    async fn exec_prepared_inner(&mut self, name: &str, params: &[SqlParam]) -> DbResult<()> {
        let key = name.to_lowercase();
        let entry = self.prepared.get(&key).ok_or_else(|| {
            DbError::with_code(
                code::SQL_ERROR,
                format!("statement {key} is not prepared"),
            )
        })?;
        if entry.stmt.params().len() != params.len() {
            return Err(DbError::internal(format!(
                "statement {key} takes {} parameter(s), got {}",
                entry.stmt.params().len(),
                params.len()
            )));
        }
        let values = Self::bind_values(params)?;
        let refs = Self::as_refs(&values);

        if entry.stmt.columns().is_empty() {
            let kw = first_keyword(&entry.sql);
            let stmt = entry.stmt.clone();
            let affected = self
                .client()?
                .execute(&stmt, &refs)
                .await
                .map_err(|e| DbError::from_pg(code::SQL_ERROR, e))?;
            if is_dml(&kw) && affected == 0 {
                return Err(DbError::no_data());
            }
            Ok(())
        } else {
            let stmt = entry.stmt.clone();
            let rows = self
                .client()?
                .query(&stmt, &refs)
                .await
                .map_err(|e| DbError::from_pg(code::SQL_ERROR, e))?;
            self.stmt_rows.insert(key, rows);
            Ok(())
        }
    }

    /// Resolve the SQL text behind an `@name` cursor: the local prepared
    /// table first, the backend catalog second.
    async fn prepared_source(&self, stmt_name: &str) -> DbResult<String> {
        let key = stmt_name.to_lowercase();
        if let Some(entry) = self.prepared.get(&key) {
            return Ok(entry.sql.clone());
        }
        let rows = self
            .client()?
            .query(
                "SELECT statement FROM pg_prepared_statements WHERE lower(name) = $1",
                &[&key],
            )
            .await
            .map_err(|e| DbError::from_pg(code::OPEN_CURSOR_FAILED, e))?;
        match rows.first() {
            Some(row) => row
                .try_get::<_, String>(0)
                .map_err(|e| DbError::from_pg(code::OPEN_CURSOR_FAILED, e)),
            None => Err(DbError::with_code(
                code::OPEN_CURSOR_FAILED,
                format!("unknown prepared statement {key}"),
            )),
        }
    }

    async fn cursor_open_inner(&mut self, name: &str, params: &[SqlParam]) -> DbResult<()> {
        let mut spec = self.declared.get(name).cloned().ok_or_else(|| {
            DbError::with_code(
                code::OPEN_CURSOR_FAILED,
                format!("cursor {name} is not declared"),
            )
        })?;
        if !params.is_empty() {
            spec = spec.with_params(params.to_vec());
        }

        let sql = match spec.prepared_ref() {
            Some(stmt_name) => self.prepared_source(stmt_name).await?,
            None => spec.query().clone(),
        };
        let values = Self::bind_values(spec.params())?;

        let open = if self.native_cursors {
            let hold = if *spec.with_hold() { "WITH HOLD " } else { "" };
            let declare = format!("DECLARE {name} CURSOR {hold}FOR {sql}");
            let refs = Self::as_refs(&values);
            self.client()?
                .execute(declare.as_str(), &refs)
                .await
                .map_err(|e| DbError::from_pg(code::OPEN_CURSOR_FAILED, e))?;
            OpenCursor {
                native: true,
                rows: Vec::new(),
                pos: RowPosition::new(),
            }
        } else {
            let stream = self
                .client()?
                .query_raw(sql.as_str(), values.iter().map(|v| v as &(dyn ToSql + Sync)))
                .await
                .map_err(|e| DbError::from_pg(code::OPEN_CURSOR_FAILED, e))?;
            let rows: Vec<Row> = stream
                .try_collect()
                .await
                .map_err(|e| DbError::from_pg(code::OPEN_CURSOR_FAILED, e))?;
            OpenCursor {
                native: false,
                rows,
                pos: RowPosition::new(),
            }
        };

        self.cursors.insert(name.to_string(), open);
        Ok(())
    }

    async fn cursor_fetch_inner(&mut self, name: &str, mode: FetchMode) -> DbResult<()> {
        let native = self
            .cursors
            .get(name)
            .ok_or_else(|| {
                DbError::with_code(
                    code::FETCH_ROW_FAILED,
                    format!("cursor {name} is not open"),
                )
            })?
            .native;

        if native {
            if mode != FetchMode::Next {
                return Err(DbError::with_code(
                    code::FETCH_ROW_FAILED,
                    "scroll fetch requires emulated cursors",
                ));
            }
            let fetch = format!("FETCH NEXT FROM {name}");
            let rows = self
                .client()?
                .query(fetch.as_str(), &[])
                .await
                .map_err(|e| DbError::from_pg(code::FETCH_ROW_FAILED, e))?;
            let cursor = self.cursors.get_mut(name).expect("cursor checked above");
            if rows.is_empty() {
                return Err(DbError::no_data());
            }
            cursor.rows = rows;
            cursor.pos = RowPosition::new();
            cursor.pos.advance(FetchMode::Next, 1);
            Ok(())
        } else {
            let cursor = self.cursors.get_mut(name).expect("cursor checked above");
            match cursor.pos.advance(mode, cursor.rows.len()) {
                Some(_) => Ok(()),
                None => Err(DbError::no_data()),
            }
        }
    }

    async fn cursor_close_inner(&mut self, name: &str) -> DbResult<()> {
        let cursor = self.cursors.remove(name).ok_or_else(|| {
            DbError::with_code(
                code::CLOSE_CURSOR_FAILED,
                format!("cursor {name} is not open"),
            )
        })?;
        if cursor.native {
            let close = format!("CLOSE {name}");
            self.client()?
                .batch_execute(&close)
                .await
                .map_err(|e| DbError::from_pg(code::CLOSE_CURSOR_FAILED, e))?;
        }
        Ok(())
    }

    /// Index of the row the cursor currently stands on.
    pub fn cursor_row_index(&self, name: &str) -> Option<usize> {
        self.cursors.get(name).and_then(|c| c.pos.index())
    }
}

impl Drop for PgsqlDriver {
    fn drop(&mut self) {
        self.release_session();
    }
}

#[async_trait]
impl DbInterface for PgsqlDriver {
    async fn connect(&mut self, params: &ConnectParams) -> DbResult<()> {
        let result = self.connect_inner(params).await;
        self.record(result)
    }

    async fn reset(&mut self) -> DbResult<()> {
        let params = self.saved_params.clone().ok_or_else(|| {
            DbError::with_code(code::CONN_RESET_FAILED, "no previous connection")
        });
        let result = match params {
            Ok(params) => {
                self.release_session();
                self.connect_inner(&params)
                    .await
                    .map_err(|e| DbError::new(code::CONN_RESET_FAILED, e.state, e.message))
            }
            Err(e) => Err(e),
        };
        self.record(result)
    }

    async fn terminate(&mut self) -> DbResult<()> {
        self.release_session();
        let result = Ok(());
        self.record(result)
    }

    async fn exec(&mut self, sql: &str) -> DbResult<()> {
        let result = self.exec_inner(sql, &[]).await;
        self.record(result)
    }

    async fn exec_params(&mut self, sql: &str, params: &[SqlParam]) -> DbResult<()> {
        let result = self.exec_inner(sql, params).await;
        self.record(result)
    }

    async fn prepare(&mut self, name: &str, sql: &str) -> DbResult<()> {
        let result = self.prepare_inner(name, sql).await;
        self.record(result)
    }

    async fn exec_prepared(&mut self, name: &str, params: &[SqlParam]) -> DbResult<()> {
        let result = self.exec_prepared_inner(name, params).await;
        self.record(result)
    }

    async fn cursor_declare(&mut self, cursor: Cursor) -> DbResult<()> {
        let result = if self.cursors.contains_key(cursor.name()) {
            Err(DbError::with_code(
                code::DECLARE_CURSOR_FAILED,
                format!("cursor {} is open", cursor.name()),
            ))
        } else {
            self.declared.insert(cursor.name().clone(), cursor);
            Ok(())
        };
        self.record(result)
    }

    async fn cursor_open(&mut self, name: &str, params: &[SqlParam]) -> DbResult<()> {
        let result = self.cursor_open_inner(name, params).await;
        self.record(result)
    }

    async fn cursor_fetch_one(&mut self, name: &str, mode: FetchMode) -> DbResult<()> {
        let result = self.cursor_fetch_inner(name, mode).await;
        self.record(result)
    }

    async fn cursor_close(&mut self, name: &str) -> DbResult<()> {
        let result = self.cursor_close_inner(name).await;
        self.record(result)
    }

    async fn move_to_first_record(&mut self, stmt_name: Option<&str>) -> DbResult<()> {
        let result = {
            let rows = match stmt_name {
                Some(name) => self.stmt_rows.get(&name.to_lowercase()),
                None => self.current_rows.as_ref(),
            };
            match rows {
                None => Err(DbError::with_code(
                    code::MOVE_TO_FIRST_FAILED,
                    "no result set",
                )),
                Some(rows) if rows.is_empty() => Err(DbError::no_data()),
                Some(_) => Ok(()),
            }
        };
        self.record(result)
    }

    fn get_resultset_value(
        &self,
        source: &ResultSource,
        row: usize,
        col: usize,
        max_len: usize,
    ) -> DbResult<(Vec<u8>, bool)> {
        let rows: &[Row] = match source {
            ResultSource::Current => self
                .current_rows
                .as_deref()
                .ok_or_else(|| DbError::with_code(code::SQL_ERROR, "no result set"))?,
            ResultSource::Cursor(name) => {
                &self
                    .cursors
                    .get(name)
                    .ok_or_else(|| {
                        DbError::with_code(
                            code::FETCH_ROW_FAILED,
                            format!("cursor {name} is not open"),
                        )
                    })?
                    .rows
            }
            ResultSource::Statement(name) => self
                .stmt_rows
                .get(&name.to_lowercase())
                .map(Vec::as_slice)
                .ok_or_else(|| {
                    DbError::with_code(
                        code::SQL_ERROR,
                        format!("statement {name} has no result set"),
                    )
                })?,
        };
        let row = rows.get(row).ok_or_else(DbError::no_data)?;

        let value = if self.decode_binary {
            cell_to_bytes(row, col)
        } else {
            cell_to_text(row, col).map(|v| v.map(String::into_bytes))
        }
        .map_err(|e| DbError::with_code(code::SQL_ERROR, e.to_string()))?;

        match value {
            None => Ok((Vec::new(), true)),
            Some(bytes) => {
                if bytes.len() > max_len {
                    return Err(DbError::with_code(
                        code::TOO_MUCH_DATA,
                        format!("value of {} byte(s) exceeds buffer of {max_len}", bytes.len()),
                    ));
                }
                Ok((bytes, false))
            }
        }
    }

    fn native_features(&self) -> u32 {
        features::RESULTSET_ROW_COUNT
    }

    fn last_status(&self) -> &LastStatus {
        &self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_classification() {
        assert!(is_tx_control("begin"));
        assert!(ends_transaction("commit"));
        assert!(!ends_transaction("begin"));
        assert!(is_dml("update"));
        assert!(returns_rows("select"));
        assert!(returns_rows("with"));
        assert!(!returns_rows("insert"));
        assert_eq!(first_keyword("  SELECT 1"), "select");
    }

    #[tokio::test]
    async fn test_operations_without_connection_fail() {
        let mut driver = PgsqlDriver::new();
        let err = driver.exec("SELECT 1").await.unwrap_err();
        assert_eq!(err.code, code::CONNECTION_FAILED);
        assert_eq!(driver.last_rc(), code::CONNECTION_FAILED);

        let err = driver.reset().await.unwrap_err();
        assert_eq!(err.code, code::CONN_RESET_FAILED);
    }

    #[tokio::test]
    async fn test_cursor_state_checks() {
        let mut driver = PgsqlDriver::new();

        let err = driver
            .cursor_fetch_one("CUR1", FetchMode::Next)
            .await
            .unwrap_err();
        assert_eq!(err.code, code::FETCH_ROW_FAILED);

        let err = driver.cursor_close("CUR1").await.unwrap_err();
        assert_eq!(err.code, code::CLOSE_CURSOR_FAILED);

        driver
            .cursor_declare(Cursor::new("CUR1", "SELECT 1", false))
            .await
            .unwrap();
        assert!(driver.declared.contains_key("CUR1"));
        assert_eq!(driver.last_rc(), 0);
    }

    #[tokio::test]
    async fn test_exec_prepared_unknown_statement() {
        let mut driver = PgsqlDriver::new();
        let err = driver.exec_prepared("P1", &[]).await.unwrap_err();
        assert_eq!(err.code, code::SQL_ERROR);
        assert_eq!(driver.last_state(), crate::error::SQLSTATE_GENERIC);
    }

    #[tokio::test]
    async fn test_move_to_first_without_resultset() {
        let mut driver = PgsqlDriver::new();
        let err = driver.move_to_first_record(None).await.unwrap_err();
        assert_eq!(err.code, code::MOVE_TO_FIRST_FAILED);
    }
}
