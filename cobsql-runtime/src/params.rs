use std::collections::HashMap;

use getset::{Getters, Setters, WithSetters};

use crate::error::{code, DbError, DbResult};

/// Connection coordinates plus the backend option map, assembled by the
/// caller or parsed from a connection string of the form
/// `backend://user[.password]@host[:port]/dbname[?opt=val&…]`.
/// Options are forwarded verbatim to the backend; the driver itself reads
/// `autocommit`, `fixup_parameters`, `use_native_cursors` and
/// `decode_binary`.
#[derive(Debug, Clone, Default, Getters, Setters, WithSetters)]
#[getset(get = "pub", set = "pub", set_with = "pub")]
pub struct ConnectParams {
    backend: String,
    host: String,
    port: u16,
    username: String,
    password: String,
    dbname: String,
    options: HashMap<String, String>,
}

impl ConnectParams {
    pub fn new() -> ConnectParams {
        ConnectParams::default()
    }

    pub fn parse(conn_str: &str) -> DbResult<ConnectParams> {
        let (backend, rest) = conn_str.split_once("://").ok_or_else(|| {
            DbError::with_code(
                code::CONNECTION_FAILED,
                format!("malformed connection string {conn_str:?}"),
            )
        })?;

        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, Some(q)),
            None => (rest, None),
        };

        let (userinfo, hostpart) = match rest.rsplit_once('@') {
            Some((u, h)) => (Some(u), h),
            None => (None, rest),
        };

        let (hostport, dbname) = match hostpart.split_once('/') {
            Some((hp, db)) => (hp, db),
            None => (hostpart, ""),
        };

        let mut params = ConnectParams::new().with_backend(backend.to_string());
        if let Some(userinfo) = userinfo {
            match userinfo.split_once('.') {
                Some((user, password)) => {
                    params.username = user.to_string();
                    params.password = password.to_string();
                }
                None => params.username = userinfo.to_string(),
            }
        }
        match hostport.split_once(':') {
            Some((host, port)) => {
                params.host = host.to_string();
                params.port = port.parse().map_err(|_| {
                    DbError::with_code(
                        code::CONNECTION_FAILED,
                        format!("invalid port in connection string {conn_str:?}"),
                    )
                })?;
            }
            None => params.host = hostport.to_string(),
        }
        params.dbname = dbname.to_string();

        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                params
                    .options
                    .insert(key.to_lowercase(), value.to_string());
            }
        }
        Ok(params)
    }

    pub fn set_opt(&mut self, key: &str, value: impl Into<String>) {
        self.options.insert(key.to_lowercase(), value.into());
    }

    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn opt_bool(&self, key: &str, default: bool) -> bool {
        match self.options.get(key).map(String::as_str) {
            Some("1") | Some("on") | Some("true") | Some("yes") => true,
            Some("0") | Some("off") | Some("false") | Some("no") => false,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_form() {
        let p = ConnectParams::parse("pgsql://scott.tiger@dbhost:5433/payroll?autocommit=off")
            .unwrap();
        assert_eq!(p.backend(), "pgsql");
        assert_eq!(p.username(), "scott");
        assert_eq!(p.password(), "tiger");
        assert_eq!(p.host(), "dbhost");
        assert_eq!(*p.port(), 5433);
        assert_eq!(p.dbname(), "payroll");
        assert!(!p.opt_bool("autocommit", true));
    }

    #[test]
    fn test_parse_minimal_form() {
        let p = ConnectParams::parse("pgsql://localhost/test").unwrap();
        assert_eq!(p.host(), "localhost");
        assert_eq!(*p.port(), 0);
        assert_eq!(p.dbname(), "test");
        assert!(p.username().is_empty());
        assert!(p.opt_bool("autocommit", true));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ConnectParams::parse("not-a-connection-string").is_err());
        assert!(ConnectParams::parse("pgsql://host:notaport/db").is_err());
    }
}
